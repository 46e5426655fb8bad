//! `vendorportal` command-line client.
//!
//! The session is kept in the configured storage directory, so it survives
//! between invocations the way a browser session survives a reload.

use anyhow::{Context, Result, bail};

use vendorportal_auth::{AccountRole, Permission, explain_authorization};
use vendorportal_client::account::{IdentityCheck, PasswordReset, Registration};
use vendorportal_client::resources::employees::EmployeeQuery;
use vendorportal_client::resources::patients::PatientQuery;
use vendorportal_client::resources::trials::TrialQuery;
use vendorportal_client::{ClientConfig, SessionManager};

const USAGE: &str = "usage: vendorportal <command>

commands:
  login <username> <password>
  register <username> <email> <password> <first-name> <last-name> <role>
  reset-password <username> <email> <new-password>
  logout
  status
  whoami
  validate
  permissions [--refresh] [--explain <permission>]
  employees
  patients
  products
  trials
  documents <trial-id>
  dashboard
  metrics";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    vendorportal_observability::init();

    let config = ClientConfig::from_env();
    let session = SessionManager::from_config(&config).context("failed to initialize client")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        println!("{USAGE}");
        return Ok(());
    };

    match command.as_str() {
        "login" => {
            let [username, password] = rest else {
                bail!("usage: vendorportal login <username> <password>");
            };
            let profile = session.login(username, password).await?;
            println!("signed in as {} ({})", profile.display_name(), profile.role);
        }
        "register" => {
            let [username, email, password, first_name, last_name, role] = rest else {
                bail!("usage: vendorportal register <username> <email> <password> <first-name> <last-name> <role>");
            };
            let registered = session
                .register(&Registration {
                    username: username.clone(),
                    first_name: first_name.clone(),
                    last_name: last_name.clone(),
                    email: email.clone(),
                    password: password.clone(),
                    role: AccountRole::from(role.as_str()),
                    status: None,
                    age: None,
                    gender: None,
                    phone: None,
                    professional_data: None,
                })
                .await?;
            println!("registered {} as {} (user #{})", registered.username, registered.role, registered.user_id);
        }
        "reset-password" => {
            let [username, email, new_password] = rest else {
                bail!("usage: vendorportal reset-password <username> <email> <new-password>");
            };
            let identity = IdentityCheck::new(username.as_str(), email.as_str());
            let recovery = session.recovery();
            recovery.verify_identity(&identity).await?;
            recovery
                .reset_password(&PasswordReset {
                    identity,
                    new_password: new_password.clone(),
                })
                .await?;
            println!("password updated; sign in with the new password");
        }
        "logout" => {
            session.logout()?;
            println!("signed out");
        }
        "status" => status(&session),
        "whoami" => {
            let profile = session.profile().context("not signed in")?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        "validate" => {
            if session.validate_token().await {
                println!("token accepted");
            } else if session.api().check_connectivity().await {
                println!("token rejected; signed out");
            } else {
                println!("API unreachable at {}", session.api().base_url());
            }
        }
        "permissions" => permissions(&session, rest).await?,
        "employees" => {
            let list = session.employees().list(&EmployeeQuery::default()).await?;
            println!("{} employee(s) for vendor {}", list.total_count, list.vendor_id);
            for e in list.employees {
                println!(
                    "  #{:<5} {:<20} {:<8} {:<8} {}",
                    e.employee_id,
                    e.username,
                    e.employee_role,
                    e.status,
                    e.full_name()
                );
            }
        }
        "patients" => {
            let list = session.patients().list(&PatientQuery::default()).await?;
            println!("{} patient(s)", list.total_count);
            for p in list.patients {
                println!("  #{:<5} {:<20} {:<8} {} {}", p.patient_id, p.username, p.status, p.first_name, p.last_name);
            }
        }
        "products" => {
            let list = session.products().list().await?;
            println!("{} product(s)", list.total_products);
            for p in list.products {
                let price = p
                    .effective_price()
                    .map(|price| price.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("  #{:<5} {:<30} {}", p.product_id, p.name, price);
            }
        }
        "trials" => {
            let trials = session.trials().list(&TrialQuery::default()).await?;
            for t in trials {
                println!("  #{:<5} {:<40} {:<12} irb:{}", t.trial_id, t.trial_name, t.trial_status, t.irb_status);
            }
        }
        "documents" => {
            let [trial_id] = rest else {
                bail!("usage: vendorportal documents <trial-id>");
            };
            let docs = session.trials().documents(trial_id.parse()?).await?;
            for d in docs {
                println!("  #{:<5} {:<12} {:<40} v{}", d.document_id, d.document_type, d.document_name, d.version.unwrap_or(1));
            }
        }
        "metrics" => {
            let metrics = session.metrics();
            let d = metrics.dashboard().await?;
            let c = metrics.customer_insights().await?;
            println!("impressions: {}  engagement: {:.1}%  reach: {}", d.total_impressions, d.engagement_rate, d.customer_reach);
            println!(
                "customers:   {} total, {} new, retention {:.1}%, avg health {:.1}",
                c.total_customers, c.new_customers, c.retention_rate, c.avg_health_index
            );
            for r in metrics.recent_customers().await? {
                println!("  #{:<5} {:<30} {:>3} visit(s) {:?}", r.customer_id, r.full_name, r.visit_count, r.health_status);
            }
        }
        "dashboard" => {
            let d = session.trials().dashboard().await?;
            println!("trials: {} total, {} active, {} completed", d.total_trials, d.active_trials, d.completed_trials);
            println!("irb:    {} pending, {} approved", d.pending_irb, d.approved_irb);
        }
        other => {
            eprintln!("unknown command '{other}'\n\n{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

fn status(session: &SessionManager) {
    if !session.is_authenticated() {
        println!("not signed in");
        return;
    }
    let caps = session.capabilities();
    match (session.profile(), session.session()) {
        (Some(profile), Some(current)) => {
            let left = current.remaining(chrono::Utc::now());
            println!("signed in as {} ({})", profile.username, caps.role());
            println!("session expires {} ({} min left)", current.expires_at, left.num_minutes());
        }
        _ => println!("signed in ({})", caps.role()),
    }
}

async fn permissions(session: &SessionManager, args: &[String]) -> Result<()> {
    let mut refresh = false;
    let mut explain = None;
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--refresh" => refresh = true,
            "--explain" => {
                let name = args.next().context("--explain needs a permission name")?;
                explain = Some(name.parse::<Permission>()?);
            }
            other => bail!("unexpected argument '{other}'"),
        }
    }

    if refresh {
        session.refresh_permissions().await?;
    }

    let caps = session.capabilities();
    if let Some(required) = explain {
        let explanation = explain_authorization(&caps, required);
        println!("{}", serde_json::to_string_pretty(&explanation)?);
        return Ok(());
    }

    println!("role:                 {}", caps.role());
    println!("can edit content:     {}", caps.can_edit_content());
    println!("viewer only:          {}", caps.is_viewer_only());
    println!("can manage employees: {}", caps.can_manage_employees());
    for permission in Permission::ALL {
        println!("  {:<26} {}", permission.as_str(), caps.has_permission(permission));
    }
    Ok(())
}
