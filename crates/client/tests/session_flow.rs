use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;

use vendorportal_auth::{AccountRole, EmployeeRole, Permission, Role};
use vendorportal_client::{
    ApiClient, AuthError, ClientConfig, EndReason, FileStore, RequestError, SessionEvent, SessionManager,
    SessionStore,
};
use vendorportal_testkit::{StubApi, mint_token};

fn manager_for(api: &StubApi, store: SessionStore) -> SessionManager {
    let config = ClientConfig::default().with_api_url(&api.base_url);
    SessionManager::new(ApiClient::new(&config).expect("http client"), store)
}

fn in_memory(api: &StubApi) -> SessionManager {
    manager_for(api, SessionStore::in_memory())
}

fn scratch_dir(name: &str) -> PathBuf {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    std::env::temp_dir().join(format!("vendorportal-{name}-{}-{nanos}", std::process::id()))
}

fn drain_ended(rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<EndReason> {
    let mut ended = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(SessionEvent::Ended { reason }) => ended.push(reason),
            Ok(_) => {}
            Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => return ended,
        }
    }
}

#[tokio::test]
async fn vendor_login_grants_everything() {
    let api = StubApi::spawn().await;
    let session = in_memory(&api);
    let mut events = session.subscribe();

    let profile = session.login("acme_admin", "admin123").await.unwrap();
    assert_eq!(profile.role, AccountRole::Vendor);

    assert!(session.is_authenticated());
    let caps = session.capabilities();
    assert_eq!(caps.role(), Role::VendorAdmin);
    assert!(Permission::ALL.iter().all(|p| caps.has_permission(*p)));
    assert!(!caps.is_viewer_only());

    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::LoggedIn {
            username: "acme_admin".into(),
            role: AccountRole::Vendor
        }
    );
}

#[tokio::test]
async fn employee_login_caches_role_permissions() {
    let api = StubApi::spawn().await;

    let viewer = in_memory(&api);
    viewer.login("vic_viewer", "viewer1").await.unwrap();
    let caps = viewer.capabilities();
    assert_eq!(caps.role(), Role::Employee(EmployeeRole::Viewer));
    assert!(!caps.can_edit_content());
    assert!(caps.is_viewer_only());

    let manager = in_memory(&api);
    manager.login("mgr_mia", "manager1").await.unwrap();
    let caps = manager.capabilities();
    assert!(caps.can_manage_employees());
    assert!(!caps.has_permission(Permission::CanDeleteEmployees));

    let editor = in_memory(&api);
    editor.login("ed_eli", "editor1").await.unwrap();
    let caps = editor.capabilities();
    assert!(caps.can_edit_content());
    assert!(!caps.has_permission(Permission::CanDeleteEmployees));
}

#[tokio::test]
async fn patient_login_has_no_portal_capabilities() {
    let api = StubApi::spawn().await;
    let session = in_memory(&api);

    session.login("pat01", "patient1").await.unwrap();

    assert_eq!(session.capabilities().role(), Role::Patient);
    assert!(session.employee_permissions().is_none());
    assert_eq!(api.hits("/api/vendor/employees/me/permissions"), 0);
}

#[tokio::test]
async fn wrong_password_leaves_nothing_stored() {
    let api = StubApi::spawn().await;
    let session = in_memory(&api);

    let err = session.login("acme_admin", "nope").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials), "got {err:?}");
    assert!(!session.is_authenticated());
    assert!(session.token().is_none());
    assert!(session.profile().is_none());
}

#[tokio::test]
async fn disabled_account_cannot_sign_in() {
    let api = StubApi::spawn().await;
    api.disable_user("ed_eli");
    let session = in_memory(&api);

    let err = session.login("ed_eli", "editor1").await.unwrap_err();
    assert!(matches!(err, AuthError::AccountDisabled), "got {err:?}");
    assert!(session.token().is_none());
}

#[tokio::test]
async fn new_login_replaces_previous_session() {
    let api = StubApi::spawn().await;
    let session = in_memory(&api);

    session.login("mgr_mia", "manager1").await.unwrap();
    let mut events = session.subscribe();
    session.login("pat01", "patient1").await.unwrap();

    assert_eq!(session.profile().unwrap().username, "pat01");
    assert!(session.employee_permissions().is_none());
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::Ended {
            reason: EndReason::Logout
        }
    );
    assert!(matches!(events.try_recv().unwrap(), SessionEvent::LoggedIn { username, .. } if username == "pat01"));
}

#[tokio::test]
async fn first_login_announces_no_ended_session() {
    let api = StubApi::spawn().await;
    let session = in_memory(&api);
    let mut events = session.subscribe();

    session.login("acme_admin", "admin123").await.unwrap();

    assert!(drain_ended(&mut events).is_empty());
}

#[tokio::test]
async fn over_generous_server_permissions_are_clamped() {
    let api = StubApi::spawn().await;
    let viewer = api.state().user("vic_viewer").unwrap();
    api.override_permissions(
        "vic_viewer",
        json!({
            "user_id": viewer.user_id,
            "vendor_id": "V-100",
            "user_type": "viewer",
            "can_create_employees": true,
            "can_edit_employees": true,
            "can_delete_employees": true,
            "can_deactivate_employees": true,
        }),
    );
    let session = in_memory(&api);

    session.login("vic_viewer", "viewer1").await.unwrap();

    let cached = session.employee_permissions().unwrap();
    assert!(cached.granted().is_empty());
    assert!(!session.capabilities().can_manage_employees());
}

#[tokio::test]
async fn permission_failure_keeps_employee_restricted() {
    let api = StubApi::spawn().await;
    api.fail_permissions(500);
    let session = in_memory(&api);

    session.login("mgr_mia", "manager1").await.unwrap();

    assert!(session.is_authenticated());
    let caps = session.capabilities();
    assert_eq!(caps.role(), Role::Unresolved);
    assert!(!caps.can_manage_employees());
    assert!(!caps.can_edit_content());
    assert!(!session.permissions_loading());

    api.restore_permissions();
    session.refresh_permissions().await.unwrap();
    assert_eq!(session.capabilities().role(), Role::Employee(EmployeeRole::Manager));
}

#[tokio::test]
async fn refresh_picks_up_a_server_side_role_change() {
    let api = StubApi::spawn().await;
    let session = in_memory(&api);
    session.login("ed_eli", "editor1").await.unwrap();

    api.set_employee_role("ed_eli", EmployeeRole::Viewer);
    assert!(session.capabilities().can_edit_content());

    session.refresh_permissions().await.unwrap();
    assert!(!session.capabilities().can_edit_content());
}

#[tokio::test]
async fn concurrent_unauthorized_responses_end_the_session_once() {
    let api = StubApi::spawn().await;
    let session = Arc::new(in_memory(&api));
    session.login("acme_admin", "admin123").await.unwrap();
    let mut events = session.subscribe();

    api.revoke_all_tokens();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let session = session.clone();
        handles.push(tokio::spawn(async move { session.products().list().await }));
    }
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(
            matches!(result, Err(RequestError::Unauthorized | RequestError::NotAuthenticated)),
            "got {result:?}"
        );
    }

    assert_eq!(drain_ended(&mut events), vec![EndReason::Unauthorized]);
    assert!(!session.is_authenticated());
    assert!(session.token().is_none());
}

#[tokio::test]
async fn validate_token_logs_out_when_rejected() {
    let api = StubApi::spawn().await;
    let session = in_memory(&api);
    session.login("mgr_mia", "manager1").await.unwrap();

    assert!(session.validate_token().await);

    api.revoke_all_tokens();
    let mut events = session.subscribe();
    assert!(!session.validate_token().await);
    assert!(session.token().is_none());
    assert_eq!(drain_ended(&mut events), vec![EndReason::Unauthorized]);
}

#[tokio::test]
async fn validate_token_keeps_session_when_api_is_unreachable() {
    let config = ClientConfig::default().with_api_url("http://127.0.0.1:9");
    let session = SessionManager::new(ApiClient::new(&config).unwrap(), SessionStore::in_memory());
    session
        .store()
        .save_token(&mint_token("acme_admin", "vendor", Some(100), Duration::minutes(5)))
        .unwrap();

    assert!(!session.validate_token().await);
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn expired_stub_token_is_cleared_locally() {
    let api = StubApi::spawn().await;
    api.set_token_ttl(Duration::seconds(-30));
    let session = in_memory(&api);

    // The stub rejects its own expired token when the profile is requested.
    let err = session.login("acme_admin", "admin123").await.unwrap_err();
    assert!(matches!(err, AuthError::SessionRejected), "got {err:?}");
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn file_store_survives_reload_and_logout_clears_it() {
    let api = StubApi::spawn().await;
    let dir = scratch_dir("reload");

    {
        let session = manager_for(&api, SessionStore::new(FileStore::open(&dir).unwrap()));
        session.login("mgr_mia", "manager1").await.unwrap();
    }

    let reloaded = manager_for(&api, SessionStore::new(FileStore::open(&dir).unwrap()));
    assert!(reloaded.is_authenticated());
    assert_eq!(reloaded.profile().unwrap().username, "mgr_mia");
    assert!(reloaded.capabilities().can_manage_employees());

    reloaded.logout().unwrap();

    let after_logout = manager_for(&api, SessionStore::new(FileStore::open(&dir).unwrap()));
    assert!(!after_logout.is_authenticated());
    assert!(after_logout.employee_permissions().is_none());

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn logout_emits_a_single_event() {
    let api = StubApi::spawn().await;
    let session = in_memory(&api);
    session.login("acme_admin", "admin123").await.unwrap();
    let mut events = session.subscribe();

    session.logout().unwrap();
    session.logout().unwrap();

    assert_eq!(drain_ended(&mut events), vec![EndReason::Logout]);
}
