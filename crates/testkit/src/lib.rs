//! `vendorportal-testkit`
//!
//! In-process stand-in for the portal's external API, for integration tests.
//! It issues and verifies real HS256 tokens and keeps its records in memory.
//!
//! Seeded accounts (username / password):
//! - `acme_admin` / `admin123`: vendor admin of `V-100`
//! - `mgr_mia` / `manager1`, `ed_eli` / `editor1`, `vic_viewer` / `viewer1`: employees
//! - `pat01` / `patient1`, `johndoe` / `patient-pass`: patients; `johndoe`
//!   has four recorded engagements
//!
//! The seeded trial carries one protocol document.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod routes;
mod state;

pub use state::{StubState, StubUser, VENDOR_ID};

use state::lock;

pub const TEST_SECRET: &str = "test-secret";

/// Claims the stub signs, matching the real token issuer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubClaims {
    pub sub: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub exp: i64,
    pub iat: i64,
}

impl StubClaims {
    pub fn new(username: &str, role: &str, user_id: Option<i64>, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: username.to_string(),
            role: role.to_string(),
            user_id,
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

pub(crate) fn encode_claims(secret: &str, claims: &StubClaims) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

/// Mint a token signed with [`TEST_SECRET`]; a negative `ttl` yields an
/// already-expired token.
pub fn mint_token(username: &str, role: &str, user_id: Option<i64>, ttl: Duration) -> String {
    let mut claims = StubClaims::new(username, role, user_id, ttl.num_seconds());
    if ttl < Duration::zero() {
        claims.iat = claims.exp - 60;
    }
    sign_claims(&claims)
}

/// Sign arbitrary claims with [`TEST_SECRET`].
pub fn sign_claims(claims: &StubClaims) -> String {
    encode_claims(TEST_SECRET, claims)
}

/// Stub API bound to an ephemeral local port. Aborted on drop.
pub struct StubApi {
    pub base_url: String,
    state: Arc<StubState>,
    handle: tokio::task::JoinHandle<()>,
}

impl StubApi {
    pub async fn spawn() -> Self {
        let state = Arc::new(StubState::seeded(TEST_SECRET));
        let app = routes::router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().expect("listener has no local address");
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "stub API stopped");
            }
        });

        Self { base_url, state, handle }
    }

    pub fn state(&self) -> &StubState {
        &self.state
    }

    /// Reject every bearer token from now on, as after a server-side revocation.
    pub fn revoke_all_tokens(&self) {
        self.state.revoked.store(true, Ordering::SeqCst);
    }

    /// Lifetime of tokens issued by `POST /token`.
    pub fn set_token_ttl(&self, ttl: Duration) {
        self.state.token_ttl_secs.store(ttl.num_seconds(), Ordering::SeqCst);
    }

    /// Serve `body` verbatim as `username`'s permission object.
    pub fn override_permissions(&self, username: &str, body: Value) {
        lock(&self.state.permission_overrides).insert(username.to_string(), body);
    }

    /// Make the permissions endpoint fail with `status`.
    pub fn fail_permissions(&self, status: u16) {
        *lock(&self.state.permissions_failure) = Some(status);
    }

    pub fn restore_permissions(&self) {
        *lock(&self.state.permissions_failure) = None;
    }

    /// Change the stored employee sub-role behind `username`.
    pub fn set_employee_role(&self, username: &str, role: vendorportal_auth::EmployeeRole) {
        if let Some(user) = lock(&self.state.users).iter_mut().find(|u| u.username == username) {
            user.employee_role = Some(role);
        }
    }

    pub fn disable_user(&self, username: &str) {
        if let Some(user) = lock(&self.state.users).iter_mut().find(|u| u.username == username) {
            user.disabled = true;
        }
    }

    /// Requests received for `path`, across all methods.
    pub fn hits(&self, path: &str) -> usize {
        lock(&self.state.hits).get(path).copied().unwrap_or(0)
    }
}

impl Drop for StubApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
