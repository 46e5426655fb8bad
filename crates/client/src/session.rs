//! Session manager: sign-in lifecycle, cached identity and central 401 sink.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;

use vendorportal_auth::{AccountRole, Capabilities, EmployeePermissions, Session, UserProfile};

use crate::config::ClientConfig;
use crate::error::{AuthError, RequestError, error_detail};
use crate::http::ApiClient;
use crate::storage::{FileStore, SessionStore, StorageResult};

const EVENT_CAPACITY: usize = 16;

pub const PROFILE_PATH: &str = "/users/me";
pub const VALIDATE_PATH: &str = "/validate-token";
pub const PERMISSIONS_PATH: &str = "/api/vendor/employees/me/permissions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Logout,
    Expired,
    Unauthorized,
}

/// Session lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { username: String, role: AccountRole },
    Ended { reason: EndReason },
}

/// Owns the persisted session and every request made on its behalf.
///
/// Storage is the single source of truth: nothing here caches identity in
/// memory, so every read reflects the last login or clear.
pub struct SessionManager {
    api: ApiClient,
    store: SessionStore,
    events: broadcast::Sender<SessionEvent>,
    permissions_loading: AtomicUsize,
}

/// One in-flight permission fetch; overlapping fetches each hold their own.
struct LoadingFlag<'a>(&'a AtomicUsize);

impl<'a> LoadingFlag<'a> {
    fn raise(in_flight: &'a AtomicUsize) -> Self {
        in_flight.fetch_add(1, Ordering::SeqCst);
        Self(in_flight)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SessionManager {
    pub fn new(api: ApiClient, store: SessionStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            store,
            events,
            permissions_loading: AtomicUsize::new(0),
        }
    }

    /// HTTP client plus file storage when a storage directory is configured.
    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        let api = ApiClient::new(config)?;
        let store = match &config.storage_dir {
            Some(dir) => {
                let file = FileStore::open(dir)?;
                tracing::debug!(path = %file.path().display(), "using file session store");
                SessionStore::new(file)
            }
            None => {
                tracing::warn!("no storage directory available; session will not persist");
                SessionStore::in_memory()
            }
        };
        Ok(Self::new(api, store))
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// True while any employee permission fetch is in flight.
    pub fn permissions_loading(&self) -> bool {
        self.permissions_loading.load(Ordering::SeqCst) > 0
    }

    /// Exchange credentials for a session.
    ///
    /// Each step is awaited in order: the token is persisted before the profile
    /// is requested, and the profile is persisted before permissions are.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserProfile, AuthError> {
        // A new sign-in fully replaces whatever was stored; subscribers see
        // the previous session end before the new one starts.
        self.end_session(EndReason::Logout)?;

        let token = self.api.request_token(username, password).await?;
        let session = Session::from_token(token)?;
        self.store.save_token(&session.token)?;

        match self.complete_login(&session).await {
            Ok(profile) => {
                tracing::info!(username = %profile.username, role = %profile.role, "signed in");
                let _ = self.events.send(SessionEvent::LoggedIn {
                    username: profile.username.clone(),
                    role: profile.role.clone(),
                });
                Ok(profile)
            }
            Err(e) => {
                if let Err(clear_err) = self.store.clear() {
                    tracing::error!(error = %clear_err, "failed to discard partial session");
                }
                Err(e)
            }
        }
    }

    async fn complete_login(&self, session: &Session) -> Result<UserProfile, AuthError> {
        let profile = self.fetch_profile(&session.token).await?;
        if profile.is_disabled() {
            return Err(AuthError::AccountDisabled);
        }
        self.store.save_profile(&profile)?;

        if matches!(profile.role, AccountRole::Vendor | AccountRole::Employee) {
            match self.load_permissions(&session.token).await {
                Ok(_) => {}
                Err(RequestError::Unauthorized) => return Err(AuthError::SessionRejected),
                Err(RequestError::Storage(e)) => return Err(AuthError::Storage(e)),
                Err(e) => {
                    tracing::warn!(error = %e, "could not load employee permissions; access stays restricted");
                }
            }
        }

        Ok(profile)
    }

    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, AuthError> {
        let resp = self
            .api
            .request(Method::GET, PROFILE_PATH)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => {
                resp.json().await.map_err(|e| AuthError::Decode(e.to_string()))
            }
            StatusCode::UNAUTHORIZED => Err(AuthError::SessionRejected),
            StatusCode::FORBIDDEN => Err(AuthError::AccountDisabled),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(AuthError::UnexpectedStatus {
                    status: status.as_u16(),
                    detail: error_detail(&body),
                })
            }
        }
    }

    /// Fetch, clamp and cache the permission object with an explicit token.
    ///
    /// A 401 here is reported to the caller, not routed through
    /// [`handle_unauthorized`](Self::handle_unauthorized): during login the
    /// caller owns the partial session.
    async fn load_permissions(&self, token: &str) -> Result<EmployeePermissions, RequestError> {
        let _loading = LoadingFlag::raise(&self.permissions_loading);

        let resp = self
            .api
            .request(Method::GET, PERMISSIONS_PATH)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RequestError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RequestError::from_status(status, &body));
        }

        let permissions: EmployeePermissions =
            resp.json().await.map_err(|e| RequestError::Decode(e.to_string()))?;
        self.cache_permissions(permissions)
    }

    fn cache_permissions(&self, mut permissions: EmployeePermissions) -> Result<EmployeePermissions, RequestError> {
        if permissions.clamp_to_role() {
            tracing::warn!(
                user_type = permissions.user_type.as_str(),
                "permission object disagreed with the role table; clamped"
            );
        }
        self.store.save_permissions(&permissions)?;
        Ok(permissions)
    }

    /// Re-fetch the employee permission object without signing in again.
    pub async fn refresh_permissions(&self) -> Result<EmployeePermissions, RequestError> {
        let _loading = LoadingFlag::raise(&self.permissions_loading);
        let permissions: EmployeePermissions = self.get(PERMISSIONS_PATH).await?;
        let permissions = self.cache_permissions(permissions)?;
        tracing::debug!(granted = ?permissions.granted(), "employee permissions refreshed");
        Ok(permissions)
    }

    pub fn logout(&self) -> StorageResult<()> {
        self.end_session(EndReason::Logout).map(|_| ())
    }

    /// Token present, decodable and not past expiry.
    ///
    /// An expired or undecodable token is cleared on the spot. Issue time is
    /// not checked: a client clock behind the server's must not sign out a
    /// live session.
    pub fn is_authenticated(&self) -> bool {
        let Some(token) = self.token() else {
            return false;
        };

        let now = Utc::now();
        match Session::from_token(token) {
            Ok(session) if session.is_expired(now) => {
                tracing::warn!(expired_at = %session.expires_at, "stored token has expired");
                self.expire();
                false
            }
            Ok(session) => {
                if let Err(e) = session.validate(now) {
                    tracing::debug!(error = %e, "token time window disagrees with local clock");
                }
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "stored token is unreadable");
                self.expire();
                false
            }
        }
    }

    fn expire(&self) {
        if let Err(e) = self.end_session(EndReason::Expired) {
            tracing::error!(error = %e, "failed to clear expired session");
        }
    }

    pub fn token(&self) -> Option<String> {
        self.store.token().unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to read token");
            None
        })
    }

    pub fn session(&self) -> Option<Session> {
        self.token().and_then(|token| Session::from_token(token).ok())
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.store.profile().unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to read profile");
            None
        })
    }

    pub fn employee_permissions(&self) -> Option<EmployeePermissions> {
        self.store.permissions().unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to read employee permissions");
            None
        })
    }

    /// Capability set derived from storage as of this call.
    pub fn capabilities(&self) -> Capabilities {
        if !self.is_authenticated() {
            return Capabilities::anonymous();
        }
        let role = match (self.profile(), self.session()) {
            (Some(profile), _) => profile.role,
            (None, Some(session)) => session.role,
            (None, None) => return Capabilities::anonymous(),
        };
        Capabilities::new(role, self.employee_permissions())
    }

    /// Ask the API whether the stored token is still accepted.
    ///
    /// A rejection logs out. A transport failure reports `false` and leaves the
    /// session alone.
    pub async fn validate_token(&self) -> bool {
        let Some(token) = self.token() else {
            return false;
        };

        match self.api.request(Method::GET, VALIDATE_PATH).bearer_auth(&token).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!(status = resp.status().as_u16(), "token rejected by API");
                self.reject_token(&token, VALIDATE_PATH);
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "token validation could not reach the API");
                false
            }
        }
    }

    /// Central sink for 401 responses.
    ///
    /// Returns `true` for the one caller that actually ended the session.
    pub fn handle_unauthorized(&self, origin: &str) -> bool {
        match self.end_session(EndReason::Unauthorized) {
            Ok(ended) => {
                if ended {
                    tracing::warn!(origin, "API rejected the session; signed out");
                }
                ended
            }
            Err(e) => {
                tracing::error!(origin, error = %e, "failed to clear rejected session");
                false
            }
        }
    }

    /// 401 for a request sent with `token`.
    ///
    /// Ends the session only while `token` is still the stored one, so a late
    /// rejection of a replaced session leaves the newer sign-in alone.
    fn reject_token(&self, token: &str, origin: &str) -> bool {
        match self.store.clear_if_token(token) {
            Ok(ended) => {
                if ended {
                    tracing::warn!(origin, "API rejected the session; signed out");
                    self.announce_end(EndReason::Unauthorized);
                } else {
                    tracing::debug!(origin, "ignoring 401 for a token that is no longer stored");
                }
                ended
            }
            Err(e) => {
                tracing::error!(origin, error = %e, "failed to clear rejected session");
                false
            }
        }
    }

    fn end_session(&self, reason: EndReason) -> StorageResult<bool> {
        let ended = self.store.clear()?;
        if ended {
            self.announce_end(reason);
        }
        Ok(ended)
    }

    fn announce_end(&self, reason: EndReason) {
        if reason == EndReason::Logout {
            tracing::info!("signed out");
        }
        let _ = self.events.send(SessionEvent::Ended { reason });
    }

    /// Authenticated request returning a decoded JSON body.
    ///
    /// A 401 from any endpoint ends the session before the error is returned.
    pub async fn execute<T, F>(&self, method: Method, path: &str, configure: F) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        if !self.is_authenticated() {
            return Err(RequestError::NotAuthenticated);
        }
        let token = self.token().ok_or(RequestError::NotAuthenticated)?;

        tracing::debug!(%method, path, "api request");
        let request = configure(self.api.request(method, path).bearer_auth(&token));
        let resp = request
            .send()
            .await
            .map_err(|e| RequestError::Network(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            self.reject_token(&token, path);
            return Err(RequestError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), path, "api request failed");
            return Err(RequestError::from_status(status, &body));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| RequestError::Network(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| RequestError::Decode(e.to_string()))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        self.execute(Method::GET, path, |req| req).await
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("api", &self.api.base_url())
            .field("permissions_loading", &self.permissions_loading())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use vendorportal_testkit::{StubClaims, mint_token, sign_claims};

    fn employee_token(ttl: Duration) -> String {
        mint_token("dana", "employee", Some(12), ttl)
    }

    fn manager() -> SessionManager {
        let config = ClientConfig::default().with_api_url("http://127.0.0.1:9");
        SessionManager::new(ApiClient::new(&config).unwrap(), SessionStore::in_memory())
    }

    #[test]
    fn expired_token_is_cleared_once() {
        let manager = manager();
        let mut events = manager.subscribe();
        manager
            .store()
            .save_token(&employee_token(Duration::seconds(-10)))
            .unwrap();

        assert!(!manager.is_authenticated());
        assert!(!manager.is_authenticated());
        assert_eq!(manager.token(), None);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Ended { reason: EndReason::Expired }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn token_issued_ahead_of_local_clock_stays_signed_in() {
        let manager = manager();
        let mut events = manager.subscribe();
        let now = Utc::now();
        let mut claims = StubClaims::new("acme_admin", "vendor", Some(100), 3600);
        claims.iat = (now + Duration::seconds(300)).timestamp();
        let token = sign_claims(&claims);
        manager.store().save_token(&token).unwrap();

        assert!(manager.is_authenticated());
        assert_eq!(manager.token().as_deref(), Some(token.as_str()));
        assert!(manager.capabilities().is_vendor_admin());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn inverted_time_window_is_kept_until_expiry() {
        let manager = manager();
        let mut claims = StubClaims::new("acme_admin", "vendor", Some(100), 600);
        claims.iat = claims.exp + 60;
        manager.store().save_token(&sign_claims(&claims)).unwrap();

        assert!(manager.is_authenticated());
        assert!(manager.token().is_some());
    }

    #[test]
    fn live_token_without_permissions_is_unresolved() {
        let manager = manager();
        manager
            .store()
            .save_token(&employee_token(Duration::minutes(10)))
            .unwrap();

        assert!(manager.is_authenticated());
        let caps = manager.capabilities();
        assert!(caps.is_employee());
        assert!(!caps.can_edit_content());
        assert!(!caps.is_viewer_only());
    }

    #[test]
    fn unauthorized_ends_session_exactly_once() {
        let manager = manager();
        let mut events = manager.subscribe();
        manager
            .store()
            .save_token(&employee_token(Duration::minutes(10)))
            .unwrap();

        assert!(manager.handle_unauthorized("/api/products"));
        assert!(!manager.handle_unauthorized("/api/vendor/patients"));
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Ended { reason: EndReason::Unauthorized }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn loading_lasts_until_the_last_overlapping_fetch_ends() {
        let manager = manager();
        let first = LoadingFlag::raise(&manager.permissions_loading);
        let second = LoadingFlag::raise(&manager.permissions_loading);
        assert!(manager.permissions_loading());

        drop(first);
        assert!(manager.permissions_loading());

        drop(second);
        assert!(!manager.permissions_loading());
    }

    #[test]
    fn late_rejection_of_a_replaced_token_keeps_the_new_session() {
        let manager = manager();
        let old = employee_token(Duration::minutes(10));
        let new = mint_token("acme_admin", "vendor", Some(100), Duration::minutes(10));
        manager.store().save_token(&new).unwrap();
        let mut events = manager.subscribe();

        assert!(!manager.reject_token(&old, "/api/products"));
        assert_eq!(manager.token().as_deref(), Some(new.as_str()));
        assert!(events.try_recv().is_err());

        assert!(manager.reject_token(&new, "/api/products"));
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Ended { reason: EndReason::Unauthorized }
        );
    }

    #[tokio::test]
    async fn requests_without_session_are_refused_locally() {
        let manager = manager();
        let result: Result<serde_json::Value, _> = manager.get("/api/products").await;
        assert!(matches!(result, Err(RequestError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn validation_without_token_is_false() {
        assert!(!manager().validate_token().await);
    }
}
