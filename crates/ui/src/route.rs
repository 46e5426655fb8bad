//! Protected-route state machine.
//!
//! Every navigation takes a [`VisitTicket`]. Session checks can resolve after
//! the user has already moved on, so [`ProtectedRoute::complete`] drops any
//! outcome whose ticket is not the latest one.

use std::sync::{Mutex, MutexGuard};

use reqwest::Url;

use vendorportal_auth::AccountRole;
use vendorportal_client::{ClientConfig, EndReason, SessionEvent, SessionManager};

/// Query parameter carrying the location to return to after sign-in.
pub const RETURN_TO_PARAM: &str = "redirect";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    Loading,
    Authenticated,
    Unauthenticated,
    Forbidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    Render,
    Redirect { to: String, return_to: Option<String> },
}

impl RouteAction {
    /// Full redirect target with the return location as a `redirect` query value.
    pub fn target(&self) -> Option<String> {
        match self {
            RouteAction::Render => None,
            RouteAction::Redirect { to, return_to: None } => Some(to.clone()),
            RouteAction::Redirect {
                to,
                return_to: Some(location),
            } => Some(with_return_to(to, location)),
        }
    }
}

fn with_return_to(path: &str, location: &str) -> String {
    // Url needs a base; only the path and query survive.
    match Url::parse("http://portal.invalid").and_then(|base| base.join(path)) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(RETURN_TO_PARAM, location);
            match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, path, "unparsable redirect path; dropping return location");
            path.to_string()
        }
    }
}

/// Result of checking the session for one visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    NoSession,
    Signed(Option<AccountRole>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitTicket(u64);

#[derive(Debug)]
struct Visit {
    ticket: u64,
    location: String,
    state: RouteState,
}

/// Gate in front of a view that needs a signed-in account.
#[derive(Debug)]
pub struct ProtectedRoute {
    login_path: String,
    unauthorized_path: String,
    allowed_roles: Vec<AccountRole>,
    visit: Mutex<Visit>,
}

impl ProtectedRoute {
    /// Any signed-in account may enter.
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            login_path: config.login_path.clone(),
            unauthorized_path: config.unauthorized_path.clone(),
            allowed_roles: Vec::new(),
            visit: Mutex::new(Visit {
                ticket: 0,
                location: String::new(),
                state: RouteState::Loading,
            }),
        }
    }

    /// Vendor admins and employees.
    pub fn vendor_portal(config: &ClientConfig) -> Self {
        Self::new(config)
            .allow(AccountRole::Vendor)
            .allow(AccountRole::Employee)
    }

    pub fn allow(mut self, role: AccountRole) -> Self {
        if !self.allowed_roles.contains(&role) {
            self.allowed_roles.push(role);
        }
        self
    }

    pub fn state(&self) -> RouteState {
        self.lock().state
    }

    /// Start a navigation to `location`; earlier tickets become stale.
    pub fn begin(&self, location: impl Into<String>) -> VisitTicket {
        let mut visit = self.lock();
        visit.ticket += 1;
        visit.location = location.into();
        visit.state = RouteState::Loading;
        VisitTicket(visit.ticket)
    }

    /// Check the locally stored session (expiry only, no network).
    pub fn check_local(session: &SessionManager) -> SessionCheck {
        if session.is_authenticated() {
            SessionCheck::Signed(session.capabilities().account_role().cloned())
        } else {
            SessionCheck::NoSession
        }
    }

    /// Check the session against the server's token validation endpoint.
    pub async fn check_remote(session: &SessionManager) -> SessionCheck {
        if session.is_authenticated() && session.validate_token().await {
            SessionCheck::Signed(session.capabilities().account_role().cloned())
        } else {
            SessionCheck::NoSession
        }
    }

    /// Begin a visit and resolve it against the local session in one step.
    ///
    /// `None` only when another navigation started in between.
    pub fn visit(&self, location: impl Into<String>, session: &SessionManager) -> Option<RouteAction> {
        let ticket = self.begin(location);
        self.complete(ticket, Self::check_local(session))
    }

    /// Like [`visit`](Self::visit) but confirms the token with the server first.
    pub async fn visit_validated(&self, location: impl Into<String>, session: &SessionManager) -> Option<RouteAction> {
        let ticket = self.begin(location);
        let check = Self::check_remote(session).await;
        self.complete(ticket, check)
    }

    /// Apply a session check to the visit it was started for.
    ///
    /// Returns `None` when the ticket is stale.
    pub fn complete(&self, ticket: VisitTicket, check: SessionCheck) -> Option<RouteAction> {
        self.resolve(ticket.0, check)
    }

    fn resolve(&self, ticket: u64, check: SessionCheck) -> Option<RouteAction> {
        let mut visit = self.lock();
        if visit.ticket != ticket {
            tracing::debug!(ticket, current = visit.ticket, "ignoring stale route resolution");
            return None;
        }

        let (state, action) = match check {
            SessionCheck::NoSession => (
                RouteState::Unauthenticated,
                RouteAction::Redirect {
                    to: self.login_path.clone(),
                    return_to: Some(visit.location.clone()),
                },
            ),
            SessionCheck::Signed(role) if self.admits(role.as_ref()) => {
                (RouteState::Authenticated, RouteAction::Render)
            }
            SessionCheck::Signed(role) => {
                tracing::debug!(
                    role = role.as_ref().map(AccountRole::as_str).unwrap_or("none"),
                    location = %visit.location,
                    "role not allowed on route"
                );
                (
                    RouteState::Forbidden,
                    RouteAction::Redirect {
                        to: self.unauthorized_path.clone(),
                        return_to: None,
                    },
                )
            }
        };

        visit.state = state;
        Some(action)
    }

    fn admits(&self, role: Option<&AccountRole>) -> bool {
        if self.allowed_roles.is_empty() {
            return true;
        }
        role.is_some_and(|role| self.allowed_roles.contains(role))
    }

    /// React to a session notification; an authenticated view is sent to the
    /// login page once its session ends.
    pub fn on_session_event(&self, event: &SessionEvent) -> Option<RouteAction> {
        let SessionEvent::Ended { reason } = event else {
            return None;
        };

        let mut visit = self.lock();
        if visit.state != RouteState::Authenticated {
            return None;
        }
        visit.state = RouteState::Unauthenticated;
        let return_to = match reason {
            EndReason::Logout => None,
            EndReason::Expired | EndReason::Unauthorized => Some(visit.location.clone()),
        };
        Some(RouteAction::Redirect {
            to: self.login_path.clone(),
            return_to,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Visit> {
        self.visit.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
