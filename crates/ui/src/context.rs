use std::sync::Arc;

use tokio::sync::broadcast;

use vendorportal_auth::Capabilities;
use vendorportal_client::{SessionEvent, SessionManager};

/// Permission data as a view sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionState {
    /// The employee permission object is being fetched.
    Loading,
    Ready(Capabilities),
}

impl PermissionState {
    pub fn capabilities(&self) -> Option<&Capabilities> {
        match self {
            PermissionState::Loading => None,
            PermissionState::Ready(caps) => Some(caps),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, PermissionState::Loading)
    }
}

/// Session handle passed down to views instead of reading storage directly.
///
/// Reads go through the session manager every time, so a view never holds a
/// capability set that outlived a logout or a permission refresh.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session: Arc<SessionManager>,
}

impl SessionContext {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn permission_state(&self) -> PermissionState {
        if self.session.permissions_loading() {
            PermissionState::Loading
        } else {
            PermissionState::Ready(self.session.capabilities())
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.session.capabilities()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }
}
