//! `vendorportal-ui`: view-side access decisions for the vendor portal.
//!
//! Guards, protected routes and navigation read capabilities from a
//! [`SessionContext`] and return plain decisions; rendering is left to the
//! host application.

pub mod context;
pub mod guard;
pub mod menu;
pub mod route;

pub use context::{PermissionState, SessionContext};
pub use guard::{Guard, GuardDecision, Requirement};
pub use menu::{Action, Section, visible_sections};
pub use route::{ProtectedRoute, RouteAction, RouteState, SessionCheck, VisitTicket};
