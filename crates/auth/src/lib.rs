//! `vendorportal-auth`: pure authorization boundary for the vendor portal.
//!
//! This crate is intentionally decoupled from HTTP and storage: it turns a
//! bearer token, a user profile and an employee permission object into typed
//! capability decisions.

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod profile;
pub mod roles;
pub mod session;

pub use authorize::{
    AuthorizationExplanation, AuthzError, Capabilities, DenialKind, DenialReason, authorize, explain_authorization,
};
pub use claims::{TokenClaims, TokenError, TokenValidationError, decode_claims, validate_claims};
pub use permissions::{EmployeePermissions, Permission, UnknownPermission, UserType};
pub use profile::UserProfile;
pub use roles::{AccountRole, EmployeeRole, Role};
pub use session::Session;
