//! `vendorportal-core`: identifiers and input validation shared by the portal crates.
//!
//! This crate contains no IO and no authorization policy.

pub mod error;
pub mod id;
pub mod validation;

pub use error::{DomainError, DomainResult};
pub use id::{EmployeeId, PatientId, PaymentId, ProductId, TrialId, UserId, VendorId};
