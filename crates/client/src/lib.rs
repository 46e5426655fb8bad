//! `vendorportal-client`
//!
//! **Responsibility:** the authenticated side of the vendor portal.
//!
//! This crate provides:
//! - Session persistence behind a key/value store (file or in-memory)
//! - The session manager: login, logout, token validation, central 401 handling
//! - Typed bindings for the vendor CRUD endpoints and dashboard metrics
//! - Registration and password recovery, which need no session
//!
//! The external API remains the authority; nothing here grants access the
//! server would refuse.

pub mod account;
pub mod config;
pub mod error;
pub mod http;
pub mod resources;
pub mod session;
pub mod storage;

pub use config::ClientConfig;
pub use error::{AuthError, RequestError};
pub use http::ApiClient;
pub use session::{EndReason, SessionEvent, SessionManager};
pub use storage::{FileStore, InMemoryStore, KeyValueStore, SessionStore, StorageError};
