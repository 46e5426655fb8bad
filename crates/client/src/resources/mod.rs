//! Typed bindings for the vendor CRUD and dashboard endpoints.
//!
//! Records here are transient views of server state; nothing is cached.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionManager;

pub mod employees;
pub mod metrics;
pub mod patients;
pub mod products;
pub mod trials;

pub use employees::Employees;
pub use metrics::Metrics;
pub use patients::Patients;
pub use products::Products;
pub use trials::Trials;

impl SessionManager {
    pub fn employees(&self) -> Employees<'_> {
        Employees::new(self)
    }

    pub fn metrics(&self) -> Metrics<'_> {
        Metrics::new(self)
    }

    pub fn patients(&self) -> Patients<'_> {
        Patients::new(self)
    }

    pub fn products(&self) -> Products<'_> {
        Products::new(self)
    }

    pub fn trials(&self) -> Trials<'_> {
        Trials::new(self)
    }
}

/// Server timestamp.
///
/// The API mixes RFC 3339, naive ISO 8601 and `YYYY-MM-DD HH:MM:SS`; naive
/// values are taken as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self(dt.with_timezone(&Utc)));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| Self(naive.and_utc()))
    }
}

impl TryFrom<String> for Timestamp {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Timestamp::parse(&value).ok_or_else(|| format!("unrecognized timestamp '{value}'"))
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.0.to_rfc3339()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M"))
    }
}

/// `{"message": ..., ...}` reply of mutating endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Offset pagination accepted by the list endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Page {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_three_server_formats() {
        let a = Timestamp::parse("2024-03-01T09:30:00+00:00").unwrap();
        let b = Timestamp::parse("2024-03-01T09:30:00.000000").unwrap();
        let c = Timestamp::parse("2024-03-01 09:30:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(Timestamp::parse("yesterday").is_none());
    }

    #[test]
    fn acknowledgement_keeps_extra_fields() {
        let ack: Acknowledgement = serde_json::from_str(
            r#"{"message":"Employee deactivated successfully","employee_id":4,"status":"inactive"}"#,
        )
        .unwrap();
        assert_eq!(ack.message.as_deref(), Some("Employee deactivated successfully"));
        assert_eq!(ack.fields["status"], "inactive");
    }
}
