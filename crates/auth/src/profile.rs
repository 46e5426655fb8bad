use serde::{Deserialize, Serialize};

use vendorportal_core::{UserId, VendorId};

use crate::AccountRole;

/// Profile of the signed-in account, as served by `GET /users/me`.
///
/// Read-only on the client; refreshed only by signing in again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub role: AccountRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<VendorId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

impl UserProfile {
    /// "First Last" when known, otherwise the username.
    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            self.username.clone()
        } else {
            parts.join(" ")
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_profile_without_optional_fields() {
        let json = r#"{ "user_id": 9, "username": "pat01", "role": "patient" }"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();

        assert_eq!(profile.role, AccountRole::Patient);
        assert_eq!(profile.display_name(), "pat01");
        assert!(!profile.is_disabled());
    }

    #[test]
    fn display_name_prefers_real_name() {
        let profile = UserProfile {
            user_id: UserId::new(1),
            username: "jsmith".into(),
            email: None,
            first_name: Some("John".into()),
            last_name: Some("Smith".into()),
            role: AccountRole::Employee,
            vendor_id: None,
            disabled: Some(false),
        };
        assert_eq!(profile.display_name(), "John Smith");
    }
}
