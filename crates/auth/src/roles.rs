use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Account role as carried by the bearer token and the user profile.
///
/// Unknown role strings are preserved in `Other` so they can be logged, but
/// they never grant anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountRole {
    Vendor,
    Employee,
    Patient,
    Other(String),
}

impl AccountRole {
    pub fn as_str(&self) -> &str {
        match self {
            AccountRole::Vendor => "vendor",
            AccountRole::Employee => "employee",
            AccountRole::Patient => "patient",
            AccountRole::Other(s) => s,
        }
    }
}

impl From<String> for AccountRole {
    fn from(value: String) -> Self {
        match value.as_str() {
            "vendor" => AccountRole::Vendor,
            "employee" => AccountRole::Employee,
            "patient" => AccountRole::Patient,
            _ => AccountRole::Other(value),
        }
    }
}

impl From<&str> for AccountRole {
    fn from(value: &str) -> Self {
        AccountRole::from(value.to_string())
    }
}

impl From<AccountRole> for String {
    fn from(value: AccountRole) -> Self {
        match value {
            AccountRole::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl core::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-role assigned to an employee by their vendor admin.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeRole {
    Viewer,
    Editor,
    Manager,
}

impl EmployeeRole {
    pub const ALL: [EmployeeRole; 3] = [EmployeeRole::Viewer, EmployeeRole::Editor, EmployeeRole::Manager];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeRole::Viewer => "viewer",
            EmployeeRole::Editor => "editor",
            EmployeeRole::Manager => "manager",
        }
    }
}

impl FromStr for EmployeeRole {
    type Err = UnknownEmployeeRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(EmployeeRole::Viewer),
            "editor" => Ok(EmployeeRole::Editor),
            "manager" => Ok(EmployeeRole::Manager),
            other => Err(UnknownEmployeeRole(other.to_string())),
        }
    }
}

impl core::fmt::Display for EmployeeRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown employee role '{0}'")]
pub struct UnknownEmployeeRole(pub String);

/// Fully resolved role used for every capability decision.
///
/// `Unresolved` covers unknown account roles and employees whose permission
/// object is not (yet) cached. Every capability is denied for it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    VendorAdmin,
    Employee(EmployeeRole),
    Patient,
    Unresolved,
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Role::VendorAdmin => f.write_str("vendor_admin"),
            Role::Employee(sub) => write!(f, "employee:{sub}"),
            Role::Patient => f.write_str("patient"),
            Role::Unresolved => f.write_str("unresolved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_role_round_trips_known_and_unknown_strings() {
        let known: AccountRole = serde_json::from_str("\"vendor\"").unwrap();
        assert_eq!(known, AccountRole::Vendor);

        let unknown: AccountRole = serde_json::from_str("\"auditor\"").unwrap();
        assert_eq!(unknown, AccountRole::Other("auditor".to_string()));
        assert_eq!(serde_json::to_string(&unknown).unwrap(), "\"auditor\"");
    }

    #[test]
    fn employee_role_parses_lowercase_only() {
        assert_eq!("editor".parse::<EmployeeRole>().unwrap(), EmployeeRole::Editor);
        assert!("Editor".parse::<EmployeeRole>().is_err());
    }
}
