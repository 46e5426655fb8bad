use serde::Serialize;
use thiserror::Error;

use crate::permissions::{EmployeePermissions, Permission, UserType};
use crate::roles::{AccountRole, EmployeeRole, Role};

/// Capability set of the current session.
///
/// Built from the account role and, for employees, the cached permission
/// object. Cheap to rebuild; callers are expected to derive a fresh value for
/// every check instead of holding one across state changes.
///
/// Every predicate is an exhaustive match over [`Role`] and answers `false`
/// for anything that is not a vendor admin or a resolved employee.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Capabilities {
    account_role: Option<AccountRole>,
    permissions: Option<EmployeePermissions>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Permission),
}

impl Capabilities {
    /// No session: every check is denied.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new(account_role: AccountRole, permissions: Option<EmployeePermissions>) -> Self {
        Self {
            account_role: Some(account_role),
            permissions,
        }
    }

    pub fn account_role(&self) -> Option<&AccountRole> {
        self.account_role.as_ref()
    }

    pub fn employee_permissions(&self) -> Option<&EmployeePermissions> {
        self.permissions.as_ref()
    }

    pub fn role(&self) -> Role {
        match (&self.account_role, &self.permissions) {
            (Some(AccountRole::Vendor), _) => Role::VendorAdmin,
            (Some(AccountRole::Employee), Some(perms)) => match perms.user_type {
                UserType::Employee(sub) => Role::Employee(sub),
                // An employee token paired with an admin permission object is inconsistent.
                UserType::VendorAdmin => Role::Unresolved,
            },
            (Some(AccountRole::Employee), None) => Role::Unresolved,
            (Some(AccountRole::Patient), _) => Role::Patient,
            (Some(AccountRole::Other(_)), _) | (None, _) => Role::Unresolved,
        }
    }

    pub fn is_vendor_admin(&self) -> bool {
        matches!(self.account_role, Some(AccountRole::Vendor))
    }

    pub fn is_employee(&self) -> bool {
        matches!(self.account_role, Some(AccountRole::Employee))
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        match self.role() {
            Role::VendorAdmin => true,
            Role::Employee(_) => self
                .permissions
                .as_ref()
                .is_some_and(|perms| perms.allows(permission)),
            Role::Patient | Role::Unresolved => false,
        }
    }

    /// String-keyed lookup; unknown names are denied for everyone but a vendor admin.
    pub fn has_permission_named(&self, name: &str) -> bool {
        match self.role() {
            Role::VendorAdmin => true,
            Role::Employee(_) => name
                .parse::<Permission>()
                .is_ok_and(|permission| self.has_permission(permission)),
            Role::Patient | Role::Unresolved => false,
        }
    }

    pub fn can_edit_content(&self) -> bool {
        match self.role() {
            Role::VendorAdmin => true,
            Role::Employee(EmployeeRole::Editor | EmployeeRole::Manager) => true,
            Role::Employee(EmployeeRole::Viewer) => false,
            Role::Patient | Role::Unresolved => false,
        }
    }

    pub fn is_viewer_only(&self) -> bool {
        match self.role() {
            Role::Employee(EmployeeRole::Viewer) => true,
            Role::Employee(EmployeeRole::Editor | EmployeeRole::Manager) => false,
            Role::VendorAdmin | Role::Patient | Role::Unresolved => false,
        }
    }

    pub fn can_manage_employees(&self) -> bool {
        self.has_permission(Permission::CanCreateEmployees)
            || self.has_permission(Permission::CanEditEmployees)
            || self.has_permission(Permission::CanDeactivateEmployees)
    }

    /// Permissions that would currently be granted.
    pub fn effective_permissions(&self) -> Vec<Permission> {
        Permission::ALL
            .into_iter()
            .filter(|p| self.has_permission(*p))
            .collect()
    }
}

/// Authorize a mutating action against the current capabilities.
///
/// - No IO
/// - No panics
pub fn authorize(capabilities: &Capabilities, required: Permission) -> Result<(), AuthzError> {
    if capabilities.has_permission(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    pub role: String,
    pub effective_permissions: Vec<String>,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    NotSignedIn,
    UnsupportedRole,
    PermissionsNotLoaded,
    MissingPermission,
}

/// Explain why `required` is (or is not) granted.
pub fn explain_authorization(capabilities: &Capabilities, required: Permission) -> AuthorizationExplanation {
    let role = capabilities.role();
    let effective_permissions: Vec<String> = capabilities
        .effective_permissions()
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();

    let granted = capabilities.has_permission(required);
    let (reason, denial_reason) = if granted {
        let reason = match role {
            Role::VendorAdmin => "vendor admin holds every permission".to_string(),
            _ => format!("permission '{required}' granted to {role}"),
        };
        (reason, None)
    } else {
        let denial = denial_for(capabilities, role, required);
        (denial.message.clone(), Some(denial))
    };

    AuthorizationExplanation {
        required_permission: required.as_str().to_string(),
        granted,
        reason,
        role: role.to_string(),
        effective_permissions,
        denial_reason,
    }
}

fn denial_for(capabilities: &Capabilities, role: Role, required: Permission) -> DenialReason {
    match (capabilities.account_role(), role) {
        (None, _) => DenialReason {
            kind: DenialKind::NotSignedIn,
            message: "no active session".to_string(),
            suggestions: vec!["Sign in with a vendor or employee account".to_string()],
        },
        (Some(AccountRole::Employee), Role::Unresolved) => DenialReason {
            kind: DenialKind::PermissionsNotLoaded,
            message: "employee permission object is not cached".to_string(),
            suggestions: vec![
                "Refresh permissions from the API".to_string(),
                "Sign in again".to_string(),
            ],
        },
        (Some(account), Role::Patient | Role::Unresolved) => DenialReason {
            kind: DenialKind::UnsupportedRole,
            message: format!("account role '{account}' has no vendor capabilities"),
            suggestions: vec!["Use a vendor admin or employee account".to_string()],
        },
        (Some(_), _) => DenialReason {
            kind: DenialKind::MissingPermission,
            message: format!("{role} lacks '{required}'"),
            suggestions: vec![
                "Ask the vendor admin for the manager role".to_string(),
                "Ask the vendor admin to perform the action".to_string(),
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendorportal_core::VendorId;

    fn vendor_id() -> VendorId {
        VendorId::new("V-1")
    }

    fn employee(role: EmployeeRole) -> Capabilities {
        Capabilities::new(
            AccountRole::Employee,
            Some(EmployeePermissions::for_employee(vendor_id(), role)),
        )
    }

    fn vendor() -> Capabilities {
        Capabilities::new(AccountRole::Vendor, None)
    }

    #[test]
    fn vendor_admin_has_everything() {
        let caps = vendor();
        assert!(caps.is_vendor_admin());
        assert!(!caps.is_employee());
        assert!(caps.has_permission_named("anything_at_all"));
        assert!(caps.can_edit_content());
        assert!(caps.can_manage_employees());
        assert!(!caps.is_viewer_only());
    }

    #[test]
    fn viewer_is_read_only() {
        let caps = employee(EmployeeRole::Viewer);
        assert!(caps.is_employee());
        assert!(caps.is_viewer_only());
        assert!(!caps.can_edit_content());
        assert!(!caps.can_manage_employees());
        assert!(caps.effective_permissions().is_empty());
    }

    #[test]
    fn editor_edits_content_but_cannot_delete_employees() {
        let caps = employee(EmployeeRole::Editor);
        assert!(caps.can_edit_content());
        assert!(!caps.has_permission(Permission::CanDeleteEmployees));
        assert!(!caps.can_manage_employees());
    }

    #[test]
    fn manager_manages_but_does_not_delete() {
        let caps = employee(EmployeeRole::Manager);
        assert!(caps.can_manage_employees());
        assert!(!caps.has_permission(Permission::CanDeleteEmployees));
        assert_eq!(
            authorize(&caps, Permission::CanDeleteEmployees),
            Err(AuthzError::Forbidden(Permission::CanDeleteEmployees))
        );
    }

    #[test]
    fn employee_without_cached_permissions_is_fail_closed() {
        let caps = Capabilities::new(AccountRole::Employee, None);
        assert!(caps.is_employee());
        assert_eq!(caps.role(), Role::Unresolved);
        assert!(!caps.can_edit_content());
        assert!(!caps.has_permission_named("can_create_employees"));
    }

    #[test]
    fn employee_unknown_permission_name_is_denied() {
        let caps = employee(EmployeeRole::Manager);
        assert!(caps.has_permission_named("can_create_employees"));
        assert!(!caps.has_permission_named("can_launch_rockets"));
    }

    #[test]
    fn patient_and_unknown_roles_are_denied_everything() {
        for caps in [
            Capabilities::new(AccountRole::Patient, None),
            Capabilities::new(AccountRole::Other("auditor".into()), None),
            Capabilities::anonymous(),
        ] {
            assert!(!caps.is_vendor_admin());
            assert!(!caps.is_employee());
            assert!(!caps.has_permission_named("can_create_employees"));
            assert!(!caps.can_edit_content());
            assert!(!caps.is_viewer_only());
            assert!(!caps.can_manage_employees());
        }
    }

    #[test]
    fn employee_token_with_admin_object_is_unresolved() {
        let caps = Capabilities::new(
            AccountRole::Employee,
            Some(EmployeePermissions::vendor_admin(vendor_id())),
        );
        assert_eq!(caps.role(), Role::Unresolved);
        assert!(!caps.can_manage_employees());
    }

    #[test]
    fn explanation_names_the_missing_permission() {
        let explanation = explain_authorization(&employee(EmployeeRole::Editor), Permission::CanEditEmployees);
        assert!(!explanation.granted);
        let denial = explanation.denial_reason.unwrap();
        assert_eq!(denial.kind, DenialKind::MissingPermission);
        assert!(denial.message.contains("can_edit_employees"));
    }

    #[test]
    fn explanation_distinguishes_unloaded_permissions() {
        let caps = Capabilities::new(AccountRole::Employee, None);
        let explanation = explain_authorization(&caps, Permission::CanCreateEmployees);
        assert_eq!(
            explanation.denial_reason.map(|d| d.kind),
            Some(DenialKind::PermissionsNotLoaded)
        );

        let explanation = explain_authorization(&Capabilities::anonymous(), Permission::CanCreateEmployees);
        assert_eq!(
            explanation.denial_reason.map(|d| d.kind),
            Some(DenialKind::NotSignedIn)
        );
    }

    #[test]
    fn explanation_for_vendor_is_granted() {
        let explanation = explain_authorization(&vendor(), Permission::CanDeleteEmployees);
        assert!(explanation.granted);
        assert_eq!(explanation.effective_permissions.len(), Permission::ALL.len());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn any_employee_role() -> impl Strategy<Value = EmployeeRole> {
            prop_oneof![
                Just(EmployeeRole::Viewer),
                Just(EmployeeRole::Editor),
                Just(EmployeeRole::Manager),
            ]
        }

        fn any_flags() -> impl Strategy<Value = [bool; 4]> {
            proptest::array::uniform4(any::<bool>())
        }

        fn raw_permissions(user_type: UserType, flags: [bool; 4]) -> EmployeePermissions {
            EmployeePermissions {
                user_id: None,
                vendor_id: VendorId::new("V-1"),
                user_type,
                can_create_employees: flags[0],
                can_edit_employees: flags[1],
                can_delete_employees: flags[2],
                can_deactivate_employees: flags[3],
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: a vendor admin holds every named permission.
            #[test]
            fn vendor_has_any_permission(name in "[a-z_]{0,40}") {
                let caps = Capabilities::new(AccountRole::Vendor, None);
                prop_assert!(caps.has_permission_named(&name));
                prop_assert!(!caps.is_viewer_only());
            }

            /// Property: after clamping, a viewer never holds a mutating permission.
            #[test]
            fn clamped_viewer_never_mutates(flags in any_flags()) {
                let mut perms = raw_permissions(UserType::Employee(EmployeeRole::Viewer), flags);
                perms.clamp_to_role();
                let caps = Capabilities::new(AccountRole::Employee, Some(perms));

                prop_assert!(caps.is_viewer_only());
                prop_assert!(!caps.can_edit_content());
                prop_assert!(caps.effective_permissions().is_empty());
            }

            /// Property: only a manager among employees can manage employees, and never delete.
            #[test]
            fn only_managers_manage(role in any_employee_role(), flags in any_flags()) {
                let mut perms = raw_permissions(UserType::Employee(role), flags);
                perms.clamp_to_role();
                let caps = Capabilities::new(AccountRole::Employee, Some(perms));

                if caps.can_manage_employees() {
                    prop_assert_eq!(role, EmployeeRole::Manager);
                }
                prop_assert!(!caps.has_permission(Permission::CanDeleteEmployees));
            }

            /// Property: a manager derived from the role table can always manage employees.
            #[test]
            fn derived_manager_manages(vendor in "[A-Z0-9-]{1,12}") {
                let perms = EmployeePermissions::for_employee(VendorId::new(vendor), EmployeeRole::Manager);
                let caps = Capabilities::new(AccountRole::Employee, Some(perms));
                prop_assert!(caps.can_manage_employees());
            }

            /// Property: patients and unknown roles fail closed regardless of cached data.
            #[test]
            fn non_vendor_roles_fail_closed(
                other in "[a-z]{1,12}",
                role in any_employee_role(),
                name in "[a-z_]{0,30}"
            ) {
                let account = if other == "vendor" || other == "employee" {
                    AccountRole::Patient
                } else {
                    AccountRole::from(other)
                };
                let perms = EmployeePermissions::for_employee(VendorId::new("V-1"), role);
                let caps = Capabilities::new(account, Some(perms));

                prop_assert!(!caps.has_permission_named(&name));
                prop_assert!(!caps.can_edit_content());
                prop_assert!(!caps.is_viewer_only());
                prop_assert!(!caps.can_manage_employees());
            }
        }
    }
}
