use core::str::FromStr;

use serde::{Deserialize, Serialize};

use vendorportal_core::{UserId, VendorId};

use crate::roles::EmployeeRole;

/// Named mutating capability over employee accounts.
///
/// The string form matches the field names of the permission object served by
/// `GET /api/vendor/employees/me/permissions`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CanCreateEmployees,
    CanEditEmployees,
    CanDeleteEmployees,
    CanDeactivateEmployees,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::CanCreateEmployees,
        Permission::CanEditEmployees,
        Permission::CanDeleteEmployees,
        Permission::CanDeactivateEmployees,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CanCreateEmployees => "can_create_employees",
            Permission::CanEditEmployees => "can_edit_employees",
            Permission::CanDeleteEmployees => "can_delete_employees",
            Permission::CanDeactivateEmployees => "can_deactivate_employees",
        }
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission '{0}'")]
pub struct UnknownPermission(pub String);

/// Who the permission object was computed for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UserType {
    VendorAdmin,
    Employee(EmployeeRole),
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::VendorAdmin => "vendor_admin",
            UserType::Employee(role) => role.as_str(),
        }
    }
}

impl TryFrom<String> for UserType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "vendor_admin" {
            return Ok(UserType::VendorAdmin);
        }
        value
            .parse::<EmployeeRole>()
            .map(UserType::Employee)
            .map_err(|e| e.to_string())
    }
}

impl From<UserType> for String {
    fn from(value: UserType) -> Self {
        value.as_str().to_string()
    }
}

/// Employee-management permission set for the signed-in account.
///
/// # Invariants
/// - A vendor admin always holds every permission.
/// - A viewer or editor never holds a mutating permission.
/// - Among employees only a manager may manage other employees, and never delete them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeePermissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub vendor_id: VendorId,
    pub user_type: UserType,
    pub can_create_employees: bool,
    pub can_edit_employees: bool,
    pub can_delete_employees: bool,
    pub can_deactivate_employees: bool,
}

impl EmployeePermissions {
    /// Full permission set of a vendor admin.
    pub fn vendor_admin(vendor_id: VendorId) -> Self {
        Self::for_user_type(vendor_id, UserType::VendorAdmin)
    }

    /// Permission set derived from an employee sub-role.
    pub fn for_employee(vendor_id: VendorId, role: EmployeeRole) -> Self {
        Self::for_user_type(vendor_id, UserType::Employee(role))
    }

    fn for_user_type(vendor_id: VendorId, user_type: UserType) -> Self {
        let [create, edit, delete, deactivate] = ceiling(user_type);
        Self {
            user_id: None,
            vendor_id,
            user_type,
            can_create_employees: create,
            can_edit_employees: edit,
            can_delete_employees: delete,
            can_deactivate_employees: deactivate,
        }
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn employee_role(&self) -> Option<EmployeeRole> {
        match self.user_type {
            UserType::Employee(role) => Some(role),
            UserType::VendorAdmin => None,
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::CanCreateEmployees => self.can_create_employees,
            Permission::CanEditEmployees => self.can_edit_employees,
            Permission::CanDeleteEmployees => self.can_delete_employees,
            Permission::CanDeactivateEmployees => self.can_deactivate_employees,
        }
    }

    /// Permissions currently granted, in declaration order.
    pub fn granted(&self) -> Vec<Permission> {
        Permission::ALL.into_iter().filter(|p| self.allows(*p)).collect()
    }

    /// Force the flags onto the role table.
    ///
    /// Vendor admins are raised to full capability; employees are lowered to
    /// the ceiling of their sub-role. Returns `true` when anything changed.
    pub fn clamp_to_role(&mut self) -> bool {
        let [create, edit, delete, deactivate] = ceiling(self.user_type);
        let before = self.flags();

        match self.user_type {
            UserType::VendorAdmin => {
                self.can_create_employees = true;
                self.can_edit_employees = true;
                self.can_delete_employees = true;
                self.can_deactivate_employees = true;
            }
            UserType::Employee(_) => {
                self.can_create_employees &= create;
                self.can_edit_employees &= edit;
                self.can_delete_employees &= delete;
                self.can_deactivate_employees &= deactivate;
            }
        }

        before != self.flags()
    }

    fn flags(&self) -> [bool; 4] {
        [
            self.can_create_employees,
            self.can_edit_employees,
            self.can_delete_employees,
            self.can_deactivate_employees,
        ]
    }
}

/// Role table: `[create, edit, delete, deactivate]`.
fn ceiling(user_type: UserType) -> [bool; 4] {
    match user_type {
        UserType::VendorAdmin => [true, true, true, true],
        UserType::Employee(EmployeeRole::Manager) => [true, true, false, true],
        UserType::Employee(EmployeeRole::Editor) => [false, false, false, false],
        UserType::Employee(EmployeeRole::Viewer) => [false, false, false, false],
    }
}
