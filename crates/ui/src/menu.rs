//! Portal navigation and per-action requirements.

use vendorportal_auth::{Capabilities, Permission, Role};

use crate::context::PermissionState;
use crate::guard::Requirement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Dashboard,
    Products,
    Patients,
    Billing,
    ClinicalTrials,
    Employees,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::Dashboard,
        Section::Products,
        Section::Patients,
        Section::Billing,
        Section::ClinicalTrials,
        Section::Employees,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Section::Dashboard => "/dashboard",
            Section::Products => "/products",
            Section::Patients => "/patients",
            Section::Billing => "/billing",
            Section::ClinicalTrials => "/clinical-trials",
            Section::Employees => "/employees",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Section::Dashboard => "Dashboard",
            Section::Products => "Products",
            Section::Patients => "Patients",
            Section::Billing => "Billing",
            Section::ClinicalTrials => "Clinical Trials",
            Section::Employees => "Employees",
        }
    }

    /// Extra requirement beyond being a vendor admin or resolved employee.
    pub fn required(&self) -> Option<Requirement> {
        match self {
            Section::Dashboard | Section::Products => None,
            Section::Patients | Section::Billing | Section::ClinicalTrials => Some(Requirement::Admin),
            Section::Employees => Some(Requirement::ManageEmployees),
        }
    }

    pub fn is_visible(&self, caps: &Capabilities) -> bool {
        let portal_member = match caps.role() {
            Role::VendorAdmin | Role::Employee(_) => true,
            Role::Patient | Role::Unresolved => false,
        };
        portal_member && self.required().is_none_or(|req| req.is_met(caps))
    }
}

/// Sections to show; empty while permissions are still loading.
pub fn visible_sections(state: &PermissionState) -> Vec<Section> {
    match state {
        PermissionState::Loading => Vec::new(),
        PermissionState::Ready(caps) => Section::ALL.into_iter().filter(|s| s.is_visible(caps)).collect(),
    }
}

/// Mutating actions a view can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    CreateProduct,
    EditProduct,
    DeleteProduct,
    CreatePatient,
    DeactivatePatient,
    CreateEmployee,
    EditEmployee,
    ChangeEmployeeStatus,
    DeleteEmployee,
    CreateTrial,
    UpdateIrbStatus,
    RecordPayment,
}

impl Action {
    pub fn required(&self) -> Requirement {
        match self {
            Action::CreateProduct | Action::EditProduct | Action::DeleteProduct => Requirement::Edit,
            // Patient accounts belong to the vendor itself.
            Action::CreatePatient | Action::DeactivatePatient => Requirement::Admin,
            Action::CreateEmployee => Requirement::Permission(Permission::CanCreateEmployees),
            Action::EditEmployee => Requirement::Permission(Permission::CanEditEmployees),
            Action::ChangeEmployeeStatus => Requirement::Permission(Permission::CanDeactivateEmployees),
            Action::DeleteEmployee => Requirement::Permission(Permission::CanDeleteEmployees),
            Action::CreateTrial | Action::UpdateIrbStatus | Action::RecordPayment => Requirement::Admin,
        }
    }

    pub fn is_allowed(&self, state: &PermissionState) -> bool {
        state.capabilities().is_some_and(|caps| self.required().is_met(caps))
    }
}
