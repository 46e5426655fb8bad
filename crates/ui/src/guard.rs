//! Conditional rendering decisions.
//!
//! A guard only reads the [`PermissionState`] it is handed; it never fetches
//! or mutates anything.

use vendorportal_auth::{Capabilities, Permission, Role};

use crate::context::PermissionState;

/// What a guarded element needs from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    Admin,
    Edit,
    ManageEmployees,
    /// Hidden from viewers; shown to vendor admins and non-viewer employees.
    HideFromViewers,
    Permission(Permission),
}

impl Requirement {
    pub fn is_met(&self, caps: &Capabilities) -> bool {
        match self {
            Requirement::Admin => caps.is_vendor_admin(),
            Requirement::Edit => caps.can_edit_content(),
            Requirement::ManageEmployees => caps.can_manage_employees(),
            Requirement::HideFromViewers => match caps.role() {
                Role::VendorAdmin => true,
                Role::Employee(_) => !caps.is_viewer_only(),
                Role::Patient | Role::Unresolved => false,
            },
            Requirement::Permission(p) => caps.has_permission(*p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Children,
    /// Children drawn inert while permissions load.
    DimmedChildren,
    Fallback,
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    requirement: Requirement,
    fallback: bool,
    dim_while_loading: bool,
}

impl Guard {
    pub fn new(requirement: Requirement) -> Self {
        Self {
            requirement,
            fallback: false,
            dim_while_loading: false,
        }
    }

    pub fn admin() -> Self {
        Self::new(Requirement::Admin)
    }

    pub fn edit() -> Self {
        Self::new(Requirement::Edit)
    }

    pub fn manage_employees() -> Self {
        Self::new(Requirement::ManageEmployees)
    }

    pub fn hide_from_viewers() -> Self {
        Self::new(Requirement::HideFromViewers)
    }

    pub fn permission(permission: Permission) -> Self {
        Self::new(Requirement::Permission(permission))
    }

    /// Render the supplied fallback instead of nothing when denied.
    pub fn with_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    pub fn dimmed_while_loading(mut self) -> Self {
        self.dim_while_loading = true;
        self
    }

    pub fn requirement(&self) -> Requirement {
        self.requirement
    }

    pub fn decide(&self, state: &PermissionState) -> GuardDecision {
        match state {
            PermissionState::Loading if self.dim_while_loading => GuardDecision::DimmedChildren,
            PermissionState::Loading => GuardDecision::Nothing,
            PermissionState::Ready(caps) if self.requirement.is_met(caps) => GuardDecision::Children,
            PermissionState::Ready(_) if self.fallback => GuardDecision::Fallback,
            PermissionState::Ready(_) => GuardDecision::Nothing,
        }
    }

    /// Pick between `children` and `fallback` according to [`decide`](Self::decide).
    ///
    /// Returns the element and whether it should be drawn dimmed.
    pub fn select<T>(&self, state: &PermissionState, children: T, fallback: Option<T>) -> Option<(T, bool)> {
        match self.decide(state) {
            GuardDecision::Children => Some((children, false)),
            GuardDecision::DimmedChildren => Some((children, true)),
            GuardDecision::Fallback => fallback.map(|f| (f, false)),
            GuardDecision::Nothing => None,
        }
    }
}
