use reqwest::Method;
use serde::{Deserialize, Serialize};

use vendorportal_auth::{EmployeePermissions, EmployeeRole};
use vendorportal_core::validation::{
    NAME_MAX, validate_email, validate_max_len, validate_name, validate_password, validate_phone,
    validate_username,
};
use vendorportal_core::{DomainResult, EmployeeId, UserId, VendorId};

use crate::error::RequestError;
use crate::resources::{Acknowledgement, Page, Timestamp};
use crate::session::SessionManager;

const BASE: &str = "/api/vendor/employees";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

impl EmployeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeStatus::Active => "active",
            EmployeeStatus::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub employee_id: EmployeeId,
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub employee_role: EmployeeRole,
    #[serde(default)]
    pub department: Option<String>,
    /// Account status as stored; `active` or `inactive` in practice.
    pub status: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    #[serde(default)]
    pub created_by_username: Option<String>,
    #[serde(default)]
    pub created_by_name: Option<String>,
    pub vendor_id: VendorId,
    #[serde(default)]
    pub vendor_company_name: Option<String>,
}

impl Employee {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmployeeList {
    pub employees: Vec<Employee>,
    pub total_count: u64,
    pub vendor_id: VendorId,
}

/// Filters for `GET /api/vendor/employees`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmployeeQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_filter: Option<EmployeeRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_filter: Option<EmployeeStatus>,
    #[serde(flatten)]
    pub page: Page,
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct NewEmployee {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub employee_role: EmployeeRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl NewEmployee {
    pub fn validate(&self) -> DomainResult<()> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        validate_name("first_name", &self.first_name)?;
        validate_name("last_name", &self.last_name)?;
        validate_phone(&self.phone)?;
        validate_max_len("department", self.department.as_deref(), NAME_MAX)
    }
}

impl std::fmt::Debug for NewEmployee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewEmployee")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("employee_role", &self.employee_role)
            .finish_non_exhaustive()
    }
}

/// Partial update; unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmployeeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_role: Option<EmployeeRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl EmployeeUpdate {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(first) = &self.first_name {
            validate_name("first_name", first)?;
        }
        if let Some(last) = &self.last_name {
            validate_name("last_name", last)?;
        }
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        validate_max_len("department", self.department.as_deref(), NAME_MAX)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Reply of `POST /api/vendor/employees`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedEmployee {
    #[serde(default)]
    pub message: Option<String>,
    pub employee_id: EmployeeId,
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub employee_role: EmployeeRole,
    pub vendor_id: VendorId,
}

/// Employee management for the signed-in vendor.
#[derive(Debug, Clone, Copy)]
pub struct Employees<'a> {
    session: &'a SessionManager,
}

impl<'a> Employees<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    pub async fn list(&self, query: &EmployeeQuery) -> Result<EmployeeList, RequestError> {
        self.session
            .execute(Method::GET, BASE, |req| req.query(query))
            .await
    }

    pub async fn get(&self, id: EmployeeId) -> Result<Employee, RequestError> {
        self.session.get(&format!("{BASE}/{id}")).await
    }

    pub async fn create(&self, employee: &NewEmployee) -> Result<CreatedEmployee, RequestError> {
        employee.validate()?;
        let created: CreatedEmployee = self
            .session
            .execute(Method::POST, BASE, |req| req.json(employee))
            .await?;
        tracing::info!(employee_id = %created.employee_id, role = %created.employee_role, "employee created");
        Ok(created)
    }

    pub async fn update(&self, id: EmployeeId, update: &EmployeeUpdate) -> Result<Acknowledgement, RequestError> {
        update.validate()?;
        self.session
            .execute(Method::PUT, &format!("{BASE}/{id}"), |req| req.json(update))
            .await
    }

    /// Activate or deactivate an employee account.
    pub async fn set_status(&self, id: EmployeeId, status: EmployeeStatus) -> Result<Acknowledgement, RequestError> {
        self.session
            .execute(Method::PUT, &format!("{BASE}/{id}/status"), |req| {
                req.query(&[("status", status.as_str())])
            })
            .await
    }

    /// Permanently delete an employee and their account.
    pub async fn delete(&self, id: EmployeeId) -> Result<Acknowledgement, RequestError> {
        let ack = self
            .session
            .execute(Method::DELETE, &format!("{BASE}/{id}"), |req| req)
            .await?;
        tracing::info!(employee_id = %id, "employee deleted");
        Ok(ack)
    }

    /// Fetch the caller's own permission object and refresh the cached copy.
    pub async fn my_permissions(&self) -> Result<EmployeePermissions, RequestError> {
        self.session.refresh_permissions().await
    }
}
