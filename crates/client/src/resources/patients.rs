use reqwest::Method;
use serde::{Deserialize, Serialize};

use vendorportal_core::validation::{
    validate_email, validate_name, validate_password, validate_phone, validate_username,
};
use vendorportal_core::{DomainResult, PatientId, UserId, VendorId};

use crate::error::RequestError;
use crate::resources::{Acknowledgement, Page, Timestamp};
use crate::session::SessionManager;

const BASE: &str = "/api/vendor/patients";

/// Patient account registered by a vendor.
///
/// Address and demographic fields are only present on the detail endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    #[serde(rename = "customer_id")]
    pub patient_id: PatientId,
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub status: String,
    pub created_at: Timestamp,
    #[serde(default)]
    pub created_by_vendor_id: Option<VendorId>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PatientList {
    pub patients: Vec<Patient>,
    pub total_count: u64,
    pub vendor_id: VendorId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatientQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_filter: Option<String>,
    #[serde(flatten)]
    pub page: Page,
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct NewPatient {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

impl NewPatient {
    pub fn validate(&self) -> DomainResult<()> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        validate_name("first_name", &self.first_name)?;
        validate_name("last_name", &self.last_name)?;
        validate_phone(&self.phone)
    }
}

impl std::fmt::Debug for NewPatient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewPatient")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedPatient {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "customer_id")]
    pub patient_id: PatientId,
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub created_by_vendor: Option<VendorId>,
}

#[derive(Debug, Clone, Copy)]
pub struct Patients<'a> {
    session: &'a SessionManager,
}

impl<'a> Patients<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    pub async fn list(&self, query: &PatientQuery) -> Result<PatientList, RequestError> {
        self.session
            .execute(Method::GET, BASE, |req| req.query(query))
            .await
    }

    pub async fn get(&self, id: PatientId) -> Result<Patient, RequestError> {
        self.session.get(&format!("{BASE}/{id}")).await
    }

    pub async fn create(&self, patient: &NewPatient) -> Result<CreatedPatient, RequestError> {
        patient.validate()?;
        let created: CreatedPatient = self
            .session
            .execute(Method::POST, BASE, |req| req.json(patient))
            .await?;
        tracing::info!(patient_id = %created.patient_id, "patient account created");
        Ok(created)
    }

    /// Deactivate a patient account; the record is kept.
    pub async fn deactivate(&self, id: PatientId) -> Result<Acknowledgement, RequestError> {
        self.session
            .execute(Method::DELETE, &format!("{BASE}/{id}"), |req| req)
            .await
    }
}
