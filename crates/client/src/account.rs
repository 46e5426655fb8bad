//! Account endpoints that work without a session: self-registration and
//! password recovery.

use serde::{Deserialize, Serialize};

use vendorportal_auth::AccountRole;
use vendorportal_core::validation::{
    validate_email, validate_max_len, validate_name, validate_password, validate_phone, validate_text,
    validate_username,
};
use vendorportal_core::{DomainResult, UserId};

use crate::error::RequestError;
use crate::http::ApiClient;
use crate::resources::Acknowledgement;
use crate::session::SessionManager;

pub const REGISTER_PATH: &str = "/register";
pub const VERIFY_IDENTITY_PATH: &str = "/verify-identity";
pub const RESET_PASSWORD_PATH: &str = "/reset-password";

const ROLE_MAX: usize = 50;
const LICENSE_MAX: usize = 100;
const SPECIALTY_MAX: usize = 100;
const ORGANIZATION_MAX: usize = 200;

/// Credentials of a healthcare professional registering an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfessionalData {
    pub license_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

impl ProfessionalData {
    pub fn validate(&self) -> DomainResult<()> {
        validate_text("license_number", &self.license_number, LICENSE_MAX)?;
        validate_max_len("specialty", self.specialty.as_deref(), SPECIALTY_MAX)?;
        validate_max_len("organization", self.organization.as_deref(), ORGANIZATION_MAX)
    }
}

/// `POST /register` body. The server defaults `status` to active.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: AccountRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub professional_data: Option<ProfessionalData>,
}

impl Registration {
    pub fn validate(&self) -> DomainResult<()> {
        validate_username(&self.username)?;
        validate_name("first_name", &self.first_name)?;
        validate_name("last_name", &self.last_name)?;
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        validate_text("role", self.role.as_str(), ROLE_MAX)?;
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        match &self.professional_data {
            Some(data) => data.validate(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Registered {
    #[serde(default)]
    pub message: Option<String>,
    pub user_id: UserId,
    pub username: String,
    pub status: String,
    pub role: AccountRole,
}

/// Username and email that must belong to the same account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityCheck {
    pub username: String,
    pub email: String,
}

impl IdentityCheck {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        validate_username(&self.username)?;
        validate_email(&self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdentityVerified {
    pub verified: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct PasswordReset {
    #[serde(flatten)]
    pub identity: IdentityCheck,
    pub new_password: String,
}

impl PasswordReset {
    pub fn validate(&self) -> DomainResult<()> {
        self.identity.validate()?;
        validate_password(&self.new_password)
    }
}

impl std::fmt::Debug for PasswordReset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordReset")
            .field("identity", &self.identity)
            .field("new_password", &"<redacted>")
            .finish()
    }
}

/// Password recovery: prove the username/email pair, then set a new password.
///
/// A pair that does not match an account comes back as
/// [`RequestError::NotFound`].
#[derive(Debug, Clone, Copy)]
pub struct Recovery<'a> {
    api: &'a ApiClient,
}

impl<'a> Recovery<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn verify_identity(&self, identity: &IdentityCheck) -> Result<IdentityVerified, RequestError> {
        identity.validate()?;
        self.api.post_public(VERIFY_IDENTITY_PATH, identity).await
    }

    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<Acknowledgement, RequestError> {
        reset.validate()?;
        let ack: Acknowledgement = self.api.post_public(RESET_PASSWORD_PATH, reset).await?;
        tracing::info!(username = %reset.identity.username, "password reset");
        Ok(ack)
    }
}

impl SessionManager {
    /// Create an account. Does not sign in and leaves any current session as is.
    pub async fn register(&self, registration: &Registration) -> Result<Registered, RequestError> {
        registration.validate()?;
        let registered: Registered = self.api().post_public(REGISTER_PATH, registration).await?;
        tracing::info!(user_id = %registered.user_id, role = %registered.role, "account registered");
        Ok(registered)
    }

    pub fn recovery(&self) -> Recovery<'_> {
        Recovery::new(self.api())
    }
}
