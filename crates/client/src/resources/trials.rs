//! Clinical trials, IRB review tracking and trial payments.

use chrono::NaiveDate;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use vendorportal_core::validation::{validate_max_len, validate_text};
use vendorportal_core::{DomainError, DomainResult, PaymentId, TrialId, UserId, VendorId};

use crate::error::RequestError;
use crate::resources::Timestamp;
use crate::session::SessionManager;

const BASE: &str = "/api/vendor/clinical";

pub const TRIAL_NAME_MAX: usize = 200;
pub const TRIAL_DESCRIPTION_MAX: usize = 1000;
pub const COMMENT_MAX: usize = 500;

/// Institutional Review Board status of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrbStatus {
    Preparation,
    Submitted,
    UnderReview,
    ChangesRequested,
    Resubmitted,
    Approved,
    Rejected,
}

impl IrbStatus {
    pub const ALL: [IrbStatus; 7] = [
        IrbStatus::Preparation,
        IrbStatus::Submitted,
        IrbStatus::UnderReview,
        IrbStatus::ChangesRequested,
        IrbStatus::Resubmitted,
        IrbStatus::Approved,
        IrbStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IrbStatus::Preparation => "preparation",
            IrbStatus::Submitted => "submitted",
            IrbStatus::UnderReview => "under_review",
            IrbStatus::ChangesRequested => "changes_requested",
            IrbStatus::Resubmitted => "resubmitted",
            IrbStatus::Approved => "approved",
            IrbStatus::Rejected => "rejected",
        }
    }

    /// Still waiting on a board decision.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            IrbStatus::Submitted | IrbStatus::UnderReview | IrbStatus::Resubmitted
        )
    }
}

impl std::str::FromStr for IrbStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IrbStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = IrbStatus::ALL.iter().map(IrbStatus::as_str).collect();
                DomainError::validation(format!("IRB status must be one of: {}", allowed.join(", ")))
            })
    }
}

impl std::fmt::Display for IrbStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    WireTransfer,
    Check,
    Cash,
    Ach,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::CreditCard,
        PaymentMethod::WireTransfer,
        PaymentMethod::Check,
        PaymentMethod::Cash,
        PaymentMethod::Ach,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::WireTransfer => "wire_transfer",
            PaymentMethod::Check => "check",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Ach => "ach",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unsupported payment method '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalTrial {
    pub trial_id: TrialId,
    pub vendor_id: VendorId,
    pub trial_name: String,
    #[serde(default)]
    pub trial_description: Option<String>,
    pub product_name: String,
    pub trial_status: String,
    pub irb_status: IrbStatus,
    #[serde(default)]
    pub irb_submission_date: Option<Timestamp>,
    #[serde(default)]
    pub irb_approval_date: Option<Timestamp>,
    #[serde(default)]
    pub trial_start_date: Option<Timestamp>,
    #[serde(default)]
    pub trial_end_date: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub created_by_user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewClinicalTrial {
    pub trial_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_description: Option<String>,
    pub product_name: String,
}

impl NewClinicalTrial {
    pub fn validate(&self) -> DomainResult<()> {
        validate_text("trial_name", &self.trial_name, TRIAL_NAME_MAX)?;
        validate_max_len("trial_description", self.trial_description.as_deref(), TRIAL_DESCRIPTION_MAX)?;
        validate_text("product_name", &self.product_name, TRIAL_NAME_MAX)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrialQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trial_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub irb_status: Option<IrbStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IrbStatusUpdate {
    pub new_status: IrbStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl IrbStatusUpdate {
    pub fn validate(&self) -> DomainResult<()> {
        validate_max_len("comments", self.comments.as_deref(), COMMENT_MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IrbStatusChange {
    #[serde(default)]
    pub message: Option<String>,
    pub trial_id: TrialId,
    #[serde(default)]
    pub old_status: Option<IrbStatus>,
    pub new_status: IrbStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IrbHistoryEntry {
    pub history_id: i64,
    pub trial_id: TrialId,
    #[serde(default)]
    pub old_status: Option<IrbStatus>,
    pub new_status: IrbStatus,
    #[serde(default)]
    pub changed_by_user_id: Option<UserId>,
    #[serde(default)]
    pub changed_by_username: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub changed_at: Option<Timestamp>,
}

/// Newest entry first.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IrbHistory {
    pub trial_id: TrialId,
    pub history_count: u64,
    pub history: Vec<IrbHistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPayment {
    pub installment_number: u32,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn validate(&self) -> DomainResult<()> {
        if self.installment_number < 1 {
            return Err(DomainError::validation("installment_number must be at least 1"));
        }
        if self.amount < Decimal::ZERO {
            return Err(DomainError::validation("amount must not be negative"));
        }
        validate_max_len("notes", self.notes.as_deref(), COMMENT_MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Payment {
    pub payment_id: PaymentId,
    pub trial_id: TrialId,
    pub installment_number: u32,
    pub amount: Decimal,
    pub payment_status: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub paid_date: Option<Timestamp>,
    /// Unset until the installment is paid.
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ClinicalDashboard {
    pub total_trials: u64,
    pub active_trials: u64,
    pub completed_trials: u64,
    pub pending_irb: u64,
    pub approved_irb: u64,
}

/// Metadata of a file attached to a trial; the file itself lives in object storage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrialDocument {
    pub document_id: i64,
    pub trial_id: TrialId,
    pub document_type: String,
    pub document_name: String,
    #[serde(default)]
    pub s3_key: Option<String>,
    #[serde(default)]
    pub s3_url: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub uploaded_by_user_id: Option<UserId>,
    #[serde(default)]
    pub uploaded_at: Option<Timestamp>,
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Trials<'a> {
    session: &'a SessionManager,
}

impl<'a> Trials<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    pub async fn list(&self, query: &TrialQuery) -> Result<Vec<ClinicalTrial>, RequestError> {
        self.session
            .execute(Method::GET, &format!("{BASE}/trials"), |req| req.query(query))
            .await
    }

    pub async fn get(&self, id: TrialId) -> Result<ClinicalTrial, RequestError> {
        self.session.get(&format!("{BASE}/trials/{id}")).await
    }

    pub async fn create(&self, trial: &NewClinicalTrial) -> Result<ClinicalTrial, RequestError> {
        trial.validate()?;
        let created: ClinicalTrial = self
            .session
            .execute(Method::POST, &format!("{BASE}/trials"), |req| req.json(trial))
            .await?;
        tracing::info!(trial_id = %created.trial_id, "clinical trial created");
        Ok(created)
    }

    pub async fn update_irb_status(
        &self,
        id: TrialId,
        update: &IrbStatusUpdate,
    ) -> Result<IrbStatusChange, RequestError> {
        update.validate()?;
        let change: IrbStatusChange = self
            .session
            .execute(Method::PUT, &format!("{BASE}/trials/{id}/irb-status"), |req| req.json(update))
            .await?;
        tracing::info!(
            trial_id = %id,
            from = ?change.old_status,
            to = %change.new_status,
            "IRB status updated"
        );
        Ok(change)
    }

    pub async fn irb_history(&self, id: TrialId) -> Result<IrbHistory, RequestError> {
        self.session.get(&format!("{BASE}/trials/{id}/irb-history")).await
    }

    pub async fn add_payment(&self, id: TrialId, payment: &NewPayment) -> Result<Payment, RequestError> {
        payment.validate()?;
        self.session
            .execute(Method::POST, &format!("{BASE}/trials/{id}/payments"), |req| req.json(payment))
            .await
    }

    pub async fn payments(&self, id: TrialId) -> Result<Vec<Payment>, RequestError> {
        self.session.get(&format!("{BASE}/trials/{id}/payments")).await
    }

    /// Newest upload first.
    pub async fn documents(&self, id: TrialId) -> Result<Vec<TrialDocument>, RequestError> {
        self.session.get(&format!("{BASE}/trials/{id}/documents")).await
    }

    pub async fn dashboard(&self) -> Result<ClinicalDashboard, RequestError> {
        self.session.get(&format!("{BASE}/dashboard")).await
    }
}
