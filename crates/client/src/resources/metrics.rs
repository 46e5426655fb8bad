//! Vendor dashboard figures: reach, engagement and recent customers.
//!
//! Available to any signed-in account; the numbers are computed server-side.

use serde::Deserialize;

use vendorportal_core::UserId;

use crate::error::RequestError;
use crate::session::SessionManager;

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct DashboardMetrics {
    pub total_impressions: u64,
    /// Clicks per hundred views, one decimal.
    pub engagement_rate: f64,
    pub customer_reach: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct CustomerInsights {
    pub total_customers: u64,
    pub new_customers: u64,
    pub avg_health_index: f64,
    /// Percentage of active accounts.
    pub retention_rate: f64,
}

/// Server-side bucket of a health index: at least 3.5 is healthy, at least
/// 2.5 a warning, anything lower critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecentCustomer {
    /// The customer's user account.
    pub customer_id: UserId,
    pub full_name: String,
    /// Display date, e.g. `05 Mar 2025`.
    #[serde(default)]
    pub signup_date: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub overall_health_index: Option<f64>,
    pub visit_count: u64,
    pub status: String,
    pub health_status: HealthStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CustomerVisit {
    pub visit_id: i64,
    #[serde(default)]
    pub visit_date: Option<String>,
    #[serde(default)]
    pub health_index_value: Option<f64>,
    pub health_status: HealthStatus,
    #[serde(default)]
    pub engagement_type: Option<String>,
}

#[derive(Deserialize)]
struct CustomerList {
    customers: Vec<RecentCustomer>,
}

#[derive(Deserialize)]
struct VisitList {
    visits: Vec<CustomerVisit>,
}

#[derive(Debug, Clone, Copy)]
pub struct Metrics<'a> {
    session: &'a SessionManager,
}

impl<'a> Metrics<'a> {
    pub fn new(session: &'a SessionManager) -> Self {
        Self { session }
    }

    pub async fn dashboard(&self) -> Result<DashboardMetrics, RequestError> {
        self.session.get("/api/dashboard-metrics").await
    }

    pub async fn customer_insights(&self) -> Result<CustomerInsights, RequestError> {
        self.session.get("/api/customer-insights").await
    }

    /// The ten most recent sign-ups, newest first.
    pub async fn recent_customers(&self) -> Result<Vec<RecentCustomer>, RequestError> {
        let list: CustomerList = self.session.get("/api/recent-customers").await?;
        Ok(list.customers)
    }

    /// Visits of one customer, newest first.
    pub async fn customer_visits(&self, customer: UserId) -> Result<Vec<CustomerVisit>, RequestError> {
        let list: VisitList = self.session.get(&format!("/api/customer/{customer}/visits")).await?;
        Ok(list.visits)
    }
}
