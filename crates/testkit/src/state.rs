use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde_json::{Value, json};

use vendorportal_auth::{EmployeePermissions, EmployeeRole};
use vendorportal_core::VendorId;

pub const VENDOR_ID: &str = "V-100";
pub const VENDOR_NAME: &str = "Acme Biotics";

/// Account known to the stub.
#[derive(Debug, Clone)]
pub struct StubUser {
    pub user_id: i64,
    pub username: String,
    pub password: String,
    pub role: String,
    pub employee_role: Option<EmployeeRole>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub disabled: bool,
}

impl StubUser {
    pub fn profile(&self) -> Value {
        json!({
            "user_id": self.user_id,
            "username": self.username,
            "email": self.email,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "role": self.role,
            "vendor_id": VENDOR_ID,
            "disabled": self.disabled,
        })
    }

    /// Permission object as the role table computes it.
    pub fn permissions(&self) -> Option<EmployeePermissions> {
        let vendor = VendorId::new(VENDOR_ID);
        let perms = match (self.role.as_str(), self.employee_role) {
            ("vendor", _) => EmployeePermissions::vendor_admin(vendor),
            ("employee", Some(role)) => EmployeePermissions::for_employee(vendor, role),
            _ => return None,
        };
        Some(perms.with_user_id(self.user_id.into()))
    }
}

/// Everything the stub server knows, plus the knobs tests turn.
#[derive(Debug)]
pub struct StubState {
    pub(crate) secret: String,
    pub(crate) users: Mutex<Vec<StubUser>>,
    pub(crate) employees: Mutex<Vec<Value>>,
    pub(crate) patients: Mutex<Vec<Value>>,
    pub(crate) products: Mutex<Vec<Value>>,
    pub(crate) trials: Mutex<Vec<Value>>,
    pub(crate) payments: Mutex<Vec<Value>>,
    pub(crate) irb_history: Mutex<Vec<Value>>,
    pub(crate) documents: Mutex<Vec<Value>>,
    pub(crate) engagements: Mutex<Vec<Value>>,
    pub(crate) permission_overrides: Mutex<HashMap<String, Value>>,
    pub(crate) permissions_failure: Mutex<Option<u16>>,
    pub(crate) hits: Mutex<HashMap<String, usize>>,
    pub(crate) revoked: AtomicBool,
    pub(crate) token_ttl_secs: AtomicI64,
    next_id: AtomicI64,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StubState {
    pub fn seeded(secret: &str) -> Self {
        let state = Self {
            secret: secret.to_string(),
            users: Mutex::new(Vec::new()),
            employees: Mutex::new(Vec::new()),
            patients: Mutex::new(Vec::new()),
            products: Mutex::new(Vec::new()),
            trials: Mutex::new(Vec::new()),
            payments: Mutex::new(Vec::new()),
            irb_history: Mutex::new(Vec::new()),
            documents: Mutex::new(Vec::new()),
            engagements: Mutex::new(Vec::new()),
            permission_overrides: Mutex::new(HashMap::new()),
            permissions_failure: Mutex::new(None),
            hits: Mutex::new(HashMap::new()),
            revoked: AtomicBool::new(false),
            token_ttl_secs: AtomicI64::new(30 * 60),
            next_id: AtomicI64::new(100),
        };

        state.add_user("acme_admin", "admin123", "vendor", None, ("Ada", "Admin"));
        state.add_employee("mgr_mia", "manager1", EmployeeRole::Manager, ("Mia", "Manager"));
        state.add_employee("ed_eli", "editor1", EmployeeRole::Editor, ("Eli", "Editor"));
        state.add_employee("vic_viewer", "viewer1", EmployeeRole::Viewer, ("Vic", "Viewer"));
        state.add_user("pat01", "patient1", "patient", None, ("Pat", "Patient"));

        let john = state.add_patient("johndoe", "John", "Doe");
        state.add_product("DailyBiotic Pro", 49.99, Some(39.99));
        state.add_product("Gut Reset", 25.0, None);
        for (product, impressions) in lock(&state.products).iter_mut().zip([120, 30]) {
            product["impressions"] = json!(impressions);
        }
        let trial = state.add_trial("DailyBiotic Pro Phase 1 Safety Study", "DailyBiotic Pro");
        state.add_document(&trial, "protocol", "phase1-protocol.pdf");

        let john_id = john["user_id"].as_i64().unwrap_or_default();
        for kind in ["view", "view", "click", "view"] {
            state.add_engagement(john_id, kind);
        }

        state
    }

    pub(crate) fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn now() -> String {
        Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string()
    }

    pub(crate) fn add_user(
        &self,
        username: &str,
        password: &str,
        role: &str,
        employee_role: Option<EmployeeRole>,
        (first, last): (&str, &str),
    ) -> StubUser {
        let user = StubUser {
            user_id: self.next_id(),
            username: username.to_string(),
            password: password.to_string(),
            role: role.to_string(),
            employee_role,
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: format!("{username}@acme.test"),
            disabled: false,
        };
        lock(&self.users).push(user.clone());
        user
    }

    pub(crate) fn add_employee(
        &self,
        username: &str,
        password: &str,
        role: EmployeeRole,
        names: (&str, &str),
    ) -> Value {
        let user = self.add_user(username, password, "employee", Some(role), names);
        let record = json!({
            "employee_id": self.next_id(),
            "user_id": user.user_id,
            "username": user.username,
            "email": user.email,
            "first_name": user.first_name,
            "last_name": user.last_name,
            "phone": null,
            "employee_role": role.as_str(),
            "department": null,
            "status": "active",
            "created_at": Self::now(),
            "created_by_username": "acme_admin",
            "vendor_id": VENDOR_ID,
            "vendor_company_name": VENDOR_NAME,
        });
        lock(&self.employees).push(record.clone());
        record
    }

    pub(crate) fn add_patient(&self, username: &str, first: &str, last: &str) -> Value {
        let user = self.add_user(username, "patient-pass", "patient", None, (first, last));
        let record = json!({
            "customer_id": self.next_id(),
            "user_id": user.user_id,
            "username": user.username,
            "email": user.email,
            "first_name": first,
            "last_name": last,
            "phone": "+1-555-123-4567",
            "status": "active",
            "created_at": Self::now(),
            "created_by_vendor_id": VENDOR_ID,
        });
        lock(&self.patients).push(record.clone());
        record
    }

    pub(crate) fn add_product(&self, name: &str, regular: f64, sale: Option<f64>) -> Value {
        let record = json!({
            "product_id": self.next_id(),
            "vendor_id": VENDOR_ID,
            "name": name,
            "regular_price": regular,
            "sale_price": sale,
            "discount_percentage": null,
            "impressions": 0,
            "description": null,
            "image_path": null,
            "created_at": Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            "updated_at": null,
            "clinical_status_id": null,
        });
        lock(&self.products).push(record.clone());
        record
    }

    pub(crate) fn add_trial(&self, name: &str, product: &str) -> Value {
        let now = Self::now();
        let record = json!({
            "trial_id": self.next_id(),
            "vendor_id": VENDOR_ID,
            "trial_name": name,
            "trial_description": null,
            "product_name": product,
            "trial_status": "planning",
            "irb_status": "preparation",
            "irb_submission_date": null,
            "irb_approval_date": null,
            "trial_start_date": null,
            "trial_end_date": null,
            "created_at": now,
            "updated_at": now,
            "created_by_user_id": null,
        });
        lock(&self.trials).push(record.clone());
        record
    }

    pub(crate) fn add_document(&self, trial: &Value, document_type: &str, name: &str) -> Value {
        let trial_id = trial["trial_id"].as_i64().unwrap_or_default();
        let record = json!({
            "document_id": self.next_id(),
            "trial_id": trial_id,
            "document_type": document_type,
            "document_name": name,
            "s3_key": format!("trials/{trial_id}/{name}"),
            "s3_url": null,
            "file_size": 48213,
            "mime_type": "application/pdf",
            "uploaded_by_user_id": null,
            "uploaded_at": Self::now(),
            "version": 1,
            "notes": null,
        });
        lock(&self.documents).push(record.clone());
        record
    }

    pub(crate) fn add_engagement(&self, user_id: i64, kind: &str) {
        let record = json!({
            "engagement_id": self.next_id(),
            "user_id": user_id,
            "engagement_type": kind,
            "created_at": Self::now(),
        });
        lock(&self.engagements).push(record);
    }

    pub fn user(&self, username: &str) -> Option<StubUser> {
        lock(&self.users).iter().find(|u| u.username == username).cloned()
    }

    pub(crate) fn record_hit(&self, path: &str) {
        *lock(&self.hits).entry(path.to_string()).or_insert(0) += 1;
    }
}
