//! Handlers of the stub API. Response shapes follow the real service.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{Value, json};

use vendorportal_auth::{EmployeeRole, Permission};

use crate::state::{StubState, StubUser, VENDOR_ID, VENDOR_NAME, lock};
use crate::{StubClaims, encode_claims};

type Shared = Arc<StubState>;
type Reply = Result<Response, Response>;

const PASSWORD_MAX_BYTES: usize = 72;

const IRB_STATUSES: [&str; 7] = [
    "preparation",
    "submitted",
    "under_review",
    "changes_requested",
    "resubmitted",
    "approved",
    "rejected",
];

pub fn router(state: Shared) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/token", post(token))
        .route("/users/me", get(users_me))
        .route("/validate-token", get(validate_token))
        .route("/register", post(register))
        .route("/verify-identity", post(verify_identity))
        .route("/reset-password", post(reset_password))
        .route("/api/dashboard-metrics", get(dashboard_metrics))
        .route("/api/customer-insights", get(customer_insights))
        .route("/api/recent-customers", get(recent_customers))
        .route("/api/customer/:id/visits", get(customer_visits))
        .route("/api/vendor/employees/me/permissions", get(my_permissions))
        .route("/api/vendor/employees", get(list_employees).post(create_employee))
        .route(
            "/api/vendor/employees/:id",
            get(get_employee).put(update_employee).delete(delete_employee),
        )
        .route("/api/vendor/employees/:id/status", put(set_employee_status))
        .route("/api/vendor/patients", get(list_patients).post(create_patient))
        .route("/api/vendor/patients/:id", get(get_patient).delete(deactivate_patient))
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/paginated", get(paginated_products))
        .route(
            "/api/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/api/vendor/clinical/trials", get(list_trials).post(create_trial))
        .route("/api/vendor/clinical/trials/:id", get(get_trial))
        .route("/api/vendor/clinical/trials/:id/irb-status", put(update_irb_status))
        .route("/api/vendor/clinical/trials/:id/irb-history", get(irb_history))
        .route("/api/vendor/clinical/trials/:id/documents", get(trial_documents))
        .route(
            "/api/vendor/clinical/trials/:id/payments",
            get(list_payments).post(add_payment),
        )
        .route("/api/vendor/clinical/dashboard", get(dashboard))
        .layer(middleware::from_fn_with_state(state.clone(), count_hits))
        .with_state(state)
}

async fn count_hits(State(state): State<Shared>, req: Request, next: Next) -> Response {
    state.record_hit(req.uri().path());
    next.run(req).await
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

fn ok(body: Value) -> Reply {
    Ok(Json(body).into_response())
}

fn created(body: Value) -> Reply {
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

fn unauthorized() -> Response {
    detail(StatusCode::UNAUTHORIZED, "Could not validate credentials")
}

fn authenticate(state: &StubState, headers: &HeaderMap) -> Result<StubUser, Response> {
    if state.revoked.load(Ordering::SeqCst) {
        return Err(unauthorized());
    }

    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(unauthorized)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let claims = jsonwebtoken::decode::<StubClaims>(
        token,
        &DecodingKey::from_secret(state.secret.as_bytes()),
        &validation,
    )
    .map_err(|_| unauthorized())?
    .claims;

    let user = state.user(&claims.sub).ok_or_else(unauthorized)?;
    if user.disabled {
        return Err(detail(StatusCode::BAD_REQUEST, "Inactive user"));
    }
    Ok(user)
}

fn vendor_side(user: &StubUser) -> Result<(), Response> {
    match user.role.as_str() {
        "vendor" | "employee" => Ok(()),
        _ => Err(detail(StatusCode::FORBIDDEN, "Only vendors and their employees can access this resource")),
    }
}

fn vendor_only(user: &StubUser, message: &str) -> Result<(), Response> {
    if user.role == "vendor" {
        Ok(())
    } else {
        Err(detail(StatusCode::FORBIDDEN, message))
    }
}

const TRIALS_VENDOR_ONLY: &str = "Only vendors can access clinical trials";

fn require(user: &StubUser, permission: Permission, message: &str) -> Result<(), Response> {
    let allowed = user.permissions().is_some_and(|p| p.allows(permission));
    if allowed {
        Ok(())
    } else {
        Err(detail(StatusCode::FORBIDDEN, message))
    }
}

fn position(records: &[Value], field: &str, id: i64) -> Option<usize> {
    records.iter().position(|r| r[field].as_i64() == Some(id))
}

fn paginate(records: Vec<Value>, limit: Option<usize>, offset: Option<usize>) -> Vec<Value> {
    records
        .into_iter()
        .skip(offset.unwrap_or(0))
        .take(limit.unwrap_or(100))
        .collect()
}

fn matches_search(record: &Value, search: Option<&str>) -> bool {
    let Some(needle) = search.map(str::to_lowercase) else {
        return true;
    };
    ["username", "email", "first_name", "last_name"]
        .iter()
        .filter_map(|f| record[*f].as_str())
        .any(|v| v.to_lowercase().contains(&needle))
}

fn text(body: &Value, field: &str) -> Result<String, Response> {
    body[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| detail(StatusCode::UNPROCESSABLE_ENTITY, format!("field required: {field}")))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "vendor-portal-stub" }))
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn token(State(state): State<Shared>, Form(form): Form<LoginForm>) -> Reply {
    let user = state
        .user(&form.username)
        .filter(|u| u.password == form.password)
        .ok_or_else(|| detail(StatusCode::UNAUTHORIZED, "Incorrect username or password"))?;
    if user.disabled {
        return Err(detail(StatusCode::FORBIDDEN, "Inactive user"));
    }

    let ttl = state.token_ttl_secs.load(Ordering::SeqCst);
    let access_token = encode_claims(&state.secret, &StubClaims::new(&user.username, &user.role, Some(user.user_id), ttl));
    ok(json!({ "access_token": access_token, "token_type": "bearer" }))
}

async fn users_me(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let user = authenticate(&state, &headers)?;
    ok(user.profile())
}

async fn validate_token(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let user = authenticate(&state, &headers)?;
    ok(json!({ "valid": true, "user_id": user.user_id, "username": user.username, "role": user.role }))
}

async fn register(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let username = text(&body, "username")?;
    let email = text(&body, "email")?;
    let password = text(&body, "password")?;
    let role = text(&body, "role")?;
    if lock(&state.users).iter().any(|u| u.email == email) {
        return Err(detail(StatusCode::BAD_REQUEST, "Email already registered"));
    }
    if state.user(&username).is_some() {
        return Err(detail(StatusCode::BAD_REQUEST, "Username already taken"));
    }

    let first = text(&body, "first_name")?;
    let last = text(&body, "last_name")?;
    let user = state.add_user(&username, &password, &role, None, (&first, &last));
    if let Some(account) = lock(&state.users).iter_mut().find(|u| u.user_id == user.user_id) {
        account.email = email;
    }
    let status = body["status"].as_str().unwrap_or("active").to_string();

    ok(json!({
        "success": true,
        "message": "User registered successfully",
        "user_id": user.user_id,
        "username": username,
        "status": status,
        "role": role,
    }))
}

fn matching_account(state: &StubState, body: &Value) -> Result<StubUser, Response> {
    let username = text(body, "username")?;
    let email = text(body, "email")?;
    state
        .user(&username)
        .filter(|u| u.email == email)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Username and email do not match"))
}

async fn verify_identity(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    matching_account(&state, &body)?;
    ok(json!({ "verified": true, "message": "Identity verified" }))
}

async fn reset_password(State(state): State<Shared>, Json(body): Json<Value>) -> Reply {
    let new_password = text(&body, "new_password")?;
    if new_password.len() > PASSWORD_MAX_BYTES {
        return Err(detail(
            StatusCode::BAD_REQUEST,
            format!(
                "Password is too long ({} bytes). Maximum is {PASSWORD_MAX_BYTES} bytes.",
                new_password.len()
            ),
        ));
    }
    let account = matching_account(&state, &body)?;
    if let Some(user) = lock(&state.users).iter_mut().find(|u| u.user_id == account.user_id) {
        user.password = new_password;
    }
    ok(json!({ "success": true, "message": "Password reset successful" }))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn health_status(index: Option<f64>) -> &'static str {
    match index {
        Some(i) if i >= 3.5 => "healthy",
        Some(i) if i >= 2.5 => "warning",
        _ => "critical",
    }
}

/// Every engagement stands in for a visit with a fixed health index.
const VISIT_HEALTH_INDEX: f64 = 3.5;

async fn dashboard_metrics(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    authenticate(&state, &headers)?;

    let total_impressions: i64 = lock(&state.products)
        .iter()
        .filter_map(|p| p["impressions"].as_i64())
        .sum();
    let engagements = lock(&state.engagements);
    let count = |kind: &str| engagements.iter().filter(|e| e["engagement_type"] == kind).count();
    let (views, clicks) = (count("view"), count("click"));
    let engagement_rate = if views == 0 {
        0.0
    } else {
        round1(clicks as f64 * 100.0 / views as f64)
    };
    let mut reached: Vec<i64> = engagements.iter().filter_map(|e| e["user_id"].as_i64()).collect();
    reached.sort_unstable();
    reached.dedup();

    ok(json!({
        "total_impressions": total_impressions,
        "engagement_rate": engagement_rate,
        "customer_reach": reached.len(),
    }))
}

async fn customer_insights(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    authenticate(&state, &headers)?;

    let users = lock(&state.users);
    let patients = users.iter().filter(|u| u.role == "patient").count();
    let active = users.iter().filter(|u| !u.disabled).count();
    let retention_rate = if users.is_empty() {
        0.0
    } else {
        round1(active as f64 * 100.0 / users.len() as f64)
    };

    ok(json!({
        "total_customers": patients,
        // Every stub account was created within the reporting window.
        "new_customers": patients,
        "avg_health_index": 3.8,
        "retention_rate": retention_rate,
    }))
}

async fn recent_customers(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    authenticate(&state, &headers)?;

    let signup_date = chrono::Utc::now().format("%d %b %Y").to_string();
    let engagements = lock(&state.engagements);
    let mut patients: Vec<StubUser> = lock(&state.users)
        .iter()
        .filter(|u| u.role == "patient")
        .cloned()
        .collect();
    patients.sort_by(|a, b| b.user_id.cmp(&a.user_id));

    let customers: Vec<Value> = patients
        .iter()
        .take(10)
        .map(|u| {
            let visits = engagements.iter().filter(|e| e["user_id"].as_i64() == Some(u.user_id)).count();
            let index = (visits > 0).then_some(VISIT_HEALTH_INDEX);
            json!({
                "customer_id": u.user_id,
                "full_name": format!("{} {}", u.first_name, u.last_name),
                "signup_date": signup_date,
                "age": null,
                "overall_health_index": index,
                "visit_count": visits,
                "status": if u.disabled { "inactive" } else { "active" },
                "health_status": health_status(index),
            })
        })
        .collect();

    ok(json!({ "customers": customers }))
}

async fn customer_visits(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    authenticate(&state, &headers)?;

    let visits: Vec<Value> = lock(&state.engagements)
        .iter()
        .rev()
        .filter(|e| e["user_id"].as_i64() == Some(id))
        .map(|e| {
            json!({
                "visit_id": e["engagement_id"],
                "visit_date": chrono::Utc::now().format("%d %b %Y").to_string(),
                "health_index_value": VISIT_HEALTH_INDEX,
                "health_status": health_status(Some(VISIT_HEALTH_INDEX)),
                "engagement_type": e["engagement_type"],
            })
        })
        .collect();

    ok(json!({ "visits": visits }))
}

async fn my_permissions(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let user = authenticate(&state, &headers)?;
    if let Some(status) = *lock(&state.permissions_failure) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return Err(detail(status, "Failed to get permissions"));
    }
    if let Some(forced) = lock(&state.permission_overrides).get(&user.username) {
        return ok(forced.clone());
    }
    let permissions = user
        .permissions()
        .ok_or_else(|| detail(StatusCode::FORBIDDEN, "User is not a vendor admin or employee"))?;
    ok(json!(permissions))
}

#[derive(Deserialize, Default)]
struct ListParams {
    search: Option<String>,
    role_filter: Option<String>,
    status_filter: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_employees(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_side(&user)?;

    let matching: Vec<Value> = lock(&state.employees)
        .iter()
        .filter(|e| matches_search(e, params.search.as_deref()))
        .filter(|e| params.role_filter.as_deref().is_none_or(|r| e["employee_role"] == r))
        .filter(|e| params.status_filter.as_deref().is_none_or(|s| e["status"] == s))
        .cloned()
        .collect();
    let total = matching.len();

    ok(json!({
        "employees": paginate(matching, params.limit, params.offset),
        "total_count": total,
        "vendor_id": VENDOR_ID,
    }))
}

async fn get_employee(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_side(&user)?;

    let employees = lock(&state.employees);
    let idx = position(&employees, "employee_id", id)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Employee not found or you don't have permission to view"))?;
    ok(employees[idx].clone())
}

async fn create_employee(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_side(&user)?;
    require(&user, Permission::CanCreateEmployees, "You don't have permission to create employees")?;

    let username = text(&body, "username")?;
    if state.user(&username).is_some() {
        return Err(detail(StatusCode::BAD_REQUEST, "Username already exists"));
    }
    let role: EmployeeRole = body["employee_role"]
        .as_str()
        .unwrap_or("viewer")
        .parse()
        .map_err(|_| detail(StatusCode::UNPROCESSABLE_ENTITY, "invalid employee_role"))?;
    let first = text(&body, "first_name")?;
    let last = text(&body, "last_name")?;
    let password = text(&body, "password")?;

    let mut record = state.add_employee(&username, &password, role, (&first, &last));
    record["email"] = body["email"].clone();
    record["phone"] = body["phone"].clone();
    record["department"] = body["department"].clone();
    record["created_by_username"] = json!(user.username);
    {
        let mut employees = lock(&state.employees);
        if let Some(idx) = position(&employees, "employee_id", record["employee_id"].as_i64().unwrap_or(0)) {
            employees[idx] = record.clone();
        }
    }

    created(json!({
        "message": "Employee account created successfully",
        "employee_id": record["employee_id"],
        "user_id": record["user_id"],
        "username": username,
        "email": record["email"],
        "employee_role": role.as_str(),
        "vendor_id": VENDOR_ID,
    }))
}

async fn update_employee(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_side(&user)?;
    require(&user, Permission::CanEditEmployees, "You don't have permission to edit employees")?;

    let mut employees = lock(&state.employees);
    let idx = position(&employees, "employee_id", id)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Employee not found or you don't have permission"))?;
    if let Value::Object(changes) = body {
        for (field, value) in changes {
            employees[idx][field.as_str()] = value;
        }
    }
    employees[idx]["updated_at"] = json!(StubState::now());

    ok(json!({ "message": "Employee updated successfully", "employee_id": id }))
}

#[derive(Deserialize)]
struct StatusParams {
    status: String,
}

async fn set_employee_status(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(params): Query<StatusParams>,
) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_side(&user)?;
    require(&user, Permission::CanDeactivateEmployees, "You don't have permission to change employee status")?;
    if !matches!(params.status.as_str(), "active" | "inactive") {
        return Err(detail(StatusCode::UNPROCESSABLE_ENTITY, "status must be 'active' or 'inactive'"));
    }

    let user_id = {
        let mut employees = lock(&state.employees);
        let idx = position(&employees, "employee_id", id)
            .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Employee not found or you don't have permission"))?;
        employees[idx]["status"] = json!(params.status);
        employees[idx]["user_id"].as_i64()
    };
    if let Some(account) = lock(&state.users).iter_mut().find(|u| Some(u.user_id) == user_id) {
        account.disabled = params.status == "inactive";
    }

    let action = if params.status == "active" { "activated" } else { "deactivated" };
    ok(json!({
        "message": format!("Employee {action} successfully"),
        "employee_id": id,
        "status": params.status,
    }))
}

async fn delete_employee(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_side(&user)?;
    require(
        &user,
        Permission::CanDeleteEmployees,
        "Only vendor administrators can permanently delete employees",
    )?;

    let removed = {
        let mut employees = lock(&state.employees);
        let idx = position(&employees, "employee_id", id)
            .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Employee not found or you don't have permission"))?;
        employees.remove(idx)
    };
    let user_id = removed["user_id"].as_i64();
    lock(&state.users).retain(|u| Some(u.user_id) != user_id);

    ok(json!({ "message": "Employee deleted permanently", "employee_id": id }))
}

async fn list_patients(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_only(&user, "Only vendors can access patient data")?;

    let matching: Vec<Value> = lock(&state.patients)
        .iter()
        .filter(|p| matches_search(p, params.search.as_deref()))
        .filter(|p| params.status_filter.as_deref().is_none_or(|s| p["status"] == s))
        .cloned()
        .collect();
    let total = matching.len();

    ok(json!({
        "patients": paginate(matching, params.limit, params.offset),
        "total_count": total,
        "vendor_id": VENDOR_ID,
    }))
}

async fn get_patient(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_only(&user, "Only vendors can access patient data")?;

    let patients = lock(&state.patients);
    let idx = position(&patients, "customer_id", id)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Patient not found or access denied"))?;
    let mut record = patients[idx].clone();
    for field in ["date_of_birth", "gender", "address", "city", "state", "postal_code", "country"] {
        record[field] = Value::Null;
    }
    ok(record)
}

async fn create_patient(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_only(&user, "Only vendors can create patient accounts")?;

    let username = text(&body, "username")?;
    if state.user(&username).is_some() {
        return Err(detail(StatusCode::BAD_REQUEST, "Username already exists"));
    }
    let record = state.add_patient(&username, &text(&body, "first_name")?, &text(&body, "last_name")?);

    created(json!({
        "message": "Patient account created successfully",
        "customer_id": record["customer_id"],
        "user_id": record["user_id"],
        "username": username,
        "email": body["email"],
        "created_by_vendor": VENDOR_ID,
    }))
}

async fn deactivate_patient(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_only(&user, "Only vendors can deactivate patient accounts")?;

    let user_id = {
        let mut patients = lock(&state.patients);
        let idx = position(&patients, "customer_id", id)
            .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Patient not found or access denied"))?;
        patients[idx]["status"] = json!("inactive");
        patients[idx]["user_id"].as_i64()
    };
    if let Some(account) = lock(&state.users).iter_mut().find(|u| Some(u.user_id) == user_id) {
        account.disabled = true;
    }

    ok(json!({ "message": "Patient account deactivated successfully", "customer_id": id }))
}

fn can_edit_content(user: &StubUser) -> Result<(), Response> {
    match (user.role.as_str(), user.employee_role) {
        ("vendor", _) | ("employee", Some(EmployeeRole::Editor | EmployeeRole::Manager)) => Ok(()),
        _ => Err(detail(StatusCode::FORBIDDEN, "You don't have permission to modify products")),
    }
}

async fn list_products(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    authenticate(&state, &headers)?;
    let products = lock(&state.products).clone();
    ok(json!({ "success": true, "total_products": products.len(), "products": products }))
}

async fn paginated_products(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Reply {
    authenticate(&state, &headers)?;
    let products = lock(&state.products).clone();
    let total = products.len();
    let limit = params.limit.unwrap_or(100);
    let offset = params.offset.unwrap_or(0);
    let page = paginate(products, Some(limit), Some(offset));

    ok(json!({
        "success": true,
        "total_count": total,
        "current_count": page.len(),
        "limit": limit,
        "offset": offset,
        "products": page,
    }))
}

async fn get_product(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    authenticate(&state, &headers)?;
    let products = lock(&state.products);
    let idx = position(&products, "product_id", id)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, format!("Product with ID '{id}' not found")))?;
    ok(json!({ "success": true, "product": products[idx] }))
}

async fn create_product(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let user = authenticate(&state, &headers)?;
    can_edit_content(&user)?;

    let name = text(&body, "name")?;
    let mut record = state.add_product(&name, body["regular_price"].as_f64().unwrap_or(0.0), body["sale_price"].as_f64());
    for field in ["discount_percentage", "description", "image_path", "clinical_status_id"] {
        if let Some(value) = body.get(field) {
            record[field] = value.clone();
        }
    }
    let mut products = lock(&state.products);
    if let Some(idx) = position(&products, "product_id", record["product_id"].as_i64().unwrap_or(0)) {
        products[idx] = record.clone();
    }
    created(json!({ "success": true, "product": record }))
}

async fn update_product(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Reply {
    let user = authenticate(&state, &headers)?;
    can_edit_content(&user)?;

    let mut products = lock(&state.products);
    let idx = position(&products, "product_id", id)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, format!("Product with ID '{id}' not found")))?;
    if let Value::Object(changes) = body {
        for (field, value) in changes {
            products[idx][field.as_str()] = value;
        }
    }
    products[idx]["updated_at"] = json!(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string());
    ok(json!({ "success": true, "product": products[idx] }))
}

async fn delete_product(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let user = authenticate(&state, &headers)?;
    can_edit_content(&user)?;

    let mut products = lock(&state.products);
    let idx = position(&products, "product_id", id)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, format!("Product with ID '{id}' not found")))?;
    products.remove(idx);
    ok(json!({ "success": true, "message": "Product deleted", "product_id": id }))
}

#[derive(Deserialize)]
struct TrialParams {
    trial_status: Option<String>,
    irb_status: Option<String>,
}

async fn list_trials(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<TrialParams>,
) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_only(&user, TRIALS_VENDOR_ONLY)?;

    let trials: Vec<Value> = lock(&state.trials)
        .iter()
        .filter(|t| params.trial_status.as_deref().is_none_or(|s| t["trial_status"] == s))
        .filter(|t| params.irb_status.as_deref().is_none_or(|s| t["irb_status"] == s))
        .cloned()
        .collect();
    ok(json!(trials))
}

fn trial_index(trials: &[Value], id: i64) -> Result<usize, Response> {
    position(trials, "trial_id", id)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Clinical trial not found or access denied"))
}

async fn get_trial(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_only(&user, TRIALS_VENDOR_ONLY)?;
    let trials = lock(&state.trials);
    let idx = trial_index(&trials, id)?;
    ok(trials[idx].clone())
}

async fn create_trial(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_only(&user, TRIALS_VENDOR_ONLY)?;

    let mut record = state.add_trial(&text(&body, "trial_name")?, &text(&body, "product_name")?);
    record["trial_description"] = body["trial_description"].clone();
    record["created_by_user_id"] = json!(user.user_id);
    let mut trials = lock(&state.trials);
    let idx = trial_index(&trials, record["trial_id"].as_i64().unwrap_or(0))?;
    trials[idx] = record.clone();
    created(record)
}

async fn update_irb_status(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_only(&user, TRIALS_VENDOR_ONLY)?;

    let new_status = text(&body, "new_status")?;
    if !IRB_STATUSES.contains(&new_status.as_str()) {
        return Err(detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Status must be one of: {}", IRB_STATUSES.join(", ")),
        ));
    }

    let now = StubState::now();
    let old_status = {
        let mut trials = lock(&state.trials);
        let idx = trial_index(&trials, id)?;
        let old = trials[idx]["irb_status"].clone();
        trials[idx]["irb_status"] = json!(new_status);
        trials[idx]["updated_at"] = json!(now);
        match new_status.as_str() {
            "submitted" => trials[idx]["irb_submission_date"] = json!(now),
            "approved" => trials[idx]["irb_approval_date"] = json!(now),
            _ => {}
        }
        old
    };

    lock(&state.irb_history).push(json!({
        "history_id": state.next_id(),
        "trial_id": id,
        "old_status": old_status,
        "new_status": new_status,
        "changed_by_user_id": user.user_id,
        "comments": body["comments"],
        "changed_at": now,
        "changed_by_username": user.username,
    }));

    ok(json!({
        "success": true,
        "message": "IRB status updated successfully",
        "trial_id": id,
        "old_status": old_status,
        "new_status": new_status,
    }))
}

async fn irb_history(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_only(&user, TRIALS_VENDOR_ONLY)?;
    trial_index(&lock(&state.trials), id)?;

    let history: Vec<Value> = lock(&state.irb_history)
        .iter()
        .rev()
        .filter(|h| h["trial_id"].as_i64() == Some(id))
        .cloned()
        .collect();
    ok(json!({
        "success": true,
        "trial_id": id,
        "history_count": history.len(),
        "history": history,
    }))
}

async fn trial_documents(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_only(&user, "Only vendors can access documents")?;
    trial_index(&lock(&state.trials), id)?;

    let documents: Vec<Value> = lock(&state.documents)
        .iter()
        .rev()
        .filter(|d| d["trial_id"].as_i64() == Some(id))
        .cloned()
        .collect();
    ok(json!(documents))
}

async fn add_payment(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_only(&user, TRIALS_VENDOR_ONLY)?;
    trial_index(&lock(&state.trials), id)?;

    let now = StubState::now();
    let record = json!({
        "payment_id": state.next_id(),
        "trial_id": id,
        "installment_number": body["installment_number"],
        "amount": body["amount"],
        "payment_status": "pending",
        "due_date": body["due_date"],
        "paid_date": null,
        "payment_method": body["payment_method"],
        "transaction_id": null,
        "notes": body["notes"],
        "created_at": now,
        "updated_at": now,
    });
    lock(&state.payments).push(record.clone());
    created(record)
}

async fn list_payments(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<i64>) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_only(&user, TRIALS_VENDOR_ONLY)?;
    trial_index(&lock(&state.trials), id)?;

    let payments: Vec<Value> = lock(&state.payments)
        .iter()
        .filter(|p| p["trial_id"].as_i64() == Some(id))
        .cloned()
        .collect();
    ok(json!(payments))
}

async fn dashboard(State(state): State<Shared>, headers: HeaderMap) -> Reply {
    let user = authenticate(&state, &headers)?;
    vendor_only(&user, TRIALS_VENDOR_ONLY)?;

    let trials = lock(&state.trials);
    let count = |pred: &dyn Fn(&Value) -> bool| trials.iter().filter(|t| pred(t)).count();
    ok(json!({
        "total_trials": trials.len(),
        "active_trials": count(&|t: &Value| t["trial_status"] == "active"),
        "completed_trials": count(&|t: &Value| t["trial_status"] == "completed"),
        "pending_irb": count(&|t: &Value| matches!(t["irb_status"].as_str(), Some("submitted" | "under_review" | "resubmitted"))),
        "approved_irb": count(&|t: &Value| t["irb_status"] == "approved"),
        "vendor": VENDOR_NAME,
    }))
}
