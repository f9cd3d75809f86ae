//! In-process mock of the REST backend.
//!
//! Serves the `/api` surface the client talks to, issues HS256 tokens signed
//! with [`SECRET`], and records every request so tests can assert what went
//! over the wire (and what did not).

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Notify;

use babytrack::models::user::{ROLE_ADMIN, ROLE_USER};
use babytrack::models::{
    AdminUser, AuditLog, Baby, Gender, Measurement, Record, RecordType, Role, SubType, User,
};
use babytrack::navigation::RouteHistory;
use babytrack::{BabyTracker, Config, MemoryStorage, SessionStorage};

pub const SECRET: &[u8] = b"mock-backend-secret";
pub const PASSWORD: &str = "password1";
pub const OTP_CODE: &str = "123456";
pub const CSRF_TOKEN: &str = "csrf-token-1";

type ApiErr = (StatusCode, Json<Value>);
type Reply<T> = Result<Json<T>, ApiErr>;

fn api_err(status: StatusCode, message: &str) -> ApiErr {
    (status, Json(json!({ "message": message })))
}

#[derive(Debug, Clone)]
pub struct RequestLog {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub csrf: Option<String>,
    pub bearer: bool,
}

#[derive(Debug, Clone)]
pub struct MockUser {
    pub id: i64,
    pub password: String,
    pub email: String,
    pub admin: bool,
    pub two_factor: bool,
    pub disabled: bool,
}

#[derive(Default)]
pub struct MockData {
    pub users: BTreeMap<String, MockUser>,
    pub admin_users: BTreeMap<i64, AdminUser>,
    pub babies: BTreeMap<i64, Baby>,
    pub records: BTreeMap<i64, Vec<Record>>,
    pub measurements: BTreeMap<i64, Vec<Measurement>>,
    pub logs: BTreeMap<i64, AuditLog>,
    pub requests: Vec<RequestLog>,
    /// Returned by the next password sign-in instead of a fresh token.
    pub signin_token_override: Option<String>,
    /// Raw body of the last `PUT /admin/users/{id}/expiry`.
    pub last_expiry_body: Option<Value>,
    /// `GET /csrf-token` answers 500 while set.
    pub csrf_unavailable: bool,
    /// Holds password sign-ins until released.
    pub signin_gate: Option<Arc<Gate>>,
    next_id: i64,
}

impl MockData {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_user(&mut self, username: &str, admin: bool, two_factor: bool) {
        let id = self.next_id();
        let role = Role {
            role_id: Some(if admin { 2 } else { 1 }),
            role_name: role_name(admin),
        };
        self.admin_users.insert(
            id,
            AdminUser {
                user_id: id,
                user_name: username.to_string(),
                email: Some(format!("{}@example.com", username)),
                account_non_locked: true,
                account_non_expired: true,
                credentials_non_expired: true,
                enabled: true,
                account_expiry_date: None,
                credentials_expiry_date: None,
                two_factor_enabled: two_factor,
                sign_up_method: Some("email".into()),
                role,
                created_date: Some(Utc::now()),
                updated_date: None,
            },
        );
        self.users.insert(
            username.to_string(),
            MockUser {
                id,
                password: PASSWORD.to_string(),
                email: format!("{}@example.com", username),
                admin,
                two_factor,
                disabled: false,
            },
        );
    }

    fn user_view(&self, username: &str) -> Option<User> {
        let user = self.users.get(username)?;
        Some(User {
            username: username.to_string(),
            email: Some(user.email.clone()),
            role: Role {
                role_id: Some(if user.admin { 2 } else { 1 }),
                role_name: role_name(user.admin),
            },
        })
    }

    fn baby_view(&self, id: i64) -> Option<Baby> {
        let mut baby = self.babies.get(&id)?.clone();
        baby.records = self.records.get(&id).cloned().unwrap_or_default();
        baby.measurements = self.measurements.get(&id).cloned().unwrap_or_default();
        Some(baby)
    }

    pub fn requests_to(&self, method: Method, path: &str) -> usize {
        self.requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// Requests other than the CSRF bootstrap.
    pub fn api_requests(&self) -> Vec<RequestLog> {
        self.requests
            .iter()
            .filter(|r| r.path != "/api/csrf-token")
            .cloned()
            .collect()
    }
}

/// Pauses a handler: `arrived` fires when the request is in, `release` lets it answer.
#[derive(Default)]
pub struct Gate {
    pub arrived: Notify,
    pub release: Notify,
}

#[derive(Clone, Default)]
pub struct Mock(Arc<Mutex<MockData>>);

impl Mock {
    pub fn data(&self) -> MutexGuard<'_, MockData> {
        self.0.lock().unwrap()
    }
}

// ── Tokens ──────────────────────────────────────────────────────────────────

fn role_name(admin: bool) -> String {
    let name = if admin { ROLE_ADMIN } else { ROLE_USER };
    name.to_string()
}

fn roles(admin: bool) -> Vec<&'static str> {
    if admin {
        vec![ROLE_USER, ROLE_ADMIN]
    } else {
        vec![ROLE_USER]
    }
}

pub fn sign_token(username: &str, admin: bool, ttl: Duration) -> String {
    let now = Utc::now();
    encode(
        &Header::default(),
        &json!({
            "sub": username,
            "iat": now.timestamp(),
            "exp": (now + ttl).timestamp(),
            "roles": roles(admin),
        }),
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

fn pending_token(username: &str) -> String {
    encode(
        &Header::default(),
        &json!({
            "sub": username,
            "exp": (Utc::now() + Duration::minutes(5)).timestamp(),
            "pending2fa": true,
        }),
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

fn verify_token(token: &str) -> Option<Value> {
    decode::<Value>(token, &DecodingKey::from_secret(SECRET), &Validation::default())
        .ok()
        .map(|data| data.claims)
}

fn authorize(data: &MockData, headers: &HeaderMap) -> Result<String, ApiErr> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| api_err(StatusCode::UNAUTHORIZED, "Full authentication is required"))?;

    let claims = verify_token(token)
        .filter(|c| c.get("pending2fa").is_none())
        .ok_or_else(|| api_err(StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;
    let username = claims["sub"].as_str().unwrap_or_default().to_string();

    match data.users.get(&username) {
        Some(user) if user.disabled => Err(api_err(StatusCode::FORBIDDEN, "User account is disabled")),
        Some(_) => Ok(username),
        None => Err(api_err(StatusCode::UNAUTHORIZED, "Unknown user")),
    }
}

fn authorize_admin(data: &MockData, headers: &HeaderMap) -> Result<String, ApiErr> {
    let username = authorize(data, headers)?;
    if data.users.get(&username).map(|u| u.admin).unwrap_or(false) {
        Ok(username)
    } else {
        Err(api_err(StatusCode::FORBIDDEN, "Access denied"))
    }
}

// ── Request bodies ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SignInBody {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct SignupBody {
    username: String,
    email: String,
    #[allow(dead_code)]
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyBody {
    code: String,
    jwt_token: String,
}

#[derive(Deserialize)]
struct CodeBody {
    code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BabyBody {
    name: String,
    gender: Gender,
    date_of_birth: NaiveDate,
    weight: Option<f64>,
    height: Option<f64>,
    head_circumference: Option<f64>,
    caregivers: Vec<String>,
    owner: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordBody {
    #[serde(rename = "type")]
    record_type: RecordType,
    sub_type: Option<SubType>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    note: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeasurementBody {
    weight: f64,
    height: f64,
    head_circumference: f64,
    time: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleBody {
    role_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    account_non_locked: bool,
    account_non_expired: bool,
    credentials_non_expired: bool,
    enabled: bool,
}

// ── Auth handlers ───────────────────────────────────────────────────────────

async fn csrf_token(State(mock): State<Mock>) -> Reply<Value> {
    if mock.data().csrf_unavailable {
        return Err(api_err(StatusCode::INTERNAL_SERVER_ERROR, "CSRF repository unavailable"));
    }
    Ok(Json(json!({ "token": CSRF_TOKEN, "headerName": "X-XSRF-TOKEN", "parameterName": "_csrf" })))
}

async fn signin(State(mock): State<Mock>, Json(body): Json<SignInBody>) -> Reply<Value> {
    let gate = mock.data().signin_gate.clone();
    if let Some(gate) = gate {
        gate.arrived.notify_one();
        gate.release.notified().await;
    }

    let mut data = mock.data();
    let Some(user) = data.users.get(&body.username).cloned() else {
        return Err(api_err(StatusCode::UNAUTHORIZED, "Bad credentials"));
    };
    if user.password != body.password {
        return Err(api_err(StatusCode::UNAUTHORIZED, "Bad credentials"));
    }
    if user.disabled {
        return Err(api_err(StatusCode::FORBIDDEN, "User account is disabled"));
    }
    if user.two_factor {
        return Ok(Json(json!({
            "jwtToken": pending_token(&body.username),
            "username": body.username,
            "is2faRequired": true,
        })));
    }

    let token = data
        .signin_token_override
        .take()
        .unwrap_or_else(|| sign_token(&body.username, user.admin, Duration::hours(1)));
    Ok(Json(json!({
        "jwtToken": token,
        "username": body.username,
        "roles": roles(user.admin),
    })))
}

async fn verify_2fa_login(State(mock): State<Mock>, Json(body): Json<VerifyBody>) -> Reply<Value> {
    let data = mock.data();
    let claims = verify_token(&body.jwt_token)
        .ok_or_else(|| api_err(StatusCode::UNAUTHORIZED, "Invalid or expired token"))?;
    if body.code != OTP_CODE {
        return Err(api_err(StatusCode::UNAUTHORIZED, "Invalid 2FA code"));
    }
    let username = claims["sub"].as_str().unwrap_or_default();
    let admin = data.users.get(username).map(|u| u.admin).unwrap_or(false);
    Ok(Json(json!({ "jwtToken": sign_token(username, admin, Duration::hours(1)) })))
}

async fn signup(State(mock): State<Mock>, Json(body): Json<SignupBody>) -> Reply<Value> {
    let mut data = mock.data();
    if data.users.contains_key(&body.username) {
        return Err(api_err(StatusCode::CONFLICT, "Username is already taken"));
    }
    data.add_user(&body.username, false, false);
    if let Some(user) = data.users.get_mut(&body.username) {
        user.email = body.email;
    }
    Ok(Json(json!({ "message": "User registered successfully!" })))
}

async fn current_user(State(mock): State<Mock>, headers: HeaderMap) -> Reply<User> {
    let data = mock.data();
    let username = authorize(&data, &headers)?;
    data.user_view(&username)
        .map(Json)
        .ok_or_else(|| api_err(StatusCode::NOT_FOUND, "User not found"))
}

async fn two_factor_status(State(mock): State<Mock>, headers: HeaderMap) -> Reply<Value> {
    let data = mock.data();
    let username = authorize(&data, &headers)?;
    let enabled = data.users.get(&username).map(|u| u.two_factor).unwrap_or(false);
    Ok(Json(json!({ "is2faEnabled": enabled })))
}

async fn enable_2fa(State(mock): State<Mock>, headers: HeaderMap) -> Result<String, ApiErr> {
    let data = mock.data();
    let username = authorize(&data, &headers)?;
    Ok(format!(
        "otpauth://totp/BabyTracker:{}?secret=JBSWY3DPEHPK3PXP&issuer=BabyTracker",
        username
    ))
}

async fn verify_2fa(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Json(body): Json<CodeBody>,
) -> Result<String, ApiErr> {
    let mut data = mock.data();
    let username = authorize(&data, &headers)?;
    if body.code != OTP_CODE {
        return Err(api_err(StatusCode::BAD_REQUEST, "Invalid 2FA code"));
    }
    if let Some(user) = data.users.get_mut(&username) {
        user.two_factor = true;
    }
    Ok("2FA verified".to_string())
}

async fn disable_2fa(State(mock): State<Mock>, headers: HeaderMap) -> Result<String, ApiErr> {
    let mut data = mock.data();
    let username = authorize(&data, &headers)?;
    if let Some(user) = data.users.get_mut(&username) {
        user.two_factor = false;
    }
    Ok("2FA disabled".to_string())
}

async fn user_exists(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Reply<Value> {
    let data = mock.data();
    authorize(&data, &headers)?;
    let exists = params
        .get("username")
        .map(|u| data.users.contains_key(u))
        .unwrap_or(false);
    Ok(Json(json!({ "exists": exists })))
}

// ── Baby handlers ───────────────────────────────────────────────────────────

async fn list_babies(State(mock): State<Mock>, headers: HeaderMap) -> Reply<Vec<Baby>> {
    let data = mock.data();
    let username = authorize(&data, &headers)?;
    let babies = data
        .babies
        .values()
        .filter(|b| b.is_caregiver(&username))
        .filter_map(|b| data.baby_view(b.id))
        .collect();
    Ok(Json(babies))
}

fn visible_baby(data: &MockData, username: &str, id: i64) -> Result<Baby, ApiErr> {
    match data.baby_view(id) {
        Some(baby) if baby.is_caregiver(username) => Ok(baby),
        Some(_) => Err(api_err(StatusCode::FORBIDDEN, "Not a caregiver of this baby")),
        None => Err(api_err(StatusCode::NOT_FOUND, "Baby not found")),
    }
}

async fn get_baby(State(mock): State<Mock>, headers: HeaderMap, Path(id): Path<i64>) -> Reply<Baby> {
    let data = mock.data();
    let username = authorize(&data, &headers)?;
    visible_baby(&data, &username, id).map(Json)
}

async fn create_baby(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Json(body): Json<BabyBody>,
) -> Reply<Baby> {
    let mut data = mock.data();
    authorize(&data, &headers)?;
    let id = data.next_id();
    let baby = Baby {
        id,
        name: body.name,
        gender: body.gender,
        date_of_birth: body.date_of_birth,
        weight: body.weight,
        height: body.height,
        head_circumference: body.head_circumference,
        caregivers: body.caregivers,
        owner: body.owner,
        records: Vec::new(),
        measurements: Vec::new(),
    };
    data.babies.insert(id, baby.clone());
    Ok(Json(baby))
}

async fn update_baby(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<BabyBody>,
) -> Reply<Baby> {
    let mut data = mock.data();
    let username = authorize(&data, &headers)?;
    let existing = visible_baby(&data, &username, id)?;
    if existing.owner != username {
        return Err(api_err(StatusCode::FORBIDDEN, "Only the owner can update this baby"));
    }
    let updated = Baby {
        name: body.name,
        gender: body.gender,
        date_of_birth: body.date_of_birth,
        weight: body.weight,
        height: body.height,
        head_circumference: body.head_circumference,
        caregivers: body.caregivers,
        owner: body.owner,
        records: Vec::new(),
        measurements: Vec::new(),
        ..existing
    };
    data.babies.insert(id, updated.clone());
    Ok(Json(updated))
}

async fn delete_baby(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<String, ApiErr> {
    let mut data = mock.data();
    let username = authorize(&data, &headers)?;
    let existing = visible_baby(&data, &username, id)?;
    if existing.owner != username {
        return Err(api_err(StatusCode::FORBIDDEN, "Only the owner can delete this baby"));
    }
    data.babies.remove(&id);
    data.records.remove(&id);
    data.measurements.remove(&id);
    Ok("Baby deleted successfully".to_string())
}

// ── Record handlers ─────────────────────────────────────────────────────────

async fn list_records(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(baby_id): Path<i64>,
) -> Reply<Vec<Record>> {
    let data = mock.data();
    let username = authorize(&data, &headers)?;
    visible_baby(&data, &username, baby_id)?;
    Ok(Json(data.records.get(&baby_id).cloned().unwrap_or_default()))
}

async fn create_record(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(baby_id): Path<i64>,
    Json(body): Json<RecordBody>,
) -> Reply<Record> {
    let mut data = mock.data();
    let username = authorize(&data, &headers)?;
    visible_baby(&data, &username, baby_id)?;
    let now = Utc::now();
    let record = Record {
        id: data.next_id(),
        record_type: body.record_type,
        sub_type: body.sub_type,
        start_time: body.start_time,
        end_time: body.end_time,
        note: body.note,
        author: username,
        created_at: now,
        updated_at: now,
    };
    data.records.entry(baby_id).or_default().push(record.clone());
    Ok(Json(record))
}

async fn update_record(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path((baby_id, record_id)): Path<(i64, i64)>,
    Json(body): Json<RecordBody>,
) -> Reply<Record> {
    let mut data = mock.data();
    let username = authorize(&data, &headers)?;
    visible_baby(&data, &username, baby_id)?;
    let record = data
        .records
        .get_mut(&baby_id)
        .and_then(|records| records.iter_mut().find(|r| r.id == record_id))
        .ok_or_else(|| api_err(StatusCode::NOT_FOUND, "Record not found"))?;
    record.record_type = body.record_type;
    record.sub_type = body.sub_type;
    record.start_time = body.start_time;
    record.end_time = body.end_time;
    record.note = body.note;
    record.updated_at = Utc::now();
    Ok(Json(record.clone()))
}

async fn delete_record(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path((baby_id, record_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiErr> {
    let mut data = mock.data();
    let username = authorize(&data, &headers)?;
    visible_baby(&data, &username, baby_id)?;
    if let Some(records) = data.records.get_mut(&baby_id) {
        records.retain(|r| r.id != record_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── Measurement handlers ────────────────────────────────────────────────────

async fn list_measurements(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(baby_id): Path<i64>,
) -> Reply<Vec<Measurement>> {
    let data = mock.data();
    let username = authorize(&data, &headers)?;
    visible_baby(&data, &username, baby_id)?;
    Ok(Json(data.measurements.get(&baby_id).cloned().unwrap_or_default()))
}

async fn create_measurement(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(baby_id): Path<i64>,
    Json(body): Json<MeasurementBody>,
) -> Reply<Measurement> {
    let mut data = mock.data();
    let username = authorize(&data, &headers)?;
    visible_baby(&data, &username, baby_id)?;
    let measurement = Measurement {
        id: data.next_id(),
        weight: body.weight,
        height: body.height,
        head_circumference: body.head_circumference,
        time: body.time,
        author: username,
    };

    let history = data.measurements.entry(baby_id).or_default();
    let latest = history.iter().all(|m| measurement.time > m.time);
    history.push(measurement.clone());
    if latest {
        if let Some(baby) = data.babies.get_mut(&baby_id) {
            baby.apply_headline(&measurement);
        }
    }
    Ok(Json(measurement))
}

async fn update_measurement(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path((baby_id, measurement_id)): Path<(i64, i64)>,
    Json(body): Json<MeasurementBody>,
) -> Reply<Measurement> {
    let mut data = mock.data();
    let username = authorize(&data, &headers)?;
    visible_baby(&data, &username, baby_id)?;
    let measurement = data
        .measurements
        .get_mut(&baby_id)
        .and_then(|list| list.iter_mut().find(|m| m.id == measurement_id))
        .ok_or_else(|| api_err(StatusCode::NOT_FOUND, "Measurement not found"))?;
    measurement.weight = body.weight;
    measurement.height = body.height;
    measurement.head_circumference = body.head_circumference;
    measurement.time = body.time;
    Ok(Json(measurement.clone()))
}

async fn delete_measurement(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path((baby_id, measurement_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiErr> {
    let mut data = mock.data();
    let username = authorize(&data, &headers)?;
    visible_baby(&data, &username, baby_id)?;
    if let Some(list) = data.measurements.get_mut(&baby_id) {
        list.retain(|m| m.id != measurement_id);
    }
    Ok(StatusCode::NO_CONTENT)
}

// ── Admin handlers ──────────────────────────────────────────────────────────

async fn admin_list_users(State(mock): State<Mock>, headers: HeaderMap) -> Reply<Vec<AdminUser>> {
    let data = mock.data();
    authorize_admin(&data, &headers)?;
    // Reverse order so the client's sort is observable.
    Ok(Json(data.admin_users.values().rev().cloned().collect()))
}

async fn admin_get_user(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Reply<AdminUser> {
    let data = mock.data();
    authorize_admin(&data, &headers)?;
    data.admin_users
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| api_err(StatusCode::NOT_FOUND, "User not found"))
}

async fn admin_update_role(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<RoleBody>,
) -> Reply<AdminUser> {
    let mut data = mock.data();
    authorize_admin(&data, &headers)?;
    let admin = body.role_name == ROLE_ADMIN;
    let user = data
        .admin_users
        .get_mut(&id)
        .ok_or_else(|| api_err(StatusCode::NOT_FOUND, "User not found"))?;
    user.role = Role {
        role_id: Some(if admin { 2 } else { 1 }),
        role_name: body.role_name,
    };
    let user = user.clone();
    if let Some(account) = data.users.get_mut(&user.user_name) {
        account.admin = admin;
    }
    Ok(Json(user))
}

async fn admin_update_status(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> Reply<AdminUser> {
    let mut data = mock.data();
    authorize_admin(&data, &headers)?;
    let user = data
        .admin_users
        .get_mut(&id)
        .ok_or_else(|| api_err(StatusCode::NOT_FOUND, "User not found"))?;
    user.account_non_locked = body.account_non_locked;
    user.account_non_expired = body.account_non_expired;
    user.credentials_non_expired = body.credentials_non_expired;
    user.enabled = body.enabled;
    let user = user.clone();
    if let Some(account) = data.users.get_mut(&user.user_name) {
        account.disabled = !body.enabled;
    }
    Ok(Json(user))
}

async fn admin_update_expiry(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Reply<AdminUser> {
    let mut data = mock.data();
    authorize_admin(&data, &headers)?;
    let user = data
        .admin_users
        .get(&id)
        .cloned()
        .ok_or_else(|| api_err(StatusCode::NOT_FOUND, "User not found"))?;

    let mut raw = serde_json::to_value(&user).unwrap();
    raw["accountExpiryDate"] = body["accountExpiryDate"].clone();
    raw["credentialsExpiryDate"] = body["credentialsExpiryDate"].clone();
    let updated: AdminUser = serde_json::from_value(raw)
        .map_err(|e| api_err(StatusCode::BAD_REQUEST, &e.to_string()))?;

    data.admin_users.insert(id, updated.clone());
    data.last_expiry_body = Some(body);
    Ok(Json(updated))
}

async fn admin_delete_user(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<String, ApiErr> {
    let mut data = mock.data();
    authorize_admin(&data, &headers)?;
    let user = data
        .admin_users
        .remove(&id)
        .ok_or_else(|| api_err(StatusCode::NOT_FOUND, "User not found"))?;
    data.users.remove(&user.user_name);
    Ok("User deleted".to_string())
}

async fn admin_list_babies(State(mock): State<Mock>, headers: HeaderMap) -> Reply<Vec<Baby>> {
    let data = mock.data();
    authorize_admin(&data, &headers)?;
    Ok(Json(data.babies.values().rev().cloned().collect()))
}

async fn admin_update_baby(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<BabyBody>,
) -> Reply<Baby> {
    let mut data = mock.data();
    authorize_admin(&data, &headers)?;
    let baby = data
        .babies
        .get_mut(&id)
        .ok_or_else(|| api_err(StatusCode::NOT_FOUND, "Baby not found"))?;
    baby.name = body.name;
    baby.gender = body.gender;
    baby.date_of_birth = body.date_of_birth;
    baby.weight = body.weight;
    baby.height = body.height;
    baby.head_circumference = body.head_circumference;
    baby.caregivers = body.caregivers;
    baby.owner = body.owner;
    Ok(Json(baby.clone()))
}

async fn admin_delete_baby(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiErr> {
    let mut data = mock.data();
    authorize_admin(&data, &headers)?;
    data.babies.remove(&id);
    data.records.remove(&id);
    data.measurements.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

async fn admin_list_logs(State(mock): State<Mock>, headers: HeaderMap) -> Reply<Vec<AuditLog>> {
    let data = mock.data();
    authorize_admin(&data, &headers)?;
    Ok(Json(data.logs.values().rev().cloned().collect()))
}

async fn admin_delete_log(
    State(mock): State<Mock>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiErr> {
    let mut data = mock.data();
    authorize_admin(&data, &headers)?;
    data.logs.remove(&id);
    Ok(StatusCode::NO_CONTENT)
}

// ── Server ──────────────────────────────────────────────────────────────────

async fn record_request(State(mock): State<Mock>, req: Request, next: Next) -> Response {
    {
        let headers = req.headers();
        let entry = RequestLog {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            query: req.uri().query().map(str::to_string),
            csrf: headers
                .get("X-XSRF-TOKEN")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            bearer: headers.contains_key(header::AUTHORIZATION),
        };
        mock.data().requests.push(entry);
    }
    next.run(req).await
}

fn router(mock: Mock) -> Router {
    Router::new()
        .route("/api/csrf-token", get(csrf_token))
        .route("/api/auth/public/signin", post(signin))
        .route("/api/auth/public/signup", post(signup))
        .route("/api/auth/public/verify-2fa-login", post(verify_2fa_login))
        .route("/api/auth/user", get(current_user))
        .route("/api/auth/user/2fa-status", get(two_factor_status))
        .route("/api/auth/enable-2fa", post(enable_2fa))
        .route("/api/auth/verify-2fa", post(verify_2fa))
        .route("/api/auth/disable-2fa", post(disable_2fa))
        .route("/api/users/exists", get(user_exists))
        .route("/api/babies", get(list_babies).post(create_baby))
        .route(
            "/api/babies/:id",
            get(get_baby).put(update_baby).delete(delete_baby),
        )
        .route(
            "/api/babies/:id/records",
            get(list_records).post(create_record),
        )
        .route(
            "/api/babies/:id/records/:record_id",
            put(update_record).delete(delete_record),
        )
        .route(
            "/api/babies/:id/measurements",
            get(list_measurements).post(create_measurement),
        )
        .route(
            "/api/babies/:id/measurements/:measurement_id",
            put(update_measurement).delete(delete_measurement),
        )
        .route("/api/admin/users", get(admin_list_users))
        .route(
            "/api/admin/users/:id",
            get(admin_get_user).delete(admin_delete_user),
        )
        .route("/api/admin/users/:id/role", put(admin_update_role))
        .route("/api/admin/users/:id/status", put(admin_update_status))
        .route("/api/admin/users/:id/expiry", put(admin_update_expiry))
        .route("/api/admin/babies", get(admin_list_babies))
        .route(
            "/api/admin/babies/:id",
            put(admin_update_baby).delete(admin_delete_baby),
        )
        .route("/api/admin/logs", get(admin_list_logs))
        .route("/api/admin/logs/:id", delete(admin_delete_log))
        .layer(middleware::from_fn_with_state(mock.clone(), record_request))
        .with_state(mock)
}

fn seed(data: &mut MockData) {
    data.add_user("alice", false, false);
    data.add_user("bob", false, false);
    data.add_user("carol", false, true);
    data.add_user("root", true, false);

    let now = Utc::now();
    for (action, details) in [("LOGIN", "alice signed in"), ("DELETE_BABY", "baby 9 removed")] {
        let id = data.next_id();
        data.logs.insert(
            id,
            AuditLog {
                id,
                username: "alice".into(),
                action: action.into(),
                details: Some(details.into()),
                timestamp: now,
            },
        );
    }
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub mock: Mock,
    pub storage: Arc<MemoryStorage>,
    pub routes: Arc<RouteHistory>,
    pub tracker: BabyTracker,
}

impl TestApp {
    pub fn config(&self) -> Config {
        Config::with_api_url(format!("http://{}", self.addr))
    }

    /// A second client over the same persisted session.
    pub fn reopen(&self) -> BabyTracker {
        let storage: Arc<dyn SessionStorage> = self.storage.clone();
        BabyTracker::new(self.config(), storage, self.routes.clone()).unwrap()
    }

    pub async fn login_as(&self, username: &str) -> User {
        let form = babytrack::dto::LoginForm {
            username: username.into(),
            password: PASSWORD.into(),
        };
        match self.tracker.auth.login(form).await.unwrap() {
            babytrack::LoginOutcome::SignedIn(user) => user,
            other => panic!("unexpected login outcome: {:?}", other),
        }
    }
}

pub async fn spawn_app() -> TestApp {
    babytrack::telemetry::init_tracing();

    let mock = Mock::default();
    seed(&mut mock.data());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(mock.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let storage = Arc::new(MemoryStorage::new());
    let routes = Arc::new(RouteHistory::new());
    let tracker = BabyTracker::new(
        Config::with_api_url(format!("http://{}", addr)),
        storage.clone(),
        routes.clone(),
    )
    .unwrap();

    TestApp {
        addr,
        mock,
        storage,
        routes,
        tracker,
    }
}
