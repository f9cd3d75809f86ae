//! # babytrack — request/response DTOs and form validation
//!
//! Every body the client sends or receives that is not a domain model lives
//! here. Forms are checked with `validator` before anything goes on the wire.
//!
//! Conventions:
//! - `*Form`     → user input, validated synchronously, often sent as-is
//! - `*Request`  → serialized to the API
//! - `*Response` → deserialized from the API
//! - All wire JSON is camelCase

use std::borrow::Cow;
use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::baby::Gender;
use crate::models::record::{RecordType, SubType};
use crate::models::user::never_expires;

// ============================================================================
// Common
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// `GET /users/exists?username={username}`
#[derive(Debug, Clone, Deserialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

/// `GET /csrf-token`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub token: String,
    #[serde(default)]
    pub header_name: Option<String>,
    #[serde(default)]
    pub parameter_name: Option<String>,
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, Serialize, Validate)]
pub struct LoginForm {
    #[validate(length(min = 1, max = 50, message = "Username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// `POST /auth/public/signin`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub jwt_token: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, alias = "is2faRequired")]
    pub two_factor_required: bool,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct SignupForm {
    #[validate(length(min = 3, max = 20, message = "Username must be 3-20 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 6, max = 120, message = "Password must be 6-120 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct TwoFactorCodeForm {
    #[validate(custom = "validate_otp_code")]
    pub code: String,
}

/// `POST /auth/public/verify-2fa-login`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTwoFactorLoginRequest {
    pub code: String,
    pub jwt_token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub jwt_token: String,
}

/// `GET /auth/user/2fa-status`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorStatusResponse {
    pub is2fa_enabled: bool,
}

fn validate_otp_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 6 && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(error_with_message("otp_code", "Code must be 6 digits"))
    }
}

// ============================================================================
// Babies
// ============================================================================

#[derive(Debug, Clone, Validate)]
pub struct NewBabyForm {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,

    pub gender: Gender,

    #[validate(custom = "validate_not_future_date")]
    pub date_of_birth: NaiveDate,

    #[validate(range(min = 0.1, max = 50.0, message = "Weight must be 0.1-50 kg"))]
    pub weight: Option<f64>,

    #[validate(range(min = 1.0, max = 150.0, message = "Height must be 1-150 cm"))]
    pub height: Option<f64>,

    #[validate(range(min = 1.0, max = 80.0, message = "Head circumference must be 1-80 cm"))]
    pub head_circumference: Option<f64>,
}

#[derive(Debug, Clone, Validate)]
pub struct BabyUpdateForm {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,

    pub gender: Gender,

    #[validate(custom = "validate_not_future_date")]
    pub date_of_birth: NaiveDate,

    #[validate(range(min = 0.1, max = 50.0, message = "Weight must be 0.1-50 kg"))]
    pub weight: Option<f64>,

    #[validate(range(min = 1.0, max = 150.0, message = "Height must be 1-150 cm"))]
    pub height: Option<f64>,

    #[validate(range(min = 1.0, max = 80.0, message = "Head circumference must be 1-80 cm"))]
    pub head_circumference: Option<f64>,

    #[validate(custom = "validate_caregivers")]
    pub caregivers: Vec<String>,
}

/// Body of `POST /babies` and `PUT /babies/{id}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BabyRequest {
    pub name: String,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub head_circumference: Option<f64>,
    pub caregivers: Vec<String>,
    pub owner: String,
}

fn validate_not_future_date(date: &NaiveDate) -> Result<(), ValidationError> {
    if *date > Utc::now().date_naive() {
        return Err(error_with_message("future_date", "Date cannot be in the future"));
    }
    Ok(())
}

fn validate_caregivers(caregivers: &Vec<String>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for name in caregivers {
        let name = name.trim();
        if name.is_empty() {
            return Err(error_with_message("empty_caregiver", "Caregiver username cannot be empty"));
        }
        if !seen.insert(name) {
            return Err(error_with_message(
                "duplicate_caregiver",
                "Caregiver usernames must be unique",
            ));
        }
    }
    Ok(())
}

// ============================================================================
// Records
// ============================================================================

/// Body of `POST /babies/{id}/records` and `PUT /babies/{id}/records/{recordId}`.
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_record_form"))]
pub struct RecordForm {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub sub_type: Option<SubType>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,

    #[validate(length(max = 500, message = "Note must be under 500 characters"))]
    pub note: Option<String>,
}

fn validate_record_form(form: &RecordForm) -> Result<(), ValidationError> {
    if !form.record_type.accepts(form.sub_type) {
        return Err(error_with_message(
            "sub_type_mismatch",
            "Sub-type does not match the record type",
        ));
    }
    if let Some(end) = form.end_time {
        if end <= form.start_time {
            return Err(error_with_message(
                "end_before_start",
                "End time must be after start time",
            ));
        }
    }
    Ok(())
}

// ============================================================================
// Measurements
// ============================================================================

/// Body of `POST /babies/{id}/measurements` and its `PUT`.
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementForm {
    #[validate(range(min = 0.1, max = 50.0, message = "Weight must be 0.1-50 kg"))]
    pub weight: f64,

    #[validate(range(min = 1.0, max = 150.0, message = "Height must be 1-150 cm"))]
    pub height: f64,

    #[validate(range(min = 1.0, max = 80.0, message = "Head circumference must be 1-80 cm"))]
    pub head_circumference: f64,

    #[validate(custom = "validate_not_future_time")]
    pub time: DateTime<Utc>,
}

fn validate_not_future_time(time: &DateTime<Utc>) -> Result<(), ValidationError> {
    if *time > Utc::now() {
        return Err(error_with_message("future_time", "Time cannot be in the future"));
    }
    Ok(())
}

// ============================================================================
// Admin
// ============================================================================

/// `PUT /admin/users/{id}/role`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub role_name: String,
}

/// `PUT /admin/users/{id}/status`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusRequest {
    pub account_non_locked: bool,
    pub account_non_expired: bool,
    pub credentials_non_expired: bool,
    pub enabled: bool,
}

/// `PUT /admin/users/{id}/expiry`. `None` is sent as the "never expires" date.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserExpiryRequest {
    #[serde(with = "never_expires")]
    pub account_expiry_date: Option<NaiveDate>,
    #[serde(with = "never_expires")]
    pub credentials_expiry_date: Option<NaiveDate>,
}

// ============================================================================
// Validation helpers
// ============================================================================

fn error_with_message(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}
