//! Request handlers and wire types.
//!
//! Bodies that fail to parse are treated as empty: auth/check then answer
//! `missing_params`, admin calls fail the secret check.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use keyguard_license::{CheckOutcome, KeySummary};
use serde::{Deserialize, Serialize};

/// Body of `/api/auth` and `/api/check`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LicenseRequest {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub hwid: Option<String>,
}

/// Body of `/api/admin/add-key`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddKeyRequest {
    #[serde(default)]
    pub admin_key: Option<String>,
    #[serde(default)]
    pub license_key: Option<String>,
    #[serde(default)]
    pub expires: Option<String>,
}

/// Body of `/api/admin/reset-key` and `/api/admin/delete-key`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRequest {
    #[serde(default)]
    pub admin_key: Option<String>,
    #[serde(default)]
    pub license_key: Option<String>,
}

/// Query of `/api/admin/list-keys`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminQuery {
    #[serde(default)]
    pub admin_key: Option<String>,
}

/// `{success, error?}` body shared by auth and admin endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(code: &str) -> Self {
        Self {
            success: false,
            error: Some(code.to_string()),
        }
    }
}

/// `{valid, reason?}` body of `/api/check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Success body of `/api/admin/add-key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddKeyResponse {
    pub success: bool,
    pub license_key: String,
    pub replaced: bool,
}

/// Success body of `/api/admin/list-keys`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListKeysResponse {
    pub success: bool,
    pub keys: Vec<KeySummary>,
}

fn or_empty<T: Default>(body: Result<Json<T>, JsonRejection>) -> T {
    body.map(|Json(inner)| inner).unwrap_or_default()
}

pub(crate) async fn authorize(
    State(state): State<AppState>,
    body: Result<Json<LicenseRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let req = or_empty(body);
    let outcome = state
        .auth
        .authorize(
            req.key.as_deref().unwrap_or_default(),
            req.hwid.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(Json(match outcome.deny_reason() {
        None => StatusResponse::ok(),
        Some(reason) => StatusResponse::failed(reason.as_str()),
    }))
}

pub(crate) async fn check(
    State(state): State<AppState>,
    body: Result<Json<LicenseRequest>, JsonRejection>,
) -> Json<CheckResponse> {
    let req = or_empty(body);
    let outcome = state
        .check
        .check(
            req.key.as_deref().unwrap_or_default(),
            req.hwid.as_deref().unwrap_or_default(),
        )
        .await;

    Json(match outcome {
        CheckOutcome::Valid => CheckResponse {
            valid: true,
            reason: None,
        },
        CheckOutcome::Invalid(reason) => CheckResponse {
            valid: false,
            reason: Some(reason.as_str().to_string()),
        },
    })
}

pub(crate) async fn add_key(
    State(state): State<AppState>,
    body: Result<Json<AddKeyRequest>, JsonRejection>,
) -> Result<Json<AddKeyResponse>, ApiError> {
    let req = or_empty(body);
    let added = state
        .admin
        .add_key(
            req.admin_key.as_deref().unwrap_or_default(),
            req.license_key.as_deref(),
            req.expires.as_deref(),
        )
        .await?;

    Ok(Json(AddKeyResponse {
        success: true,
        license_key: added.key,
        replaced: added.replaced,
    }))
}

pub(crate) async fn reset_key(
    State(state): State<AppState>,
    body: Result<Json<KeyRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let req = or_empty(body);
    state
        .admin
        .reset_key(
            req.admin_key.as_deref().unwrap_or_default(),
            req.license_key.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(StatusResponse::ok()))
}

pub(crate) async fn delete_key(
    State(state): State<AppState>,
    body: Result<Json<KeyRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let req = or_empty(body);
    state
        .admin
        .delete_key(
            req.admin_key.as_deref().unwrap_or_default(),
            req.license_key.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(StatusResponse::ok()))
}

pub(crate) async fn list_keys(
    State(state): State<AppState>,
    query: Result<Query<AdminQuery>, QueryRejection>,
) -> Result<Json<ListKeysResponse>, ApiError> {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let keys = state
        .admin
        .list_keys(query.admin_key.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(ListKeysResponse {
        success: true,
        keys,
    }))
}
