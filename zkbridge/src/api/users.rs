//! User management endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use zkbridge_types::UserRecord;

use super::{lenient_number, lenient_text, ApiError, ApiResponse, AppState};

/// Body of `POST /api/users/enroll`
#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    #[serde(default, deserialize_with = "lenient_number")]
    pub uid: Option<u16>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub userid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub role: Option<u8>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub cardno: Option<u32>,
}

impl EnrollRequest {
    fn into_user(self) -> Result<UserRecord, ApiError> {
        let non_empty = |v: Option<String>| v.filter(|v| !v.trim().is_empty());
        let (Some(uid), Some(user_id), Some(name)) = (self.uid, non_empty(self.userid), non_empty(self.name))
        else {
            return Err(ApiError::bad_request("uid, userid, and name are required"));
        };

        let mut user = UserRecord::new(uid, user_id, name)
            .with_role(self.role.unwrap_or(0))
            .with_card_number(self.cardno.unwrap_or(0));
        if let Some(password) = non_empty(self.password) {
            user = user.with_password(password);
        }

        user.validate().map_err(|e| ApiError::bad_request(e.to_string()))?;
        Ok(user)
    }
}

fn parse_uid(raw: &str) -> Result<u16, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid uid '{raw}': expected 0-65535")))
}

pub async fn enroll(
    State(state): State<AppState>,
    payload: Result<Json<EnrollRequest>, JsonRejection>,
) -> Result<ApiResponse<UserRecord>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let user = request.into_user()?;

    state.session.enroll_user(&user).await.map_err(|e| state.error(e))?;

    Ok(ApiResponse::ok(user).with_message("User enrolled successfully"))
}

pub async fn list(State(state): State<AppState>) -> Result<ApiResponse<Vec<UserRecord>>, ApiError> {
    let users = state.session.list_users().await.map_err(|e| state.error(e))?;
    let count = users.len();
    Ok(ApiResponse::ok(users).with_count(count))
}

pub async fn get(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<ApiResponse<UserRecord>, ApiError> {
    let uid = parse_uid(&uid)?;

    let user = state
        .session
        .get_user(uid)
        .await
        .map_err(|e| state.error(e))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(ApiResponse::ok(user))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let uid = parse_uid(&uid)?;

    state.session.delete_user(uid).await.map_err(|e| state.error(e))?;
    Ok(ApiResponse::message("User deleted successfully"))
}

/// Erases every user on the device
pub async fn clear_all(State(state): State<AppState>) -> Result<ApiResponse<()>, ApiError> {
    state.session.clear_all_users().await.map_err(|e| state.error(e))?;
    Ok(ApiResponse::message("All users cleared successfully"))
}
