//! Device lifecycle endpoints

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use serde::Deserialize;
use zkbridge_types::DeviceInfo;

use super::{lenient_number, ApiError, ApiResponse, AppState};
use crate::session::{ConnectOutcome, SessionStatus, Transition};

/// Optional overrides of the configured device address
#[derive(Debug, Default, Deserialize)]
pub struct ConnectRequest {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub port: Option<u16>,
    /// Milliseconds
    #[serde(default, deserialize_with = "lenient_number")]
    pub timeout: Option<u64>,
}

impl ConnectRequest {
    /// An empty body means "use the defaults"
    fn parse(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))
    }
}

pub async fn connect(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<ApiResponse<DeviceInfo>, ApiError> {
    let request = ConnectRequest::parse(&body)?;

    let outcome = state
        .session
        .connect(request.ip, request.port, request.timeout.map(Duration::from_millis))
        .await
        .map_err(|e| state.error(e))?;

    Ok(match outcome {
        ConnectOutcome::Connected(info) => ApiResponse::ok(info).with_message("Connected successfully"),
        ConnectOutcome::AlreadyConnected => ApiResponse {
            success: true,
            message: Some("Already connected".to_string()),
            data: state.session.status().device_info,
            count: None,
        },
    })
}

pub async fn disconnect(State(state): State<AppState>) -> Result<ApiResponse<()>, ApiError> {
    let transition = state.session.disconnect().await.map_err(|e| state.error(e))?;

    Ok(ApiResponse::message(match transition {
        Transition::Applied => "Disconnected successfully",
        Transition::AlreadyInState => "Already disconnected",
    }))
}

pub async fn status(State(state): State<AppState>) -> ApiResponse<SessionStatus> {
    ApiResponse::ok(state.session.status())
}

pub async fn info(State(state): State<AppState>) -> Result<ApiResponse<DeviceInfo>, ApiError> {
    let info = state.session.get_device_info().await.map_err(|e| state.error(e))?;
    Ok(ApiResponse::ok(info))
}

pub async fn reboot(State(state): State<AppState>) -> Result<ApiResponse<()>, ApiError> {
    state.session.reboot().await.map_err(|e| state.error(e))?;
    Ok(ApiResponse::message("Device is rebooting"))
}
