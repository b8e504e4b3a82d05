//! HTTP API over the device session
//!
//! Every `/api/*` route sits behind the API key gate; `/health` does not.

pub mod attendance;
pub mod auth;
pub mod device;
pub mod health;
pub mod response;
pub mod users;

use std::str::FromStr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Router};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::config::Environment;
use crate::error::{Error, ErrorKind};
use crate::session::DeviceSession;

pub use response::{ApiError, ApiResponse};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<DeviceSession>,
    api_key: Option<Arc<str>>,
    /// Include error chains in failure bodies
    expose_errors: bool,
}

impl AppState {
    pub fn new(session: Arc<DeviceSession>, api_key: Option<String>, environment: &Environment) -> Self {
        Self {
            session,
            api_key: api_key.map(Arc::from),
            expose_errors: !environment.is_production(),
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Turn a session error into a response
    pub fn error(&self, err: Error) -> ApiError {
        let status = match err.kind() {
            ErrorKind::Configuration => StatusCode::BAD_REQUEST,
            ErrorKind::NotConnected => StatusCode::CONFLICT,
            ErrorKind::Transport => StatusCode::BAD_GATEWAY,
            ErrorKind::DeviceRejected => StatusCode::UNPROCESSABLE_ENTITY,
        };

        match err.kind() {
            ErrorKind::Transport => error!("{}", err),
            _ => warn!("{}", err),
        }

        let detail = self.expose_errors.then(|| format!("{err:?}"));
        ApiError::new(status, err.to_string()).with_detail(detail)
    }
}

/// Build the bridge router
pub fn create_router(state: AppState) -> Router {
    let device = Router::new()
        .route("/api/device/connect", post(device::connect))
        .route("/api/device/disconnect", post(device::disconnect))
        .route("/api/device/status", get(device::status))
        .route("/api/device/info", get(device::info))
        .route("/api/device/reboot", post(device::reboot));

    let users = Router::new()
        .route("/api/users/enroll", post(users::enroll))
        .route("/api/users", get(users::list).delete(users::clear_all))
        .route("/api/users/{uid}", get(users::get).delete(users::delete));

    let attendance = Router::new()
        .route("/api/attendance", get(attendance::list).delete(attendance::clear))
        .route("/api/attendance/realtime/start", post(attendance::start_realtime))
        .route("/api/attendance/realtime/stop", post(attendance::stop_realtime))
        .route("/api/attendance/realtime/events", get(attendance::events));

    let api = Router::new()
        .merge(device)
        .merge(users)
        .merge(attendance)
        .layer(middleware::from_fn_with_state(state.clone(), auth::api_key_middleware));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(api)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Endpoint not found")
}

/// Accept a number either as a JSON number or a numeric string
pub(crate) fn lenient_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + FromStr,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| T::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("{n} is out of range"))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("'{s}' is not a valid number"))),
        Some(other) => Err(D::Error::custom(format!("expected a number, got {other}"))),
    }
}

/// Accept text either as a JSON string or a number
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected text, got {other}"))),
    }
}
