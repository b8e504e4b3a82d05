//! Attendance and real-time endpoints

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use zkbridge_types::AttendanceRecord;

use super::{ApiError, ApiResponse, AppState};
use crate::session::Transition;

pub async fn list(State(state): State<AppState>) -> Result<ApiResponse<Vec<AttendanceRecord>>, ApiError> {
    let records = state.session.get_attendance().await.map_err(|e| state.error(e))?;
    let count = records.len();
    Ok(ApiResponse::ok(records).with_count(count))
}

pub async fn clear(State(state): State<AppState>) -> Result<ApiResponse<()>, ApiError> {
    state.session.clear_attendance().await.map_err(|e| state.error(e))?;
    Ok(ApiResponse::message("Attendance logs cleared successfully"))
}

pub async fn start_realtime(State(state): State<AppState>) -> Result<ApiResponse<()>, ApiError> {
    let transition = state.session.enable_realtime().await.map_err(|e| state.error(e))?;

    Ok(ApiResponse::message(match transition {
        Transition::Applied => "Real-time mode enabled",
        Transition::AlreadyInState => "Real-time mode already active",
    }))
}

pub async fn stop_realtime(State(state): State<AppState>) -> Result<ApiResponse<()>, ApiError> {
    let transition = state.session.disable_realtime().await.map_err(|e| state.error(e))?;

    Ok(ApiResponse::message(match transition {
        Transition::Applied => "Real-time mode disabled",
        Transition::AlreadyInState => "Real-time mode already inactive",
    }))
}

/// Server-sent stream of real-time events
///
/// Stays open across enable/disable cycles; events only flow while
/// real-time mode is on.
pub async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.session.subscribe();
    debug!("SSE subscriber attached");

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = match serde_json::to_string(&event) {
                        Ok(data) => data,
                        Err(e) => {
                            warn!("Failed to serialize real-time event: {}", e);
                            continue;
                        }
                    };
                    return Some((Ok(Event::default().event("attendance").data(data)), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE subscriber lagging, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
