use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::protocol::LinkStatusDto;
use crate::interface_adapters::state::AppState;

use axum::{
    extract::{Json, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use std::sync::Arc;

pub async fn fleet_snapshot_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // Same bytes the sockets receive; empty until the control loop has ticked once.
    let latest = state.fleet_latest_tx.borrow().clone();
    if latest.is_empty() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "no fleet snapshot yet".to_string(),
            }),
        )
            .into_response();
    }

    (
        [(header::CONTENT_TYPE, "application/json")],
        latest.as_str().to_owned(),
    )
        .into_response()
}

pub async fn link_status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(LinkStatusDto::from(state.link.state()))
}

/// Makes the simulated peer drop the link, as if it went out of range.
pub async fn sim_drop_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if !state.radio.is_connected() {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "no live link to drop".to_string(),
            }),
        )
            .into_response();
    }

    state.radio.inject_disconnect();
    StatusCode::NO_CONTENT.into_response()
}
