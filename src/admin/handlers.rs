use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::state::{AdminState, ServiceView};
use crate::watch::WatchStatus;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub watches: usize,
    pub running: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let views = state.views();
    let running = views
        .iter()
        .filter(|v| v.status == WatchStatus::Running)
        .count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if running == views.len() { "operational" } else { "degraded" },
        watches: views.len(),
        running,
    })
}

pub async fn get_endpoints(State(state): State<AdminState>) -> Json<Vec<ServiceView>> {
    Json(state.views())
}

pub async fn get_service(
    State(state): State<AdminState>,
    Path(key): Path<String>,
) -> Result<Json<ServiceView>, StatusCode> {
    state.get(&key).map(Json).ok_or(StatusCode::NOT_FOUND)
}
