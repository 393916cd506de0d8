//! Admin API: read-only view of the daemon's watches.
//!
//! - `GET /admin/status`: version and watch counts
//! - `GET /admin/endpoints`: every watch with its current endpoints
//! - `GET /admin/endpoints/{key}`: one watch (`service` or `service@tag`)

pub mod auth;
pub mod handlers;
pub mod state;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::AdminConfig;

pub use state::{watch_key, AdminState, ServiceView};

pub fn setup_admin_router(state: AdminState, config: &AdminConfig) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/endpoints", get(get_endpoints))
        .route("/admin/endpoints/{key}", get(get_service))
        .layer(middleware::from_fn_with_state(
            config.api_key.clone(),
            admin_auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
