//! HTTP API routes and handlers.
//!
//! - `health` - Service health check
//! - `records` - The displayed record list
//! - `session` - Session status
//! - `mock` - Event injection for the in-memory peripheral
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod error;
pub mod health;
#[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
pub mod mock;
pub mod openapi;
pub mod records;
pub mod session;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /records           - Displayed records
/// ├── /session           - Session status
/// ├── /mock              - Event injection (in-memory peripheral only)
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/records", get(records::get_records))
        .route("/session", get(session::get_session))
        .route("/openapi.json", get(openapi::get_openapi_spec));

    #[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
    let api = api.nest("/mock", mock::router());

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
