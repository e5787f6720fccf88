//! Session status endpoint.

use axum::extract::State;
use axum::Json;
use billspc_core::SessionStatus;

use crate::state::SharedState;

/// Get the peripheral session status.
#[utoipa::path(
    get,
    path = "/api/session",
    tag = "session",
    operation_id = "getSession",
    summary = "Get the session status",
    description = "Returns the lifecycle phase, the advertised identity, the number of \
        subscribed centrals and the outcome of the last write. `radio_state` is set \
        only while the phase is `unavailable`.",
    responses(
        (status = 200, description = "Current session status", body = SessionStatus)
    )
)]
pub async fn get_session(State(state): State<SharedState>) -> Json<SessionStatus> {
    Json(state.status())
}
