//! Display list endpoint.
//!
//! Serves what the UI shows: the waiting view until the first central
//! subscribes, then the visible records from the last accepted batch.

use axum::extract::State;
use axum::Json;
use billspc_core::DisplaySnapshot;

use crate::state::SharedState;

/// Get the current display list.
#[utoipa::path(
    get,
    path = "/api/records",
    tag = "display",
    operation_id = "getRecords",
    summary = "Get the displayed records",
    description = "Returns the current view and the visible records in batch order. \
        `view` is `waiting` until a central subscribes. Each record carries its \
        display name (empty for unnamed indices) and a `NO. <index>` label. \
        A rejected batch refreshes `updated_at_utc` but leaves the records as they were.",
    responses(
        (status = 200, description = "Current display state", body = DisplaySnapshot)
    )
)]
pub async fn get_records(State(state): State<SharedState>) -> Json<DisplaySnapshot> {
    Json(state.display())
}
