//! Hardware-free event injection.
//!
//! These routes push events into the same driver channel a radio adapter
//! would, so the whole pipeline (decode, policy, response, echo, display)
//! can be exercised from HTTP.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use billspc_core::codec::{self, Record};
use billspc_core::{CentralId, PeripheralEvent, RadioState, SessionStatus, WriteStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Central used when a request does not name one.
pub const DEFAULT_CENTRAL: &str = "mock-central";

/// Creates the mock router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/radio", post(set_radio))
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
        .route("/write", post(write))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Radio state to report.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "state": "powered_on" }))]
pub struct RadioRequest {
    /// New radio state.
    pub state: RadioState,
}

/// Central to subscribe or unsubscribe.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[schema(example = json!({ "central": "phone" }))]
pub struct CentralRequest {
    /// Central identity, `mock-central` when omitted.
    pub central: Option<String>,
}

/// One record to pack into a payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct MockRecord {
    /// Operation code, 0 to 3. 2 makes the record visible.
    #[schema(example = 2, minimum = 0, maximum = 3)]
    pub operation: u8,

    /// Record index. Anything above 151 ends the batch.
    #[schema(example = 151)]
    pub index: u8,
}

/// A characteristic write, either raw or packed from records.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[schema(example = json!({
    "central": "phone",
    "records": [
        { "operation": 2, "index": 151 },
        { "operation": 2, "index": 150 },
        { "operation": 0, "index": 5 },
        { "operation": 0, "index": 5 },
        { "operation": 0, "index": 5 },
        { "operation": 0, "index": 5 }
    ]
}))]
pub struct WriteRequest {
    /// Central identity, `mock-central` when omitted.
    pub central: Option<String>,

    /// Raw payload text, sent as-is.
    #[schema(example = "0")]
    pub payload: Option<String>,

    /// Records to pack into a decimal payload.
    pub records: Option<Vec<MockRecord>>,
}

/// Outcome of an injected write.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "success",
    "payload": "5635002466982551"
}))]
pub struct WriteResponse {
    /// Status the driver answered with.
    pub status: WriteStatus,

    /// The payload that was written.
    pub payload: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Report a radio state change.
#[utoipa::path(
    post,
    path = "/api/mock/radio",
    tag = "mock",
    operation_id = "mockRadio",
    summary = "Report a radio state",
    description = "Injects a radio state report. `powered_on` registers the service and \
        starts advertising; anything else makes the session unavailable and drops \
        all subscribers. Returns the session status once the report is processed.",
    request_body = RadioRequest,
    responses(
        (status = 200, description = "Report processed", body = SessionStatus),
        (status = 503, description = "Session driver stopped", body = super::error::ErrorResponse)
    )
)]
pub async fn set_radio(
    State(state): State<SharedState>,
    Json(request): Json<RadioRequest>,
) -> ApiResult<Json<SessionStatus>> {
    inject(&state, PeripheralEvent::RadioStateChanged(request.state)).await
}

/// Subscribe a central to notifications.
#[utoipa::path(
    post,
    path = "/api/mock/subscribe",
    tag = "mock",
    operation_id = "mockSubscribe",
    summary = "Subscribe a central",
    description = "Injects a notification subscription. Ignored until the service is \
        registered. The first one switches the display to the data view.",
    request_body = CentralRequest,
    responses(
        (status = 200, description = "Subscription processed", body = SessionStatus),
        (status = 503, description = "Session driver stopped", body = super::error::ErrorResponse)
    )
)]
pub async fn subscribe(
    State(state): State<SharedState>,
    Json(request): Json<CentralRequest>,
) -> ApiResult<Json<SessionStatus>> {
    let central = central(request.central);
    inject(&state, PeripheralEvent::Subscribed(central)).await
}

/// End a central's subscription.
#[utoipa::path(
    post,
    path = "/api/mock/unsubscribe",
    tag = "mock",
    operation_id = "mockUnsubscribe",
    summary = "Unsubscribe a central",
    request_body = CentralRequest,
    responses(
        (status = 200, description = "Unsubscription processed", body = SessionStatus),
        (status = 503, description = "Session driver stopped", body = super::error::ErrorResponse)
    )
)]
pub async fn unsubscribe(
    State(state): State<SharedState>,
    Json(request): Json<CentralRequest>,
) -> ApiResult<Json<SessionStatus>> {
    let central = central(request.central);
    inject(&state, PeripheralEvent::Unsubscribed(central)).await
}

/// Write the characteristic.
#[utoipa::path(
    post,
    path = "/api/mock/write",
    tag = "mock",
    operation_id = "mockWrite",
    summary = "Write the characteristic",
    description = "Injects a write and waits for the driver's answer. Give exactly one of \
        `payload` (raw text) or `records` (packed at bit offsets 0, 10, .. 50). \
        Batches of six records succeed; shorter ones come back as \
        `request_not_supported`; non-numeric payloads as `invalid_request`.",
    request_body = WriteRequest,
    responses(
        (status = 200, description = "Write answered", body = WriteResponse),
        (status = 400, description = "Neither or both of payload and records, or records do not pack",
            body = super::error::ErrorResponse),
        (status = 503, description = "Session driver stopped", body = super::error::ErrorResponse)
    )
)]
pub async fn write(
    State(state): State<SharedState>,
    Json(request): Json<WriteRequest>,
) -> ApiResult<Json<WriteResponse>> {
    let payload = match (request.payload, request.records) {
        (Some(payload), None) => payload,
        (None, Some(records)) => {
            let records: Vec<Record> = records
                .iter()
                .map(|r| Record::new(r.operation, r.index))
                .collect();
            codec::encode(&records)?.to_string()
        }
        _ => {
            return Err(ApiError::bad_request(
                "invalid_write_request",
                "Give exactly one of `payload` or `records`",
            ))
        }
    };

    let central = central(request.central);
    debug!(%central, %payload, "injecting write");
    let status = state
        .events
        .write(central, payload.clone().into_bytes())
        .await?;
    // The writer is answered before the echo and display refresh run.
    state.events.read().await?;

    Ok(Json(WriteResponse { status, payload }))
}

fn central(id: Option<String>) -> CentralId {
    CentralId::new(id.unwrap_or_else(|| DEFAULT_CENTRAL.to_string()))
}

/// Send an event and wait until the driver has processed it.
async fn inject(state: &SharedState, event: PeripheralEvent) -> ApiResult<Json<SessionStatus>> {
    state.events.send(event).await?;
    // Events are handled in order, so a read round trip is a barrier.
    state.events.read().await?;
    Ok(Json(state.status()))
}
