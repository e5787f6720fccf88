//! OpenAPI specification for the billspc API.
//!
//! The document is served at `/api/openapi.json` and written to the
//! workspace root by the `gen-openapi` binary.

use axum::Json;
use billspc_core::{
    DisplayRecord, DisplaySnapshot, DisplayView, RadioState, SessionStatus, WriteStatus,
};
use utoipa::OpenApi;

use super::error::ErrorResponse;
use super::health::HealthResponse;

/// Serve the OpenAPI specification as JSON.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}

/// The full document, including the mock routes when they are compiled in.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    #[allow(unused_mut)]
    let mut doc = ApiDoc::openapi();
    #[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
    doc.merge(MockApiDoc::openapi());
    doc
}

/// Returns the OpenAPI specification as pretty JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    openapi().to_pretty_json()
}

/// Main OpenAPI document structure for billspc.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "billspc API",
        version = "0.1.0",
        description = r"
# billspc API

Bill's PC is a Bluetooth LE peripheral. A central writes a batch of up to six
bit-packed records to its characteristic as a decimal string; the peripheral
answers, echoes the payload back as a notification and shows the confirmed
records.

## Overview

- **Display**: the record list the peripheral currently shows
- **Session**: radio phase, subscribers and the outcome of the last write

## Payload format

The payload is an unsigned 64-bit integer. Field `k` sits at bit `10k`: the
low 8 bits are the index and the next 2 bits the operation. Decoding stops at
the first index above 151. Batches with fewer than six records are rejected.
Records with operation 2 are shown.
",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local billspc server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "display", description = "What the peripheral shows"),
        (name = "session", description = "Peripheral session state")
    ),
    paths(
        super::health::health_check,
        super::records::get_records,
        super::session::get_session,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            DisplayRecord,
            DisplayView,
            DisplaySnapshot,
            SessionStatus,
            RadioState,
            WriteStatus,
        )
    )
)]
pub struct ApiDoc;

/// Mock routes, present only when the in-memory peripheral is in use.
#[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
#[derive(OpenApi)]
#[openapi(
    tags(
        (name = "mock", description = "Inject radio events without hardware")
    ),
    paths(
        super::mock::set_radio,
        super::mock::subscribe,
        super::mock::unsubscribe,
        super::mock::write,
    ),
    components(
        schemas(
            super::mock::RadioRequest,
            super::mock::CentralRequest,
            super::mock::MockRecord,
            super::mock::WriteRequest,
            super::mock::WriteResponse,
        )
    )
)]
pub struct MockApiDoc;
