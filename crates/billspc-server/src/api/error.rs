//! API error types and response handling.
//!
//! Every handler error becomes a JSON [`ErrorResponse`] with a matching
//! HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use billspc_core::{BluetoothError, CodecError, PcError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - the request body cannot be acted on.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 500 Internal Server Error - unexpected server-side failure.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 503 Service Unavailable - the radio or the session driver is down.
    ServiceUnavailable {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional additional details.
        details: Option<String>,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "invalid_payload",
    "message": "Invalid payload 'abc'. Expected an unsigned 64-bit decimal integer.",
    "details": null
}))]
pub struct ErrorResponse {
    /// Machine-readable error code.
    #[schema(example = "invalid_payload")]
    pub error: String,

    /// Human-readable error message.
    pub message: String,

    /// Optional additional details.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Shorthand for a 400 with a code and message.
    pub fn bad_request(error_code: &str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            error_code: error_code.to_string(),
            message: message.into(),
        }
    }

    /// The HTTP status this error is served with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::BadRequest {
                error_code,
                message,
            } => ErrorResponse {
                error: error_code,
                message,
                details: None,
            },

            Self::InternalError {
                error_code,
                message,
            } => {
                tracing::error!(%error_code, %message, "internal server error");
                ErrorResponse {
                    error: error_code,
                    message,
                    details: None,
                }
            }

            Self::ServiceUnavailable {
                error_code,
                message,
                details,
            } => ErrorResponse {
                error: error_code,
                message,
                details: details.map(serde_json::Value::String),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
            Self::ServiceUnavailable { message, .. } => {
                write!(f, "Service Unavailable: {message}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

/// Convert from core errors, keyed on the core's own status mapping.
impl From<PcError> for ApiError {
    fn from(err: PcError) -> Self {
        let error_code = err.error_code().to_ascii_lowercase();
        let message = err.to_string();
        match err.http_status_code() {
            400 => Self::BadRequest {
                error_code,
                message,
            },
            503 => Self::ServiceUnavailable {
                error_code,
                message,
                details: err
                    .is_recoverable()
                    .then(|| "retry once the radio is powered on".to_string()),
            },
            _ => Self::InternalError {
                error_code,
                message,
            },
        }
    }
}

impl From<CodecError> for ApiError {
    fn from(err: CodecError) -> Self {
        Self::from(PcError::from(err))
    }
}

impl From<BluetoothError> for ApiError {
    fn from(err: BluetoothError) -> Self {
        Self::from(PcError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_is_bad_request() {
        let err = ApiError::from(CodecError::InvalidNumber("abc".into()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(matches!(
            err,
            ApiError::BadRequest { ref error_code, .. } if error_code == "invalid_payload"
        ));
    }

    #[test]
    fn test_stopped_driver_is_unavailable() {
        let err = ApiError::from(BluetoothError::DriverStopped);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[test]
    fn test_setup_failure_carries_retry_hint() {
        let err = ApiError::from(BluetoothError::AdvertisingFailed {
            message: "busy".into(),
        });
        assert!(matches!(
            err,
            ApiError::ServiceUnavailable { details: Some(_), .. }
        ));
    }

    #[test]
    fn test_config_error_is_internal() {
        let err = ApiError::from(PcError::ConfigParseError("bad toml".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse {
            error: "driver_stopped".to_string(),
            message: "Session driver is not running".to_string(),
            details: None,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"error\":\"driver_stopped\""));
        assert!(json.contains("\"details\":null"));
    }
}
