//! Unified error types for the billspc core library.
//!
//! [`PcError`] covers every failure mode the peripheral can surface. Each
//! module keeps its own error type ([`CodecError`], [`ConfigError`],
//! [`BluetoothError`]) and converts into this one at the edges.
//!
//! # Example
//!
//! ```rust
//! use billspc_core::error::{PcError, Result};
//!
//! fn records(payload: &str) -> Result<usize> {
//!     Ok(billspc_core::codec::decode(payload)?.len())
//! }
//!
//! assert_eq!(records("151").unwrap(), 6);
//! assert_eq!(records("200").unwrap(), 0);
//! assert!(matches!(records("abc"), Err(PcError::InvalidPayload(_))));
//! ```

use thiserror::Error;

use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::peripheral::BluetoothError;

/// The unified error type for all billspc operations.
#[derive(Debug, Error)]
pub enum PcError {
    // =========================================================================
    // PAYLOAD ERRORS
    // =========================================================================
    /// The written bytes are not ASCII text.
    #[error("Payload is not ASCII text. Write the value as decimal digits.")]
    PayloadNotAscii,

    /// The written text is not an unsigned 64-bit decimal number.
    #[error("Invalid payload '{0}'. Expected an unsigned 64-bit decimal integer.")]
    InvalidPayload(String),

    /// Too many records to pack into one payload.
    #[error("Cannot pack {0} records into one payload")]
    TooManyRecords(usize),

    /// An operation code does not fit its field.
    #[error("Operation {0} is out of range")]
    OperationOutOfRange(u8),

    // =========================================================================
    // BLUETOOTH ERRORS
    // =========================================================================
    /// No Bluetooth adapter was found on this system.
    #[error(
        "No Bluetooth adapter found. Ensure Bluetooth hardware is present and bluetoothd is running."
    )]
    BluetoothAdapterNotFound,

    /// The platform refused to register the service or advertise.
    #[error("Bluetooth setup failed: {0}")]
    BluetoothSetupFailed(String),

    /// Any other radio failure.
    #[error("Bluetooth error: {0}")]
    BluetoothFailed(String),

    /// The session driver is no longer running.
    #[error("Session driver is not running")]
    DriverStopped,

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration sources could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // I/O ERRORS
    // =========================================================================
    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for billspc operations.
pub type Result<T> = std::result::Result<T, PcError>;

impl PcError {
    /// Returns `true` if a writer sent a bad payload.
    #[inline]
    #[must_use]
    pub const fn is_codec_error(&self) -> bool {
        matches!(
            self,
            Self::PayloadNotAscii
                | Self::InvalidPayload(_)
                | Self::TooManyRecords(_)
                | Self::OperationOutOfRange(_)
        )
    }

    /// Returns `true` if this error is related to the radio.
    #[inline]
    #[must_use]
    pub const fn is_bluetooth_error(&self) -> bool {
        matches!(
            self,
            Self::BluetoothAdapterNotFound
                | Self::BluetoothSetupFailed(_)
                | Self::BluetoothFailed(_)
                | Self::DriverStopped
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if the session can carry on after this error.
    ///
    /// Bad payloads only fail the one request; radio setup is retried on the
    /// next power-on.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        self.is_codec_error() || matches!(self, Self::BluetoothSetupFailed(_))
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::PayloadNotAscii
            | Self::InvalidPayload(_)
            | Self::TooManyRecords(_)
            | Self::OperationOutOfRange(_) => 400,

            Self::ConfigParseError(_) | Self::ConfigValidationError(_) => 422,

            Self::IoError(_) => 500,

            Self::BluetoothAdapterNotFound
            | Self::BluetoothSetupFailed(_)
            | Self::BluetoothFailed(_)
            | Self::DriverStopped => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::PayloadNotAscii => "PAYLOAD_NOT_ASCII",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::TooManyRecords(_) => "TOO_MANY_RECORDS",
            Self::OperationOutOfRange(_) => "OPERATION_OUT_OF_RANGE",
            Self::BluetoothAdapterNotFound => "BLUETOOTH_ADAPTER_NOT_FOUND",
            Self::BluetoothSetupFailed(_) => "BLUETOOTH_SETUP_FAILED",
            Self::BluetoothFailed(_) => "BLUETOOTH_ERROR",
            Self::DriverStopped => "DRIVER_STOPPED",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<CodecError> for PcError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::NotAscii => Self::PayloadNotAscii,
            CodecError::InvalidNumber(text) => Self::InvalidPayload(text),
            CodecError::TooManyRecords(count) => Self::TooManyRecords(count),
            CodecError::OperationOutOfRange(operation) => Self::OperationOutOfRange(operation),
        }
    }
}

impl From<ConfigError> for PcError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Load(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::NoConfigDir => {
                Self::ConfigParseError("cannot determine configuration directory".to_string())
            }
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<BluetoothError> for PcError {
    fn from(err: BluetoothError) -> Self {
        match err {
            BluetoothError::AdapterNotFound => Self::BluetoothAdapterNotFound,
            BluetoothError::ServiceRegistrationFailed { message }
            | BluetoothError::AdvertisingFailed { message } => Self::BluetoothSetupFailed(message),
            BluetoothError::SessionInitFailed { message }
            | BluetoothError::NotifyFailed { message }
            | BluetoothError::Internal { message } => Self::BluetoothFailed(message),
            BluetoothError::ResponseUndeliverable => {
                Self::BluetoothFailed("write response could not be delivered".to_string())
            }
            BluetoothError::DriverStopped => Self::DriverStopped,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
