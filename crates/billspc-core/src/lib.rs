//! # billspc-core
//!
//! Core logic for "Bill's PC", a BLE peripheral that receives batches of
//! bit-packed records from a central and shows the visible ones.
//!
//! This crate provides:
//! - The payload codec (an ASCII decimal `u64` holding up to six 10-bit fields)
//! - The peripheral session state machine and its write acceptance policy
//! - A single-owner driver that sequences responses, echoes and UI refreshes
//! - Platform adapters: BlueZ via `bluer`, and an in-memory one
//!
//! ## Architecture
//!
//! - [`codec`] - Payload parsing, field extraction and the name table
//! - [`session`] - Lifecycle phases, subscribers and the last accepted batch
//! - [`peripheral`] - Platform seam, event channel and the session driver
//! - [`bluetooth`] - BlueZ GATT server and advertiser (feature `bluetooth`)
//! - [`mock`] - In-memory peripheral for development and tests
//! - [`config`] - Layered configuration loading and validation
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Display and status snapshots with OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

#[cfg(feature = "bluetooth")]
pub mod bluetooth;
pub mod codec;
pub mod config;
pub mod error;
pub mod mock;
pub mod peripheral;
pub mod session;
pub mod types;

// Re-export primary types for convenience
#[cfg(feature = "bluetooth")]
pub use bluetooth::BluezPeripheral;
pub use codec::{CodecError, Record, MAX_FIELDS, MAX_INDEX, VISIBLE_OPERATION};
pub use config::{ConfigError, ConfigResult, LoggingConfig, PcConfig, PeripheralConfig, ServerConfig};
pub use error::{PcError, Result};
pub use mock::MemoryPeripheral;
pub use peripheral::{
    BluetoothError, BluetoothResult, DisplaySink, EventSender, Peripheral, PeripheralEvent,
    Responder, SessionDriver, WatchDisplay,
};
pub use session::{
    AdvertisementConfig, CentralId, RadioState, ServiceDefinition, Session, SessionPhase,
    WriteOutcome, WriteStatus, MIN_ACCEPTED_BATCH,
};
pub use types::{DisplayRecord, DisplaySnapshot, DisplayView, SessionStatus};
