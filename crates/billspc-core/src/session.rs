//! Peripheral session state machine.
//!
//! [`Session`] is a plain value with no I/O. The [`crate::peripheral`]
//! driver feeds it platform events and carries out what it asks for
//! (register the service, start advertising, answer the writer, notify).
//!
//! ```text
//! Idle ──powered on──▶ Ready ──service added──▶ ServiceAdded
//!   │                                               │
//!   └─other radio state──▶ Unavailable(state)   advertising started
//!                                                   ▼
//!                         Subscribed ◀──subscribe── Advertising
//! ```

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::codec::{self, CodecError, Record, MAX_FIELDS};

/// Minimum number of decoded records for a batch to be accepted.
pub const MIN_ACCEPTED_BATCH: usize = MAX_FIELDS;

/// Condition reported by the local radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RadioState {
    /// State not yet known.
    Unknown,
    /// The radio is resetting.
    Resetting,
    /// This host has no BLE peripheral support.
    Unsupported,
    /// The process is not allowed to use the radio.
    Unauthorized,
    /// The radio is switched off.
    PoweredOff,
    /// The radio is on and usable.
    PoweredOn,
}

impl fmt::Display for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "UNKNOWN",
            Self::Resetting => "RESETTING",
            Self::Unsupported => "UNSUPPORTED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::PoweredOff => "POWERED OFF",
            Self::PoweredOn => "POWERED ON",
        };
        f.write_str(name)
    }
}

/// Lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No radio state reported yet.
    Idle,
    /// The radio reported something other than powered-on.
    Unavailable(RadioState),
    /// Radio powered on, service not yet registered.
    Ready,
    /// Service registered, advertising not yet confirmed.
    ServiceAdded,
    /// Advertising, nobody subscribed.
    Advertising,
    /// At least one central is subscribed.
    Subscribed,
}

impl SessionPhase {
    /// Machine-readable phase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Unavailable(_) => "unavailable",
            Self::Ready => "ready",
            Self::ServiceAdded => "service_added",
            Self::Advertising => "advertising",
            Self::Subscribed => "subscribed",
        }
    }

    /// The radio state behind an unavailable phase.
    #[must_use]
    pub const fn radio_fault(self) -> Option<RadioState> {
        match self {
            Self::Unavailable(state) => Some(state),
            _ => None,
        }
    }

    /// Whether the GATT service is registered in this phase.
    #[must_use]
    pub const fn has_service(self) -> bool {
        matches!(self, Self::ServiceAdded | Self::Advertising | Self::Subscribed)
    }
}

/// Opaque identity of a remote central.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CentralId(String);

impl CentralId {
    /// Wrap a platform identifier (usually the device address).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CentralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What gets advertised and registered. Fixed for the life of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisementConfig {
    /// Primary service UUID, also advertised.
    pub service_uuid: Uuid,
    /// The single characteristic inside the service.
    pub characteristic_uuid: Uuid,
    /// Advertised local name.
    pub local_name: String,
}

/// Characteristic properties as declared to centrals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharacteristicProperties {
    /// Centrals may read the value.
    pub read: bool,
    /// Centrals may write with response.
    pub write: bool,
    /// Centrals may subscribe to notifications.
    pub notify: bool,
}

/// Attribute permissions on the characteristic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharacteristicPermissions {
    /// Value is readable without encryption.
    pub readable: bool,
    /// Value is writable without encryption.
    pub writable: bool,
}

/// One characteristic to register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicDefinition {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// Declared properties.
    pub properties: CharacteristicProperties,
    /// Value permissions.
    pub permissions: CharacteristicPermissions,
}

/// The primary service to register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    /// Service UUID.
    pub uuid: Uuid,
    /// Whether this is a primary service.
    pub primary: bool,
    /// Characteristics in declaration order.
    pub characteristics: Vec<CharacteristicDefinition>,
}

impl ServiceDefinition {
    /// The service for an advertisement: one notify/write/read characteristic.
    #[must_use]
    pub fn for_advertisement(config: &AdvertisementConfig) -> Self {
        Self {
            uuid: config.service_uuid,
            primary: true,
            characteristics: vec![CharacteristicDefinition {
                uuid: config.characteristic_uuid,
                properties: CharacteristicProperties {
                    read: true,
                    write: true,
                    notify: true,
                },
                permissions: CharacteristicPermissions {
                    readable: true,
                    writable: true,
                },
            }],
        }
    }
}

/// Status returned to the writer of a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    /// Full batch accepted.
    Success,
    /// Batch too small, rejected.
    RequestNotSupported,
    /// Payload could not be parsed.
    InvalidRequest,
}

/// Result of handling one write that decoded successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Status to send back to the writer.
    pub status: WriteStatus,
    /// Number of records decoded from the payload.
    pub batch_len: usize,
    /// Raw payload to notify to subscribers after responding.
    pub echo: Vec<u8>,
}

impl WriteOutcome {
    /// Whether the batch replaced the visible records.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.status == WriteStatus::Success
    }
}

/// Session state for one peripheral manager.
#[derive(Debug, Clone)]
pub struct Session {
    advertisement: AdvertisementConfig,
    phase: SessionPhase,
    subscribed_centrals: BTreeSet<CentralId>,
    last_decoded_records: Vec<Record>,
    visible_records: Vec<Record>,
    value: Vec<u8>,
}

impl Session {
    /// Create an idle session for the given advertisement.
    #[must_use]
    pub fn new(advertisement: AdvertisementConfig) -> Self {
        Self {
            advertisement,
            phase: SessionPhase::Idle,
            subscribed_centrals: BTreeSet::new(),
            last_decoded_records: Vec::new(),
            visible_records: Vec::new(),
            value: Vec::new(),
        }
    }

    /// The fixed advertisement identity.
    #[must_use]
    pub const fn advertisement(&self) -> &AdvertisementConfig {
        &self.advertisement
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Centrals currently subscribed to notifications.
    #[must_use]
    pub const fn subscribed_centrals(&self) -> &BTreeSet<CentralId> {
        &self.subscribed_centrals
    }

    /// Records from the most recent write that parsed, accepted or not.
    #[must_use]
    pub fn last_decoded_records(&self) -> &[Record] {
        &self.last_decoded_records
    }

    /// Records with the visible operation from the last accepted batch.
    #[must_use]
    pub fn visible_records(&self) -> &[Record] {
        &self.visible_records
    }

    /// Current characteristic value: the last raw payload received.
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// React to a radio state report.
    ///
    /// Returns the service to register when this report moves the session
    /// into [`SessionPhase::Ready`]. Repeated powered-on reports while the
    /// radio is already up return `None`.
    pub fn on_radio_state_changed(&mut self, state: RadioState) -> Option<ServiceDefinition> {
        if state == RadioState::PoweredOn {
            info!("Bluetooth device is {state}");
            return match self.phase {
                SessionPhase::Idle | SessionPhase::Unavailable(_) => {
                    self.phase = SessionPhase::Ready;
                    Some(ServiceDefinition::for_advertisement(&self.advertisement))
                }
                phase => {
                    debug!(?phase, "radio already powered on");
                    None
                }
            };
        }

        warn!("Bluetooth device is {state}");
        self.phase = SessionPhase::Unavailable(state);
        self.subscribed_centrals.clear();
        None
    }

    /// The service was registered. Returns what to advertise next.
    pub fn on_service_added(&mut self) -> Option<&AdvertisementConfig> {
        if self.phase != SessionPhase::Ready {
            debug!(phase = ?self.phase, "ignoring service registration outside Ready");
            return None;
        }
        self.phase = SessionPhase::ServiceAdded;
        Some(&self.advertisement)
    }

    /// Advertising has started.
    pub fn on_advertising_started(&mut self) {
        if self.phase == SessionPhase::ServiceAdded {
            self.phase = if self.subscribed_centrals.is_empty() {
                SessionPhase::Advertising
            } else {
                SessionPhase::Subscribed
            };
        }
    }

    /// A central subscribed to notifications.
    ///
    /// Returns `true` when the UI should switch to the data view. That is
    /// every subscription while the service is up; repeats are harmless.
    pub fn on_subscribe(&mut self, central: CentralId) -> bool {
        if !self.phase.has_service() {
            debug!(%central, phase = ?self.phase, "subscription without a registered service");
            return false;
        }
        info!(%central, "central subscribed");
        self.subscribed_centrals.insert(central);
        self.phase = SessionPhase::Subscribed;
        true
    }

    /// A central unsubscribed or went away.
    pub fn on_unsubscribe(&mut self, central: &CentralId) {
        if self.subscribed_centrals.remove(central) {
            info!(%central, "central unsubscribed");
        }
        if self.phase == SessionPhase::Subscribed && self.subscribed_centrals.is_empty() {
            self.phase = SessionPhase::Advertising;
        }
    }

    /// Handle an inbound write.
    ///
    /// Batches of at least [`MIN_ACCEPTED_BATCH`] records succeed and replace
    /// the visible records with the visible subset. Smaller batches are
    /// rejected and leave the visible records alone. Either way the raw
    /// payload becomes the characteristic value and is echoed.
    ///
    /// # Errors
    ///
    /// Returns the [`CodecError`] if the payload does not parse. The session
    /// is left untouched and nothing should be echoed.
    pub fn on_write_request(&mut self, payload: &[u8]) -> Result<WriteOutcome, CodecError> {
        let records = codec::decode_bytes(payload)?;
        let batch_len = records.len();

        let status = if batch_len < MIN_ACCEPTED_BATCH {
            WriteStatus::RequestNotSupported
        } else {
            self.visible_records = records.iter().copied().filter(Record::is_visible).collect();
            WriteStatus::Success
        };

        self.last_decoded_records = records;
        self.value = payload.to_vec();

        Ok(WriteOutcome {
            status,
            batch_len,
            echo: payload.to_vec(),
        })
    }

    /// Handle a read of the characteristic value.
    #[must_use]
    pub fn on_read_request(&self) -> Vec<u8> {
        self.value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    fn advertisement() -> AdvertisementConfig {
        AdvertisementConfig {
            service_uuid: Uuid::from_u128(1),
            characteristic_uuid: Uuid::from_u128(2),
            local_name: "Bill's PC".to_string(),
        }
    }

    fn advertising_session() -> Session {
        let mut session = Session::new(advertisement());
        session.on_radio_state_changed(RadioState::PoweredOn).unwrap();
        session.on_service_added().unwrap();
        session.on_advertising_started();
        session
    }

    fn payload(records: &[Record]) -> Vec<u8> {
        encode(records).unwrap().to_string().into_bytes()
    }

    #[test]
    fn test_starts_idle() {
        let session = Session::new(advertisement());
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.visible_records().is_empty());
        assert!(session.value().is_empty());
    }

    #[test]
    fn test_powered_on_requests_service_once() {
        let mut session = Session::new(advertisement());
        let service = session.on_radio_state_changed(RadioState::PoweredOn).unwrap();
        assert_eq!(session.phase(), SessionPhase::Ready);
        assert_eq!(service.uuid, Uuid::from_u128(1));
        assert!(service.primary);
        let characteristic = &service.characteristics[0];
        assert_eq!(characteristic.uuid, Uuid::from_u128(2));
        assert!(characteristic.properties.read);
        assert!(characteristic.properties.write);
        assert!(characteristic.properties.notify);
        assert!(characteristic.permissions.readable);
        assert!(characteristic.permissions.writable);

        assert!(session.on_radio_state_changed(RadioState::PoweredOn).is_none());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut session = Session::new(advertisement());
        session.on_radio_state_changed(RadioState::PoweredOn);
        let adv = session.on_service_added().unwrap();
        assert_eq!(adv.local_name, "Bill's PC");
        assert_eq!(session.phase(), SessionPhase::ServiceAdded);
        session.on_advertising_started();
        assert_eq!(session.phase(), SessionPhase::Advertising);
        assert!(session.on_subscribe(CentralId::new("AA:BB")));
        assert_eq!(session.phase(), SessionPhase::Subscribed);
    }

    #[test]
    fn test_other_radio_states_are_inert() {
        for state in [
            RadioState::Unknown,
            RadioState::Resetting,
            RadioState::Unsupported,
            RadioState::Unauthorized,
            RadioState::PoweredOff,
        ] {
            let mut session = Session::new(advertisement());
            assert!(session.on_radio_state_changed(state).is_none());
            assert_eq!(session.phase(), SessionPhase::Unavailable(state));
            assert!(session.on_service_added().is_none());
            assert!(!session.on_subscribe(CentralId::new("x")));
        }
    }

    #[test]
    fn test_power_cycle_registers_again() {
        let mut session = advertising_session();
        session.on_subscribe(CentralId::new("a"));
        session.on_radio_state_changed(RadioState::PoweredOff);
        assert!(session.subscribed_centrals().is_empty());
        assert!(session.on_radio_state_changed(RadioState::PoweredOn).is_some());
    }

    #[test]
    fn test_repeated_subscribe_is_idempotent() {
        let mut session = advertising_session();
        assert!(session.on_subscribe(CentralId::new("a")));
        assert!(session.on_subscribe(CentralId::new("a")));
        assert!(session.on_subscribe(CentralId::new("b")));
        assert_eq!(session.subscribed_centrals().len(), 2);
    }

    #[test]
    fn test_last_unsubscribe_returns_to_advertising() {
        let mut session = advertising_session();
        session.on_subscribe(CentralId::new("a"));
        session.on_subscribe(CentralId::new("b"));
        session.on_unsubscribe(&CentralId::new("a"));
        assert_eq!(session.phase(), SessionPhase::Subscribed);
        session.on_unsubscribe(&CentralId::new("b"));
        assert_eq!(session.phase(), SessionPhase::Advertising);
    }

    #[test]
    fn test_small_batches_rejected_without_touching_visible() {
        let mut session = advertising_session();
        let full = payload(&[Record::new(2, 151); 6]);
        session.on_write_request(&full).unwrap();
        let before = session.visible_records().to_vec();

        for len in 0..MIN_ACCEPTED_BATCH {
            let mut records = vec![Record::new(2, 1); len];
            records.push(Record::new(0, 255));
            let outcome = session.on_write_request(&payload(&records)).unwrap();
            assert_eq!(outcome.status, WriteStatus::RequestNotSupported);
            assert_eq!(outcome.batch_len, len);
            assert_eq!(session.visible_records(), before.as_slice());
            assert_eq!(session.last_decoded_records().len(), len);
        }
    }

    #[test]
    fn test_full_batch_keeps_only_visible_operation() {
        let mut session = advertising_session();
        let records = [
            Record::new(2, 151),
            Record::new(1, 150),
            Record::new(2, 143),
            Record::new(3, 130),
            Record::new(0, 1),
            Record::new(2, 0),
        ];
        let outcome = session.on_write_request(&payload(&records)).unwrap();
        assert!(outcome.is_accepted());
        assert_eq!(
            session.visible_records(),
            &[Record::new(2, 151), Record::new(2, 143), Record::new(2, 0)]
        );
    }

    #[test]
    fn test_rejected_write_still_echoes() {
        let mut session = advertising_session();
        let outcome = session.on_write_request(b"200").unwrap();
        assert_eq!(outcome.status, WriteStatus::RequestNotSupported);
        assert_eq!(outcome.echo, b"200");
        assert_eq!(session.value(), b"200");
        assert_eq!(session.on_read_request(), b"200".to_vec());
    }

    #[test]
    fn test_parse_error_leaves_session_untouched() {
        let mut session = advertising_session();
        session.on_write_request(b"0").unwrap();

        let err = session.on_write_request(b"abc").unwrap_err();
        assert!(err.is_parse_error());
        assert_eq!(session.value(), b"0");
        assert_eq!(session.last_decoded_records().len(), 6);

        assert!(session.on_write_request(b"0").is_ok());
    }
}
