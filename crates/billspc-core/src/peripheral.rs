//! Platform seam and the session driver.
//!
//! Platform adapters turn radio callbacks into [`PeripheralEvent`]s on a
//! channel. A single [`SessionDriver`] task owns the [`Session`] and handles
//! those events one at a time, so a write is fully processed (decode, policy,
//! state update, response) before the next event is looked at.
//!
//! For a write the driver answers the writer first, then notifies the echo
//! to subscribers, then refreshes the display. No timers are involved.

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::codec::Record;
use crate::session::{
    AdvertisementConfig, CentralId, RadioState, ServiceDefinition, Session, WriteStatus,
};
use crate::types::{DisplayRecord, DisplaySnapshot, DisplayView, SessionStatus};

/// Capacity of the event channel between adapters and the driver.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Errors raised by platform adapters.
#[derive(Debug, Error)]
pub enum BluetoothError {
    /// No adapter is present.
    #[error("No Bluetooth adapter found")]
    AdapterNotFound,

    /// Connecting to the Bluetooth daemon failed.
    #[error("Failed to start Bluetooth session: {message}")]
    SessionInitFailed {
        /// Underlying error text.
        message: String,
    },

    /// The GATT service could not be registered.
    #[error("Failed to register GATT service: {message}")]
    ServiceRegistrationFailed {
        /// Underlying error text.
        message: String,
    },

    /// Advertising could not be started.
    #[error("Failed to start advertising: {message}")]
    AdvertisingFailed {
        /// Underlying error text.
        message: String,
    },

    /// A notification could not be sent.
    #[error("Failed to send notification: {message}")]
    NotifyFailed {
        /// Underlying error text.
        message: String,
    },

    /// The write request was dropped before its response was handed over.
    #[error("Write response could not be delivered, the request is gone")]
    ResponseUndeliverable,

    /// The driver is no longer receiving events.
    #[error("Session driver has stopped")]
    DriverStopped,

    /// Any other adapter failure.
    #[error("Bluetooth error: {message}")]
    Internal {
        /// Underlying error text.
        message: String,
    },
}

/// Result type for adapter operations.
pub type BluetoothResult<T> = std::result::Result<T, BluetoothError>;

/// Answers one write request.
///
/// The adapter keeps the receiving end and completes the platform request
/// with whatever status arrives.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<WriteStatus>,
}

impl Responder {
    /// Create a responder and the receiver the adapter waits on.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<WriteStatus>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Hand the status to the platform layer.
    ///
    /// Returns once the status is in the waiting request's channel. When the
    /// platform puts the reply on the air is up to the adapter: on BlueZ the
    /// reply leaves from the write callback while notifications leave from
    /// each notify session's task, so their order over the radio is not
    /// guaranteed.
    ///
    /// # Errors
    ///
    /// Returns [`BluetoothError::ResponseUndeliverable`] if the request was
    /// dropped (for example the central disconnected).
    pub fn respond(self, status: WriteStatus) -> BluetoothResult<()> {
        self.tx
            .send(status)
            .map_err(|_| BluetoothError::ResponseUndeliverable)
    }
}

/// Something the platform reported.
#[derive(Debug)]
pub enum PeripheralEvent {
    /// The radio changed state.
    RadioStateChanged(RadioState),
    /// A central subscribed to notifications.
    Subscribed(CentralId),
    /// A central's notification session ended.
    Unsubscribed(CentralId),
    /// A central wrote the characteristic.
    WriteRequest {
        /// Who wrote.
        central: CentralId,
        /// Raw bytes written.
        value: Vec<u8>,
        /// Where to send the status.
        responder: Responder,
    },
    /// A central read the characteristic.
    ReadRequest {
        /// Where to send the value.
        reply: oneshot::Sender<Vec<u8>>,
    },
}

/// Handle for pushing events into a running driver.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<PeripheralEvent>,
}

impl EventSender {
    /// Create a sender and the receiver the driver consumes.
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<PeripheralEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    /// Deliver an event.
    ///
    /// # Errors
    ///
    /// Returns [`BluetoothError::DriverStopped`] if the driver is gone.
    pub async fn send(&self, event: PeripheralEvent) -> BluetoothResult<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| BluetoothError::DriverStopped)
    }

    /// Deliver a write and wait for the status the driver chose.
    ///
    /// # Errors
    ///
    /// Returns [`BluetoothError::DriverStopped`] if the driver is gone or
    /// dropped the request without answering.
    pub async fn write(&self, central: CentralId, value: Vec<u8>) -> BluetoothResult<WriteStatus> {
        let (responder, status) = Responder::channel();
        self.send(PeripheralEvent::WriteRequest {
            central,
            value,
            responder,
        })
        .await?;
        status.await.map_err(|_| BluetoothError::DriverStopped)
    }

    /// Read the current characteristic value.
    ///
    /// # Errors
    ///
    /// Returns [`BluetoothError::DriverStopped`] if the driver is gone.
    pub async fn read(&self) -> BluetoothResult<Vec<u8>> {
        let (reply, value) = oneshot::channel();
        self.send(PeripheralEvent::ReadRequest { reply }).await?;
        value.await.map_err(|_| BluetoothError::DriverStopped)
    }
}

/// The platform side of the peripheral.
#[async_trait]
pub trait Peripheral: Send {
    /// Register the GATT service.
    async fn add_service(&mut self, service: &ServiceDefinition) -> BluetoothResult<()>;

    /// Start advertising the local name and service UUID.
    async fn start_advertising(&mut self, advertisement: &AdvertisementConfig)
        -> BluetoothResult<()>;

    /// Send a notification with `value` to every subscribed central.
    async fn notify(&mut self, characteristic: Uuid, value: &[u8]) -> BluetoothResult<()>;
}

/// The UI collaborator.
pub trait DisplaySink: Send {
    /// A central subscribed: hide the waiting view, show the data view.
    fn on_subscribed(&mut self);

    /// The visible list may have changed: re-render from `records`.
    fn on_records_updated(&mut self, records: &[Record]);
}

/// Publishes display state on a watch channel.
#[derive(Debug)]
pub struct WatchDisplay {
    tx: watch::Sender<DisplaySnapshot>,
}

impl WatchDisplay {
    /// Create a display and a receiver for its snapshots.
    #[must_use]
    pub fn new() -> (Self, watch::Receiver<DisplaySnapshot>) {
        let (tx, rx) = watch::channel(DisplaySnapshot::default());
        (Self { tx }, rx)
    }
}

impl DisplaySink for WatchDisplay {
    fn on_subscribed(&mut self) {
        self.tx.send_modify(|snapshot| snapshot.view = DisplayView::Data);
    }

    fn on_records_updated(&mut self, records: &[Record]) {
        let records: Vec<DisplayRecord> = records.iter().map(DisplayRecord::from).collect();
        self.tx.send_modify(|snapshot| {
            snapshot.records = records;
            snapshot.updated_at_utc = Some(Utc::now());
        });
    }
}

/// Single owner of the session. Processes events in arrival order.
pub struct SessionDriver<P, D> {
    session: Session,
    peripheral: P,
    display: D,
    status: watch::Sender<SessionStatus>,
    last_batch_len: Option<usize>,
    last_write_status: Option<WriteStatus>,
    writes_handled: u64,
}

impl<P: Peripheral, D: DisplaySink> SessionDriver<P, D> {
    /// Create a driver and a receiver for its status snapshots.
    pub fn new(session: Session, peripheral: P, display: D) -> (Self, watch::Receiver<SessionStatus>) {
        let (status, rx) = watch::channel(SessionStatus::from_session(&session));
        let driver = Self {
            session,
            peripheral,
            display,
            status,
            last_batch_len: None,
            last_write_status: None,
            writes_handled: 0,
        };
        (driver, rx)
    }

    /// The session being driven.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The platform adapter.
    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    /// Process events until every sender is dropped.
    pub async fn run(mut self, mut events: mpsc::Receiver<PeripheralEvent>) {
        info!(
            local_name = %self.session.advertisement().local_name,
            service = %self.session.advertisement().service_uuid,
            "session driver started"
        );
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        info!("event channel closed, session driver stopping");
    }

    /// Process a single event.
    pub async fn handle(&mut self, event: PeripheralEvent) {
        match event {
            PeripheralEvent::RadioStateChanged(state) => self.handle_radio_state(state).await,
            PeripheralEvent::Subscribed(central) => {
                if self.session.on_subscribe(central) {
                    self.display.on_subscribed();
                }
            }
            PeripheralEvent::Unsubscribed(central) => self.session.on_unsubscribe(&central),
            PeripheralEvent::WriteRequest {
                central,
                value,
                responder,
            } => self.handle_write(&central, &value, responder).await,
            PeripheralEvent::ReadRequest { reply } => {
                if reply.send(self.session.on_read_request()).is_err() {
                    debug!("read request dropped before reply");
                }
            }
        }
        self.publish_status();
    }

    async fn handle_radio_state(&mut self, state: RadioState) {
        let Some(service) = self.session.on_radio_state_changed(state) else {
            return;
        };

        if let Err(err) = self.peripheral.add_service(&service).await {
            error!(%err, service = %service.uuid, "service registration failed");
            return;
        }
        let Some(advertisement) = self.session.on_service_added().cloned() else {
            return;
        };

        if let Err(err) = self.peripheral.start_advertising(&advertisement).await {
            error!(%err, "advertising failed");
            return;
        }
        self.session.on_advertising_started();
        info!(local_name = %advertisement.local_name, "advertising");
    }

    async fn handle_write(&mut self, central: &CentralId, value: &[u8], responder: Responder) {
        self.writes_handled += 1;

        let outcome = match self.session.on_write_request(value) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(%central, %err, "invalid write request");
                self.last_write_status = Some(WriteStatus::InvalidRequest);
                if let Err(err) = responder.respond(WriteStatus::InvalidRequest) {
                    debug!(%central, %err, "writer gone");
                }
                return;
            }
        };

        if outcome.is_accepted() {
            info!(
                %central,
                batch_len = outcome.batch_len,
                visible = self.session.visible_records().len(),
                "batch accepted"
            );
        } else {
            info!(%central, batch_len = outcome.batch_len, "batch rejected");
        }
        self.last_batch_len = Some(outcome.batch_len);
        self.last_write_status = Some(outcome.status);

        if let Err(err) = responder.respond(outcome.status) {
            warn!(%central, %err, "write response not delivered");
        }

        if self.session.subscribed_centrals().is_empty() {
            debug!("no subscribers, skipping echo");
        } else {
            let characteristic = self.session.advertisement().characteristic_uuid;
            if let Err(err) = self.peripheral.notify(characteristic, &outcome.echo).await {
                warn!(%err, "echo notification failed");
            }
        }

        self.display.on_records_updated(self.session.visible_records());
    }

    fn publish_status(&self) {
        let mut status = SessionStatus::from_session(&self.session);
        status.last_batch_len = self.last_batch_len;
        status.last_write_status = self.last_write_status;
        status.writes_handled = self.writes_handled;
        self.status.send_replace(status);
    }
}
