//! BlueZ peripheral adapter.
//!
//! Registers the GATT application and advertisement with BlueZ through
//! `bluer`, and turns its callbacks into [`PeripheralEvent`]s for the
//! session driver:
//!
//! - adapter `Powered` property changes become radio state reports
//! - characteristic writes become write requests answered by the driver
//! - each notify session becomes a subscription, ended when BlueZ stops it
//! - characteristic reads are answered with the driver's current value

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bluer::adv::{Advertisement, AdvertisementHandle, Type as AdvertisementType};
use bluer::gatt::local::{
    Application, ApplicationHandle, Characteristic, CharacteristicNotifier, CharacteristicNotify,
    CharacteristicNotifyMethod, CharacteristicRead, CharacteristicReadRequest,
    CharacteristicWrite, CharacteristicWriteMethod, CharacteristicWriteRequest, ReqError, Service,
};
use bluer::{Adapter, AdapterEvent, AdapterProperty};
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::peripheral::{BluetoothError, BluetoothResult, EventSender, Peripheral, PeripheralEvent};
use crate::session::{
    AdvertisementConfig, CentralId, CharacteristicDefinition, RadioState, ServiceDefinition,
    WriteStatus,
};

/// Notifications buffered per notify session before it starts lagging.
const NOTIFY_BUFFER: usize = 16;

/// Map the adapter's powered flag to a radio state.
const fn radio_state(powered: bool) -> RadioState {
    if powered {
        RadioState::PoweredOn
    } else {
        RadioState::PoweredOff
    }
}

/// [`Peripheral`] backed by the default BlueZ adapter.
pub struct BluezPeripheral {
    adapter: Adapter,
    events: EventSender,
    notifications: broadcast::Sender<Vec<u8>>,
    next_session: Arc<AtomicU64>,
    app_handle: Option<ApplicationHandle>,
    adv_handle: Option<AdvertisementHandle>,
}

impl BluezPeripheral {
    /// Connect to BlueZ and pick the default adapter.
    ///
    /// With `power_on` set the adapter is switched on if it is off. Otherwise
    /// the session waits for someone else to power it.
    ///
    /// # Errors
    ///
    /// Returns an error if BlueZ is unreachable or no adapter exists.
    pub async fn new(events: EventSender, power_on: bool) -> BluetoothResult<Self> {
        let session = bluer::Session::new()
            .await
            .map_err(|e| BluetoothError::SessionInitFailed {
                message: e.to_string(),
            })?;
        let adapter = session
            .default_adapter()
            .await
            .map_err(|_| BluetoothError::AdapterNotFound)?;
        info!(adapter = adapter.name(), "using Bluetooth adapter");

        if power_on {
            adapter
                .set_powered(true)
                .await
                .map_err(|e| BluetoothError::Internal {
                    message: e.to_string(),
                })?;
        }

        let (notifications, _) = broadcast::channel(NOTIFY_BUFFER);
        Ok(Self {
            adapter,
            events,
            notifications,
            next_session: Arc::new(AtomicU64::new(1)),
            app_handle: None,
            adv_handle: None,
        })
    }

    /// Report the current radio state, then every change to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter cannot be queried.
    pub async fn watch_radio(&self) -> BluetoothResult<JoinHandle<()>> {
        let powered = self
            .adapter
            .is_powered()
            .await
            .map_err(|e| BluetoothError::Internal {
                message: e.to_string(),
            })?;
        let stream = self
            .adapter
            .events()
            .await
            .map_err(|e| BluetoothError::Internal {
                message: e.to_string(),
            })?;

        let events = self.events.clone();
        events
            .send(PeripheralEvent::RadioStateChanged(radio_state(powered)))
            .await?;

        let mut stream = Box::pin(stream);
        Ok(tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                if let AdapterEvent::PropertyChanged(AdapterProperty::Powered(powered)) = event {
                    let report = PeripheralEvent::RadioStateChanged(radio_state(powered));
                    if events.send(report).await.is_err() {
                        break;
                    }
                }
            }
            debug!("adapter event stream ended");
        }))
    }

    fn characteristic(&self, definition: &CharacteristicDefinition) -> Characteristic {
        let properties = definition.properties;
        let permissions = definition.permissions;
        Characteristic {
            uuid: definition.uuid,
            read: (properties.read && permissions.readable).then(|| self.read_handler()),
            write: (properties.write && permissions.writable).then(|| self.write_handler()),
            notify: properties.notify.then(|| self.notify_handler()),
            ..Default::default()
        }
    }

    fn read_handler(&self) -> CharacteristicRead {
        let events = self.events.clone();
        CharacteristicRead {
            read: true,
            fun: Box::new(move |_req: CharacteristicReadRequest| {
                let events = events.clone();
                Box::pin(async move { events.read().await.map_err(|_| ReqError::Failed) })
            }),
            ..Default::default()
        }
    }

    fn write_handler(&self) -> CharacteristicWrite {
        let events = self.events.clone();
        CharacteristicWrite {
            write: true,
            method: CharacteristicWriteMethod::Fun(Box::new(
                move |value: Vec<u8>, req: CharacteristicWriteRequest| {
                    let events = events.clone();
                    Box::pin(async move {
                        let central = CentralId::new(req.device_address.to_string());
                        debug!(
                            %central,
                            len = value.len(),
                            offset = req.offset,
                            mtu = req.mtu,
                            "write received"
                        );
                        check_offset(req.offset)?;
                        write_reply(events.write(central, value).await.ok())
                    })
                },
            )),
            ..Default::default()
        }
    }

    fn notify_handler(&self) -> CharacteristicNotify {
        let events = self.events.clone();
        let notifications = self.notifications.clone();
        let next_session = Arc::clone(&self.next_session);
        CharacteristicNotify {
            notify: true,
            method: CharacteristicNotifyMethod::Fun(Box::new(move |notifier| {
                let id = next_session.fetch_add(1, Ordering::Relaxed);
                let central = CentralId::new(format!("notify-session-{id}"));
                Box::pin(forward_notifications(
                    notifier,
                    notifications.subscribe(),
                    events.clone(),
                    central,
                ))
            })),
            ..Default::default()
        }
    }
}

/// Only whole-value writes are decoded; a payload split over a long or
/// prepared write would otherwise be read from its tail alone.
fn check_offset(offset: u16) -> Result<(), ReqError> {
    if offset == 0 {
        Ok(())
    } else {
        warn!(offset, "write at non-zero offset refused");
        Err(ReqError::InvalidOffset)
    }
}

/// Map the driver's answer to the ATT reply. `None` means the driver is gone.
fn write_reply(status: Option<WriteStatus>) -> Result<(), ReqError> {
    match status {
        Some(WriteStatus::Success) => Ok(()),
        Some(WriteStatus::RequestNotSupported) => Err(ReqError::NotSupported),
        Some(WriteStatus::InvalidRequest) | None => Err(ReqError::Failed),
    }
}

/// Run one notify session: report the subscription, forward every
/// notification until BlueZ stops the session, then report it gone.
async fn forward_notifications(
    mut notifier: CharacteristicNotifier,
    mut updates: broadcast::Receiver<Vec<u8>>,
    events: EventSender,
    central: CentralId,
) {
    if events
        .send(PeripheralEvent::Subscribed(central.clone()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        let update = tokio::select! {
            () = notifier.stopped() => break,
            update = updates.recv() => update,
        };
        match update {
            Ok(value) => {
                if let Err(err) = notifier.notify(value).await {
                    debug!(%central, %err, "notify session closed");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(%central, skipped, "notify session lagging, dropped notifications");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    // The driver may already be gone during shutdown.
    let _ = events.send(PeripheralEvent::Unsubscribed(central)).await;
}

#[async_trait]
impl Peripheral for BluezPeripheral {
    async fn add_service(&mut self, service: &ServiceDefinition) -> BluetoothResult<()> {
        // Dropping the handle unregisters any previous application.
        self.app_handle = None;

        let application = Application {
            services: vec![Service {
                uuid: service.uuid,
                primary: service.primary,
                characteristics: service
                    .characteristics
                    .iter()
                    .map(|c| self.characteristic(c))
                    .collect(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let handle = self
            .adapter
            .serve_gatt_application(application)
            .await
            .map_err(|e| BluetoothError::ServiceRegistrationFailed {
                message: e.to_string(),
            })?;
        self.app_handle = Some(handle);
        info!(service = %service.uuid, "GATT service registered");
        Ok(())
    }

    async fn start_advertising(
        &mut self,
        advertisement: &AdvertisementConfig,
    ) -> BluetoothResult<()> {
        self.adv_handle = None;

        let data = Advertisement {
            advertisement_type: AdvertisementType::Peripheral,
            service_uuids: BTreeSet::from([advertisement.service_uuid]),
            local_name: Some(advertisement.local_name.clone()),
            discoverable: Some(true),
            ..Default::default()
        };

        let handle = self
            .adapter
            .advertise(data)
            .await
            .map_err(|e| BluetoothError::AdvertisingFailed {
                message: e.to_string(),
            })?;
        self.adv_handle = Some(handle);
        Ok(())
    }

    async fn notify(&mut self, characteristic: Uuid, value: &[u8]) -> BluetoothResult<()> {
        match self.notifications.send(value.to_vec()) {
            Ok(sessions) => debug!(%characteristic, sessions, "notification queued"),
            Err(_) => debug!(%characteristic, "no notify sessions, notification dropped"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_powered_flag_maps_to_radio_state() {
        assert_eq!(radio_state(true), RadioState::PoweredOn);
        assert_eq!(radio_state(false), RadioState::PoweredOff);
    }

    #[test]
    fn test_offset_writes_are_refused() {
        assert!(check_offset(0).is_ok());
        assert!(matches!(check_offset(1), Err(ReqError::InvalidOffset)));
        assert!(matches!(check_offset(512), Err(ReqError::InvalidOffset)));
    }

    #[test]
    fn test_write_status_maps_to_att_reply() {
        assert!(write_reply(Some(WriteStatus::Success)).is_ok());
        assert!(matches!(
            write_reply(Some(WriteStatus::RequestNotSupported)),
            Err(ReqError::NotSupported)
        ));
        assert!(matches!(
            write_reply(Some(WriteStatus::InvalidRequest)),
            Err(ReqError::Failed)
        ));
        assert!(matches!(write_reply(None), Err(ReqError::Failed)));
    }
}
