//! Session start-up: picks the platform adapter and spawns the driver.
//!
//! With the `bluetooth` feature (and without `mock-bluetooth`) the session
//! runs on BlueZ and the adapter's power state drives it. Otherwise it runs
//! on [`MemoryPeripheral`] and events arrive through the mock routes.

use billspc_core::{EventSender, PcConfig, PeripheralEvent, Session, SessionDriver, WatchDisplay};
#[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
use billspc_core::MemoryPeripheral;
#[cfg(all(feature = "bluetooth", not(feature = "mock-bluetooth")))]
use billspc_core::BluezPeripheral;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::state::{AppState, SharedState};

/// A running session and the handles the server keeps.
#[derive(Debug)]
pub struct Runtime {
    /// State for the HTTP handlers.
    pub state: SharedState,

    /// The driver task. Ends once every event sender is dropped.
    pub driver: JoinHandle<()>,

    /// Adapter watcher feeding radio state changes, if any.
    pub radio: Option<JoinHandle<()>>,
}

/// Start the session on the in-memory peripheral.
///
/// # Errors
///
/// Never fails; the signature matches the BlueZ variant.
#[cfg(any(feature = "mock-bluetooth", not(feature = "bluetooth")))]
#[allow(clippy::unused_async)]
pub async fn start(config: PcConfig) -> anyhow::Result<Runtime> {
    let (events, rx) = EventSender::channel();
    info!("using in-memory peripheral, drive it through /api/mock");
    Ok(spawn(config, MemoryPeripheral::default(), events, rx, None))
}

/// Start the session on the default BlueZ adapter.
///
/// # Errors
///
/// Returns an error if BlueZ or the adapter is unavailable.
#[cfg(all(feature = "bluetooth", not(feature = "mock-bluetooth")))]
pub async fn start(config: PcConfig) -> anyhow::Result<Runtime> {
    let (events, rx) = EventSender::channel();
    let peripheral =
        BluezPeripheral::new(events.clone(), config.peripheral.power_on_adapter).await?;
    let radio = peripheral.watch_radio().await?;
    info!("using BlueZ peripheral");
    Ok(spawn(config, peripheral, events, rx, Some(radio)))
}

fn spawn<P>(
    config: PcConfig,
    peripheral: P,
    events: EventSender,
    rx: mpsc::Receiver<PeripheralEvent>,
    radio: Option<JoinHandle<()>>,
) -> Runtime
where
    P: billspc_core::Peripheral + 'static,
{
    let session = Session::new(config.advertisement());
    let (display, display_rx) = WatchDisplay::new();
    let (driver, status_rx) = SessionDriver::new(session, peripheral, display);
    let driver = tokio::spawn(driver.run(rx));

    Runtime {
        state: AppState::new(config, display_rx, status_rx, events),
        driver,
        radio,
    }
}

#[cfg(all(test, any(feature = "mock-bluetooth", not(feature = "bluetooth"))))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_publishes_idle_status() {
        let runtime = start(PcConfig::default()).await.unwrap();
        let status = runtime.state.status();
        assert_eq!(status.phase, "idle");
        assert_eq!(status.local_name, "Bill's PC");
        assert!(runtime.radio.is_none());
    }
}
