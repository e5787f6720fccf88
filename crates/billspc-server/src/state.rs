//! Application state shared across handlers.

use std::sync::Arc;

use billspc_core::{DisplaySnapshot, EventSender, PcConfig, SessionStatus};
use tokio::sync::watch;

/// Shared state handle passed to every handler.
pub type SharedState = Arc<AppState>;

/// Read-side views of the running session plus the event channel into it.
///
/// Handlers never touch the session directly; the driver task owns it.
#[derive(Debug)]
pub struct AppState {
    /// Configuration the server started with.
    pub config: PcConfig,

    /// Latest display snapshot published by the driver.
    pub display: watch::Receiver<DisplaySnapshot>,

    /// Latest session status published by the driver.
    pub status: watch::Receiver<SessionStatus>,

    /// Channel into the driver.
    pub events: EventSender,
}

impl AppState {
    /// Wrap the driver handles for sharing.
    #[must_use]
    pub fn new(
        config: PcConfig,
        display: watch::Receiver<DisplaySnapshot>,
        status: watch::Receiver<SessionStatus>,
        events: EventSender,
    ) -> SharedState {
        Arc::new(Self {
            config,
            display,
            status,
            events,
        })
    }

    /// Clone of the current display snapshot.
    #[must_use]
    pub fn display(&self) -> DisplaySnapshot {
        self.display.borrow().clone()
    }

    /// Clone of the current session status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }
}
