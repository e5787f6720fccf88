//! In-memory peripheral for development and tests.
//!
//! Records what the driver asked the platform to do. Clones share state, so
//! a handle kept outside the driver can inspect it afterwards.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::peripheral::{BluetoothError, BluetoothResult, Peripheral};
use crate::session::{AdvertisementConfig, ServiceDefinition};

#[derive(Debug, Default)]
struct MemoryState {
    services: Vec<ServiceDefinition>,
    advertisements: Vec<AdvertisementConfig>,
    notifications: Vec<(Uuid, Vec<u8>)>,
    fail_add_service: bool,
    fail_advertising: bool,
}

/// A [`Peripheral`] that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPeripheral {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPeripheral {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make service registration fail.
    pub fn fail_add_service(&self, fail: bool) {
        self.state().fail_add_service = fail;
    }

    /// Make advertising fail.
    pub fn fail_advertising(&self, fail: bool) {
        self.state().fail_advertising = fail;
    }

    /// Services registered so far.
    #[must_use]
    pub fn services(&self) -> Vec<ServiceDefinition> {
        self.state().services.clone()
    }

    /// Advertisements started so far.
    #[must_use]
    pub fn advertisements(&self) -> Vec<AdvertisementConfig> {
        self.state().advertisements.clone()
    }

    /// Notifications sent so far, oldest first.
    #[must_use]
    pub fn notifications(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.state().notifications.clone()
    }
}

#[async_trait]
impl Peripheral for MemoryPeripheral {
    async fn add_service(&mut self, service: &ServiceDefinition) -> BluetoothResult<()> {
        let mut state = self.state();
        if state.fail_add_service {
            return Err(BluetoothError::ServiceRegistrationFailed {
                message: "injected failure".to_string(),
            });
        }
        debug!(service = %service.uuid, "memory peripheral: service added");
        state.services.push(service.clone());
        Ok(())
    }

    async fn start_advertising(
        &mut self,
        advertisement: &AdvertisementConfig,
    ) -> BluetoothResult<()> {
        let mut state = self.state();
        if state.fail_advertising {
            return Err(BluetoothError::AdvertisingFailed {
                message: "injected failure".to_string(),
            });
        }
        debug!(local_name = %advertisement.local_name, "memory peripheral: advertising");
        state.advertisements.push(advertisement.clone());
        Ok(())
    }

    async fn notify(&mut self, characteristic: Uuid, value: &[u8]) -> BluetoothResult<()> {
        self.state()
            .notifications
            .push((characteristic, value.to_vec()));
        Ok(())
    }
}
