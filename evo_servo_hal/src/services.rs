//! Service handle for out-of-band callers.
//!
//! `ServoServices` is cheap to clone and safe to use from any thread. Each
//! call blocks only its caller, with an explicit timeout; the control
//! cycle is never waited on while holding its lock.

use std::sync::Arc;
use std::time::Duration;

use evo_servo_common::types::{ActuatorId, CommStatus, RegisterValue, StateSnapshot};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::Shared;
use crate::torque::TorqueResponse;

/// Reply to `get_item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ItemResponse {
    /// Register value, zero on failure
    pub value: RegisterValue,
    /// Whether the value was read
    pub success: bool,
}

/// Reply to `set_item` and `reboot_actuators`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceResult {
    /// Whether the request was accepted or completed
    pub success: bool,
}

/// Cloneable handle to the running HAL.
#[derive(Clone)]
pub struct ServoServices {
    shared: Arc<Shared>,
}

static_assertions::assert_impl_all!(ServoServices: Send, Sync, Clone);

impl ServoServices {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Read one register through the next control cycles.
    ///
    /// A `timeout_sec` of zero (or less) waits the configured item timeout.
    pub fn get_item(&self, id: u8, item: &str, timeout_sec: f64) -> ItemResponse {
        let timeout = Duration::try_from_secs_f64(timeout_sec)
            .ok()
            .filter(|t| !t.is_zero())
            .unwrap_or_else(|| self.shared.config.item_timeout());

        let result = self
            .shared
            .items
            .enqueue_read(ActuatorId(id), item)
            .and_then(|handle| self.shared.items.wait(&handle, timeout));
        match result {
            Ok(value) => ItemResponse {
                value,
                success: true,
            },
            Err(e) => {
                warn!("GetItem failed: {}", e);
                ItemResponse {
                    value: 0,
                    success: false,
                }
            }
        }
    }

    /// Queue one register write. Success means the request was accepted.
    pub fn set_item(&self, id: u8, item: &str, value: RegisterValue) -> ServiceResult {
        match self.shared.items.enqueue_write(ActuatorId(id), item, value) {
            Ok(()) => ServiceResult { success: true },
            Err(e) => {
                warn!("SetItem failed: {}", e);
                ServiceResult { success: false }
            }
        }
    }

    /// Reboot every transmission. Blocks until recovery ends.
    pub fn reboot_actuators(&self) -> ServiceResult {
        info!("Reboot requested");
        match self.shared.reboot_actuators() {
            Ok(()) => ServiceResult { success: true },
            Err(e) => {
                warn!("Reboot failed: {}", e);
                ServiceResult { success: false }
            }
        }
    }

    /// Request torque on or off and wait for the cycle to apply it.
    pub fn set_torque(&self, enable: bool) -> TorqueResponse {
        self.shared.torque.request(enable)
    }

    /// Current communication status.
    pub fn comm_status(&self) -> CommStatus {
        self.shared.faults.status()
    }

    /// State broadcast payload.
    pub fn snapshot(&self) -> StateSnapshot {
        self.shared.snapshot()
    }

    /// Publish period from the configuration.
    pub fn state_publish_period(&self) -> Duration {
        self.shared.config.state_publish_period()
    }
}
