//! Communication and hardware fault monitor.
//!
//! Every bulk read outcome passes through `FaultMonitor`:
//! - transport failure → `CommError`, no hardware inspection that cycle
//! - successful read → each transmission's Hardware Error Status is matched
//!   against the configured cause table; any match forces `HardwareError`
//!
//! Degraded states are latched. Only a successful reboot recovery returns
//! the status to `Ok` (see `FaultMonitor::clear`).

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use evo_servo_common::config::HardwareErrorCause;
use evo_servo_common::consts::MAX_HARDWARE_ERROR_CAUSES;
use evo_servo_common::error::LinkError;
use evo_servo_common::types::{
    ActuatorId, CommStatus, HW_STATE_COMM_ERROR, HW_STATE_HARDWARE_ERROR, HW_STATE_OK,
};
use heapless::Vec as CauseList;
use tracing::{error, info, warn};

/// Outcome of one cycle's fault check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Status after this cycle
    pub status: CommStatus,
    /// Code mirrored into joint `hardware_state` slots
    pub hardware_state: u16,
}

#[derive(Debug, Default)]
struct Health {
    status: CommStatus,
    bits: BTreeMap<ActuatorId, u8>,
    last_code: u16,
    consecutive_failures: u64,
}

/// Tracks `CommStatus` and the per-actuator hardware error bits.
#[derive(Debug)]
pub struct FaultMonitor {
    causes: Vec<HardwareErrorCause>,
    health: Mutex<Health>,
}

impl FaultMonitor {
    /// Create a monitor with the given cause table.
    ///
    /// Causes beyond `MAX_HARDWARE_ERROR_CAUSES` are ignored.
    pub fn new(causes: &[HardwareErrorCause]) -> Self {
        let causes: Vec<HardwareErrorCause> = causes
            .iter()
            .take(MAX_HARDWARE_ERROR_CAUSES)
            .cloned()
            .collect();
        Self {
            causes,
            health: Mutex::new(Health::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Health> {
        self.health.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current status.
    pub fn status(&self) -> CommStatus {
        self.lock().status
    }

    /// Latest hardware error register of every inspected actuator.
    pub fn hardware_bits(&self) -> BTreeMap<ActuatorId, u8> {
        self.lock().bits.clone()
    }

    /// Latest hardware error register of one actuator.
    pub fn bits_of(&self, id: ActuatorId) -> u8 {
        self.lock().bits.get(&id).copied().unwrap_or(0)
    }

    /// Code of the most recent classification.
    pub fn last_hardware_state(&self) -> u16 {
        self.lock().last_code
    }

    /// Indices into the cause table matched by `bits`.
    pub fn matching_causes(&self, bits: u8) -> CauseList<usize, MAX_HARDWARE_ERROR_CAUSES> {
        let mut matched = CauseList::new();
        for (idx, cause) in self.causes.iter().enumerate() {
            if bits & cause.mask != 0 {
                // Capacity equals the cause table bound
                let _ = matched.push(idx);
            }
        }
        matched
    }

    fn describe(&self, matched: &[usize]) -> String {
        matched
            .iter()
            .map(|&idx| self.causes[idx].cause.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Record a transport failure of the bulk read.
    pub fn record_transport_failure(&self, err: &LinkError) -> Classification {
        let mut health = self.lock();
        if health.status != CommStatus::Rebooting {
            health.status = CommStatus::CommError;
        }
        health.last_code = HW_STATE_COMM_ERROR;
        health.consecutive_failures += 1;
        let n = health.consecutive_failures;
        if n <= 10 || n % 1000 == 0 {
            error!("Communication failure #{}: {}", n, err);
        }
        Classification {
            status: health.status,
            hardware_state: HW_STATE_COMM_ERROR,
        }
    }

    /// Classify the Hardware Error Status of every transmission after a
    /// successful bulk read.
    pub fn classify<I>(&self, readings: I) -> Classification
    where
        I: IntoIterator<Item = (ActuatorId, u8)>,
    {
        let mut health = self.lock();
        health.consecutive_failures = 0;
        let mut faulted = false;
        for (id, bits) in readings {
            let matched = self.matching_causes(bits);
            if !matched.is_empty() {
                faulted = true;
                warn!(
                    id = id.get(),
                    bits = bits,
                    causes = %self.describe(&matched),
                    "Hardware error status"
                );
            }
            health.bits.insert(id, bits);
        }

        let code = if faulted {
            if health.status != CommStatus::Rebooting {
                health.status = CommStatus::HardwareError;
            }
            HW_STATE_HARDWARE_ERROR
        } else {
            HW_STATE_OK
        };
        health.last_code = code;
        Classification {
            status: health.status,
            hardware_state: code,
        }
    }

    /// Enter reboot recovery.
    pub fn begin_reboot(&self) {
        self.lock().status = CommStatus::Rebooting;
        info!("Communication reset started");
    }

    /// Leave reboot recovery after success: status `Ok`, bits cleared.
    pub fn clear(&self) {
        let mut health = self.lock();
        health.status = CommStatus::Ok;
        health.bits.values_mut().for_each(|b| *b = 0);
        health.last_code = HW_STATE_OK;
    }

    /// Leave reboot recovery after the window expired.
    pub fn fail_open(&self) {
        let mut health = self.lock();
        health.status = CommStatus::CommError;
        health.last_code = HW_STATE_COMM_ERROR;
    }

    /// Human-readable causes of an actuator's latest error bits.
    pub fn causes_of(&self, id: ActuatorId) -> String {
        let bits = self.bits_of(id);
        self.describe(&self.matching_causes(bits))
    }
}
