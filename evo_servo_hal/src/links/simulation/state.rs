//! Shared state of the simulated bus and its fault-injection handle.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use evo_servo_common::consts::{ITEM_HARDWARE_ERROR_STATUS, ITEM_TORQUE_ENABLE};
use evo_servo_common::types::{ActuatorId, RegisterValue};

use super::control_table::CONTROL_TABLE;

/// Number of single-register writes kept in the write log.
pub const WRITE_LOG_CAPACITY: usize = 256;

/// Number of calls the simulated link received, per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimCounters {
    /// `open()` calls, successful or not
    pub opens: u32,
    /// `bulk_read()` calls
    pub bulk_reads: u64,
    /// `bulk_write()` calls
    pub bulk_writes: u64,
    /// `enable()` calls
    pub enables: u32,
    /// `disable()` calls
    pub disables: u32,
    /// `reboot()` calls
    pub reboots: u32,
    /// `reset_link()` calls
    pub resets: u32,
    /// `read_register()` calls
    pub register_reads: u64,
    /// `write_register()` calls
    pub register_writes: u64,
}

/// One actuator on the simulated bus.
#[derive(Debug, Clone)]
pub(super) struct SimActuator {
    pub registers: BTreeMap<String, f64>,
    pub torque: bool,
    pub read_set: Vec<String>,
    pub write_set: Vec<String>,
}

impl SimActuator {
    pub(super) fn power_up(id: ActuatorId) -> Self {
        let mut registers: BTreeMap<String, f64> = CONTROL_TABLE
            .iter()
            .map(|(name, value)| ((*name).to_string(), *value))
            .collect();
        registers.insert("ID".to_string(), f64::from(id.get()));
        Self {
            registers,
            torque: false,
            read_set: Vec::new(),
            write_set: Vec::new(),
        }
    }

    pub(super) fn set_torque(&mut self, on: bool) {
        self.torque = on;
        self.registers
            .insert(ITEM_TORQUE_ENABLE.to_string(), if on { 1.0 } else { 0.0 });
    }
}

#[derive(Debug, Default)]
pub(super) struct SimState {
    pub opened: bool,
    pub actuators: BTreeMap<ActuatorId, SimActuator>,
    pub counters: SimCounters,
    pub write_log: VecDeque<(ActuatorId, String, RegisterValue)>,
    pub torque_refused: BTreeSet<ActuatorId>,
    pub fail_open_remaining: u32,
    pub fail_bulk_read: bool,
    pub fail_bulk_write: bool,
    pub reboot_fail_until: Option<Instant>,
    pub reboot_always_fails: bool,
}

/// Test and demo handle onto the simulated bus.
///
/// Cloned handles share state with the link they were taken from.
#[derive(Debug, Clone, Default)]
pub struct SimHandle {
    pub(super) state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    pub(super) fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the next `count` `open()` calls fail.
    pub fn fail_next_opens(&self, count: u32) {
        self.lock().fail_open_remaining = count;
    }

    /// Make every `bulk_read()` fail at the transport level.
    pub fn set_bulk_read_failure(&self, fail: bool) {
        self.lock().fail_bulk_read = fail;
    }

    /// Make every `bulk_write()` fail at the transport level.
    pub fn set_bulk_write_failure(&self, fail: bool) {
        self.lock().fail_bulk_write = fail;
    }

    /// Reject `reboot()` until the link clock reaches `until`.
    pub fn fail_reboots_until(&self, until: Instant) {
        self.lock().reboot_fail_until = Some(until);
    }

    /// Reject every `reboot()`.
    pub fn set_reboot_always_fails(&self, fail: bool) {
        self.lock().reboot_always_fails = fail;
    }

    /// Raise hardware error bits on one actuator.
    pub fn set_hardware_error(&self, id: ActuatorId, bits: u8) {
        self.set_register(id, ITEM_HARDWARE_ERROR_STATUS, f64::from(bits));
    }

    /// Switch torque on one actuator, bypassing the bus.
    pub fn set_torque(&self, id: ActuatorId, on: bool) {
        if let Some(actuator) = self.lock().actuators.get_mut(&id) {
            actuator.set_torque(on);
        }
    }

    /// Make `enable()` leave torque off on one actuator.
    pub fn set_torque_refused(&self, id: ActuatorId, refuse: bool) {
        let mut state = self.lock();
        if refuse {
            state.torque_refused.insert(id);
        } else {
            state.torque_refused.remove(&id);
        }
    }

    /// Overwrite a register, bypassing the bus.
    pub fn set_register(&self, id: ActuatorId, item: &str, value: f64) {
        let mut state = self.lock();
        let actuator = state
            .actuators
            .entry(id)
            .or_insert_with(|| SimActuator::power_up(id));
        actuator.registers.insert(item.to_string(), value);
    }

    /// Current register content.
    pub fn register(&self, id: ActuatorId, item: &str) -> Option<f64> {
        self.lock()
            .actuators
            .get(&id)
            .and_then(|a| a.registers.get(item).copied())
    }

    /// Torque flag of one actuator.
    pub fn torque(&self, id: ActuatorId) -> Option<bool> {
        self.lock().actuators.get(&id).map(|a| a.torque)
    }

    /// Registers read for `id` on every bulk read.
    pub fn read_set(&self, id: ActuatorId) -> Vec<String> {
        self.lock()
            .actuators
            .get(&id)
            .map(|a| a.read_set.clone())
            .unwrap_or_default()
    }

    /// Call counters.
    pub fn counters(&self) -> SimCounters {
        self.lock().counters
    }

    /// The last `WRITE_LOG_CAPACITY` single-register writes, oldest first.
    pub fn write_log(&self) -> Vec<(ActuatorId, String, RegisterValue)> {
        self.lock().write_log.iter().cloned().collect()
    }

    /// Forget logged writes.
    pub fn clear_write_log(&self) {
        self.lock().write_log.clear();
    }
}
