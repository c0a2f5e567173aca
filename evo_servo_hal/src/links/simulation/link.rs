//! Simulated actuator link.
//!
//! The `SimulatedLink` implements the `ActuatorLink` trait over an
//! in-memory control table per actuator. Goal registers written while
//! torque is on are mirrored into their present registers, so a command
//! written in one cycle is read back in the next.

use std::collections::BTreeMap;
use std::sync::Arc;

use evo_servo_common::consts::{ITEM_HARDWARE_ERROR_STATUS, ITEM_TORQUE_ENABLE};
use evo_servo_common::error::LinkError;
use evo_servo_common::link::{ActuatorLink, LinkSettings};
use evo_servo_common::types::{ActuatorId, BulkFrame, RegisterValue};
use tracing::{debug, info, warn};

use super::control_table::{follower_of, CONTROL_TABLE};
use super::state::{SimActuator, SimHandle, SimState, WRITE_LOG_CAPACITY};
use crate::clock::{Clock, MonotonicClock};

/// Simulated bus implementing the `ActuatorLink` trait.
pub struct SimulatedLink {
    handle: SimHandle,
    clock: Arc<dyn Clock>,
}

impl SimulatedLink {
    /// Create a simulated bus on the monotonic clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock))
    }

    /// Create a simulated bus whose reboot failures follow `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            handle: SimHandle::default(),
            clock,
        }
    }

    /// Fault-injection and inspection handle.
    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }
}

impl Default for SimulatedLink {
    fn default() -> Self {
        Self::new()
    }
}

fn actuator(state: &mut SimState, id: ActuatorId) -> Result<&mut SimActuator, LinkError> {
    if !state.opened {
        return Err(LinkError::OpenPortFailed("port not open".to_string()));
    }
    state
        .actuators
        .get_mut(&id)
        .ok_or_else(|| LinkError::OpenPortFailed(format!("no status packet from ID {id}")))
}

fn check_items(actuator: &SimActuator, items: &[String]) -> bool {
    items.iter().all(|item| actuator.registers.contains_key(item))
}

/// Store a register write, letting the matching present register follow.
fn store(actuator: &mut SimActuator, item: &str, value: f64) {
    actuator.registers.insert(item.to_string(), value);
    if item == ITEM_TORQUE_ENABLE {
        actuator.torque = value != 0.0;
    }
    if !actuator.torque {
        return;
    }
    if let Some(present) = follower_of(item) {
        actuator.registers.insert(present.to_string(), value);
    }
}

impl ActuatorLink for SimulatedLink {
    fn name(&self) -> &'static str {
        super::LINK_NAME
    }

    fn open(&mut self, settings: &LinkSettings, ids: &[ActuatorId]) -> Result<(), LinkError> {
        let mut state = self.handle.lock();
        state.counters.opens += 1;
        if state.fail_open_remaining > 0 {
            state.fail_open_remaining -= 1;
            return Err(LinkError::OpenPortFailed(format!(
                "{}: device busy",
                settings.port_name
            )));
        }

        for &id in ids {
            state
                .actuators
                .entry(id)
                .or_insert_with(|| SimActuator::power_up(id));
        }
        state.opened = true;
        info!(
            "Simulated bus opened on {} at {} baud with {} actuators",
            settings.port_name,
            settings.baud_rate,
            ids.len()
        );
        Ok(())
    }

    fn control_items(&self, id: ActuatorId) -> Vec<String> {
        let state = self.handle.lock();
        match state.actuators.get(&id) {
            Some(actuator) => actuator.registers.keys().cloned().collect(),
            None => CONTROL_TABLE.iter().map(|(name, _)| (*name).to_string()).collect(),
        }
    }

    fn register_read_set(&mut self, id: ActuatorId, items: &[String]) -> Result<(), LinkError> {
        let mut state = self.handle.lock();
        let actuator = actuator(&mut state, id).map_err(|_| LinkError::SetReadItemFailed(id))?;
        if !check_items(actuator, items) {
            return Err(LinkError::SetReadItemFailed(id));
        }
        actuator.read_set = items.to_vec();
        Ok(())
    }

    fn register_write_set(&mut self, id: ActuatorId, items: &[String]) -> Result<(), LinkError> {
        let mut state = self.handle.lock();
        let actuator = actuator(&mut state, id).map_err(|_| LinkError::SetWriteItemFailed(id))?;
        if !check_items(actuator, items) {
            return Err(LinkError::SetWriteItemFailed(id));
        }
        actuator.write_set = items.to_vec();
        Ok(())
    }

    fn reset_link(&mut self) {
        let mut state = self.handle.lock();
        state.counters.resets += 1;
        for actuator in state.actuators.values_mut() {
            actuator.read_set.clear();
            actuator.write_set.clear();
        }
    }

    fn bulk_read(&mut self, frame: &mut BulkFrame) -> Result<(), LinkError> {
        let mut state = self.handle.lock();
        state.counters.bulk_reads += 1;
        if state.fail_bulk_read {
            return Err(LinkError::BulkReadFailed("[TxRxResult] There is no status packet!".to_string()));
        }
        if !state.opened {
            return Err(LinkError::BulkReadFailed("port not open".to_string()));
        }

        for entry in &mut frame.entries {
            let actuator = state
                .actuators
                .get(&entry.id)
                .ok_or_else(|| LinkError::BulkReadFailed(format!("ID {} not on bus", entry.id)))?;
            for (item, value) in entry.items.iter().zip(entry.values.iter_mut()) {
                *value = actuator.registers.get(item).copied().unwrap_or(0.0);
            }
        }
        Ok(())
    }

    fn bulk_write(&mut self, frame: &BulkFrame) -> Result<(), LinkError> {
        let mut state = self.handle.lock();
        state.counters.bulk_writes += 1;
        if state.fail_bulk_write {
            return Err(LinkError::BulkWriteFailed("[TxRxResult] Port is in use!".to_string()));
        }
        if !state.opened {
            return Err(LinkError::BulkWriteFailed("port not open".to_string()));
        }

        for entry in &frame.entries {
            let Some(actuator) = state.actuators.get_mut(&entry.id) else {
                return Err(LinkError::BulkWriteFailed(format!("ID {} not on bus", entry.id)));
            };
            for (item, value) in entry.items.iter().zip(&entry.values) {
                store(actuator, item, *value);
            }
        }
        Ok(())
    }

    fn enable(&mut self, ids: &[ActuatorId]) -> Result<(), LinkError> {
        let mut state = self.handle.lock();
        state.counters.enables += 1;
        for &id in ids {
            let refused = state.torque_refused.contains(&id);
            let actuator = actuator(&mut state, id).map_err(|_| LinkError::ItemWriteFailed(id))?;
            if refused {
                warn!("Simulated ID {} refused torque enable", id);
                continue;
            }
            actuator.set_torque(true);
        }
        debug!("Torque enabled on {:?}", ids);
        Ok(())
    }

    fn disable(&mut self, ids: &[ActuatorId]) -> Result<(), LinkError> {
        let mut state = self.handle.lock();
        state.counters.disables += 1;
        for &id in ids {
            let actuator = actuator(&mut state, id).map_err(|_| LinkError::ItemWriteFailed(id))?;
            actuator.set_torque(false);
        }
        debug!("Torque disabled on {:?}", ids);
        Ok(())
    }

    fn reboot(&mut self, id: ActuatorId) -> Result<(), LinkError> {
        let now = self.clock.now();
        let mut state = self.handle.lock();
        state.counters.reboots += 1;

        let refused = state.reboot_always_fails
            || state.reboot_fail_until.is_some_and(|until| now < until);
        if refused {
            warn!("Simulated reboot of ID {} refused", id);
            return Err(LinkError::RebootFailed(id));
        }

        let actuator = actuator(&mut state, id).map_err(|_| LinkError::RebootFailed(id))?;
        actuator
            .registers
            .insert(ITEM_HARDWARE_ERROR_STATUS.to_string(), 0.0);
        actuator.set_torque(false);
        Ok(())
    }

    fn read_register(&mut self, id: ActuatorId, item: &str) -> Result<RegisterValue, LinkError> {
        let mut state = self.handle.lock();
        state.counters.register_reads += 1;
        let actuator = actuator(&mut state, id).map_err(|_| LinkError::ItemReadFailed(id))?;
        actuator
            .registers
            .get(item)
            .map(|v| *v as RegisterValue)
            .ok_or_else(|| LinkError::ControlItemNotFound {
                id,
                item: item.to_string(),
            })
    }

    fn write_register(
        &mut self,
        id: ActuatorId,
        item: &str,
        value: RegisterValue,
    ) -> Result<(), LinkError> {
        let mut state = self.handle.lock();
        state.counters.register_writes += 1;
        let actuator = actuator(&mut state, id).map_err(|_| LinkError::ItemWriteFailed(id))?;
        if !actuator.registers.contains_key(item) {
            return Err(LinkError::ControlItemNotFound {
                id,
                item: item.to_string(),
            });
        }
        store(actuator, item, f64::from(value));
        if state.write_log.len() == WRITE_LOG_CAPACITY {
            state.write_log.pop_front();
        }
        state.write_log.push_back((id, item.to_string(), value));
        Ok(())
    }

    fn torque_state(&self) -> BTreeMap<ActuatorId, bool> {
        self.handle
            .lock()
            .actuators
            .iter()
            .map(|(id, a)| (*id, a.torque))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use evo_servo_common::types::FrameEntry;
    use std::time::Duration;

    fn settings() -> LinkSettings {
        LinkSettings {
            port_name: "sim0".to_string(),
            baud_rate: 4_000_000,
        }
    }

    fn opened(ids: &[u8]) -> SimulatedLink {
        let mut link = SimulatedLink::new();
        let ids: Vec<ActuatorId> = ids.iter().copied().map(ActuatorId).collect();
        link.open(&settings(), &ids).unwrap();
        link
    }

    #[test]
    fn open_failures_are_consumed() {
        let mut link = SimulatedLink::new();
        link.handle().fail_next_opens(2);
        assert!(link.open(&settings(), &[ActuatorId(1)]).is_err());
        assert!(link.open(&settings(), &[ActuatorId(1)]).is_err());
        assert!(link.open(&settings(), &[ActuatorId(1)]).is_ok());
        assert_eq!(link.handle().counters().opens, 3);
    }

    #[test]
    fn goal_position_follows_only_with_torque() {
        let mut link = opened(&[1]);
        let handle = link.handle();
        let frame = BulkFrame {
            entries: vec![FrameEntry {
                id: ActuatorId(1),
                items: vec!["Goal Position".to_string()],
                values: vec![1024.0],
            }],
        };

        link.bulk_write(&frame).unwrap();
        assert_eq!(handle.register(ActuatorId(1), "Present Position"), Some(0.0));

        link.enable(&[ActuatorId(1)]).unwrap();
        link.bulk_write(&frame).unwrap();
        assert_eq!(handle.register(ActuatorId(1), "Present Position"), Some(1024.0));

        let mut read = BulkFrame {
            entries: vec![FrameEntry::new(ActuatorId(1), vec!["Present Position".to_string()])],
        };
        link.bulk_read(&mut read).unwrap();
        assert_eq!(read.entries[0].values, vec![1024.0]);
    }

    #[test]
    fn unknown_items_are_rejected() {
        let mut link = opened(&[1]);
        assert!(matches!(
            link.read_register(ActuatorId(1), "Warp Drive"),
            Err(LinkError::ControlItemNotFound { .. })
        ));
        assert_eq!(
            link.register_read_set(ActuatorId(1), &["Warp Drive".to_string()]),
            Err(LinkError::SetReadItemFailed(ActuatorId(1)))
        );
        assert!(link.read_register(ActuatorId(2), "LED").is_err());
    }

    #[test]
    fn reboot_clears_hardware_error_and_torque() {
        let mut link = opened(&[5]);
        let handle = link.handle();
        link.enable(&[ActuatorId(5)]).unwrap();
        handle.set_hardware_error(ActuatorId(5), 0x01);

        link.reboot(ActuatorId(5)).unwrap();
        assert_eq!(handle.register(ActuatorId(5), "Hardware Error Status"), Some(0.0));
        assert_eq!(link.torque_state()[&ActuatorId(5)], false);
    }

    #[test]
    fn reboot_refused_until_clock_reaches_deadline() {
        let clock = Arc::new(ManualClock::new());
        let mut link = SimulatedLink::with_clock(clock.clone());
        link.open(&settings(), &[ActuatorId(1)]).unwrap();
        link.handle()
            .fail_reboots_until(clock.now() + Duration::from_secs(2));

        assert!(link.reboot(ActuatorId(1)).is_err());
        clock.advance(Duration::from_secs(2));
        assert!(link.reboot(ActuatorId(1)).is_ok());
    }

    #[test]
    fn transport_failure_injection() {
        let mut link = opened(&[1]);
        link.handle().set_bulk_read_failure(true);
        let mut frame = BulkFrame::default();
        assert!(link.bulk_read(&mut frame).unwrap_err().is_transport());
    }

    #[test]
    fn register_writes_are_logged() {
        let mut link = opened(&[3]);
        link.write_register(ActuatorId(3), "LED", 1).unwrap();
        assert_eq!(
            link.handle().write_log(),
            vec![(ActuatorId(3), "LED".to_string(), 1)]
        );
        assert_eq!(link.read_register(ActuatorId(3), "LED").unwrap(), 1);
    }

    #[test]
    fn write_log_keeps_only_recent_writes() {
        let mut link = opened(&[3]);
        let total = WRITE_LOG_CAPACITY as u32 + 44;
        for value in 0..total {
            link.write_register(ActuatorId(3), "Profile Velocity", value).unwrap();
        }
        let log = link.handle().write_log();
        assert_eq!(log.len(), WRITE_LOG_CAPACITY);
        assert_eq!(log[0].2, 44);
        assert_eq!(log[WRITE_LOG_CAPACITY - 1].2, total - 1);
        assert_eq!(link.handle().counters().register_writes, u64::from(total));
    }

    #[test]
    fn refused_actuator_stays_off_on_enable() {
        let mut link = opened(&[1, 2]);
        link.handle().set_torque_refused(ActuatorId(2), true);
        link.enable(&[ActuatorId(1), ActuatorId(2)]).unwrap();
        let flags = link.torque_state();
        assert!(flags[&ActuatorId(1)]);
        assert!(!flags[&ActuatorId(2)]);
    }
}
