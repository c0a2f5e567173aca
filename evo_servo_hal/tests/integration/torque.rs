//! Integration test: torque requests through the service handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use evo_servo_common::types::{ActuatorId, TorqueStatus};
use evo_servo_hal::GroupKind;

use super::common::{TICK, config, slot, started, started_realtime};

#[test]
fn enable_when_enabled_succeeds_without_bus_traffic() {
    let fx = started();
    let enables = fx.sim.counters().enables;

    let response = fx.hal.services().set_torque(true);
    assert!(response.success);
    assert_eq!(response.message, "Already enabled.");
    fx.hal.tick().unwrap();
    assert_eq!(fx.sim.counters().enables, enables);
}

#[test]
fn disable_is_applied_by_the_cycle_and_resyncs_commands() {
    let (hal, sim) = started_realtime(config());
    let exported = hal.exported_interfaces();
    let command = slot(&exported, GroupKind::JointCommand, "wrist_pitch", "position");
    let state = slot(&exported, GroupKind::JointState, "wrist_pitch", "position");

    let stop = AtomicBool::new(false);
    let response = thread::scope(|s| {
        s.spawn(|| {
            while !stop.load(Ordering::SeqCst) {
                let _ = hal.tick();
                thread::sleep(TICK);
            }
        });
        thread::sleep(TICK * 10);
        command.slot.set(9.0);
        let response = hal.services().set_torque(false);
        stop.store(true, Ordering::SeqCst);
        response
    });

    assert!(response.success, "{}", response.message);
    assert_eq!(response.message, "Success to disable.");
    assert_eq!(hal.torque_status(), TorqueStatus::Disabled);
    assert_eq!(sim.torque(ActuatorId(4)), Some(false));
    assert_eq!(sim.torque(ActuatorId(5)), Some(false));
    // Command resynced to the measured joint position
    assert_eq!(command.slot.get(), state.slot.get());
}

#[test]
fn request_without_cycle_times_out_and_stays_pending() {
    let fx = started();
    let response = fx.hal.services().set_torque(false);
    assert!(!response.success);
    assert_eq!(fx.hal.torque_status(), TorqueStatus::RequestedDisable);

    fx.hal.tick().unwrap();
    assert_eq!(fx.hal.torque_status(), TorqueStatus::Disabled);
}

#[test]
fn one_actuator_without_torque_reports_disabled() {
    let fx = started();
    fx.sim.set_torque(ActuatorId(5), false);

    let report = fx.hal.tick().unwrap();
    assert_eq!(report.torque, TorqueStatus::Disabled);
    let snapshot = fx.hal.snapshot();
    let flags: Vec<_> = snapshot
        .transmissions
        .iter()
        .map(|t| (t.id, t.torque_enabled))
        .collect();
    assert_eq!(flags, vec![(ActuatorId(4), true), (ActuatorId(5), false)]);
}

#[test]
fn enable_fails_when_one_actuator_refuses_torque() {
    let (hal, sim) = started_realtime(config());
    sim.set_torque_refused(ActuatorId(5), true);
    sim.set_torque(ActuatorId(5), false);
    hal.tick().unwrap();
    assert_eq!(hal.torque_status(), TorqueStatus::Disabled);

    let stop = AtomicBool::new(false);
    let response = thread::scope(|s| {
        s.spawn(|| {
            while !stop.load(Ordering::SeqCst) {
                let _ = hal.tick();
                thread::sleep(TICK);
            }
        });
        let response = hal.services().set_torque(true);
        stop.store(true, Ordering::SeqCst);
        response
    });

    assert!(!response.success);
    assert_eq!(response.message, "Fail to enable.");
    assert_eq!(sim.torque(ActuatorId(4)), Some(true));
    assert_eq!(sim.torque(ActuatorId(5)), Some(false));
    assert_eq!(hal.torque_status(), TorqueStatus::Disabled);
}
