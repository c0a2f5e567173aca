//! Integration test: fault classification through the control cycle.

use evo_servo_common::types::{ActuatorId, CommStatus, HW_STATE_HARDWARE_ERROR};
use evo_servo_hal::GroupKind;

use super::common::{slot, started};

#[test]
fn input_voltage_bit_on_one_transmission_latches_hardware_error() {
    let fx = started();
    fx.sim.set_hardware_error(ActuatorId(5), 0x01);

    let report = fx.hal.tick().unwrap();
    assert_eq!(report.status, CommStatus::HardwareError);
    assert_eq!(report.hardware_state, HW_STATE_HARDWARE_ERROR);
    assert_eq!(fx.hal.hardware_bits(ActuatorId(5)), 0x01);
    assert_eq!(fx.hal.hardware_bits(ActuatorId(4)), 0);

    let exported = fx.hal.exported_interfaces();
    for joint in ["wrist_pitch", "wrist_roll"] {
        let hw = slot(&exported, GroupKind::JointState, joint, "hardware_state");
        assert_ne!(hw.slot.get(), 0.0);
    }

    // Latched: clearing the register does not clear the status
    fx.sim.set_hardware_error(ActuatorId(5), 0);
    let report = fx.hal.tick().unwrap();
    assert_eq!(report.status, CommStatus::HardwareError);
    assert_eq!(report.hardware_state, 0);
}

#[test]
fn transport_failure_marks_comm_error_and_keeps_writing() {
    let fx = started();
    fx.sim.set_bulk_read_failure(true);
    let before = fx.sim.counters();

    for _ in 0..3 {
        assert_eq!(fx.hal.tick().unwrap().status, CommStatus::CommError);
    }
    let after = fx.sim.counters();
    assert_eq!(after.bulk_reads, before.bulk_reads + 3);
    assert_eq!(after.bulk_writes, before.bulk_writes + 3);

    fx.sim.set_bulk_read_failure(false);
    assert_eq!(fx.hal.tick().unwrap().status, CommStatus::CommError);
}

#[test]
fn snapshot_carries_per_transmission_health() {
    let fx = started();
    fx.sim.set_hardware_error(ActuatorId(4), 0x24);
    fx.hal.tick().unwrap();

    let snapshot = fx.hal.services().snapshot();
    assert_eq!(snapshot.comm_status, CommStatus::HardwareError);
    let ids: Vec<u8> = snapshot.transmissions.iter().map(|t| t.id.get()).collect();
    assert_eq!(ids, vec![4, 5]);
    assert_eq!(snapshot.transmissions[0].hardware_error, 0x24);
    assert!(snapshot.transmissions.iter().all(|t| t.torque_enabled));
}
