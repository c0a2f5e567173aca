//! Integration test: configuration loading, mapping and host slots.

use std::io::Write;
use std::sync::Arc;

use evo_servo_common::config::{ConfigLoader, ServoConfig};
use evo_servo_common::error::ServoError;
use evo_servo_common::types::{ActuatorId, CommStatus};
use evo_servo_hal::links::simulation::SimulatedLink;
use evo_servo_hal::state_publisher::MemorySink;
use evo_servo_hal::{GroupKind, LinkRegistry, ManualClock, ServoHal, StatePublisher};

use super::common::{WRIST, config, slot, started};

#[test]
fn hal_starts_from_a_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(WRIST.as_bytes()).unwrap();

    let config = ServoConfig::load(file.path()).unwrap();
    let hal = ServoHal::new(config, &LinkRegistry::with_builtin_links()).unwrap();
    hal.start().unwrap();
    assert_eq!(hal.tick().unwrap().status, CommStatus::Ok);
    hal.stop().unwrap();
}

#[test]
fn unknown_link_is_rejected() {
    let mut config = config();
    config.link.driver = "rs485".to_string();
    let result = ServoHal::new(config, &LinkRegistry::with_builtin_links());
    assert!(matches!(result, Err(ServoError::LinkNotFound(_))));
}

#[test]
fn invalid_matrix_is_a_config_error() {
    let mut config = config();
    config.joint_to_transmission_matrix.pop();
    let clock = Arc::new(ManualClock::new());
    let link = SimulatedLink::with_clock(clock.clone());
    let result = ServoHal::with_link(config, Box::new(link), clock);
    assert!(matches!(result, Err(ServoError::Config(_))));
}

#[test]
fn host_slots_drive_the_differential() {
    let fx = started();
    let exported = fx.hal.exported_interfaces();

    fx.sim.set_register(ActuatorId(4), "Present Position", 1.0);
    fx.sim.set_register(ActuatorId(5), "Present Position", 3.0);
    fx.sim.set_register(ActuatorId(4), "Present Current", 10.0);
    fx.sim.set_register(ActuatorId(20), "External Port Data 2", 512.0);
    fx.hal.read().unwrap();

    let pitch = slot(&exported, GroupKind::JointState, "wrist_pitch", "position");
    let roll = slot(&exported, GroupKind::JointState, "wrist_roll", "position");
    assert_eq!(pitch.slot.get(), 2.0);
    assert_eq!(roll.slot.get(), -1.0);
    let effort = slot(&exported, GroupKind::JointState, "wrist_pitch", "effort");
    assert_eq!(effort.slot.get(), 5.0);
    let sensor = slot(&exported, GroupKind::SensorState, "force_sensor", "External Port Data 2");
    assert_eq!(sensor.slot.get(), 512.0);

    // Control law: command both joints through the exported slots
    slot(&exported, GroupKind::JointCommand, "wrist_pitch", "position").slot.set(1.0);
    slot(&exported, GroupKind::JointCommand, "wrist_roll", "position").slot.set(0.25);
    slot(&exported, GroupKind::TransmissionCommand, "wrist_left", "Profile Velocity").slot.set(40.0);
    fx.hal.write().unwrap();

    assert_eq!(fx.sim.register(ActuatorId(4), "Goal Position"), Some(1.25));
    assert_eq!(fx.sim.register(ActuatorId(5), "Goal Position"), Some(0.75));
    assert_eq!(fx.sim.register(ActuatorId(4), "Profile Velocity"), Some(40.0));
}

#[test]
fn init_items_are_written_once_at_startup() {
    let fx = started();
    assert_eq!(
        fx.sim.write_log(),
        vec![
            (ActuatorId(4), "Operating Mode".to_string(), 3),
            (ActuatorId(4), "Return Delay Time".to_string(), 0),
            (ActuatorId(5), "Operating Mode".to_string(), 3),
        ]
    );
}

#[test]
fn publisher_forwards_snapshots_to_its_sink() {
    let fx = started();
    let sink = MemorySink::default();
    let mut publisher = StatePublisher::new(fx.hal.services(), Box::new(sink.clone()));
    publisher.publish_once();
    publisher.publish_once();

    assert_eq!(publisher.published(), 2);
    let snapshots = sink.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].transmissions.len(), 2);
}

#[test]
fn sample_config_is_valid() {
    let config: ServoConfig = toml::from_str(include_str!("../../config/servo_arm.toml")).unwrap();
    config.validate().unwrap();
    assert_eq!(config.transmission_ids().len(), 4);
    assert_eq!(config.sensors().count(), 1);
    assert_eq!(config.hardware_errors, evo_servo_common::config::HardwareErrorCause::manufacturer_table());
}
