//! Integration test: reboot recovery on the simulated bus.

use std::thread;
use std::time::Duration;

use evo_servo_common::error::ServoError;
use evo_servo_common::types::{ActuatorId, CommStatus, TorqueStatus};
use evo_servo_hal::Clock;

use super::common::{config, started, started_realtime};

#[test]
fn reboot_refused_for_two_seconds_then_recovers() {
    let fx = started();
    fx.sim.set_hardware_error(ActuatorId(4), 0x08);
    assert_eq!(fx.hal.tick().unwrap().status, CommStatus::HardwareError);

    fx.sim
        .fail_reboots_until(fx.clock.now() + Duration::from_secs(2));
    fx.hal.reboot_actuators().unwrap();

    assert_eq!(fx.hal.status(), CommStatus::Ok);
    assert_eq!(fx.hal.hardware_bits(ActuatorId(4)), 0);
    assert!(fx.clock.elapsed() >= Duration::from_secs(2));
    assert!(fx.clock.elapsed() < Duration::from_secs(3));
    assert_eq!(fx.sim.torque(ActuatorId(4)), Some(true));
    assert_eq!(fx.hal.torque_status(), TorqueStatus::Enabled);

    let report = fx.hal.tick().unwrap();
    assert_eq!(report.status, CommStatus::Ok);
    assert_eq!(report.hardware_state, 0);
}

#[test]
fn exhausted_window_reports_timeout_and_cycles_resume() {
    let fx = started();
    fx.sim.set_reboot_always_fails(true);

    let result = fx.hal.reboot_actuators();
    assert!(matches!(result, Err(ServoError::RebootTimeout { .. })));
    assert!(fx.clock.elapsed() <= Duration::from_secs(3));
    assert_eq!(fx.hal.status(), CommStatus::CommError);

    let writes = fx.sim.counters().bulk_writes;
    let report = fx.hal.tick().unwrap();
    assert_eq!(report.status, CommStatus::CommError);
    assert_eq!(fx.sim.counters().bulk_writes, writes + 1);
}

#[test]
fn reboot_reregisters_items_and_rewrites_init_items() {
    let fx = started();
    fx.sim.clear_write_log();
    assert!(fx.hal.services().reboot_actuators().success);

    assert_eq!(fx.sim.counters().resets, 1);
    assert_eq!(fx.sim.read_set(ActuatorId(5)).len(), 4);
    assert!(
        fx.sim
            .write_log()
            .contains(&(ActuatorId(5), "Operating Mode".to_string(), 3))
    );
}

#[test]
fn ticks_are_refused_while_rebooting() {
    let mut config = config();
    config.reboot_window_sec = 0.6;
    config.reboot_id_delay_ms = 50;
    let (hal, sim) = started_realtime(config);
    sim.set_reboot_always_fails(true);

    thread::scope(|s| {
        let reboot = s.spawn(|| hal.reboot_actuators());
        thread::sleep(Duration::from_millis(200));
        assert!(matches!(hal.tick(), Err(ServoError::Rebooting)));
        assert!(matches!(hal.reboot_actuators(), Err(ServoError::Rebooting)));
        assert!(matches!(
            reboot.join().unwrap(),
            Err(ServoError::RebootTimeout { .. })
        ));
    });
    assert!(hal.tick().is_ok());
}
