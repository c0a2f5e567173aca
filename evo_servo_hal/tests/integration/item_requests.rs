//! Integration test: ad hoc register requests through the service handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use evo_servo_common::types::ActuatorId;
use evo_servo_hal::{ItemResponse, ServoHal};

use super::common::{TICK, config, started, started_realtime};

/// Run `f` while a background thread ticks the HAL.
fn with_ticker<R>(hal: &ServoHal, f: impl FnOnce() -> R) -> R {
    let stop = AtomicBool::new(false);
    thread::scope(|s| {
        s.spawn(|| {
            while !stop.load(Ordering::SeqCst) {
                let _ = hal.tick();
                thread::sleep(TICK);
            }
        });
        let result = f();
        stop.store(true, Ordering::SeqCst);
        result
    })
}

#[test]
fn set_then_get_returns_value() {
    let (hal, _sim) = started_realtime(config());
    let services = hal.services();

    assert!(services.set_item(4, "LED", 1).success);
    let response = with_ticker(&hal, || services.get_item(4, "LED", 1.0));
    assert_eq!(
        response,
        ItemResponse {
            value: 1,
            success: true
        }
    );
}

#[test]
fn only_last_write_before_a_cycle_reaches_the_link() {
    let fx = started();
    let services = fx.hal.services();
    fx.sim.clear_write_log();

    assert!(services.set_item(5, "Profile Acceleration", 10).success);
    assert!(services.set_item(5, "Profile Acceleration", 20).success);
    fx.hal.tick().unwrap();

    let writes: Vec<_> = fx
        .sim
        .write_log()
        .into_iter()
        .filter(|(_, item, _)| item == "Profile Acceleration")
        .collect();
    assert_eq!(writes, vec![(ActuatorId(5), "Profile Acceleration".to_string(), 20)]);
    assert_eq!(fx.sim.register(ActuatorId(5), "Profile Acceleration"), Some(20.0));
}

#[test]
fn unknown_items_fail_without_waiting() {
    let fx = started();
    let services = fx.hal.services();

    let start = Instant::now();
    let response = services.get_item(4, "Goal Torque", 5.0);
    assert!(!response.success);
    assert_eq!(response.value, 0);
    assert!(start.elapsed() < Duration::from_secs(1));

    assert!(!services.set_item(4, "Goal Torque", 1).success);
    assert!(!services.get_item(99, "LED", 0.1).success);
}

#[test]
fn get_times_out_without_a_cycle() {
    let fx = started();
    let response = fx.hal.services().get_item(4, "LED", 0.05);
    assert!(!response.success);
}

#[test]
fn oversized_get_timeout_is_served_by_the_cycle() {
    let (hal, _sim) = started_realtime(config());
    let services = hal.services();

    let response = with_ticker(&hal, || services.get_item(4, "Present Temperature", 1e19));
    assert_eq!(
        response,
        ItemResponse {
            value: 32,
            success: true
        }
    );
}

#[test]
fn set_items_reach_the_link_in_request_order() {
    let fx = started();
    let services = fx.hal.services();
    fx.sim.clear_write_log();

    assert!(services.set_item(4, "Torque Enable", 0).success);
    assert!(services.set_item(4, "Operating Mode", 1).success);
    assert!(services.set_item(5, "LED", 1).success);
    assert!(services.set_item(4, "Torque Enable", 1).success);
    fx.hal.tick().unwrap();

    let items: Vec<_> = fx
        .sim
        .write_log()
        .into_iter()
        .map(|(id, item, value)| (id.get(), item, value))
        .collect();
    assert_eq!(
        items,
        vec![
            (4, "Torque Enable".to_string(), 1),
            (4, "Operating Mode".to_string(), 1),
            (5, "LED".to_string(), 1),
        ]
    );
}

#[test]
fn concurrent_gets_on_distinct_keys_complete_independently() {
    let (hal, sim) = started_realtime(config());
    sim.set_register(ActuatorId(20), "External Port Data 1", 77.0);
    let services = hal.services();

    let results = with_ticker(&hal, || {
        thread::scope(|s| {
            let requests = [
                (4, "Present Temperature"),
                (5, "Present Input Voltage"),
                (20, "External Port Data 1"),
            ];
            let handles: Vec<_> = requests
                .iter()
                .map(|&(id, item)| {
                    let services = services.clone();
                    s.spawn(move || services.get_item(id, item, 2.0))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        })
    });

    assert!(results.iter().all(|r| r.success));
    let values: Vec<u32> = results.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![32, 120, 77]);
}
