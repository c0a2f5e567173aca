//! Shared fixture: two transmissions (IDs 4 and 5) driving a differential
//! wrist, plus one sensor board (ID 20).

use std::sync::Arc;
use std::time::Duration;

use evo_servo_common::config::ServoConfig;
use evo_servo_hal::links::simulation::{SimHandle, SimulatedLink};
use evo_servo_hal::{Clock, ExportedInterface, GroupKind, ManualClock, MonotonicClock, ServoHal};

pub const WRIST: &str = r#"
number_of_joints = 2
number_of_transmissions = 2
transmission_to_joint_matrix = [0.5, 0.5, 0.5, -0.5]
joint_to_transmission_matrix = [1.0, 1.0, 1.0, -1.0]
reboot_window_sec = 3.0
reboot_id_delay_ms = 200

[shared]
service_name = "wrist"

[link]
port_name = "/dev/ttyUSB0"
baud_rate = 1000000

[[actuators]]
id = 4
name = "wrist_left"
state_interfaces = ["Present Position", "Present Velocity", "Present Current", "Hardware Error Status"]
command_interfaces = ["Goal Position", "Profile Velocity"]
init_items = [
    { item = "Operating Mode", value = 3 },
    { item = "Return Delay Time", value = 0 },
]

[[actuators]]
id = 5
name = "wrist_right"
state_interfaces = ["Present Position", "Present Velocity", "Present Current", "Hardware Error Status"]
command_interfaces = ["Goal Position", "Profile Velocity"]
init_items = [{ item = "Operating Mode", value = 3 }]

[[actuators]]
id = 20
name = "force_sensor"
kind = "sensor"
state_interfaces = ["External Port Data 1", "External Port Data 2"]

[[joints]]
name = "wrist_pitch"
state_interfaces = ["position", "velocity", "effort", "hardware_state"]
command_interfaces = ["position"]

[[joints]]
name = "wrist_roll"
state_interfaces = ["position", "velocity", "effort", "hardware_state"]
command_interfaces = ["position"]
"#;

pub fn config() -> ServoConfig {
    toml::from_str(WRIST).expect("fixture parses")
}

pub struct Fixture {
    pub hal: ServoHal,
    pub sim: SimHandle,
    pub clock: Arc<ManualClock>,
}

/// Started HAL on a manual clock shared with the simulated link.
pub fn started() -> Fixture {
    let clock = Arc::new(ManualClock::new());
    let link = SimulatedLink::with_clock(clock.clone());
    let sim = link.handle();
    let hal = ServoHal::with_link(config(), Box::new(link), clock.clone()).expect("init");
    hal.start().expect("start");
    Fixture { hal, sim, clock }
}

/// Started HAL on the wall clock, for tests with concurrent threads.
pub fn started_realtime(config: ServoConfig) -> (ServoHal, SimHandle) {
    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock);
    let link = SimulatedLink::with_clock(Arc::clone(&clock));
    let sim = link.handle();
    let hal = ServoHal::with_link(config, Box::new(link), clock).expect("init");
    hal.start().expect("start");
    (hal, sim)
}

pub fn slot<'a>(
    exported: &'a [ExportedInterface],
    kind: GroupKind,
    owner: &str,
    interface: &str,
) -> &'a ExportedInterface {
    exported
        .iter()
        .find(|e| e.kind == kind && e.owner == owner && e.interface == interface)
        .unwrap_or_else(|| panic!("no {kind:?} slot {owner}/{interface}"))
}

pub const TICK: Duration = Duration::from_millis(2);
