//! System-wide constants for the EVO servo HAL.
//!
//! Single source of truth for interface names, timing defaults and limits.

use std::time::Duration;

/// Canonical service name (used for logging and the state broadcast).
pub const SERVO_HAL_SERVICE_NAME: &str = "servo_hal";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/evo/servo.toml";

/// Default control cycle time in microseconds (100 Hz).
pub const DEFAULT_CYCLE_TIME_US: u32 = 10_000;

/// Default bounded window for a reboot recovery attempt.
pub const DEFAULT_REBOOT_WINDOW_SEC: f64 = 3.0;

/// Default delay between rebooting two consecutive actuators.
pub const DEFAULT_REBOOT_ID_DELAY_MS: u64 = 200;

/// Default timeout for `GetItem` when the caller passes zero.
pub const DEFAULT_ITEM_TIMEOUT_SEC: f64 = 1.0;

/// Default time a `SetTorque` caller waits for acknowledgement.
pub const DEFAULT_TORQUE_TIMEOUT_MS: u64 = 1000;

/// Granularity of the torque acknowledgement wait.
pub const DEFAULT_TORQUE_POLL_MS: u64 = 50;

/// Default state broadcast rate.
pub const DEFAULT_STATE_PUBLISH_RATE_HZ: u32 = 100;

/// Default number of attempts to open the link at startup (one per second).
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 60;

/// Pause between two link open attempts.
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound of every timing value given in seconds (one day).
pub const MAX_TIMING_SEC: f64 = 86_400.0;

/// Maximum number of actuators on one link.
pub const MAX_ACTUATORS: usize = 253;

/// Maximum number of configured hardware error causes (one per register bit).
pub const MAX_HARDWARE_ERROR_CAUSES: usize = 8;

static_assertions::const_assert!(MAX_HARDWARE_ERROR_CAUSES <= u8::BITS as usize);

// ─── Actuator register names ────────────────────────────────────────

/// Present position register.
pub const ITEM_PRESENT_POSITION: &str = "Present Position";
/// Present velocity register.
pub const ITEM_PRESENT_VELOCITY: &str = "Present Velocity";
/// Present current register (effort channel, current-controlled models).
pub const ITEM_PRESENT_CURRENT: &str = "Present Current";
/// Present load register (effort channel, load-reporting models).
pub const ITEM_PRESENT_LOAD: &str = "Present Load";
/// Hardware error status register.
pub const ITEM_HARDWARE_ERROR_STATUS: &str = "Hardware Error Status";
/// Torque enable register.
pub const ITEM_TORQUE_ENABLE: &str = "Torque Enable";

// ─── Joint interface names ──────────────────────────────────────────

/// Joint position interface.
pub const HW_IF_POSITION: &str = "position";
/// Joint velocity interface.
pub const HW_IF_VELOCITY: &str = "velocity";
/// Joint acceleration interface.
pub const HW_IF_ACCELERATION: &str = "acceleration";
/// Joint effort interface.
pub const HW_IF_EFFORT: &str = "effort";
/// Joint channel mirroring the latest fault classification.
pub const HW_IF_HARDWARE_STATE: &str = "hardware_state";
/// Joint torque enable interface.
pub const HW_IF_TORQUE_ENABLE: &str = "torque_enable";

/// Joint state interfaces accepted in configuration.
pub const JOINT_STATE_INTERFACES: [&str; 6] = [
    HW_IF_POSITION,
    HW_IF_VELOCITY,
    HW_IF_ACCELERATION,
    HW_IF_EFFORT,
    HW_IF_HARDWARE_STATE,
    HW_IF_TORQUE_ENABLE,
];

/// Joint command interfaces accepted in configuration.
pub const JOINT_COMMAND_INTERFACES: [&str; 4] =
    [HW_IF_POSITION, HW_IF_VELOCITY, HW_IF_ACCELERATION, HW_IF_EFFORT];
