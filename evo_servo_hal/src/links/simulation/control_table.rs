//! Control table of the simulated actuator model.
//!
//! Register names follow the X-series layout. Values are initial register
//! contents after power-up.

use evo_servo_common::consts::{
    ITEM_HARDWARE_ERROR_STATUS, ITEM_PRESENT_CURRENT, ITEM_PRESENT_LOAD, ITEM_PRESENT_POSITION,
    ITEM_PRESENT_VELOCITY, ITEM_TORQUE_ENABLE,
};

/// Goal position register.
pub const ITEM_GOAL_POSITION: &str = "Goal Position";
/// Goal velocity register.
pub const ITEM_GOAL_VELOCITY: &str = "Goal Velocity";
/// Goal current register.
pub const ITEM_GOAL_CURRENT: &str = "Goal Current";

/// `(name, power-up value)` for every register of the model.
pub const CONTROL_TABLE: &[(&str, f64)] = &[
    ("Model Number", 1060.0),
    ("Firmware Version", 48.0),
    ("ID", 1.0),
    ("Baud Rate", 3.0),
    ("Return Delay Time", 0.0),
    ("Drive Mode", 0.0),
    ("Operating Mode", 3.0),
    ("Homing Offset", 0.0),
    ("Current Limit", 1193.0),
    ("Velocity Limit", 200.0),
    ("Max Position Limit", 4095.0),
    ("Min Position Limit", 0.0),
    (ITEM_TORQUE_ENABLE, 0.0),
    ("LED", 0.0),
    ("Status Return Level", 2.0),
    (ITEM_HARDWARE_ERROR_STATUS, 0.0),
    ("Position D Gain", 0.0),
    ("Position I Gain", 0.0),
    ("Position P Gain", 800.0),
    ("Profile Acceleration", 0.0),
    ("Profile Velocity", 0.0),
    (ITEM_GOAL_CURRENT, 0.0),
    (ITEM_GOAL_VELOCITY, 0.0),
    (ITEM_GOAL_POSITION, 0.0),
    ("Moving", 0.0),
    (ITEM_PRESENT_CURRENT, 0.0),
    (ITEM_PRESENT_LOAD, 0.0),
    (ITEM_PRESENT_VELOCITY, 0.0),
    (ITEM_PRESENT_POSITION, 0.0),
    ("Present Input Voltage", 120.0),
    ("Present Temperature", 32.0),
    ("External Port Data 1", 0.0),
    ("External Port Data 2", 0.0),
    ("External Port Data 3", 0.0),
];

/// Present register that follows a goal register while torque is on.
pub fn follower_of(goal: &str) -> Option<&'static str> {
    match goal {
        ITEM_GOAL_POSITION => Some(ITEM_PRESENT_POSITION),
        ITEM_GOAL_VELOCITY => Some(ITEM_PRESENT_VELOCITY),
        ITEM_GOAL_CURRENT => Some(ITEM_PRESENT_CURRENT),
        _ => None,
    }
}
