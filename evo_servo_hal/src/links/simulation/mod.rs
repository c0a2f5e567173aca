//! Simulated actuator bus.
//!
//! Provides an `ActuatorLink` over an in-memory control table, with a
//! `SimHandle` for injecting transport failures, hardware errors and
//! reboot refusals.

mod control_table;
mod link;
mod state;

pub use control_table::{CONTROL_TABLE, ITEM_GOAL_CURRENT, ITEM_GOAL_POSITION, ITEM_GOAL_VELOCITY};
pub use link::SimulatedLink;
pub use state::{SimCounters, SimHandle, WRITE_LOG_CAPACITY};

use evo_servo_common::link::ActuatorLink;

/// Registry name of the simulated link.
pub const LINK_NAME: &str = "simulation";

/// Factory function to create a simulated link instance.
pub fn create_link() -> Box<dyn ActuatorLink> {
    Box::new(SimulatedLink::new())
}
