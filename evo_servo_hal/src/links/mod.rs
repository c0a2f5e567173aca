//! Actuator link implementations.
//!
//! - [`simulation`] - In-memory bus for development and testing
//!
//! # Adding New Links
//!
//! 1. Create a new submodule under `links/`
//! 2. Implement the `ActuatorLink` trait from `evo_servo_common::link`
//! 3. Register its factory in `register_builtin_links()`

pub mod simulation;

use crate::link_registry::LinkRegistry;
use tracing::warn;

/// Register every in-tree link with `registry`.
pub fn register_builtin_links(registry: &mut LinkRegistry) {
    if let Err(e) = registry.register(simulation::LINK_NAME, simulation::create_link) {
        warn!("{}", e);
    }
}
