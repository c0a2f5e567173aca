//! Actuator link trait.
//!
//! This module defines:
//! - `ActuatorLink` trait - Interface to the physical actuator bus
//! - `LinkFactory` type alias - Factory function type
//! - `LinkSettings` struct - Port parameters passed to `open()`

use crate::error::LinkError;
use crate::types::{ActuatorId, BulkFrame, RegisterValue};
use std::collections::BTreeMap;

/// Factory function type for creating link instances.
pub type LinkFactory = fn() -> Box<dyn ActuatorLink>;

/// Port parameters passed to `ActuatorLink::open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Serial device or endpoint name
    pub port_name: String,
    /// Baud rate as configured
    pub baud_rate: u32,
}

/// Trait defining the interface to an actuator bus.
///
/// The runtime core owns exactly one link and drives it from the control
/// cycle and from reboot recovery, never concurrently.
///
/// # Lifecycle
///
/// 1. `open()` - Called at startup, retried until it succeeds
/// 2. `register_read_set()` / `register_write_set()` - Once per actuator,
///    again after every `reset_link()`
/// 3. `bulk_read()` / `bulk_write()` - Every control cycle
///
/// # Timing Contracts
///
/// | Operation | Max Duration | RT Constraint |
/// |-----------|--------------|---------------|
/// | `open()` | 1 second | None (pre-RT) |
/// | `bulk_read()` / `bulk_write()` | cycle_time_us | **HARD** |
/// | `reboot()` | 1 second | None (recovery) |
pub trait ActuatorLink: Send {
    /// Returns the link's unique identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Open the bus and ping every actuator.
    ///
    /// # Errors
    /// Return `LinkError::OpenPortFailed` if the port or any ID is unreachable.
    fn open(&mut self, settings: &LinkSettings, ids: &[ActuatorId]) -> Result<(), LinkError>;

    /// Register names known for an actuator's model.
    ///
    /// Used to validate ad hoc item requests before they are queued.
    fn control_items(&self, id: ActuatorId) -> Vec<String>;

    /// Register the registers read for `id` on every `bulk_read()`.
    fn register_read_set(&mut self, id: ActuatorId, items: &[String]) -> Result<(), LinkError>;

    /// Register the registers written for `id` on every `bulk_write()`.
    fn register_write_set(&mut self, id: ActuatorId, items: &[String]) -> Result<(), LinkError>;

    /// Drop all read/write registrations.
    fn reset_link(&mut self);

    /// Read every registered read item into `frame`.
    ///
    /// `frame` carries one entry per registered actuator, in registration
    /// order. On error frame contents are unspecified.
    fn bulk_read(&mut self, frame: &mut BulkFrame) -> Result<(), LinkError>;

    /// Write every registered write item from `frame`.
    fn bulk_write(&mut self, frame: &BulkFrame) -> Result<(), LinkError>;

    /// Turn torque on for the given actuators.
    fn enable(&mut self, ids: &[ActuatorId]) -> Result<(), LinkError>;

    /// Turn torque off for the given actuators.
    fn disable(&mut self, ids: &[ActuatorId]) -> Result<(), LinkError>;

    /// Reboot one actuator, clearing its hardware error latch.
    fn reboot(&mut self, id: ActuatorId) -> Result<(), LinkError>;

    /// Read one register outside the bulk transaction.
    fn read_register(&mut self, id: ActuatorId, item: &str) -> Result<RegisterValue, LinkError>;

    /// Write one register outside the bulk transaction.
    fn write_register(
        &mut self,
        id: ActuatorId,
        item: &str,
        value: RegisterValue,
    ) -> Result<(), LinkError>;

    /// Torque state last seen per actuator.
    fn torque_state(&self) -> BTreeMap<ActuatorId, bool>;
}
