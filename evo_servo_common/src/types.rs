//! Servo HAL data types.
//!
//! This module defines the values exchanged between the runtime core,
//! the actuator link and external observers:
//! - `ActuatorId` - Bus identifier of one actuator
//! - `CommStatus` / `TorqueStatus` - Runtime state machines
//! - `HardwareErrorBits` - Actuator hardware error register
//! - `BulkFrame` - Values moved by one bulk read or bulk write
//! - `StateSnapshot` - Periodic state broadcast payload

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw value of an actuator register.
pub type RegisterValue = u32;

/// Bus identifier of one physical actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActuatorId(pub u8);

impl ActuatorId {
    /// Raw bus identifier.
    #[inline]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl From<u8> for ActuatorId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Communication / hardware status of the actuator link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommStatus {
    /// Link healthy, no hardware fault reported.
    #[default]
    Ok,
    /// Last bulk read failed at the transport level.
    CommError,
    /// At least one actuator reported a hardware error bit.
    HardwareError,
    /// Reboot recovery in progress; ticks are refused.
    Rebooting,
}

impl CommStatus {
    /// Whether the control cycle may perform actuator I/O.
    #[inline]
    pub const fn accepts_ticks(self) -> bool {
        !matches!(self, Self::Rebooting)
    }

    /// Whether a fault is latched (cleared only by reboot).
    #[inline]
    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::CommError | Self::HardwareError)
    }
}

/// Torque enable state of the actuator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorqueStatus {
    /// Every actuator reports torque on.
    #[default]
    Enabled,
    /// At least one actuator reports torque off.
    Disabled,
    /// Enable requested, applied on the next cycle.
    RequestedEnable,
    /// Disable requested, applied on the next cycle.
    RequestedDisable,
}

impl TorqueStatus {
    /// Whether a request is waiting for the control cycle.
    #[inline]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::RequestedEnable | Self::RequestedDisable)
    }
}

bitflags! {
    /// Hardware error status register of one actuator.
    ///
    /// Named flags follow the manufacturer register layout. Classification
    /// uses the configured cause table; these names are defaults only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HardwareErrorBits: u8 {
        /// Input voltage out of range.
        const INPUT_VOLTAGE    = 0x01;
        /// Internal temperature too high.
        const OVERHEATING      = 0x04;
        /// Motor encoder malfunction.
        const MOTOR_ENCODER    = 0x08;
        /// Electrical shock on the drive circuit.
        const ELECTRICAL_SHOCK = 0x10;
        /// Persistent load above rated torque.
        const OVERLOAD         = 0x20;
    }
}

impl HardwareErrorBits {
    /// Interpret a slot value (register mirrored as f64) as an error mask.
    #[inline]
    pub fn from_slot(value: f64) -> Self {
        Self::from_bits_retain(value as u8)
    }
}

// Codes mirrored into the joint `hardware_state` channel
/// No fault.
pub const HW_STATE_OK: u16 = 0x0000;
/// Transport failure on the last bulk read.
pub const HW_STATE_COMM_ERROR: u16 = 0x0001;
/// Actuator hardware error bit set.
pub const HW_STATE_HARDWARE_ERROR: u16 = 0x0010;

/// Values moved by one bulk transaction, grouped per actuator.
///
/// Allocated once when read/write sets are registered and reused every
/// cycle. `values[i]` belongs to `items[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkFrame {
    /// Per-actuator entries in registration order.
    pub entries: Vec<FrameEntry>,
}

/// One actuator's part of a bulk transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEntry {
    /// Actuator the values belong to
    pub id: ActuatorId,
    /// Register names
    pub items: Vec<String>,
    /// Register values, same order as `items`
    pub values: Vec<f64>,
}

impl FrameEntry {
    /// Create an entry with zeroed values.
    pub fn new(id: ActuatorId, items: Vec<String>) -> Self {
        let values = vec![0.0; items.len()];
        Self { id, items, values }
    }
}

impl BulkFrame {
    /// Find the entry of an actuator.
    pub fn entry(&self, id: ActuatorId) -> Option<&FrameEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Find the entry of an actuator (mutable).
    pub fn entry_mut(&mut self, id: ActuatorId) -> Option<&mut FrameEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }
}

/// Health of one transmission as broadcast to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmissionHealth {
    /// Actuator identifier
    pub id: ActuatorId,
    /// Latest hardware error register (raw bitmask)
    pub hardware_error: u8,
    /// Whether torque is on
    pub torque_enabled: bool,
}

/// Periodic state broadcast payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Capture time, microseconds since UNIX epoch
    pub timestamp_us: u64,
    /// Communication status at capture time
    pub comm_status: CommStatus,
    /// Per-transmission health, configuration order
    pub transmissions: Vec<TransmissionHealth>,
}
