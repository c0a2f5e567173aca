//! Prelude module for common re-exports.
//!
//! ```rust
//! use evo_servo_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ActuatorConfig, ActuatorKind, ConfigError, ConfigLoader, HardwareErrorCause, InitItem,
    JointConfig, LinkConfig, LogLevel, ServoConfig, SharedConfig,
};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{LinkError, RequestError, ServoError};

// ─── Link ───────────────────────────────────────────────────────────
pub use crate::link::{ActuatorLink, LinkFactory, LinkSettings};

// ─── Types ──────────────────────────────────────────────────────────
pub use crate::types::{
    ActuatorId, BulkFrame, CommStatus, FrameEntry, HardwareErrorBits, RegisterValue,
    StateSnapshot, TorqueStatus, TransmissionHealth,
};
