//! # EVO Servo HAL Library
//!
//! Runtime core of a servo transmission hardware interface. Maps between
//! transmission space (actuators on the bus) and joint space (the control
//! law), buffers ad hoc register requests, classifies faults, drives reboot
//! recovery and coordinates torque enable.
//!
//! # Module Structure
//!
//! - [`core`] - `ServoHal`, control cycle and host loop
//! - [`slots`] - Slot arena of fixed-size records
//! - [`handlers`] - Handler groups built from configuration
//! - [`kinematics`] - Transmission/joint matrices
//! - [`item_buffer`] - Ad hoc register read/write requests
//! - [`fault`] - Communication and hardware fault monitor
//! - [`recovery`] - Reboot sequence state machine
//! - [`torque`] - Torque request coordination
//! - [`services`] - Cloneable handle for service callers
//! - [`state_publisher`] - Periodic state broadcast
//! - [`link_registry`] / [`links`] - Link factories and implementations
//! - [`clock`] - Monotonic and manual clocks
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        evo_servo_hal                             │
//! │  ┌──────────────┐    ┌──────────────┐    ┌────────────────────┐  │
//! │  │ ServoServices│◄──►│   ServoHal   │◄──►│   Link Registry    │  │
//! │  │ (any thread) │    │ (cycle loop) │    │                    │  │
//! │  └──────┬───────┘    └──────┬───────┘    └────────────────────┘  │
//! │         │                   │                                    │
//! │         ▼                   ▼                                    │
//! │  ┌──────────────┐    ┌────────────────┐    ┌──────────────────┐  │
//! │  │ ItemBuffer   │    │ ActuatorLink   │    │ Slot arena       │  │
//! │  │ Torque/Fault │    │ (trait object) │    │ (host accessors) │  │
//! │  └──────────────┘    └────────────────┘    └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod clock;
pub mod core;
pub mod fault;
pub mod handlers;
pub mod item_buffer;
pub mod kinematics;
pub mod link_registry;
pub mod links;
pub mod recovery;
pub mod services;
pub mod slots;
pub mod state_publisher;
pub mod torque;

// Re-export key types for convenience
pub use crate::clock::{Clock, ManualClock, MonotonicClock};
pub use crate::core::{CycleReport, CycleStats, ServoHal};
pub use crate::handlers::{ExportedInterface, GroupKind, HandlerSet};
pub use crate::link_registry::LinkRegistry;
pub use crate::services::{ItemResponse, ServiceResult, ServoServices};
pub use crate::state_publisher::{StatePublisher, StateSink, TracingSink};
pub use crate::torque::TorqueResponse;
