//! EVO Servo Common Library
//!
//! This crate provides the shared vocabulary of the servo HAL: actuator
//! identifiers, runtime status enums, the `ActuatorLink` trait, error types
//! and configuration loading.
//!
//! # Module Structure
//!
//! - [`types`] - Identifiers, status enums, hardware error bits, bulk frames
//! - [`link`] - `ActuatorLink` trait implemented by bus drivers
//! - [`error`] - `LinkError`, `RequestError`, `ServoError`
//! - [`config`] - `ServoConfig` and the `ConfigLoader` trait
//! - [`consts`] - Interface names, timing defaults and limits
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use evo_servo_common::prelude::*;
//!
//! let id = ActuatorId(5);
//! assert_eq!(id.get(), 5);
//! ```

pub mod config;
pub mod consts;
pub mod error;
pub mod link;
pub mod prelude;
pub mod types;
