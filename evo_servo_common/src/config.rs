//! Configuration loading traits and types.
//!
//! This module provides the TOML configuration of the servo HAL:
//! - `ConfigLoader` - Load any deserializable type from a TOML file
//! - `ServoConfig` - Main configuration loaded from servo.toml
//! - `ActuatorConfig` / `JointConfig` - Per-actuator and per-joint layout
//! - `HardwareErrorCause` - Meaning of one hardware error register bit
//!
//! # Usage
//!
//! ```rust,no_run
//! use evo_servo_common::config::{ConfigLoader, ServoConfig, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = ServoConfig::load(Path::new("servo.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_CONNECT_ATTEMPTS, DEFAULT_CYCLE_TIME_US, DEFAULT_ITEM_TIMEOUT_SEC,
    DEFAULT_REBOOT_ID_DELAY_MS, DEFAULT_REBOOT_WINDOW_SEC, DEFAULT_STATE_PUBLISH_RATE_HZ,
    DEFAULT_TORQUE_POLL_MS, DEFAULT_TORQUE_TIMEOUT_MS, JOINT_COMMAND_INTERFACES,
    JOINT_STATE_INTERFACES, MAX_ACTUATORS, MAX_HARDWARE_ERROR_CAUSES, MAX_TIMING_SEC,
};
use crate::link::LinkSettings;
use crate::types::{ActuatorId, HardwareErrorBits};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

/// Common configuration fields shared across EVO applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "servo-arm-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

fn default_cycle_time_us() -> u32 {
    DEFAULT_CYCLE_TIME_US
}

fn default_reboot_window_sec() -> f64 {
    DEFAULT_REBOOT_WINDOW_SEC
}

fn default_reboot_id_delay_ms() -> u64 {
    DEFAULT_REBOOT_ID_DELAY_MS
}

fn default_item_timeout_sec() -> f64 {
    DEFAULT_ITEM_TIMEOUT_SEC
}

fn default_torque_timeout_ms() -> u64 {
    DEFAULT_TORQUE_TIMEOUT_MS
}

fn default_torque_poll_ms() -> u64 {
    DEFAULT_TORQUE_POLL_MS
}

fn default_state_publish_rate_hz() -> u32 {
    DEFAULT_STATE_PUBLISH_RATE_HZ
}

fn default_connect_attempts() -> u32 {
    DEFAULT_CONNECT_ATTEMPTS
}

fn default_link_driver() -> String {
    "simulation".to_string()
}

fn default_hardware_errors() -> Vec<HardwareErrorCause> {
    HardwareErrorCause::manufacturer_table()
}

/// Main configuration loaded from `servo.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServoConfig {
    /// Common application settings.
    pub shared: SharedConfig,

    /// Control cycle time in microseconds.
    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u32,

    /// Actuator bus settings.
    pub link: LinkConfig,

    /// Bounded wall-clock window of one reboot recovery.
    #[serde(default = "default_reboot_window_sec")]
    pub reboot_window_sec: f64,

    /// Delay between rebooting two consecutive actuators.
    #[serde(default = "default_reboot_id_delay_ms")]
    pub reboot_id_delay_ms: u64,

    /// `GetItem` timeout used when the caller passes zero.
    #[serde(default = "default_item_timeout_sec")]
    pub item_timeout_sec: f64,

    /// Time a `SetTorque` caller waits for acknowledgement.
    #[serde(default = "default_torque_timeout_ms")]
    pub torque_timeout_ms: u64,

    /// Granularity of the torque acknowledgement wait.
    #[serde(default = "default_torque_poll_ms")]
    pub torque_poll_ms: u64,

    /// State broadcast rate.
    #[serde(default = "default_state_publish_rate_hz")]
    pub state_publish_rate_hz: u32,

    /// Number of logical joints.
    pub number_of_joints: usize,

    /// Number of transmissions (`kind = "dxl"` actuators).
    pub number_of_transmissions: usize,

    /// `T→J` matrix, row-major, joints × transmissions.
    pub transmission_to_joint_matrix: Vec<f64>,

    /// `J→T` matrix, row-major, transmissions × joints.
    pub joint_to_transmission_matrix: Vec<f64>,

    /// Actuators on the bus, transmissions in matrix column order.
    #[serde(default)]
    pub actuators: Vec<ActuatorConfig>,

    /// Joints in matrix row order.
    #[serde(default)]
    pub joints: Vec<JointConfig>,

    /// Meaning of hardware error register bits.
    #[serde(default = "default_hardware_errors")]
    pub hardware_errors: Vec<HardwareErrorCause>,
}

/// Actuator bus settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Registered link name.
    #[serde(default = "default_link_driver")]
    pub driver: String,

    /// Serial device or endpoint.
    pub port_name: String,

    /// Baud rate.
    pub baud_rate: u32,

    /// Open attempts at startup, one per second.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

impl LinkConfig {
    /// Port parameters for `ActuatorLink::open`.
    pub fn settings(&self) -> LinkSettings {
        LinkSettings {
            port_name: self.port_name.clone(),
            baud_rate: self.baud_rate,
        }
    }
}

/// Role of an actuator on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    /// Servo actuator (transmission).
    #[default]
    Dxl,
    /// Register-polled sensor board.
    Sensor,
}

/// Per-actuator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorConfig {
    /// Bus identifier.
    pub id: u8,

    /// Unique name (exported interface prefix).
    pub name: String,

    /// Role on the bus.
    #[serde(default)]
    pub kind: ActuatorKind,

    /// Registers read every cycle.
    #[serde(default)]
    pub state_interfaces: Vec<String>,

    /// Registers written every cycle (transmissions only).
    #[serde(default)]
    pub command_interfaces: Vec<String>,

    /// Registers written once at startup and after every reboot, in order.
    #[serde(default)]
    pub init_items: Vec<InitItem>,
}

/// One register written during actuator setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitItem {
    /// Register name.
    pub item: String,
    /// Value written.
    pub value: u32,
}

impl ActuatorConfig {
    /// Bus identifier as a typed ID.
    #[inline]
    pub fn actuator_id(&self) -> ActuatorId {
        ActuatorId(self.id)
    }
}

/// Per-joint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointConfig {
    /// Unique joint name.
    pub name: String,

    /// Extra state interfaces (position, velocity and effort always exist).
    #[serde(default)]
    pub state_interfaces: Vec<String>,

    /// Command interfaces; the first one is mapped to transmissions.
    pub command_interfaces: Vec<String>,
}

/// Meaning of one bit (or bit group) of the hardware error register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareErrorCause {
    /// Register mask.
    pub mask: u8,
    /// Human-readable cause.
    pub cause: String,
}

impl HardwareErrorCause {
    /// Default cause table of the manufacturer's status register.
    pub fn manufacturer_table() -> Vec<Self> {
        [
            (HardwareErrorBits::INPUT_VOLTAGE, "input voltage error"),
            (HardwareErrorBits::OVERHEATING, "overheating"),
            (HardwareErrorBits::MOTOR_ENCODER, "motor encoder"),
            (HardwareErrorBits::ELECTRICAL_SHOCK, "electrical shock"),
            (HardwareErrorBits::OVERLOAD, "overload"),
        ]
        .into_iter()
        .map(|(bits, cause)| Self {
            mask: bits.bits(),
            cause: cause.to_string(),
        })
        .collect()
    }
}

impl ServoConfig {
    /// Validate the servo configuration.
    ///
    /// # Validation Rules
    /// 1. Timing values > 0, seconds at most MAX_TIMING_SEC
    /// 2. `number_of_joints == joints.len()`
    /// 3. `number_of_transmissions` == count of `dxl` actuators
    /// 4. Matrix sizes match joints × transmissions
    /// 5. Actuator IDs and names unique, at most MAX_ACTUATORS
    /// 6. Interface names unique within each group and known for joints
    /// 7. Every transmission and joint has a command interface
    /// 8. Hardware error masks non-zero, at most MAX_HARDWARE_ERROR_CAUSES
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.validate_timing()?;
        self.validate_actuators()?;
        self.validate_joints()?;
        self.validate_matrices()?;
        self.validate_hardware_errors()
    }

    fn validate_timing(&self) -> Result<(), ConfigError> {
        if self.cycle_time_us == 0 {
            return Err(invalid("cycle_time_us must be greater than 0"));
        }
        check_seconds("reboot_window_sec", self.reboot_window_sec)?;
        check_seconds("item_timeout_sec", self.item_timeout_sec)?;
        if self.torque_poll_ms == 0 || self.torque_poll_ms > self.torque_timeout_ms {
            return Err(invalid(
                "torque_poll_ms must be > 0 and not exceed torque_timeout_ms",
            ));
        }
        if self.state_publish_rate_hz == 0 {
            return Err(invalid("state_publish_rate_hz must be greater than 0"));
        }
        if self.link.connect_attempts == 0 {
            return Err(invalid("link.connect_attempts must be greater than 0"));
        }
        Ok(())
    }

    fn validate_actuators(&self) -> Result<(), ConfigError> {
        if self.actuators.len() > MAX_ACTUATORS {
            return Err(invalid(format!(
                "Too many actuators: {} (max {})",
                self.actuators.len(),
                MAX_ACTUATORS
            )));
        }

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for actuator in &self.actuators {
            if actuator.name.is_empty() {
                return Err(invalid(format!("Actuator ID {} has empty name", actuator.id)));
            }
            if !ids.insert(actuator.id) {
                return Err(invalid(format!("Duplicate actuator ID: {}", actuator.id)));
            }
            if !names.insert(actuator.name.as_str()) {
                return Err(invalid(format!("Duplicate actuator name: {}", actuator.name)));
            }
            check_unique(&actuator.name, &actuator.state_interfaces)?;
            check_unique(&actuator.name, &actuator.command_interfaces)?;

            match actuator.kind {
                ActuatorKind::Dxl => {
                    if actuator.command_interfaces.is_empty() {
                        return Err(invalid(format!(
                            "Transmission '{}' has no command interface",
                            actuator.name
                        )));
                    }
                }
                ActuatorKind::Sensor => {
                    if !actuator.command_interfaces.is_empty() {
                        return Err(invalid(format!(
                            "Sensor '{}' cannot have command interfaces",
                            actuator.name
                        )));
                    }
                }
            }
        }

        let transmissions = self.transmissions().count();
        if transmissions != self.number_of_transmissions {
            return Err(invalid(format!(
                "number_of_transmissions is {} but {} dxl actuators are configured",
                self.number_of_transmissions, transmissions
            )));
        }
        Ok(())
    }

    fn validate_joints(&self) -> Result<(), ConfigError> {
        if self.joints.len() != self.number_of_joints {
            return Err(invalid(format!(
                "number_of_joints is {} but {} joints are configured",
                self.number_of_joints,
                self.joints.len()
            )));
        }

        let mut names = HashSet::new();
        for joint in &self.joints {
            if !names.insert(joint.name.as_str()) {
                return Err(invalid(format!("Duplicate joint name: {}", joint.name)));
            }
            check_unique(&joint.name, &joint.state_interfaces)?;
            check_unique(&joint.name, &joint.command_interfaces)?;

            if let Some(bad) = joint
                .state_interfaces
                .iter()
                .find(|name| !JOINT_STATE_INTERFACES.contains(&name.as_str()))
            {
                return Err(invalid(format!(
                    "Joint '{}': unknown state interface '{}'",
                    joint.name, bad
                )));
            }
            if let Some(bad) = joint
                .command_interfaces
                .iter()
                .find(|name| !JOINT_COMMAND_INTERFACES.contains(&name.as_str()))
            {
                return Err(invalid(format!(
                    "Joint '{}': unknown command interface '{}'",
                    joint.name, bad
                )));
            }
            if joint.command_interfaces.is_empty() {
                return Err(invalid(format!("Joint '{}' has no command interface", joint.name)));
            }
        }
        Ok(())
    }

    fn validate_matrices(&self) -> Result<(), ConfigError> {
        let expected = self.number_of_joints * self.number_of_transmissions;
        if self.transmission_to_joint_matrix.len() != expected {
            return Err(invalid(format!(
                "transmission_to_joint_matrix has {} values, expected {} ({} joints x {} transmissions)",
                self.transmission_to_joint_matrix.len(),
                expected,
                self.number_of_joints,
                self.number_of_transmissions
            )));
        }
        if self.joint_to_transmission_matrix.len() != expected {
            return Err(invalid(format!(
                "joint_to_transmission_matrix has {} values, expected {} ({} transmissions x {} joints)",
                self.joint_to_transmission_matrix.len(),
                expected,
                self.number_of_transmissions,
                self.number_of_joints
            )));
        }
        let finite = self
            .transmission_to_joint_matrix
            .iter()
            .chain(&self.joint_to_transmission_matrix)
            .all(|v| v.is_finite());
        if !finite {
            return Err(invalid("kinematic matrices must contain finite values"));
        }
        Ok(())
    }

    fn validate_hardware_errors(&self) -> Result<(), ConfigError> {
        if self.hardware_errors.len() > MAX_HARDWARE_ERROR_CAUSES {
            return Err(invalid(format!(
                "Too many hardware error causes: {} (max {})",
                self.hardware_errors.len(),
                MAX_HARDWARE_ERROR_CAUSES
            )));
        }
        if let Some(cause) = self.hardware_errors.iter().find(|c| c.mask == 0) {
            return Err(invalid(format!(
                "Hardware error cause '{}' has an empty mask",
                cause.cause
            )));
        }
        Ok(())
    }

    /// Transmission actuators in matrix column order.
    pub fn transmissions(&self) -> impl Iterator<Item = &ActuatorConfig> {
        self.actuators.iter().filter(|a| a.kind == ActuatorKind::Dxl)
    }

    /// Sensor actuators in configuration order.
    pub fn sensors(&self) -> impl Iterator<Item = &ActuatorConfig> {
        self.actuators.iter().filter(|a| a.kind == ActuatorKind::Sensor)
    }

    /// IDs of transmission actuators (torque, reboot targets).
    pub fn transmission_ids(&self) -> Vec<ActuatorId> {
        self.transmissions().map(ActuatorConfig::actuator_id).collect()
    }

    /// IDs of every actuator on the bus.
    pub fn all_ids(&self) -> Vec<ActuatorId> {
        self.actuators.iter().map(ActuatorConfig::actuator_id).collect()
    }

    /// Control cycle period.
    pub fn cycle_time(&self) -> Duration {
        Duration::from_micros(u64::from(self.cycle_time_us))
    }

    /// Reboot recovery window.
    pub fn reboot_window(&self) -> Duration {
        Duration::from_secs_f64(self.reboot_window_sec)
    }

    /// Delay between two reboots.
    pub fn reboot_id_delay(&self) -> Duration {
        Duration::from_millis(self.reboot_id_delay_ms)
    }

    /// Default `GetItem` timeout.
    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.item_timeout_sec)
    }

    /// Torque acknowledgement timeout.
    pub fn torque_timeout(&self) -> Duration {
        Duration::from_millis(self.torque_timeout_ms)
    }

    /// Torque acknowledgement polling step.
    pub fn torque_poll(&self) -> Duration {
        Duration::from_millis(self.torque_poll_ms)
    }

    /// State broadcast period.
    pub fn state_publish_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.state_publish_rate_hz))
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

fn check_seconds(field: &str, secs: f64) -> Result<(), ConfigError> {
    if secs > 0.0 && secs <= MAX_TIMING_SEC {
        Ok(())
    } else {
        Err(invalid(format!(
            "{} must be in (0, {}], got {}",
            field, MAX_TIMING_SEC, secs
        )))
    }
}

fn check_unique(owner: &str, names: &[String]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(invalid(format!(
                "'{}': duplicate interface name '{}'",
                owner, name
            )));
        }
    }
    Ok(())
}
