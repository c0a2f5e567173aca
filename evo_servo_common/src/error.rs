//! Error types of the servo HAL.
//!
//! - `LinkError` - Failures reported by an `ActuatorLink`
//! - `RequestError` - Failures of an ad hoc item request, seen only by its caller
//! - `ServoError` - Top-level runtime error

use crate::types::ActuatorId;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by an actuator link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// Register name not present in the actuator's control table
    #[error("Cannot find control item '{item}' on ID {id}")]
    ControlItemNotFound {
        /// Actuator ID.
        id: ActuatorId,
        /// Requested item.
        item: String,
    },

    /// Port could not be opened
    #[error("Failed to open port: {0}")]
    OpenPortFailed(String),

    /// Single register write failed
    #[error("Item write failed on ID {0}")]
    ItemWriteFailed(ActuatorId),

    /// Single register read failed
    #[error("Item read failed on ID {0}")]
    ItemReadFailed(ActuatorId),

    /// Bulk write transaction failed
    #[error("Bulk write failed: {0}")]
    BulkWriteFailed(String),

    /// Bulk read transaction failed
    #[error("Bulk read failed: {0}")]
    BulkReadFailed(String),

    /// Registering the bulk read set failed
    #[error("Failed to set read items on ID {0}")]
    SetReadItemFailed(ActuatorId),

    /// Registering the bulk write set failed
    #[error("Failed to set write items on ID {0}")]
    SetWriteItemFailed(ActuatorId),

    /// Reboot command was not acknowledged
    #[error("Reboot failed on ID {0}")]
    RebootFailed(ActuatorId),
}

impl LinkError {
    /// Whether the error is a bus-level transport failure.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::OpenPortFailed(_) | Self::BulkReadFailed(_) | Self::BulkWriteFailed(_)
        )
    }
}

/// Failure of an ad hoc item request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// Item is not registered for the actuator
    #[error("Unknown item '{item}' for ID {id}")]
    UnknownItem {
        /// Actuator ID.
        id: ActuatorId,
        /// Requested item.
        item: String,
    },

    /// The control cycle did not complete the request in time
    #[error("Request for '{item}' on ID {id} timed out after {timeout:?}")]
    Timeout {
        /// Actuator ID.
        id: ActuatorId,
        /// Requested item.
        item: String,
        /// Time waited.
        timeout: Duration,
    },

    /// The link reported a failure while serving the request
    #[error("Link failure while serving request: {0}")]
    Link(#[from] LinkError),

    /// No result is available for the key
    #[error("No result for '{item}' on ID {id}")]
    NotReady {
        /// Actuator ID.
        id: ActuatorId,
        /// Requested item.
        item: String,
    },
}

/// Top-level error of the servo HAL runtime.
#[derive(Debug, Clone, Error)]
pub enum ServoError {
    /// Bus or link failure (degraded, retried every cycle)
    #[error("Transport error: {0}")]
    Transport(LinkError),

    /// Actuator reported a hardware error bit
    #[error("Hardware fault on ID {id}: {causes}")]
    HardwareFault {
        /// Offending actuator.
        id: ActuatorId,
        /// Human-readable cause list.
        causes: String,
    },

    /// Invalid configuration (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ad hoc request failed
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    /// Reboot recovery window exhausted
    #[error("Reboot recovery failed within {window:?}")]
    RebootTimeout {
        /// Recovery window.
        window: Duration,
    },

    /// Tick refused while reboot recovery is in progress
    #[error("Actuators are rebooting, tick refused")]
    Rebooting,

    /// Initialization could not complete
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Link not registered
    #[error("Link not found: {0}")]
    LinkNotFound(String),
}

impl From<LinkError> for ServoError {
    fn from(err: LinkError) -> Self {
        Self::Transport(err)
    }
}

impl From<crate::config::ConfigError> for ServoError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
