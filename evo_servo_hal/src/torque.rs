//! Torque enable coordination between service callers and the cycle.
//!
//! Callers record a request; the control cycle applies it on its next
//! tick, resynchronizes joint commands to joint states, then derives the
//! status from the link's per-ID torque flags. A caller that finds the
//! status already matching gets an immediate success with no bus traffic.

use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use evo_servo_common::error::LinkError;
use evo_servo_common::link::ActuatorLink;
use evo_servo_common::types::{ActuatorId, TorqueStatus};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::handlers::HandlerSet;

/// Reply to a torque request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorqueResponse {
    /// Whether the requested state was reached
    pub success: bool,
    /// Outcome description
    pub message: String,
}

impl TorqueResponse {
    fn new(success: bool, message: &str) -> Self {
        Self {
            success,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct TorqueState {
    status: TorqueStatus,
    per_id: BTreeMap<ActuatorId, bool>,
}

/// Torque state machine shared by service callers and the control cycle.
#[derive(Debug)]
pub struct TorqueCoordinator {
    ids: Vec<ActuatorId>,
    timeout: Duration,
    poll: Duration,
    state: Mutex<TorqueState>,
    changed: Condvar,
}

impl TorqueCoordinator {
    /// Create a coordinator for the given transmissions.
    ///
    /// The status starts `Enabled`: startup turns torque on.
    pub fn new(ids: Vec<ActuatorId>, timeout: Duration, poll: Duration) -> Self {
        Self {
            ids,
            timeout,
            poll,
            state: Mutex::new(TorqueState::default()),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TorqueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current status.
    pub fn status(&self) -> TorqueStatus {
        self.lock().status
    }

    /// Last per-ID torque flags seen on the link.
    pub fn per_id(&self) -> BTreeMap<ActuatorId, bool> {
        self.lock().per_id.clone()
    }

    /// Record a request without waiting.
    ///
    /// Returns `false` when the status already matches; nothing is queued.
    pub fn submit(&self, enable: bool) -> bool {
        let mut state = self.lock();
        match (enable, state.status) {
            (true, TorqueStatus::Enabled) | (false, TorqueStatus::Disabled) => false,
            (true, _) => {
                state.status = TorqueStatus::RequestedEnable;
                true
            }
            (false, _) => {
                state.status = TorqueStatus::RequestedDisable;
                true
            }
        }
    }

    /// Request a torque state and wait for the cycle to apply it.
    ///
    /// The wait is bounded by the configured timeout, checked every poll
    /// step. On timeout the request stays queued.
    pub fn request(&self, enable: bool) -> TorqueResponse {
        if !self.submit(enable) {
            return TorqueResponse::new(
                true,
                if enable {
                    "Already enabled."
                } else {
                    "Already disabled."
                },
            );
        }
        info!("Torque {} requested", if enable { "enable" } else { "disable" });

        let deadline = Instant::now() + self.timeout;
        let mut state = self.lock();
        loop {
            match state.status {
                TorqueStatus::Enabled => {
                    return if enable {
                        TorqueResponse::new(true, "Success to enable.")
                    } else {
                        TorqueResponse::new(false, "Fail to disable.")
                    };
                }
                TorqueStatus::Disabled => {
                    return if enable {
                        TorqueResponse::new(false, "Fail to enable.")
                    } else {
                        TorqueResponse::new(true, "Success to disable.")
                    };
                }
                TorqueStatus::RequestedEnable | TorqueStatus::RequestedDisable => {}
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("Torque request not applied within {:?}", self.timeout);
                return TorqueResponse::new(
                    false,
                    "Fail to write request, main thread is not running.",
                );
            }
            let step = self.poll.min(deadline - now);
            state = self
                .changed
                .wait_timeout(state, step)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    /// Apply a pending request and refresh the status. Called once per cycle.
    ///
    /// # Errors
    /// Returns the link error of a failed enable/disable; the status is
    /// still refreshed from the link's torque flags.
    pub fn apply(&self, link: &mut dyn ActuatorLink, handlers: &HandlerSet) -> Result<TorqueStatus, LinkError> {
        let pending = self.status();
        let result = match pending {
            TorqueStatus::RequestedEnable => {
                debug!("Applying torque enable");
                let r = link.enable(&self.ids);
                handlers.resync_commands();
                r
            }
            TorqueStatus::RequestedDisable => {
                debug!("Applying torque disable");
                let r = link.disable(&self.ids);
                handlers.resync_commands();
                r
            }
            TorqueStatus::Enabled | TorqueStatus::Disabled => Ok(()),
        };

        let status = self.settle(link, Some(pending));
        result.map(|()| status)
    }

    /// Derive the status from the link's torque flags, dropping any
    /// pending request.
    pub fn refresh(&self, link: &dyn ActuatorLink) -> TorqueStatus {
        self.settle(link, None)
    }

    fn settle(&self, link: &dyn ActuatorLink, applied: Option<TorqueStatus>) -> TorqueStatus {
        let flags = link.torque_state();
        let per_id: BTreeMap<ActuatorId, bool> = self
            .ids
            .iter()
            .map(|id| (*id, flags.get(id).copied().unwrap_or(false)))
            .collect();
        let status = if per_id.values().all(|on| *on) {
            TorqueStatus::Enabled
        } else {
            TorqueStatus::Disabled
        };

        {
            let mut state = self.lock();
            // A request submitted while this cycle ran waits for the next one
            let superseded = applied.is_some_and(|a| state.status.is_pending() && state.status != a);
            if !superseded {
                state.status = status;
            }
            state.per_id = per_id;
        }
        self.changed.notify_all();
        status
    }
}
