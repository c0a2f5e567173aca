//! Periodic state broadcast.
//!
//! The publisher snapshots the HAL under short per-structure locks, then
//! hands the snapshot to a `StateSink` with no lock held. The default sink
//! logs the snapshot as JSON through `tracing`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use evo_servo_common::types::StateSnapshot;
use tracing::{debug, info, warn};

use crate::services::ServoServices;

/// Destination of state snapshots.
pub trait StateSink: Send {
    /// Deliver one snapshot.
    fn publish(&mut self, snapshot: &StateSnapshot) -> Result<(), String>;
}

/// Sink that logs each snapshot as one JSON line.
#[derive(Debug)]
pub struct TracingSink {
    service_name: String,
}

impl TracingSink {
    /// Create a sink tagging records with `service_name`.
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
        }
    }
}

impl StateSink for TracingSink {
    fn publish(&mut self, snapshot: &StateSnapshot) -> Result<(), String> {
        let payload = serde_json::to_string(snapshot).map_err(|e| e.to_string())?;
        info!(target: "servo_state", service = %self.service_name, "{}", payload);
        Ok(())
    }
}

/// Sink that keeps every snapshot in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    snapshots: Arc<std::sync::Mutex<Vec<StateSnapshot>>>,
}

impl MemorySink {
    /// Snapshots received so far.
    pub fn snapshots(&self) -> Vec<StateSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl StateSink for MemorySink {
    fn publish(&mut self, snapshot: &StateSnapshot) -> Result<(), String> {
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(snapshot.clone());
        Ok(())
    }
}

/// Publishes HAL state at the configured rate.
pub struct StatePublisher {
    services: ServoServices,
    sink: Box<dyn StateSink>,
    published: u64,
    failures: u64,
}

impl StatePublisher {
    /// Create a publisher writing to `sink`.
    pub fn new(services: ServoServices, sink: Box<dyn StateSink>) -> Self {
        Self {
            services,
            sink,
            published: 0,
            failures: 0,
        }
    }

    /// Snapshot and publish once.
    pub fn publish_once(&mut self) {
        let snapshot = self.services.snapshot();
        match self.sink.publish(&snapshot) {
            Ok(()) => self.published += 1,
            Err(e) => {
                self.failures += 1;
                if self.failures <= 10 || self.failures % 1000 == 0 {
                    warn!("Failed to publish state #{}: {}", self.failures, e);
                }
            }
        }
    }

    /// Number of snapshots delivered.
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Publish on a background thread until `running` is cleared.
    pub fn spawn(mut self, running: Arc<AtomicBool>) -> std::io::Result<JoinHandle<u64>> {
        let period = self.services.state_publish_period();
        thread::Builder::new()
            .name("servo-state".to_string())
            .spawn(move || {
                info!("State publisher started (period={:?})", period);
                let mut next = Instant::now();
                while running.load(Ordering::SeqCst) {
                    self.publish_once();
                    next += period;
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    } else {
                        next = now;
                    }
                }
                debug!("State publisher stopped after {} snapshots", self.published);
                self.published
            })
    }
}
