//! Reboot recovery state machine.
//!
//! `RebootSequence` reboots every transmission, one per step with a fixed
//! delay between steps, then reconfigures the link. A failed step restarts
//! the attempt from the first ID. New attempts start only while the
//! recovery window lasts; an attempt already underway runs to its end.
//!
//! The sequence never sleeps. The caller polls it against a `Clock`:
//!
//! ```text
//! loop {
//!     match seq.poll(&mut target, clock.now()) {
//!         RebootPoll::Pending { next_at } => clock.sleep_until(next_at),
//!         RebootPoll::Succeeded => break,
//!         RebootPoll::Failed => break,
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use evo_servo_common::error::{LinkError, ServoError};
use evo_servo_common::types::ActuatorId;
use tracing::{error, info, warn};

/// Operations the sequence drives.
pub trait RecoveryTarget {
    /// Reboot one actuator.
    fn reboot(&mut self, id: ActuatorId) -> Result<(), LinkError>;

    /// Rewrite init items and re-register bulk read/write sets.
    fn reconfigure(&mut self) -> Result<(), ServoError>;
}

/// Result of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebootPoll {
    /// Call `poll` again at `next_at`.
    Pending {
        /// Earliest instant of the next step
        next_at: Instant,
    },
    /// Every actuator rebooted and the link is reconfigured.
    Succeeded,
    /// The window expired before an attempt succeeded.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Reboot(usize),
    Reconfigure,
    Finished(bool),
}

/// Bounded reboot-and-reconfigure sequence.
#[derive(Debug, Clone)]
pub struct RebootSequence {
    ids: Vec<ActuatorId>,
    started: Instant,
    window: Duration,
    delay: Duration,
    step: Step,
    next_at: Instant,
    attempts: u32,
}

impl RebootSequence {
    /// Start a sequence at `now`. The first reboot is due after one delay.
    pub fn new(ids: Vec<ActuatorId>, now: Instant, window: Duration, delay: Duration) -> Self {
        Self {
            ids,
            started: now,
            window,
            delay,
            step: Step::Reboot(0),
            next_at: now + delay,
            attempts: 1,
        }
    }

    /// Attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn window_open(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) < self.window
    }

    fn restart(&mut self, now: Instant) -> RebootPoll {
        self.step = Step::Reboot(0);
        self.next_at = now + self.delay;
        if !self.window_open(self.next_at) {
            error!(
                "Communication reset failed after {} attempts within {:?}",
                self.attempts, self.window
            );
            self.step = Step::Finished(false);
            return RebootPoll::Failed;
        }
        self.attempts += 1;
        RebootPoll::Pending {
            next_at: self.next_at,
        }
    }

    /// Run every step that is due at `now`.
    pub fn poll(&mut self, target: &mut dyn RecoveryTarget, now: Instant) -> RebootPoll {
        match self.step {
            Step::Finished(true) => return RebootPoll::Succeeded,
            Step::Finished(false) => return RebootPoll::Failed,
            _ => {}
        }
        if now < self.next_at {
            return RebootPoll::Pending {
                next_at: self.next_at,
            };
        }

        match self.step {
            Step::Reboot(idx) => {
                let Some(&id) = self.ids.get(idx) else {
                    self.step = Step::Reconfigure;
                    return self.poll(target, now);
                };
                match target.reboot(id) {
                    Ok(()) => {
                        info!("Rebooted ID {} (attempt {})", id, self.attempts);
                        self.step = if idx + 1 < self.ids.len() {
                            Step::Reboot(idx + 1)
                        } else {
                            Step::Reconfigure
                        };
                        self.next_at = now + self.delay;
                        RebootPoll::Pending {
                            next_at: self.next_at,
                        }
                    }
                    Err(e) => {
                        warn!("Cannot reboot ID {}: {}", id, e);
                        self.restart(now)
                    }
                }
            }
            Step::Reconfigure => match target.reconfigure() {
                Ok(()) => {
                    info!("Communication reset succeeded after {} attempts", self.attempts);
                    self.step = Step::Finished(true);
                    RebootPoll::Succeeded
                }
                Err(e) => {
                    warn!("Reconfiguration after reboot failed: {}", e);
                    self.restart(now)
                }
            },
            Step::Finished(ok) => {
                if ok {
                    RebootPoll::Succeeded
                } else {
                    RebootPoll::Failed
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use std::sync::Arc;

    /// Refuses reboots until `clock` reaches `ok_from`.
    struct FlakyBus {
        clock: Arc<ManualClock>,
        ok_from: Option<Instant>,
        reboots: Vec<(ActuatorId, Duration)>,
        reconfigured: u32,
    }

    impl RecoveryTarget for FlakyBus {
        fn reboot(&mut self, id: ActuatorId) -> Result<(), LinkError> {
            self.reboots.push((id, self.clock.elapsed()));
            match self.ok_from {
                Some(t) if self.clock.now() >= t => Ok(()),
                _ => Err(LinkError::RebootFailed(id)),
            }
        }

        fn reconfigure(&mut self) -> Result<(), ServoError> {
            self.reconfigured += 1;
            Ok(())
        }
    }

    fn drive(seq: &mut RebootSequence, bus: &mut FlakyBus, clock: &ManualClock) -> RebootPoll {
        loop {
            match seq.poll(bus, clock.now()) {
                RebootPoll::Pending { next_at } => clock.sleep_until(next_at),
                done => return done,
            }
        }
    }

    fn bus(clock: &Arc<ManualClock>, ok_after: Option<Duration>) -> FlakyBus {
        FlakyBus {
            clock: Arc::clone(clock),
            ok_from: ok_after.map(|d| clock.now() + d),
            reboots: Vec::new(),
            reconfigured: 0,
        }
    }

    #[test]
    fn reboots_each_id_with_fixed_delay() {
        let clock = Arc::new(ManualClock::new());
        let mut bus = bus(&clock, Some(Duration::ZERO));
        let ids = vec![ActuatorId(1), ActuatorId(2), ActuatorId(3)];
        let mut seq = RebootSequence::new(
            ids,
            clock.now(),
            Duration::from_secs(3),
            Duration::from_millis(200),
        );

        assert_eq!(drive(&mut seq, &mut bus, &clock), RebootPoll::Succeeded);
        let times: Vec<u128> = bus.reboots.iter().map(|(_, t)| t.as_millis()).collect();
        assert_eq!(times, vec![200, 400, 600]);
        assert_eq!(bus.reconfigured, 1);
        assert_eq!(seq.attempts(), 1);
        // Finished sequences stay finished
        assert_eq!(seq.poll(&mut bus, clock.now()), RebootPoll::Succeeded);
    }

    #[test]
    fn failing_for_two_seconds_then_recovering_inside_window() {
        let clock = Arc::new(ManualClock::new());
        let mut bus = bus(&clock, Some(Duration::from_secs(2)));
        let mut seq = RebootSequence::new(
            vec![ActuatorId(1), ActuatorId(2)],
            clock.now(),
            Duration::from_secs(3),
            Duration::from_millis(200),
        );

        assert_eq!(drive(&mut seq, &mut bus, &clock), RebootPoll::Succeeded);
        assert!(clock.elapsed() < Duration::from_secs(3));
        assert!(seq.attempts() > 1);
        assert_eq!(bus.reconfigured, 1);
    }

    #[test]
    fn never_recovering_fails_when_window_expires() {
        let clock = Arc::new(ManualClock::new());
        let mut bus = bus(&clock, None);
        let mut seq = RebootSequence::new(
            vec![ActuatorId(1)],
            clock.now(),
            Duration::from_secs(3),
            Duration::from_millis(200),
        );

        assert_eq!(drive(&mut seq, &mut bus, &clock), RebootPoll::Failed);
        assert!(clock.elapsed() <= Duration::from_secs(3));
        assert_eq!(bus.reconfigured, 0);
        // One try every 200 ms from 200 ms up to the window
        assert_eq!(bus.reboots.len(), 14);
    }

    #[test]
    fn poll_before_due_time_does_nothing() {
        let clock = Arc::new(ManualClock::new());
        let mut bus = bus(&clock, Some(Duration::ZERO));
        let start = clock.now();
        let mut seq = RebootSequence::new(
            vec![ActuatorId(7)],
            start,
            Duration::from_secs(3),
            Duration::from_millis(200),
        );
        assert_eq!(
            seq.poll(&mut bus, start),
            RebootPoll::Pending {
                next_at: start + Duration::from_millis(200)
            }
        );
        assert!(bus.reboots.is_empty());
    }
}
