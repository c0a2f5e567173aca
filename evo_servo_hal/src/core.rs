//! Servo HAL core and host loop.
//!
//! `ServoHal` owns the actuator link and drives one control cycle per
//! `tick()`. Shared state lives behind an `Arc` so the service handle and
//! the state publisher can reach it from other threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use evo_servo_common::config::ServoConfig;
use evo_servo_common::consts::CONNECT_RETRY_INTERVAL;
use evo_servo_common::error::{LinkError, ServoError};
use evo_servo_common::link::ActuatorLink;
use evo_servo_common::types::{
    ActuatorId, BulkFrame, CommStatus, FrameEntry, HardwareErrorBits, StateSnapshot,
    TorqueStatus, TransmissionHealth,
};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::fault::{Classification, FaultMonitor};
use crate::handlers::{ExportedInterface, HandlerSet, POSITION_INDEX, VELOCITY_INDEX, EFFORT_INDEX};
use crate::item_buffer::ItemBuffer;
use crate::kinematics::KinematicMapper;
use crate::link_registry::LinkRegistry;
use crate::recovery::{RebootPoll, RebootSequence, RecoveryTarget};
use crate::services::ServoServices;
use crate::slots::RecordId;
use crate::torque::TorqueCoordinator;

/// Outcome of one control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Communication status after the cycle
    pub status: CommStatus,
    /// Code mirrored into joint `hardware_state` slots
    pub hardware_state: u16,
    /// Torque status after the cycle
    pub torque: TorqueStatus,
}

/// Timing statistics of the host loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Number of cycles executed
    pub cycle_count: u64,
    /// Number of cycles that exceeded the target cycle time
    pub timing_violations: u64,
    /// Ticks refused during reboot recovery
    pub refused_ticks: u64,
    /// Maximum observed cycle time
    pub max_cycle_time_us: u64,
    /// Sum of cycle times for average calculation
    pub total_cycle_time_us: u64,
}

impl CycleStats {
    /// Mean cycle time in microseconds.
    pub fn avg_cycle_time_us(&self) -> u64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.total_cycle_time_us / self.cycle_count
        }
    }
}

/// Per-cycle working buffers, sized once.
#[derive(Debug)]
struct Scratch {
    t_pos: Vec<f64>,
    t_vel: Vec<f64>,
    t_eff: Vec<f64>,
    t_cmd: Vec<f64>,
    j_pos: Vec<f64>,
    j_vel: Vec<f64>,
    j_eff: Vec<f64>,
    j_cmd: Vec<f64>,
}

impl Scratch {
    fn new(transmissions: usize, joints: usize) -> Self {
        Self {
            t_pos: vec![0.0; transmissions],
            t_vel: vec![0.0; transmissions],
            t_eff: vec![0.0; transmissions],
            t_cmd: vec![0.0; transmissions],
            j_pos: vec![0.0; joints],
            j_vel: vec![0.0; joints],
            j_eff: vec![0.0; joints],
            j_cmd: vec![0.0; joints],
        }
    }
}

/// Everything touched by one cycle, behind a single lock.
struct CycleContext {
    link: Box<dyn ActuatorLink>,
    read_frame: BulkFrame,
    read_records: Vec<RecordId>,
    write_frame: BulkFrame,
    write_records: Vec<RecordId>,
    scratch: Scratch,
}

/// State shared by the core, the service handle and the publisher.
pub(crate) struct Shared {
    pub(crate) config: ServoConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) handlers: HandlerSet,
    pub(crate) items: ItemBuffer,
    pub(crate) faults: FaultMonitor,
    pub(crate) torque: TorqueCoordinator,
    mapper: KinematicMapper,
    transmission_ids: Vec<ActuatorId>,
    reboot_in_progress: AtomicBool,
    cycle: Mutex<CycleContext>,
}

static_assertions::assert_impl_all!(Shared: Send, Sync);

/// Servo transmission HAL.
pub struct ServoHal {
    shared: Arc<Shared>,
    /// Running flag for host loop control
    running: Arc<AtomicBool>,
    stats: CycleStats,
}

impl ServoHal {
    /// Create the HAL with the link named in the configuration.
    ///
    /// # Errors
    /// Returns `ServoError::LinkNotFound` for an unregistered link name and
    /// any error of [`ServoHal::with_link`].
    pub fn new(config: ServoConfig, registry: &LinkRegistry) -> Result<Self, ServoError> {
        let link = registry.create_link(&config.link.driver)?;
        Self::with_link(config, link, Arc::new(MonotonicClock))
    }

    /// Create the HAL around an existing link.
    ///
    /// Validates the configuration, builds handler groups and matrices,
    /// opens the link (retrying once per `CONNECT_RETRY_INTERVAL`), writes
    /// init items and registers the bulk read/write sets. Torque is not
    /// touched; call [`ServoHal::start`] next.
    ///
    /// # Errors
    /// - `ServoError::Config` for an invalid configuration
    /// - `ServoError::InitFailed` if the link cannot be opened or set up
    pub fn with_link(
        config: ServoConfig,
        mut link: Box<dyn ActuatorLink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServoError> {
        config.validate()?;
        let mapper = KinematicMapper::from_config(&config)?;
        let handlers = HandlerSet::from_config(&config)?;

        info!(
            "Creating servo HAL: {} transmissions, {} joints, {} sensors, link '{}'",
            handlers.transmissions().len(),
            handlers.joints().len(),
            handlers.sensors().len(),
            link.name()
        );

        connect(link.as_mut(), &config, clock.as_ref())?;
        write_init_items(link.as_mut(), &config)?;
        register_item_sets(link.as_mut(), &handlers)?;

        let items = ItemBuffer::from_link(link.as_ref(), &config.all_ids());
        let faults = FaultMonitor::new(&config.hardware_errors);
        let transmission_ids = config.transmission_ids();
        let torque = TorqueCoordinator::new(
            transmission_ids.clone(),
            config.torque_timeout(),
            config.torque_poll(),
        );

        let mut read_frame = BulkFrame::default();
        let mut read_records = Vec::new();
        let mut write_frame = BulkFrame::default();
        let mut write_records = Vec::new();
        for t in handlers.transmissions() {
            read_frame
                .entries
                .push(FrameEntry::new(t.id, t.state.interfaces().to_vec()));
            read_records.push(t.state.record());
            if !t.command.is_empty() {
                write_frame
                    .entries
                    .push(FrameEntry::new(t.id, t.command.interfaces().to_vec()));
                write_records.push(t.command.record());
            }
        }

        let context = CycleContext {
            link,
            read_frame,
            read_records,
            write_frame,
            write_records,
            scratch: Scratch::new(mapper.transmissions(), mapper.joints()),
        };

        info!("Servo HAL initialized, cycle_time={}us", config.cycle_time_us);
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                clock,
                handlers,
                items,
                faults,
                torque,
                mapper,
                transmission_ids,
                reboot_in_progress: AtomicBool::new(false),
                cycle: Mutex::new(context),
            }),
            running: Arc::new(AtomicBool::new(false)),
            stats: CycleStats::default(),
        })
    }

    /// Read, map, resync commands to states and turn torque on.
    pub fn start(&self) -> Result<(), ServoError> {
        self.shared.start()
    }

    /// Turn torque off.
    pub fn stop(&self) -> Result<(), ServoError> {
        self.shared.stop()
    }

    /// Run one control cycle: [`ServoHal::read`] then [`ServoHal::write`].
    ///
    /// # Errors
    /// Returns `ServoError::Rebooting` while reboot recovery runs. Per-cycle
    /// faults never fail a tick; they show up in the report.
    pub fn tick(&self) -> Result<CycleReport, ServoError> {
        let classification = self.shared.read()?;
        let torque = self.shared.write()?;
        Ok(CycleReport {
            status: self.shared.faults.status(),
            hardware_state: classification.hardware_state,
            torque,
        })
    }

    /// Read half of the cycle: bulk read, fault check, transmission to
    /// joint mapping, sensor reads and ad hoc reads.
    ///
    /// Hosts that run a control law between the halves call this and
    /// [`ServoHal::write`] instead of `tick()`.
    pub fn read(&self) -> Result<Classification, ServoError> {
        self.shared.read()
    }

    /// Write half of the cycle: ad hoc writes, torque requests, joint to
    /// transmission mapping and bulk write.
    pub fn write(&self) -> Result<TorqueStatus, ServoError> {
        self.shared.write()
    }

    /// Reboot every transmission and reconfigure the link.
    ///
    /// # Errors
    /// - `ServoError::Rebooting` if another recovery is running
    /// - `ServoError::RebootTimeout` if the window expired; normal cycles
    ///   resume with status `CommError`
    pub fn reboot_actuators(&self) -> Result<(), ServoError> {
        self.shared.reboot_actuators()
    }

    /// Live accessors to every transmission, joint and sensor slot.
    pub fn exported_interfaces(&self) -> Vec<ExportedInterface> {
        self.shared.handlers.exported()
    }

    /// Handler groups of this HAL.
    pub fn handlers(&self) -> &HandlerSet {
        &self.shared.handlers
    }

    /// Configuration in use.
    pub fn config(&self) -> &ServoConfig {
        &self.shared.config
    }

    /// Current communication status.
    pub fn status(&self) -> CommStatus {
        self.shared.faults.status()
    }

    /// Current torque status.
    pub fn torque_status(&self) -> TorqueStatus {
        self.shared.torque.status()
    }

    /// Latest hardware error bits of one actuator.
    pub fn hardware_bits(&self, id: ActuatorId) -> u8 {
        self.shared.faults.bits_of(id)
    }

    /// State broadcast payload.
    pub fn snapshot(&self) -> StateSnapshot {
        self.shared.snapshot()
    }

    /// Cloneable handle for service callers.
    pub fn services(&self) -> ServoServices {
        ServoServices::new(Arc::clone(&self.shared))
    }

    /// Run the host loop until the running flag is cleared.
    ///
    /// Each iteration ticks once and sleeps until the next cycle boundary
    /// on the HAL's clock.
    pub fn run(&mut self) -> Result<(), ServoError> {
        let cycle_time = self.shared.config.cycle_time();
        let target_us = self.shared.config.cycle_time_us as u64;
        info!("Starting servo HAL loop (cycle_time={}us)...", target_us);
        self.running.store(true, Ordering::SeqCst);

        if detect_rt_mode() {
            info!("Running in real-time mode");
        } else {
            info!("Running in standard (non-RT) mode");
        }

        let clock = Arc::clone(&self.shared.clock);
        while self.running.load(Ordering::SeqCst) {
            let cycle_start = clock.now();

            match self.tick() {
                Ok(_) => {}
                Err(ServoError::Rebooting) => {
                    self.stats.refused_ticks += 1;
                }
                Err(e) => warn!("Cycle failed: {}", e),
            }

            let cycle_time_us = clock.now().saturating_duration_since(cycle_start).as_micros() as u64;
            self.stats.cycle_count += 1;
            self.stats.total_cycle_time_us += cycle_time_us;
            self.stats.max_cycle_time_us = self.stats.max_cycle_time_us.max(cycle_time_us);

            if cycle_time_us > target_us {
                self.stats.timing_violations += 1;
                if self.stats.timing_violations <= 10 || self.stats.timing_violations % 1000 == 0 {
                    warn!(
                        "Timing violation #{}: cycle took {}us (target {}us)",
                        self.stats.timing_violations, cycle_time_us, target_us
                    );
                }
            }

            if self.stats.cycle_count % 1000 == 0 {
                debug!(
                    "Servo loop: {} cycles, avg={}us, max={}us, violations={}, refused={}",
                    self.stats.cycle_count,
                    self.stats.avg_cycle_time_us(),
                    self.stats.max_cycle_time_us,
                    self.stats.timing_violations,
                    self.stats.refused_ticks
                );
            }

            clock.sleep_until(cycle_start + cycle_time);
        }

        info!(
            "Servo HAL loop stopped after {} cycles (violations: {})",
            self.stats.cycle_count, self.stats.timing_violations
        );
        Ok(())
    }

    /// Stop the host loop and turn torque off.
    pub fn shutdown(&self) -> Result<(), ServoError> {
        info!("Shutdown requested");
        self.running.store(false, Ordering::SeqCst);
        self.stop()
    }

    /// Running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Host loop timing statistics.
    pub fn stats(&self) -> CycleStats {
        self.stats
    }
}

impl Shared {
    fn lock_cycle(&self) -> MutexGuard<'_, CycleContext> {
        self.cycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn refuse_if_rebooting(&self) -> Result<(), ServoError> {
        if self.faults.status().accepts_ticks() {
            Ok(())
        } else {
            Err(ServoError::Rebooting)
        }
    }

    pub(crate) fn read(&self) -> Result<Classification, ServoError> {
        self.refuse_if_rebooting()?;
        let mut guard = self.lock_cycle();
        // Recovery may have started while we waited for the lock
        self.refuse_if_rebooting()?;
        let ctx = &mut *guard;

        let classification = self.read_transmissions(ctx);
        self.read_sensors(ctx);
        self.items.drain_reads(ctx.link.as_mut());
        Ok(classification)
    }

    pub(crate) fn write(&self) -> Result<TorqueStatus, ServoError> {
        self.refuse_if_rebooting()?;
        let mut guard = self.lock_cycle();
        self.refuse_if_rebooting()?;
        let ctx = &mut *guard;

        self.items.drain_writes(ctx.link.as_mut());
        let torque = match self.torque.apply(ctx.link.as_mut(), &self.handlers) {
            Ok(status) => status,
            Err(e) => {
                warn!("Torque request failed: {}", e);
                self.torque.status()
            }
        };
        self.map_commands(ctx);
        if let Err(e) = ctx.link.bulk_write(&ctx.write_frame) {
            self.faults.record_transport_failure(&e);
        }
        Ok(torque)
    }

    /// Bulk read, classify, mirror the code into joints, map to joints.
    fn read_transmissions(&self, ctx: &mut CycleContext) -> Classification {
        let arena = self.handlers.arena();
        let classification = match ctx.link.bulk_read(&mut ctx.read_frame) {
            Err(e) => self.faults.record_transport_failure(&e),
            Ok(()) => {
                for (entry, record) in ctx.read_frame.entries.iter().zip(&ctx.read_records) {
                    arena.store(*record, &entry.values);
                }
                let readings = self
                    .handlers
                    .transmissions()
                    .iter()
                    .zip(&ctx.read_frame.entries)
                    .filter_map(|(t, entry)| {
                        t.hardware_error_index
                            .and_then(|idx| entry.values.get(idx))
                            .map(|v| (t.id, HardwareErrorBits::from_slot(*v).bits()))
                    });
                self.faults.classify(readings)
            }
        };

        let code = f64::from(classification.hardware_state);
        for joint in self.handlers.joints() {
            if let Some(idx) = joint.hardware_state_index {
                arena.set(joint.state.record(), idx, code);
            }
        }

        let s = &mut ctx.scratch;
        for (i, t) in self.handlers.transmissions().iter().enumerate() {
            let values = arena.lock(t.state.record());
            s.t_pos[i] = values[POSITION_INDEX];
            s.t_vel[i] = values[VELOCITY_INDEX];
            s.t_eff[i] = t.effort_index.map_or(0.0, |idx| values[idx]);
        }
        self.mapper.transmission_to_joint(&s.t_pos, &mut s.j_pos);
        self.mapper.transmission_to_joint(&s.t_vel, &mut s.j_vel);
        self.mapper.transmission_to_joint(&s.t_eff, &mut s.j_eff);
        for (j, joint) in self.handlers.joints().iter().enumerate() {
            let mut values = arena.lock(joint.state.record());
            values[POSITION_INDEX] = s.j_pos[j];
            values[VELOCITY_INDEX] = s.j_vel[j];
            values[EFFORT_INDEX] = s.j_eff[j];
        }

        classification
    }

    fn read_sensors(&self, ctx: &mut CycleContext) {
        let arena = self.handlers.arena();
        for sensor in self.handlers.sensors() {
            for (field, item) in sensor.state.interfaces().iter().enumerate() {
                match ctx.link.read_register(sensor.id, item) {
                    Ok(value) => arena.set(sensor.state.record(), field, f64::from(value)),
                    Err(e) => debug!("Sensor {} read of '{}' failed: {}", sensor.id, item, e),
                }
            }
        }
    }

    /// Map each joint's primary command to its transmissions and fill the
    /// write frame.
    fn map_commands(&self, ctx: &mut CycleContext) {
        let arena = self.handlers.arena();
        let s = &mut ctx.scratch;
        for (j, joint) in self.handlers.joints().iter().enumerate() {
            s.j_cmd[j] = arena
                .lock(joint.command.record())
                .first()
                .copied()
                .unwrap_or(0.0);
        }
        self.mapper.joint_to_transmission(&s.j_cmd, &mut s.t_cmd);
        for (i, t) in self.handlers.transmissions().iter().enumerate() {
            if !t.command.is_empty() {
                arena.set(t.command.record(), 0, s.t_cmd[i]);
            }
        }

        for (entry, record) in ctx.write_frame.entries.iter_mut().zip(&ctx.write_records) {
            let values = arena.lock(*record);
            entry.values.copy_from_slice(&values);
        }
    }

    pub(crate) fn start(&self) -> Result<(), ServoError> {
        let mut guard = self.lock_cycle();
        let ctx = &mut *guard;
        self.read_transmissions(ctx);
        self.handlers.resync_commands();
        ctx.link.enable(&self.transmission_ids)?;
        let torque = self.torque.refresh(ctx.link.as_ref());
        info!("Servo HAL started, torque {:?}", torque);
        Ok(())
    }

    pub(crate) fn stop(&self) -> Result<(), ServoError> {
        let mut guard = self.lock_cycle();
        let result = guard.link.disable(&self.transmission_ids);
        let torque = self.torque.refresh(guard.link.as_ref());
        info!("Servo HAL stopped, torque {:?}", torque);
        result.map_err(ServoError::from)
    }

    pub(crate) fn reboot_actuators(&self) -> Result<(), ServoError> {
        if self
            .reboot_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ServoError::Rebooting);
        }
        let result = self.run_reboot();
        self.reboot_in_progress.store(false, Ordering::SeqCst);
        result
    }

    fn run_reboot(&self) -> Result<(), ServoError> {
        self.faults.begin_reboot();
        {
            let mut ctx = self.lock_cycle();
            if let Err(e) = ctx.link.disable(&self.transmission_ids) {
                warn!("Cannot disable torque before reboot: {}", e);
            }
            self.torque.refresh(ctx.link.as_ref());
            ctx.link.reset_link();
        }

        let window = self.config.reboot_window();
        let mut sequence = RebootSequence::new(
            self.transmission_ids.clone(),
            self.clock.now(),
            window,
            self.config.reboot_id_delay(),
        );
        let outcome = loop {
            let poll = {
                let mut ctx = self.lock_cycle();
                let mut target = LinkRecovery {
                    link: ctx.link.as_mut(),
                    config: &self.config,
                    handlers: &self.handlers,
                };
                sequence.poll(&mut target, self.clock.now())
            };
            match poll {
                RebootPoll::Pending { next_at } => self.clock.sleep_until(next_at),
                done => break done,
            }
        };

        if outcome == RebootPoll::Succeeded {
            self.faults.clear();
            self.start()?;
            info!("Actuators rebooted after {} attempts", sequence.attempts());
            Ok(())
        } else {
            self.faults.fail_open();
            if let Err(e) = self.start() {
                error!("Cannot restart after failed reboot: {}", e);
            }
            Err(ServoError::RebootTimeout { window })
        }
    }

    pub(crate) fn snapshot(&self) -> StateSnapshot {
        let timestamp_us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        let bits = self.faults.hardware_bits();
        let torque = self.torque.per_id();
        StateSnapshot {
            timestamp_us,
            comm_status: self.faults.status(),
            transmissions: self
                .transmission_ids
                .iter()
                .map(|id| TransmissionHealth {
                    id: *id,
                    hardware_error: bits.get(id).copied().unwrap_or(0),
                    torque_enabled: torque.get(id).copied().unwrap_or(false),
                })
                .collect(),
        }
    }
}

/// Reboot target over the cycle's link.
struct LinkRecovery<'a> {
    link: &'a mut dyn ActuatorLink,
    config: &'a ServoConfig,
    handlers: &'a HandlerSet,
}

impl RecoveryTarget for LinkRecovery<'_> {
    fn reboot(&mut self, id: ActuatorId) -> Result<(), LinkError> {
        self.link.reboot(id)
    }

    fn reconfigure(&mut self) -> Result<(), ServoError> {
        write_init_items(self.link, self.config)?;
        register_item_sets(self.link, self.handlers)
    }
}

/// Open the link, retrying up to `connect_attempts` times.
fn connect(link: &mut dyn ActuatorLink, config: &ServoConfig, clock: &dyn Clock) -> Result<(), ServoError> {
    let settings = config.link.settings();
    let ids = config.all_ids();
    let attempts = config.link.connect_attempts.max(1);
    for attempt in 1..=attempts {
        match link.open(&settings, &ids) {
            Ok(()) => {
                info!("Opened {} on {} at {} baud", link.name(), settings.port_name, settings.baud_rate);
                return Ok(());
            }
            Err(e) => {
                warn!("Cannot open link ({}/{}): {}", attempt, attempts, e);
                if attempt < attempts {
                    clock.sleep(CONNECT_RETRY_INTERVAL);
                }
            }
        }
    }
    Err(ServoError::InitFailed(format!(
        "link '{}' did not open after {} attempts",
        link.name(),
        attempts
    )))
}

fn write_init_items(link: &mut dyn ActuatorLink, config: &ServoConfig) -> Result<(), ServoError> {
    for actuator in &config.actuators {
        let id = actuator.actuator_id();
        for init in &actuator.init_items {
            link.write_register(id, &init.item, init.value).map_err(|e| {
                ServoError::InitFailed(format!("init item '{}' on ID {}: {}", init.item, id, e))
            })?;
            debug!("Init item '{}' = {} on ID {}", init.item, init.value, id);
        }
    }
    Ok(())
}

fn register_item_sets(link: &mut dyn ActuatorLink, handlers: &HandlerSet) -> Result<(), ServoError> {
    for t in handlers.transmissions() {
        link.register_read_set(t.id, t.state.interfaces())
            .map_err(|e| ServoError::InitFailed(e.to_string()))?;
        if !t.command.is_empty() {
            link.register_write_set(t.id, t.command.interfaces())
                .map_err(|e| ServoError::InitFailed(e.to_string()))?;
        }
    }
    Ok(())
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: sched_getscheduler(0) only queries the calling thread.
        let policy = unsafe { sched_getscheduler(0) };
        policy == SCHED_FIFO || policy == SCHED_RR
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::links::simulation::{SimHandle, SimulatedLink};
    use evo_servo_common::consts::ITEM_PRESENT_POSITION;
    use std::time::Duration;

    const CONFIG: &str = r#"
number_of_joints = 2
number_of_transmissions = 2
transmission_to_joint_matrix = [0.5, 0.5, 0.5, -0.5]
joint_to_transmission_matrix = [1.0, 1.0, 1.0, -1.0]

[shared]
service_name = "core-test"

[link]
port_name = "sim"
baud_rate = 57600
connect_attempts = 3

[[actuators]]
id = 1
name = "dxl1"
state_interfaces = ["Present Position", "Present Velocity", "Hardware Error Status"]
command_interfaces = ["Goal Position"]
init_items = [{ item = "Operating Mode", value = 3 }]

[[actuators]]
id = 2
name = "dxl2"
state_interfaces = ["Present Position", "Present Velocity", "Hardware Error Status"]
command_interfaces = ["Goal Position"]

[[joints]]
name = "pitch"
state_interfaces = ["position", "velocity", "hardware_state"]
command_interfaces = ["position"]

[[joints]]
name = "roll"
state_interfaces = ["position", "velocity"]
command_interfaces = ["position"]
"#;

    fn build() -> (ServoHal, SimHandle, Arc<ManualClock>) {
        let config: ServoConfig = toml::from_str(CONFIG).unwrap();
        let clock = Arc::new(ManualClock::new());
        let link = SimulatedLink::with_clock(clock.clone());
        let sim = link.handle();
        let hal = ServoHal::with_link(config, Box::new(link), clock.clone()).unwrap();
        (hal, sim, clock)
    }

    #[test]
    fn init_writes_items_and_retries_open() {
        let config: ServoConfig = toml::from_str(CONFIG).unwrap();
        let clock = Arc::new(ManualClock::new());
        let link = SimulatedLink::with_clock(clock.clone());
        let sim = link.handle();
        sim.fail_next_opens(2);

        let _hal = ServoHal::with_link(config, Box::new(link), clock.clone()).unwrap();
        assert_eq!(sim.counters().opens, 3);
        assert_eq!(clock.elapsed(), CONNECT_RETRY_INTERVAL * 2);
        assert!(
            sim.write_log()
                .contains(&(ActuatorId(1), "Operating Mode".to_string(), 3))
        );
    }

    #[test]
    fn open_gives_up_after_configured_attempts() {
        let config: ServoConfig = toml::from_str(CONFIG).unwrap();
        let clock = Arc::new(ManualClock::new());
        let link = SimulatedLink::with_clock(clock.clone());
        link.handle().fail_next_opens(10);

        let result = ServoHal::with_link(config, Box::new(link), clock);
        assert!(matches!(result, Err(ServoError::InitFailed(_))));
    }

    #[test]
    fn tick_maps_transmissions_to_joints() {
        let (hal, sim, _clock) = build();
        hal.start().unwrap();
        sim.set_register(ActuatorId(1), ITEM_PRESENT_POSITION, 3.0);
        sim.set_register(ActuatorId(2), ITEM_PRESENT_POSITION, 1.0);

        let report = hal.tick().unwrap();
        assert_eq!(report.status, CommStatus::Ok);

        let arena = hal.handlers().arena();
        let pitch = &hal.handlers().joints()[0];
        let roll = &hal.handlers().joints()[1];
        assert_eq!(arena.get(pitch.state.record(), POSITION_INDEX), 2.0);
        assert_eq!(arena.get(roll.state.record(), POSITION_INDEX), 1.0);
    }

    #[test]
    fn commands_are_mapped_to_transmissions() {
        let (hal, sim, _clock) = build();
        hal.start().unwrap();
        let arena = hal.handlers().arena();
        let joints = hal.handlers().joints();
        arena.set(joints[0].command.record(), 0, 2.0);
        arena.set(joints[1].command.record(), 0, 0.5);

        hal.tick().unwrap();
        let t = hal.handlers().transmissions();
        assert_eq!(arena.get(t[0].command.record(), 0), 2.5);
        assert_eq!(arena.get(t[1].command.record(), 0), 1.5);
        assert_eq!(sim.register(ActuatorId(1), "Goal Position"), Some(2.5));
    }

    #[test]
    fn transport_failure_keeps_cycling() {
        let (hal, sim, _clock) = build();
        hal.start().unwrap();
        sim.set_bulk_read_failure(true);

        let report = hal.tick().unwrap();
        assert_eq!(report.status, CommStatus::CommError);
        let pitch = &hal.handlers().joints()[0];
        let idx = pitch.hardware_state_index.unwrap();
        assert_ne!(hal.handlers().arena().get(pitch.state.record(), idx), 0.0);

        // Writes continue while degraded
        let writes = sim.counters().bulk_writes;
        hal.tick().unwrap();
        assert_eq!(sim.counters().bulk_writes, writes + 1);
    }

    #[test]
    fn reboot_recovers_and_clears_faults() {
        let (hal, sim, clock) = build();
        hal.start().unwrap();
        sim.set_hardware_error(ActuatorId(2), 0x04);
        assert_eq!(hal.tick().unwrap().status, CommStatus::HardwareError);

        hal.reboot_actuators().unwrap();
        assert_eq!(hal.status(), CommStatus::Ok);
        assert_eq!(hal.hardware_bits(ActuatorId(2)), 0);
        assert_eq!(hal.torque_status(), TorqueStatus::Enabled);
        assert_eq!(clock.elapsed(), Duration::from_millis(600));
        assert_eq!(sim.counters().resets, 1);
        assert_eq!(hal.tick().unwrap().status, CommStatus::Ok);
    }

    #[test]
    fn snapshot_reports_transmissions() {
        let (hal, sim, _clock) = build();
        hal.start().unwrap();
        sim.set_hardware_error(ActuatorId(1), 0x01);
        hal.tick().unwrap();

        let snapshot = hal.snapshot();
        assert_eq!(snapshot.comm_status, CommStatus::HardwareError);
        assert_eq!(snapshot.transmissions.len(), 2);
        assert_eq!(snapshot.transmissions[0].hardware_error, 0x01);
        assert!(snapshot.transmissions[1].torque_enabled);
    }
}
