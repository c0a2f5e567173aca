//! Handler groups: named slot layouts built once from configuration.
//!
//! A group ties a list of interface names to one record of the slot
//! arena. `HandlerSet::from_config` is the only place groups are built;
//! reboot recovery re-registers link items from the existing set.

use std::sync::Arc;

use evo_servo_common::config::ServoConfig;
use evo_servo_common::consts::{
    HW_IF_EFFORT, HW_IF_HARDWARE_STATE, HW_IF_POSITION, HW_IF_VELOCITY, ITEM_HARDWARE_ERROR_STATUS,
    ITEM_PRESENT_CURRENT, ITEM_PRESENT_LOAD, ITEM_PRESENT_POSITION, ITEM_PRESENT_VELOCITY,
};
use evo_servo_common::error::ServoError;
use evo_servo_common::types::ActuatorId;

use crate::slots::{RecordId, SlotArena, SlotArenaBuilder, SlotRef};

/// Position slot of transmission-state and joint-state groups.
pub const POSITION_INDEX: usize = 0;
/// Velocity slot of transmission-state and joint-state groups.
pub const VELOCITY_INDEX: usize = 1;
/// Effort slot of joint-state groups (and of transmission-state groups
/// that read an effort register).
pub const EFFORT_INDEX: usize = 2;

/// Role of a handler group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    /// Registers read from a transmission each cycle.
    TransmissionState,
    /// Registers written to a transmission each cycle.
    TransmissionCommand,
    /// Joint-space state seen by the control law.
    JointState,
    /// Joint-space commands set by the control law.
    JointCommand,
    /// Registers polled from a sensor board.
    SensorState,
}

/// Named slot layout bound to one arena record.
#[derive(Debug, Clone)]
pub struct HandlerGroup {
    kind: GroupKind,
    name: String,
    interfaces: Vec<String>,
    record: RecordId,
}

impl HandlerGroup {
    fn new(builder: &mut SlotArenaBuilder, kind: GroupKind, name: &str, interfaces: Vec<String>) -> Self {
        let record = builder.add_record(interfaces.len());
        Self {
            kind,
            name: name.to_string(),
            interfaces,
            record,
        }
    }

    /// Group role.
    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    /// Owner name (joint or actuator).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interface names in slot order.
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Arena record holding the values.
    pub fn record(&self) -> RecordId {
        self.record
    }

    /// Slot index of an interface.
    pub fn index_of(&self, interface: &str) -> Option<usize> {
        self.interfaces.iter().position(|name| name == interface)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    /// Whether the group has no slots.
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

/// State and command groups of one transmission.
#[derive(Debug, Clone)]
pub struct TransmissionHandles {
    /// Bus identifier.
    pub id: ActuatorId,
    /// Registers read every cycle, position and velocity first.
    pub state: HandlerGroup,
    /// Registers written every cycle; slot 0 receives the mapped command.
    pub command: HandlerGroup,
    /// Slot of Present Current or Present Load, if read.
    pub effort_index: Option<usize>,
    /// Slot of Hardware Error Status, if read.
    pub hardware_error_index: Option<usize>,
}

/// State and command groups of one joint.
#[derive(Debug, Clone)]
pub struct JointHandles {
    /// Position, velocity, effort, then the configured extras.
    pub state: HandlerGroup,
    /// Configured command interfaces; slot 0 is mapped to transmissions.
    pub command: HandlerGroup,
    /// Slot mirroring the fault classification, if exported.
    pub hardware_state_index: Option<usize>,
    /// `(command slot, state slot)` pairs sharing an interface name.
    pub resync_pairs: Vec<(usize, usize)>,
}

/// State group of one sensor board.
#[derive(Debug, Clone)]
pub struct SensorHandles {
    /// Bus identifier.
    pub id: ActuatorId,
    /// Registers polled every cycle.
    pub state: HandlerGroup,
}

/// One slot handed to the host.
#[derive(Debug, Clone)]
pub struct ExportedInterface {
    /// Owner name (joint or actuator).
    pub owner: String,
    /// Interface name.
    pub interface: String,
    /// Group role.
    pub kind: GroupKind,
    /// Live accessor.
    pub slot: SlotRef,
}

/// Every handler group of the runtime, with the arena backing them.
#[derive(Debug, Clone)]
pub struct HandlerSet {
    arena: Arc<SlotArena>,
    transmissions: Vec<TransmissionHandles>,
    joints: Vec<JointHandles>,
    sensors: Vec<SensorHandles>,
}

impl HandlerSet {
    /// Build all groups and allocate their storage.
    ///
    /// # Errors
    /// Returns `ServoError::Config` if the group counts disagree with the
    /// configured joint and transmission counts.
    pub fn from_config(config: &ServoConfig) -> Result<Self, ServoError> {
        let mut builder = SlotArenaBuilder::new();

        let transmissions: Vec<TransmissionHandles> = config
            .transmissions()
            .map(|actuator| {
                let interfaces = transmission_state_layout(&actuator.state_interfaces);
                let effort_index = interfaces
                    .get(EFFORT_INDEX)
                    .filter(|name| is_effort_item(name))
                    .map(|_| EFFORT_INDEX);
                let state = HandlerGroup::new(
                    &mut builder,
                    GroupKind::TransmissionState,
                    &actuator.name,
                    interfaces,
                );
                let hardware_error_index = state.index_of(ITEM_HARDWARE_ERROR_STATUS);
                let command = HandlerGroup::new(
                    &mut builder,
                    GroupKind::TransmissionCommand,
                    &actuator.name,
                    actuator.command_interfaces.clone(),
                );
                TransmissionHandles {
                    id: actuator.actuator_id(),
                    state,
                    command,
                    effort_index,
                    hardware_error_index,
                }
            })
            .collect();

        let joints: Vec<JointHandles> = config
            .joints
            .iter()
            .map(|joint| {
                let mut interfaces = vec![
                    HW_IF_POSITION.to_string(),
                    HW_IF_VELOCITY.to_string(),
                    HW_IF_EFFORT.to_string(),
                ];
                let extras: Vec<String> = joint
                    .state_interfaces
                    .iter()
                    .filter(|name| !interfaces.contains(*name))
                    .cloned()
                    .collect();
                interfaces.extend(extras);
                let state =
                    HandlerGroup::new(&mut builder, GroupKind::JointState, &joint.name, interfaces);
                let command = HandlerGroup::new(
                    &mut builder,
                    GroupKind::JointCommand,
                    &joint.name,
                    joint.command_interfaces.clone(),
                );
                let resync_pairs = command
                    .interfaces()
                    .iter()
                    .enumerate()
                    .filter_map(|(cmd, name)| state.index_of(name).map(|st| (cmd, st)))
                    .collect();
                JointHandles {
                    hardware_state_index: state.index_of(HW_IF_HARDWARE_STATE),
                    state,
                    command,
                    resync_pairs,
                }
            })
            .collect();

        let sensors = config
            .sensors()
            .filter(|sensor| !sensor.state_interfaces.is_empty())
            .map(|sensor| SensorHandles {
                id: sensor.actuator_id(),
                state: HandlerGroup::new(
                    &mut builder,
                    GroupKind::SensorState,
                    &sensor.name,
                    sensor.state_interfaces.clone(),
                ),
            })
            .collect();

        if transmissions.len() != config.number_of_transmissions {
            return Err(ServoError::Config(format!(
                "expected {} transmissions, built {}",
                config.number_of_transmissions,
                transmissions.len()
            )));
        }
        if joints.len() != config.number_of_joints {
            return Err(ServoError::Config(format!(
                "expected {} joints, built {}",
                config.number_of_joints,
                joints.len()
            )));
        }

        Ok(Self {
            arena: builder.build(),
            transmissions,
            joints,
            sensors,
        })
    }

    /// Shared slot storage.
    pub fn arena(&self) -> &Arc<SlotArena> {
        &self.arena
    }

    /// Transmissions in matrix column order.
    pub fn transmissions(&self) -> &[TransmissionHandles] {
        &self.transmissions
    }

    /// Joints in matrix row order.
    pub fn joints(&self) -> &[JointHandles] {
        &self.joints
    }

    /// Sensor boards.
    pub fn sensors(&self) -> &[SensorHandles] {
        &self.sensors
    }

    /// Accessor to one slot of one group.
    pub fn slot(&self, group: &HandlerGroup, interface: &str) -> Option<SlotRef> {
        group
            .index_of(interface)
            .map(|field| SlotRef::new(Arc::clone(&self.arena), group.record(), field))
    }

    /// Every state and command slot, for the host.
    pub fn exported(&self) -> Vec<ExportedInterface> {
        let mut groups: Vec<&HandlerGroup> = Vec::new();
        for t in &self.transmissions {
            groups.push(&t.state);
            groups.push(&t.command);
        }
        for j in &self.joints {
            groups.push(&j.state);
            groups.push(&j.command);
        }
        for s in &self.sensors {
            groups.push(&s.state);
        }

        groups
            .into_iter()
            .flat_map(|group| {
                group
                    .interfaces()
                    .iter()
                    .enumerate()
                    .map(move |(field, interface)| ExportedInterface {
                        owner: group.name().to_string(),
                        interface: interface.clone(),
                        kind: group.kind(),
                        slot: SlotRef::new(Arc::clone(&self.arena), group.record(), field),
                    })
            })
            .collect()
    }

    /// Copy every joint state into the matching command interfaces.
    pub fn resync_commands(&self) {
        let mut state = Vec::new();
        for joint in &self.joints {
            state.clear();
            state.extend_from_slice(&self.arena.lock(joint.state.record()));
            let mut command = self.arena.lock(joint.command.record());
            for &(cmd, st) in &joint.resync_pairs {
                command[cmd] = state[st];
            }
        }
    }
}

fn is_effort_item(name: &str) -> bool {
    name == ITEM_PRESENT_CURRENT || name == ITEM_PRESENT_LOAD
}

/// Order transmission registers: position, velocity, effort, then the rest.
///
/// Position and velocity are always read, even if not configured.
fn transmission_state_layout(configured: &[String]) -> Vec<String> {
    let mut layout = vec![
        ITEM_PRESENT_POSITION.to_string(),
        ITEM_PRESENT_VELOCITY.to_string(),
    ];
    if let Some(effort) = configured.iter().find(|name| is_effort_item(name)) {
        layout.push(effort.clone());
    }
    let rest: Vec<String> = configured
        .iter()
        .filter(|name| !layout.contains(*name) && !is_effort_item(name))
        .cloned()
        .collect();
    layout.extend(rest);
    layout
}
