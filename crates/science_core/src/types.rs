//! Type definitions for `science_core`.
//!
//! World-level state, commands, events and content. Condition and experiment
//! types live in their own modules and are re-exported from the crate root.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    Channel, ChannelPreference, EvalState, ExperimentAction, ExperimentDefinition,
    ExperimentInstance, ExperimentStatus, ResourceStore, ScienceLedger,
};

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(VesselId);
string_id!(ExperimentId);
string_id!(ChannelId);
string_id!(CommandId);
string_id!(EventId);
string_id!(PrincipalId);

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Normal,
    Debug,
}

/// Flight situation of a vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Situation {
    Landed,
    Splashed,
    #[default]
    Prelaunch,
    Flying,
    SubOrbital,
    Orbiting,
    Escaping,
    Docked,
}

impl Situation {
    pub const ALL: [Situation; 8] = [
        Situation::Landed,
        Situation::Splashed,
        Situation::Prelaunch,
        Situation::Flying,
        Situation::SubOrbital,
        Situation::Orbiting,
        Situation::Escaping,
        Situation::Docked,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Situation::Landed => "landed",
            Situation::Splashed => "splashed",
            Situation::Prelaunch => "prelaunch",
            Situation::Flying => "flying",
            Situation::SubOrbital => "sub_orbital",
            Situation::Orbiting => "orbiting",
            Situation::Escaping => "escaping",
            Situation::Docked => "docked",
        }
    }

    /// Case-insensitive inverse of [`Situation::label`].
    pub fn from_label(label: &str) -> Option<Situation> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|situation| situation.label().eq_ignore_ascii_case(label))
    }

    pub fn is_airborne(self) -> bool {
        matches!(
            self,
            Situation::Flying | Situation::SubOrbital | Situation::Orbiting | Situation::Escaping
        )
    }

    pub fn is_down(self) -> bool {
        matches!(self, Situation::Landed | Situation::Splashed)
    }
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub meta: MetaState,
    pub vessels: HashMap<VesselId, VesselState>,
    pub ledger: ScienceLedger,
    pub counters: Counters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaState {
    pub tick: u64,
    /// Simulation clock in seconds. Advances by `seconds_per_tick` each tick.
    pub time: f32,
    pub seed: u64,
    pub schema_version: u32,
    pub content_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
    pub next_command_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrbitState {
    pub eccentricity: f32,
    pub apoapsis: f32,
    pub periapsis: f32,
    /// Degrees.
    pub inclination: f32,
    /// Orbital speed in m/s.
    pub speed: f32,
}

/// Read-only snapshot of vessel telemetry that conditions evaluate against.
///
/// The simulation never derives these values itself; a flight plan or the
/// driver pushes them in through [`Command::SetVesselEnv`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VesselEnv {
    pub situation: Situation,
    pub body: String,
    pub biome: String,
    pub altitude: f32,
    pub crew_count: u32,
    pub g_force: f32,
    pub surface_speed: f32,
    #[serde(default)]
    pub orbit: OrbitState,
    #[serde(default)]
    pub part_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselState {
    pub id: VesselId,
    pub name: String,
    pub owner: PrincipalId,
    pub env: VesselEnv,
    /// Situation seen at the previous tick; drives recovery detection.
    pub last_situation: Situation,
    pub resources: ResourceStore,
    pub channels: Vec<Channel>,
    pub experiments: Vec<ExperimentInstance>,
}

impl VesselState {
    pub fn experiment(&self, id: &ExperimentId) -> Option<&ExperimentInstance> {
        self.experiments.iter().find(|experiment| &experiment.id == id)
    }

    pub fn experiment_mut(&mut self, id: &ExperimentId) -> Option<&mut ExperimentInstance> {
        self.experiments
            .iter_mut()
            .find(|experiment| &experiment.id == id)
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: CommandId,
    pub issued_by: PrincipalId,
    pub issued_tick: u64,
    pub execute_at_tick: u64,
    pub command: Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    ExperimentAction {
        vessel_id: VesselId,
        experiment_id: ExperimentId,
        action: ExperimentAction,
    },
    SetVesselEnv {
        vessel_id: VesselId,
        env: Box<VesselEnv>,
    },
    SetChannelOnline {
        vessel_id: VesselId,
        channel_id: ChannelId,
        online: bool,
    },
    ReplenishResource {
        vessel_id: VesselId,
        resource: String,
        amount: f32,
    },
}

impl Command {
    pub fn vessel_id(&self) -> &VesselId {
        match self {
            Command::ExperimentAction { vessel_id, .. }
            | Command::SetVesselEnv { vessel_id, .. }
            | Command::SetChannelOnline { vessel_id, .. }
            | Command::ReplenishResource { vessel_id, .. } => vessel_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    ExperimentStateChanged {
        vessel_id: VesselId,
        experiment_id: ExperimentId,
        from: ExperimentStatus,
        to: ExperimentStatus,
    },
    TransmissionStarted {
        vessel_id: VesselId,
        experiment_id: ExperimentId,
        channel_id: ChannelId,
    },
    ScienceTransmitted {
        vessel_id: VesselId,
        experiment_id: ExperimentId,
        packets: f32,
        value: f32,
        deferred: f32,
        delivered_fraction: f32,
    },
    TransmissionCompleted {
        vessel_id: VesselId,
        experiment_id: ExperimentId,
        title: String,
    },
    ConnectionLost {
        vessel_id: VesselId,
        experiment_id: ExperimentId,
    },
    ScienceRecovered {
        vessel_id: VesselId,
        experiment_id: ExperimentId,
        value: f32,
    },
    /// Only emitted at `EventLevel::Debug`.
    ConditionsEvaluated {
        vessel_id: VesselId,
        experiment_id: ExperimentId,
        verdict: EvalState,
        data_rate_modifier: f32,
    },
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameContent {
    pub content_version: String,
    /// Experiment definitions keyed by definition name.
    pub experiments: HashMap<String, ExperimentDefinition>,
    pub constants: Constants,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constants {
    pub seconds_per_tick: f32,
    /// Wall-clock period between transmission steps.
    pub transmission_period_secs: f32,
    /// Body whose surface counts as home for recovery.
    pub home_body: String,
    #[serde(default)]
    pub channel_preference: ChannelPreference,
    /// Resource a channel draws when its content entry omits one.
    pub default_channel_resource: String,

    // -- Derived fields (computed by derive_tick_values, not from JSON) --
    #[serde(skip_deserializing, default)]
    pub transmission_interval_ticks: u64,
}

impl Constants {
    /// Fills the tick-denominated fields from their second-denominated sources.
    pub fn derive_tick_values(&mut self) {
        let ratio = if self.seconds_per_tick > 0.0 {
            self.transmission_period_secs / self.seconds_per_tick
        } else {
            1.0
        };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let ticks = ratio.round().max(1.0) as u64;
        self.transmission_interval_ticks = ticks;
    }

    /// Seconds covered by one transmission step.
    pub fn transmission_step_secs(&self) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let ticks = self.transmission_interval_ticks.max(1) as f32;
        ticks * self.seconds_per_tick
    }
}
