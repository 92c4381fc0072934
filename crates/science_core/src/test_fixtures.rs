//! Shared test fixtures for `science_core` and downstream crates.
//!
//! `base_content()` provides one fixed-mode definition and one-second ticks
//! with a transmission step every tick. `base_state()` builds a single vessel
//! sitting on the launch pad with one idle experiment attached.

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    Channel, ChannelPreference, Constants, Counters, ExperimentDefinition, ExperimentId,
    ExperimentInstance, GameContent, GameState, MetaState, PrincipalId, ResourceStore,
    ScienceLedger, Situation, VesselEnv, VesselId, VesselState,
};

pub const VESSEL: &str = "vessel_0001";
pub const EXPERIMENT: &str = "exp_0001";
pub const CHANNEL: &str = "antenna_0001";
pub const OWNER: &str = "principal_autopilot";
pub const CHARGE: &str = "ElectricCharge";

pub fn base_constants() -> Constants {
    let mut constants = Constants {
        seconds_per_tick: 1.0,
        transmission_period_secs: 1.0,
        home_body: "Kerbin".to_string(),
        channel_preference: ChannelPreference::LowestCost,
        default_channel_resource: CHARGE.to_string(),
        transmission_interval_ticks: 0,
    };
    constants.derive_tick_values();
    constants
}

/// Fixed-mode definition: 10 data at 1/s, 3 s analysis, 10 data worth 5.
pub fn surface_sample() -> ExperimentDefinition {
    ExperimentDefinition {
        name: "surface_sample".to_string(),
        title: "Surface Sample".to_string(),
        description: "Scoop and analyze regolith.".to_string(),
        discipline: "geology".to_string(),
        required_data: 10.0,
        maximum_data: 0.0,
        analysis_time: 3.0,
        research_data_rate: 1.0,
        data_size: 10.0,
        data_per_packet: 1.0,
        science_value: 5.0,
        ..ExperimentDefinition::default()
    }
}

pub fn base_content() -> GameContent {
    let def = surface_sample();
    GameContent {
        content_version: "test".to_string(),
        experiments: HashMap::from([(def.name.clone(), def)]),
        constants: base_constants(),
    }
}

pub fn pad_env() -> VesselEnv {
    VesselEnv {
        situation: Situation::Prelaunch,
        body: "Kerbin".to_string(),
        biome: "LaunchPad".to_string(),
        crew_count: 1,
        g_force: 1.0,
        part_names: vec!["probeCore".to_string(), "antenna".to_string()],
        ..VesselEnv::default()
    }
}

pub fn base_vessel(content: &GameContent) -> VesselState {
    let experiments = content
        .experiments
        .get("surface_sample")
        .map(|def| ExperimentInstance::attach(ExperimentId(EXPERIMENT.to_string()), def, 0.0))
        .into_iter()
        .collect();
    VesselState {
        id: VesselId(VESSEL.to_string()),
        name: "Test Lander".to_string(),
        owner: PrincipalId(OWNER.to_string()),
        env: pad_env(),
        last_situation: Situation::Prelaunch,
        resources: ResourceStore::default().with(CHARGE, 1000.0, 1000.0),
        channels: vec![Channel::new(CHANNEL, 10.0, 1.0, CHARGE)],
        experiments,
    }
}

pub fn base_state(content: &GameContent) -> GameState {
    let vessel = base_vessel(content);
    GameState {
        meta: MetaState {
            tick: 0,
            time: 0.0,
            seed: 42,
            schema_version: 1,
            content_version: content.content_version.clone(),
        },
        vessels: HashMap::from([(vessel.id.clone(), vessel)]),
        ledger: ScienceLedger::default(),
        counters: Counters::default(),
    }
}

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}
