//! Whole-game save and load through [`ConfigNode`] trees.
//!
//! Loading never fails: unreadable scalars take defaults, unknown condition
//! blocks are skipped, and experiments whose definition no longer exists are
//! dropped with a warning.

use std::collections::HashMap;

use tracing::warn;

use crate::{
    Channel, ChannelId, ConditionRegistry, ConditionSet, ConfigNode, Counters, ExperimentId,
    ExperimentInstance, ExperimentRuntime, GameContent, GameState, MetaState, OrbitState,
    PrincipalId, ResourceAmount, ResourceStore, ScienceLedger, Situation, TransmissionScheduler,
    VesselEnv, VesselId, VesselState,
};

const GAME_NODE: &str = "GAME";
const VESSEL_NODE: &str = "VESSEL";
const ENV_NODE: &str = "ENV";
const PART_NODE: &str = "PART";
const RESOURCE_NODE: &str = "RESOURCE";
const CHANNEL_NODE: &str = "CHANNEL";
const EXPERIMENT_NODE: &str = "EXPERIMENT";

pub fn save_game(state: &GameState) -> ConfigNode {
    let mut root = ConfigNode::new(GAME_NODE);
    root.add_value("tick", state.meta.tick);
    root.add_value("time", state.meta.time);
    root.add_value("seed", state.meta.seed);
    root.add_value("schemaVersion", state.meta.schema_version);
    root.add_value("contentVersion", &state.meta.content_version);
    root.add_value("scienceTransmitted", state.ledger.transmitted);
    root.add_value("scienceRecovered", state.ledger.recovered);
    root.add_value("nextEventId", state.counters.next_event_id);
    root.add_value("nextCommandId", state.counters.next_command_id);

    let mut vessel_ids: Vec<&VesselId> = state.vessels.keys().collect();
    vessel_ids.sort();
    for vessel_id in vessel_ids {
        root.add_node(save_vessel(&state.vessels[vessel_id]));
    }
    root
}

fn save_vessel(vessel: &VesselState) -> ConfigNode {
    let mut node = ConfigNode::new(VESSEL_NODE);
    node.add_value("id", &vessel.id);
    node.add_value("name", &vessel.name);
    node.add_value("owner", &vessel.owner);
    node.add_value("lastSituation", vessel.last_situation.label());
    node.add_node(save_env(&vessel.env));

    let mut resources: Vec<(&String, &ResourceAmount)> = vessel.resources.pools.iter().collect();
    resources.sort_by(|a, b| a.0.cmp(b.0));
    for (name, pool) in resources {
        let mut resource = ConfigNode::new(RESOURCE_NODE);
        resource.add_value("name", name);
        resource.add_value("amount", pool.amount);
        resource.add_value("capacity", pool.capacity);
        node.add_node(resource);
    }

    for channel in &vessel.channels {
        let mut record = ConfigNode::new(CHANNEL_NODE);
        record.add_value("id", &channel.id);
        record.add_value("rate", channel.rate);
        record.add_value("resourceCostPerPacket", channel.resource_cost_per_packet);
        record.add_value("resourceName", &channel.resource_name);
        record.add_value("online", channel.online);
        node.add_node(record);
    }

    for experiment in &vessel.experiments {
        let mut record = ConfigNode::new(EXPERIMENT_NODE);
        record.add_value("id", &experiment.id);
        record.add_value("definition", &experiment.def_id);
        experiment.runtime.save(&mut record);
        experiment.conditions.save(&mut record);
        node.add_node(record);
    }
    node
}

fn save_env(env: &VesselEnv) -> ConfigNode {
    let mut node = ConfigNode::new(ENV_NODE);
    node.add_value("situation", env.situation.label());
    node.add_value("body", &env.body);
    node.add_value("biome", &env.biome);
    node.add_value("altitude", env.altitude);
    node.add_value("crewCount", env.crew_count);
    node.add_value("gForce", env.g_force);
    node.add_value("surfaceSpeed", env.surface_speed);
    node.add_value("eccentricity", env.orbit.eccentricity);
    node.add_value("apoapsis", env.orbit.apoapsis);
    node.add_value("periapsis", env.orbit.periapsis);
    node.add_value("inclination", env.orbit.inclination);
    node.add_value("orbitalSpeed", env.orbit.speed);
    for part in &env.part_names {
        let mut record = ConfigNode::new(PART_NODE);
        record.add_value("name", part);
        node.add_node(record);
    }
    node
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

pub fn load_game(
    node: &ConfigNode,
    content: &GameContent,
    registry: &ConditionRegistry,
) -> GameState {
    let time = node.parse_or("time", 0.0);
    let mut vessels = HashMap::new();
    for vessel_node in node.get_nodes(VESSEL_NODE) {
        let vessel = load_vessel(vessel_node, content, registry, time);
        vessels.insert(vessel.id.clone(), vessel);
    }
    GameState {
        meta: MetaState {
            tick: node.parse_or("tick", 0),
            time,
            seed: node.parse_or("seed", 0),
            schema_version: node.parse_or("schemaVersion", 1),
            content_version: node.string_or("contentVersion", &content.content_version),
        },
        vessels,
        ledger: ScienceLedger {
            transmitted: node.parse_or("scienceTransmitted", 0.0),
            recovered: node.parse_or("scienceRecovered", 0.0),
        },
        counters: Counters {
            next_event_id: node.parse_or("nextEventId", 0),
            next_command_id: node.parse_or("nextCommandId", 0),
        },
    }
}

fn load_vessel(
    node: &ConfigNode,
    content: &GameContent,
    registry: &ConditionRegistry,
    now: f32,
) -> VesselState {
    let mut resources = ResourceStore::default();
    for record in node.get_nodes(RESOURCE_NODE) {
        resources = resources.with(
            &record.string_or("name", ""),
            record.parse_or("amount", 0.0),
            record.parse_or("capacity", 0.0),
        );
    }

    let channels = node
        .get_nodes(CHANNEL_NODE)
        .map(|record| Channel {
            id: ChannelId(record.string_or("id", "")),
            rate: record.parse_or("rate", 1.0),
            resource_cost_per_packet: record.parse_or("resourceCostPerPacket", 1.0),
            resource_name: record.string_or("resourceName", ""),
            online: record.bool_or("online", true),
            claimed_by: None,
        })
        .collect();

    let experiments = node
        .get_nodes(EXPERIMENT_NODE)
        .filter_map(|record| load_experiment(record, content, registry, now))
        .collect();

    let env = node.get_node(ENV_NODE).map(load_env).unwrap_or_default();
    VesselState {
        id: VesselId(node.string_or("id", "")),
        name: node.string_or("name", ""),
        owner: PrincipalId(node.string_or("owner", "")),
        last_situation: node
            .get_value("lastSituation")
            .and_then(Situation::from_label)
            .unwrap_or(env.situation),
        env,
        resources,
        channels,
        experiments,
    }
}

fn load_env(node: &ConfigNode) -> VesselEnv {
    VesselEnv {
        situation: node
            .get_value("situation")
            .and_then(Situation::from_label)
            .unwrap_or_default(),
        body: node.string_or("body", ""),
        biome: node.string_or("biome", ""),
        altitude: node.parse_or("altitude", 0.0),
        crew_count: node.parse_or("crewCount", 0),
        g_force: node.parse_or("gForce", 0.0),
        surface_speed: node.parse_or("surfaceSpeed", 0.0),
        orbit: OrbitState {
            eccentricity: node.parse_or("eccentricity", 0.0),
            apoapsis: node.parse_or("apoapsis", 0.0),
            periapsis: node.parse_or("periapsis", 0.0),
            inclination: node.parse_or("inclination", 0.0),
            speed: node.parse_or("orbitalSpeed", 0.0),
        },
        part_names: node
            .get_nodes(PART_NODE)
            .filter_map(|part| part.get_value("name").map(str::to_string))
            .collect(),
    }
}

/// Restores one instance. Saved condition blocks win over the definition's
/// so per-instance draw state survives; a record with none gets a fresh copy.
fn load_experiment(
    node: &ConfigNode,
    content: &GameContent,
    registry: &ConditionRegistry,
    now: f32,
) -> Option<ExperimentInstance> {
    let def_id = node.string_or("definition", "");
    let Some(def) = content.experiments.get(&def_id) else {
        warn!(%def_id, "dropping saved experiment with unknown definition");
        return None;
    };

    let mut diagnostics = Vec::new();
    let conditions = match ConditionSet::load(node, registry, &mut diagnostics) {
        ConditionSet::Empty => def.conditions.clone(),
        loaded => loaded,
    };
    if !diagnostics.is_empty() {
        warn!(%def_id, skipped = diagnostics.len(), "saved condition blocks skipped");
    }

    Some(ExperimentInstance {
        id: ExperimentId(node.string_or("id", "")),
        def_id,
        runtime: ExperimentRuntime::load(node, def, now),
        conditions,
        scheduler: TransmissionScheduler::default(),
    })
}
