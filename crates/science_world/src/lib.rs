//! Content loading, world construction and save files shared by the CLI and
//! the integration tests.
//!
//! Experiment definitions are authored as JSON objects that mirror the
//! `ConfigNode` tree the core reads: scalars become values, nested objects
//! and arrays of objects become child nodes (`condition`,
//! `conditionGroup`). Everything else is plain serde.

use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use science_control::{FlightAction, FlightPlanStep};
use science_core::{
    experiment_id, load_game, save_game, Channel, ChannelId, ConditionRegistry, ConfigNode,
    Constants, Counters, ExperimentDefinition, ExperimentInstance, GameContent, GameState,
    LoadError, MetaState, PrincipalId, ResourceStore, ScienceLedger, VesselEnv, VesselId, VesselState,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::warn;

const DEFINITION_NODE: &str = "EXPERIMENT_DEFINITION";

#[derive(Deserialize)]
struct ExperimentsFile {
    content_version: String,
    experiments: Vec<Value>,
}

#[derive(Deserialize)]
struct VesselsFile {
    vessels: Vec<VesselTemplate>,
}

#[derive(Deserialize)]
struct FlightPlanFile {
    steps: Vec<FlightPlanStep>,
}

/// A vessel as authored in `vessels.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselTemplate {
    pub id: VesselId,
    pub name: String,
    pub owner: PrincipalId,
    pub env: VesselEnv,
    #[serde(default)]
    pub resources: Vec<ResourceTemplate>,
    #[serde(default)]
    pub channels: Vec<ChannelTemplate>,
    /// Definition names; one instance is attached per entry.
    #[serde(default)]
    pub experiments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTemplate {
    pub name: String,
    pub amount: f32,
    pub capacity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelTemplate {
    pub id: ChannelId,
    pub rate: f32,
    pub resource_cost_per_packet: f32,
    /// Falls back to `Constants::default_channel_resource`.
    #[serde(default)]
    pub resource_name: Option<String>,
}

impl ChannelTemplate {
    fn resource<'a>(&'a self, constants: &'a Constants) -> &'a str {
        self.resource_name
            .as_deref()
            .unwrap_or(&constants.default_channel_resource)
    }
}

// ---------------------------------------------------------------------------
// Authoring tree conversion
// ---------------------------------------------------------------------------

/// Converts a JSON authoring object into a `ConfigNode` named `name`.
pub fn json_to_node(name: &str, value: &Value) -> Result<ConfigNode> {
    let Value::Object(map) = value else {
        bail!("'{name}' must be a JSON object");
    };
    let mut node = ConfigNode::new(name);
    for (key, entry) in map {
        add_entry(&mut node, key, entry)?;
    }
    Ok(node)
}

fn add_entry(node: &mut ConfigNode, key: &str, entry: &Value) -> Result<()> {
    match entry {
        Value::Null => {}
        Value::Bool(flag) => node.add_value(key, flag),
        Value::Number(number) => node.add_value(key, number),
        Value::String(text) => node.add_value(key, text),
        Value::Object(_) => {
            node.add_node(json_to_node(key, entry)?);
        }
        Value::Array(items) => {
            for item in items {
                add_entry(node, key, item)?;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validates loaded content, panicking on any authoring error.
///
/// Catches mistakes like: a zero tick length, a definition keyed under a
/// different name, or a packet size that would never drain.
pub fn validate_content(content: &GameContent) {
    let c = &content.constants;
    assert!(
        c.seconds_per_tick > 0.0,
        "seconds_per_tick must be positive, got {}",
        c.seconds_per_tick,
    );
    assert!(
        c.transmission_period_secs > 0.0,
        "transmission_period_secs must be positive, got {}",
        c.transmission_period_secs,
    );
    assert!(!c.home_body.is_empty(), "home_body must not be empty");

    for (key, def) in &content.experiments {
        assert!(!def.name.is_empty(), "experiment definition has empty name");
        assert!(
            key == &def.name,
            "experiment '{}' is registered under key '{key}'",
            def.name,
        );
        assert!(
            def.data_per_packet > 0.0,
            "experiment '{}' has non-positive dataPerPacket: {}",
            def.name,
            def.data_per_packet,
        );
        assert!(
            def.research_data_rate > 0.0,
            "experiment '{}' has non-positive researchDataRate: {}",
            def.name,
            def.research_data_rate,
        );
        assert!(
            def.analysis_time >= 0.0 && def.data_size >= 0.0,
            "experiment '{}' has a negative analysisTime or dataSize",
            def.name,
        );
    }
}

/// Validates cross-references between content, vessel templates and the
/// flight plan, panicking on any authoring error.
pub fn validate_world(content: &GameContent, vessels: &[VesselTemplate], plan: &[FlightPlanStep]) {
    let mut vessel_ids = HashSet::new();
    let mut channels_by_vessel: HashMap<&VesselId, HashSet<&ChannelId>> = HashMap::new();

    for vessel in vessels {
        assert!(
            vessel_ids.insert(&vessel.id),
            "duplicate vessel id '{}'",
            vessel.id,
        );
        for name in &vessel.experiments {
            assert!(
                content.experiments.contains_key(name),
                "vessel '{}' references unknown experiment definition '{name}'",
                vessel.id,
            );
        }
        let resources: HashSet<&str> = vessel.resources.iter().map(|r| r.name.as_str()).collect();
        let channel_ids = channels_by_vessel.entry(&vessel.id).or_default();
        for channel in &vessel.channels {
            assert!(
                channel_ids.insert(&channel.id),
                "vessel '{}' has duplicate channel id '{}'",
                vessel.id,
                channel.id,
            );
            assert!(
                channel.rate > 0.0 && channel.resource_cost_per_packet > 0.0,
                "channel '{}' on vessel '{}' needs a positive rate and resource cost",
                channel.id,
                vessel.id,
            );
            let resource = channel.resource(&content.constants);
            assert!(
                resources.contains(resource),
                "channel '{}' on vessel '{}' draws unknown resource '{resource}'",
                channel.id,
                vessel.id,
            );
        }
    }

    for step in plan {
        let Some(channel_ids) = channels_by_vessel.get(&step.vessel_id) else {
            panic!(
                "flight plan step at tick {} references unknown vessel '{}'",
                step.tick, step.vessel_id,
            );
        };
        if let FlightAction::SetChannelOnline { channel_id, .. } = &step.action {
            assert!(
                channel_ids.contains(channel_id),
                "flight plan step at tick {} references unknown channel '{channel_id}' on vessel '{}'",
                step.tick,
                step.vessel_id,
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Loads `constants.json` and `experiments.json` with the built-in condition types.
pub fn load_content(content_dir: &str) -> Result<GameContent> {
    load_content_with(content_dir, &ConditionRegistry::builtin())
}

/// A condition block dropped while reading an experiment definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBlock {
    pub experiment: String,
    pub error: LoadError,
}

/// Bad condition blocks are dropped with a warning; the rest of the
/// definition and every other definition still load.
pub fn load_content_with(content_dir: &str, registry: &ConditionRegistry) -> Result<GameContent> {
    let (content, skipped) = load_content_report(content_dir, registry)?;
    for block in &skipped {
        warn!(experiment = %block.experiment, error = %block.error, "condition block dropped");
    }
    Ok(content)
}

/// Like [`load_content_with`], also returning every dropped condition block.
pub fn load_content_report(
    content_dir: &str,
    registry: &ConditionRegistry,
) -> Result<(GameContent, Vec<SkippedBlock>)> {
    let dir = Path::new(content_dir);
    let mut constants: Constants = read_json(&dir.join("constants.json"))?;
    constants.derive_tick_values();
    let experiments_file: ExperimentsFile = read_json(&dir.join("experiments.json"))?;

    let mut experiments = HashMap::new();
    let mut skipped = Vec::new();
    for (index, authored) in experiments_file.experiments.iter().enumerate() {
        let node = json_to_node(DEFINITION_NODE, authored)
            .with_context(|| format!("experiments.json entry {index}"))?;
        let (def, diagnostics) = ExperimentDefinition::from_node(&node, registry);
        skipped.extend(diagnostics.into_iter().map(|error| SkippedBlock {
            experiment: def.name.clone(),
            error,
        }));
        if experiments.contains_key(&def.name) {
            bail!("duplicate experiment definition '{}'", def.name);
        }
        experiments.insert(def.name.clone(), def);
    }

    let content = GameContent {
        content_version: experiments_file.content_version,
        experiments,
        constants,
    };
    validate_content(&content);
    Ok((content, skipped))
}

pub fn load_vessels(content_dir: &str) -> Result<Vec<VesselTemplate>> {
    let file: VesselsFile = read_json(&Path::new(content_dir).join("vessels.json"))?;
    Ok(file.vessels)
}

/// `flight_plan.json` is optional; without it vessels never move.
pub fn load_flight_plan(content_dir: &str) -> Result<Vec<FlightPlanStep>> {
    let path = Path::new(content_dir).join("flight_plan.json");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file: FlightPlanFile = read_json(&path)?;
    Ok(file.steps)
}

// ---------------------------------------------------------------------------
// World construction
// ---------------------------------------------------------------------------

fn build_vessel(template: &VesselTemplate, content: &GameContent, rng: &mut impl Rng) -> VesselState {
    let resources = template
        .resources
        .iter()
        .fold(ResourceStore::default(), |store, r| {
            store.with(&r.name, r.amount, r.capacity)
        });
    let channels = template
        .channels
        .iter()
        .map(|c| {
            Channel::new(
                &c.id.0,
                c.rate,
                c.resource_cost_per_packet,
                c.resource(&content.constants),
            )
        })
        .collect();
    let experiments = template
        .experiments
        .iter()
        .filter_map(|name| content.experiments.get(name))
        .map(|def| ExperimentInstance::attach(experiment_id(rng), def, 0.0))
        .collect();
    VesselState {
        id: template.id.clone(),
        name: template.name.clone(),
        owner: template.owner.clone(),
        env: template.env.clone(),
        last_situation: template.env.situation,
        resources,
        channels,
        experiments,
    }
}

/// Builds the tick-0 state. Experiment ids come from `rng`, so the same seed
/// always yields the same ids.
pub fn build_initial_state(
    content: &GameContent,
    vessels: &[VesselTemplate],
    seed: u64,
    rng: &mut impl Rng,
) -> GameState {
    let vessels = vessels
        .iter()
        .map(|template| {
            let vessel = build_vessel(template, content, rng);
            (vessel.id.clone(), vessel)
        })
        .collect();
    GameState {
        meta: MetaState {
            tick: 0,
            time: 0.0,
            seed,
            schema_version: 1,
            content_version: content.content_version.clone(),
        },
        vessels,
        ledger: ScienceLedger::default(),
        counters: Counters::default(),
    }
}

// ---------------------------------------------------------------------------
// Save files
// ---------------------------------------------------------------------------

/// Writes the JSON form of the save tree.
pub fn write_save(path: &Path, state: &GameState) -> Result<()> {
    let file =
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, &save_game(state))
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn read_save(path: &Path, content: &GameContent) -> Result<GameState> {
    let node: ConfigNode = read_json(path)?;
    Ok(load_game(&node, content, &ConditionRegistry::builtin()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use science_core::test_fixtures::{base_content, pad_env, CHARGE};
    use science_core::{ConditionSet, ExperimentStatus};

    fn lander() -> VesselTemplate {
        VesselTemplate {
            id: VesselId("vessel_lander".to_string()),
            name: "Lander".to_string(),
            owner: PrincipalId("principal_autopilot".to_string()),
            env: pad_env(),
            resources: vec![ResourceTemplate {
                name: CHARGE.to_string(),
                amount: 100.0,
                capacity: 200.0,
            }],
            channels: vec![ChannelTemplate {
                id: ChannelId("antenna_whip".to_string()),
                rate: 5.0,
                resource_cost_per_packet: 1.0,
                resource_name: None,
            }],
            experiments: vec!["surface_sample".to_string(), "surface_sample".to_string()],
        }
    }

    #[test]
    fn test_valid_world_passes_validation() {
        let content = base_content();
        validate_content(&content);
        validate_world(&content, &[lander()], &[]);
    }

    #[test]
    #[should_panic(expected = "unknown experiment definition")]
    fn test_unknown_definition_panics() {
        let content = base_content();
        let mut vessel = lander();
        vessel.experiments.push("magnetometer".to_string());
        validate_world(&content, &[vessel], &[]);
    }

    #[test]
    #[should_panic(expected = "draws unknown resource")]
    fn test_channel_resource_must_exist() {
        let content = base_content();
        let mut vessel = lander();
        vessel.channels[0].resource_name = Some("Xenon".to_string());
        validate_world(&content, &[vessel], &[]);
    }

    #[test]
    #[should_panic(expected = "positive rate and resource cost")]
    fn test_free_channel_is_rejected() {
        let content = base_content();
        let mut vessel = lander();
        vessel.channels[0].resource_cost_per_packet = 0.0;
        validate_world(&content, &[vessel], &[]);
    }

    #[test]
    #[should_panic(expected = "unknown vessel")]
    fn test_flight_plan_vessel_must_exist() {
        let content = base_content();
        let step = FlightPlanStep {
            tick: 3,
            vessel_id: VesselId("vessel_ghost".to_string()),
            action: FlightAction::Replenish {
                resource: CHARGE.to_string(),
                amount: 1.0,
            },
        };
        validate_world(&content, &[lander()], &[step]);
    }

    #[test]
    #[should_panic(expected = "registered under key")]
    fn test_definition_key_must_match_name() {
        let mut content = base_content();
        let def = content.experiments.remove("surface_sample").unwrap();
        content.experiments.insert("renamed".to_string(), def);
        validate_content(&content);
    }

    #[test]
    fn test_json_authoring_tree_becomes_config_node() {
        let authored = serde_json::json!({
            "name": "goo",
            "requiredData": 4,
            "autoTransmit": false,
            "conditionGroup": [
                {"groupType": "or", "condition": [
                    {"conditionType": "Situation", "situation": "landed"},
                    {"conditionType": "Situation", "situation": "splashed"}
                ]}
            ]
        });
        let node = json_to_node(DEFINITION_NODE, &authored).unwrap();
        assert_eq!(node.get_value("requiredData"), Some("4"));
        assert_eq!(node.get_value("autoTransmit"), Some("false"));
        let group = node.get_node("conditionGroup").unwrap();
        assert_eq!(group.get_nodes("condition").count(), 2);

        let (def, diagnostics) = ExperimentDefinition::from_node(&node, &ConditionRegistry::builtin());
        assert!(diagnostics.is_empty());
        assert!(!def.auto_transmit);
        assert!(matches!(&def.conditions, ConditionSet::Groups(groups) if groups.len() == 1));
        assert!(json_to_node("x", &serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_initial_state_is_deterministic_per_seed() {
        let content = base_content();
        let build = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            build_initial_state(&content, &[lander()], seed, &mut rng)
        };
        let first = build(7);
        let again = build(7);
        let other = build(8);

        let ids = |state: &GameState| -> Vec<String> {
            state.vessels[&VesselId("vessel_lander".to_string())]
                .experiments
                .iter()
                .map(|e| e.id.0.clone())
                .collect()
        };
        assert_eq!(ids(&first), ids(&again));
        assert_ne!(ids(&first), ids(&other));
        assert!(ids(&first).iter().all(|id| id.starts_with("exp_")));
        assert_ne!(ids(&first)[0], ids(&first)[1]);

        let vessel = &first.vessels[&VesselId("vessel_lander".to_string())];
        assert_eq!(vessel.channels[0].resource_name, CHARGE);
        assert!((vessel.resources.pools[CHARGE].amount - 100.0).abs() < 1e-6);
        assert!(vessel
            .experiments
            .iter()
            .all(|e| e.status() == ExperimentStatus::Idle));
    }

    #[test]
    fn test_save_file_round_trip() {
        let content = base_content();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut state = build_initial_state(&content, &[lander()], 1, &mut rng);
        science_core::tick(&mut state, &[], &content, science_core::EventLevel::Normal);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json");
        write_save(&path, &state).unwrap();
        let loaded = read_save(&path, &content).unwrap();

        assert_eq!(loaded.meta, state.meta);
        let id = VesselId("vessel_lander".to_string());
        let summary = |state: &GameState| -> Vec<(String, ExperimentStatus)> {
            state.vessels[&id]
                .experiments
                .iter()
                .map(|e| (e.id.0.clone(), e.status()))
                .collect()
        };
        assert_eq!(summary(&loaded), summary(&state));
        assert_eq!(loaded.vessels[&id].channels, state.vessels[&id].channels);
        assert!(read_save(&dir.path().join("missing.json"), &content).is_err());
    }
}
