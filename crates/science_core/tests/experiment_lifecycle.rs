//! Integration test: definition authored as a node tree → research → analysis
//! → transmission → recovery, with a save/load round trip mid-transmission.

use science_core::test_fixtures::{base_content, base_state, make_rng, CHARGE, OWNER, VESSEL};
use science_core::*;

fn definition_node() -> ConfigNode {
    let mut node = ConfigNode::new("EXPERIMENT_DEFINITION");
    node.add_value("name", "surface_sample");
    node.add_value("title", "Surface Sample");
    node.add_value("requiredData", 6);
    node.add_value("analysisTime", 2);
    node.add_value("researchDataRate", 1);
    node.add_value("dataSize", 6);
    node.add_value("dataPerPacket", 1);
    node.add_value("scienceValue", 12);
    node.add_value("transmitValue", 0.75);

    let grounded = node.add_node(ConfigNode::new("conditionGroup"));
    grounded.add_value("groupType", "or");
    for situation in ["prelaunch", "landed"] {
        let condition = grounded.add_node(ConfigNode::new("condition"));
        condition.add_value("conditionType", "Situation");
        condition.add_value("situation", situation);
    }

    let powered = node.add_node(ConfigNode::new("conditionGroup"));
    powered.add_value("groupType", "and");
    let draw = powered.add_node(ConfigNode::new("condition"));
    draw.add_value("conditionType", "Resource");
    draw.add_value("resourceName", CHARGE);
    draw.add_value("initialConsumption", 0);
    draw.add_value("usagePerSecond", 1);
    node
}

fn setup() -> (GameContent, GameState) {
    let mut content = base_content();
    let (def, diagnostics) =
        ExperimentDefinition::from_node(&definition_node(), &ConditionRegistry::builtin());
    assert!(diagnostics.is_empty());
    content.experiments.insert(def.name.clone(), def);

    let mut state = base_state(&content);
    let vessel = state
        .vessels
        .get_mut(&VesselId(VESSEL.to_string()))
        .unwrap();
    vessel.channels[0].rate = 2.0;
    (content, state)
}

fn start_command(state: &GameState) -> CommandEnvelope {
    let vessel = &state.vessels[&VesselId(VESSEL.to_string())];
    CommandEnvelope {
        id: CommandId("cmd_000000".to_string()),
        issued_by: PrincipalId(OWNER.to_string()),
        issued_tick: 0,
        execute_at_tick: 0,
        command: Command::ExperimentAction {
            vessel_id: vessel.id.clone(),
            experiment_id: vessel.experiments[0].id.clone(),
            action: ExperimentAction::StartResearch,
        },
    }
}

fn drive(state: &mut GameState, content: &GameContent, commands: &[CommandEnvelope], ticks: u32) {
    for _ in 0..ticks {
        tick(state, commands, content, EventLevel::Normal);
    }
}

fn instance(state: &GameState) -> &ExperimentInstance {
    &state.vessels[&VesselId(VESSEL.to_string())].experiments[0]
}

#[test]
fn full_experiment_lifecycle() {
    let (content, mut state) = setup();
    let commands = [start_command(&state)];
    let mut statuses = Vec::new();
    for _ in 0..16 {
        tick(&mut state, &commands, &content, EventLevel::Normal);
        statuses.push(instance(&state).status());
    }

    assert_eq!(statuses[4], ExperimentStatus::Researching);
    assert_eq!(statuses[5], ExperimentStatus::ResearchComplete);
    assert_eq!(statuses[6], ExperimentStatus::Analyzing);
    assert_eq!(statuses[8], ExperimentStatus::AnalysisComplete);
    assert_eq!(statuses[11], ExperimentStatus::Transmitting);
    assert_eq!(statuses[13], ExperimentStatus::TransmitComplete);
    assert_eq!(statuses[15], ExperimentStatus::Completed);

    // 6 data at 2 per unit, three quarters sent home now.
    assert!((state.ledger.transmitted - 9.0).abs() < 1e-3);
    assert!((instance(&state).runtime.recovery_value - 3.0).abs() < 1e-3);

    let metrics = compute_metrics(&state);
    assert_eq!(metrics.experiments_completed, 1);
    assert!((metrics.pending_recovery_value - 3.0).abs() < 1e-3);
}

#[test]
fn save_and_resume_matches_uninterrupted_run() {
    let (content, mut straight) = setup();
    let commands = [start_command(&straight)];
    drive(&mut straight, &content, &commands, 20);

    let (_, mut interrupted) = setup();
    drive(&mut interrupted, &content, &commands, 12);
    assert_eq!(instance(&interrupted).status(), ExperimentStatus::Transmitting);

    let json = serde_json::to_string(&save_game(&interrupted)).unwrap();
    let node: ConfigNode = serde_json::from_str(&json).unwrap();
    let mut resumed = load_game(&node, &content, &ConditionRegistry::builtin());
    drive(&mut resumed, &content, &commands, 8);

    assert_eq!(resumed.meta, straight.meta);
    assert_eq!(resumed.ledger, straight.ledger);
    assert_eq!(instance(&resumed).runtime, instance(&straight).runtime);
    assert_eq!(instance(&resumed).conditions, instance(&straight).conditions);
}

#[test]
fn generated_instances_run_side_by_side() {
    let (content, mut state) = setup();
    let mut rng = make_rng();
    let def = &content.experiments["surface_sample"];
    let extra = ExperimentInstance::attach(experiment_id(&mut rng), def, 0.0);
    assert!(extra.id.0.starts_with("exp_"));
    assert_ne!(extra.id, instance(&state).id);

    let vessel_id = VesselId(VESSEL.to_string());
    state.vessels.get_mut(&vessel_id).unwrap().experiments.push(extra.clone());
    let mut commands = vec![start_command(&state)];
    commands.push(CommandEnvelope {
        id: CommandId("cmd_000001".to_string()),
        command: Command::ExperimentAction {
            vessel_id: vessel_id.clone(),
            experiment_id: extra.id.clone(),
            action: ExperimentAction::StartResearch,
        },
        ..commands[0].clone()
    });
    drive(&mut state, &content, &commands, 40);

    let vessel = &state.vessels[&vessel_id];
    assert!(vessel
        .experiments
        .iter()
        .all(|e| e.status() == ExperimentStatus::Completed));
    assert!((state.ledger.transmitted - 18.0).abs() < 1e-3);
    assert!(vessel.channels[0].claimed_by.is_none());
}
