use super::*;
use crate::test_fixtures::{base_content, base_state, surface_sample, CHARGE, EXPERIMENT, OWNER, VESSEL};

mod commands;
mod groups;
mod recovery;

// --- Shared test helpers ------------------------------------------------

fn vessel_id() -> VesselId {
    VesselId(VESSEL.to_string())
}

fn exp_id() -> ExperimentId {
    ExperimentId(EXPERIMENT.to_string())
}

/// Content whose `surface_sample` definition is replaced by `def`, and a
/// state attached to it.
fn setup(def: ExperimentDefinition) -> (GameContent, GameState) {
    let mut content = base_content();
    content.experiments.insert("surface_sample".to_string(), ExperimentDefinition {
        name: "surface_sample".to_string(),
        ..def
    });
    let state = base_state(&content);
    (content, state)
}

fn envelope(state: &GameState, command: Command) -> CommandEnvelope {
    CommandEnvelope {
        id: CommandId(format!("cmd_{:06}", state.meta.tick)),
        issued_by: PrincipalId(OWNER.to_string()),
        issued_tick: state.meta.tick,
        execute_at_tick: state.meta.tick,
        command,
    }
}

fn action(state: &GameState, action: ExperimentAction) -> CommandEnvelope {
    envelope(
        state,
        Command::ExperimentAction {
            vessel_id: vessel_id(),
            experiment_id: exp_id(),
            action,
        },
    )
}

fn vessel(state: &GameState) -> &VesselState {
    &state.vessels[&vessel_id()]
}

fn vessel_mut(state: &mut GameState) -> &mut VesselState {
    state.vessels.get_mut(&vessel_id()).unwrap()
}

fn experiment(state: &GameState) -> &ExperimentInstance {
    vessel(state).experiment(&exp_id()).unwrap()
}

fn experiment_mut(state: &mut GameState) -> &mut ExperimentInstance {
    vessel_mut(state).experiment_mut(&exp_id()).unwrap()
}

fn status(state: &GameState) -> ExperimentStatus {
    experiment(state).status()
}

/// Runs `ticks` ticks with no commands and returns every event.
fn run(state: &mut GameState, content: &GameContent, ticks: u32) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    for _ in 0..ticks {
        events.extend(tick(state, &[], content, EventLevel::Normal));
    }
    events
}

/// Issues `StartResearch` on the current tick.
fn start_research(state: &mut GameState, content: &GameContent) -> Vec<EventEnvelope> {
    let command = action(state, ExperimentAction::StartResearch);
    tick(state, &[command], content, EventLevel::Normal)
}

fn set_env(state: &mut GameState, content: &GameContent, env: VesselEnv) -> Vec<EventEnvelope> {
    let command = envelope(
        state,
        Command::SetVesselEnv {
            vessel_id: vessel_id(),
            env: Box::new(env),
        },
    );
    tick(state, &[command], content, EventLevel::Normal)
}

fn transitions(events: &[EventEnvelope]) -> Vec<(ExperimentStatus, ExperimentStatus)> {
    events
        .iter()
        .filter_map(|e| match &e.event {
            Event::ExperimentStateChanged { from, to, .. } => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

fn charge(state: &GameState) -> f32 {
    vessel(state).resources.available(CHARGE)
}

fn default_def() -> ExperimentDefinition {
    surface_sample()
}
