use super::*;
use crate::test_fixtures::{pad_env, CHANNEL};

fn stranger_envelope(state: &GameState, command: Command) -> CommandEnvelope {
    CommandEnvelope {
        issued_by: PrincipalId("principal_intruder".to_string()),
        ..envelope(state, command)
    }
}

fn start_command() -> Command {
    Command::ExperimentAction {
        vessel_id: vessel_id(),
        experiment_id: exp_id(),
        action: ExperimentAction::StartResearch,
    }
}

#[test]
fn commands_from_other_principals_are_ignored() {
    let (content, mut state) = setup(default_def());
    let command = stranger_envelope(&state, start_command());
    let events = tick(&mut state, &[command], &content, EventLevel::Normal);
    assert!(transitions(&events).is_empty());
    assert_eq!(status(&state), ExperimentStatus::Idle);
}

#[test]
fn commands_wait_for_their_tick() {
    let (content, mut state) = setup(default_def());
    let mut command = envelope(&state, start_command());
    command.execute_at_tick = 2;
    let commands = [command];

    tick(&mut state, &commands, &content, EventLevel::Normal);
    tick(&mut state, &commands, &content, EventLevel::Normal);
    assert_eq!(status(&state), ExperimentStatus::Idle);

    let events = tick(&mut state, &commands, &content, EventLevel::Normal);
    assert_eq!(
        transitions(&events),
        vec![(ExperimentStatus::Idle, ExperimentStatus::Researching)]
    );
}

#[test]
fn unknown_vessel_and_experiment_are_skipped() {
    let (content, mut state) = setup(default_def());
    let lost = envelope(
        &state,
        Command::ExperimentAction {
            vessel_id: VesselId("vessel_9999".to_string()),
            experiment_id: exp_id(),
            action: ExperimentAction::StartResearch,
        },
    );
    let missing = envelope(
        &state,
        Command::ExperimentAction {
            vessel_id: vessel_id(),
            experiment_id: ExperimentId("exp_9999".to_string()),
            action: ExperimentAction::StartResearch,
        },
    );
    let events = tick(&mut state, &[lost, missing], &content, EventLevel::Normal);
    assert!(transitions(&events).is_empty());
}

#[test]
fn set_vessel_env_replaces_the_environment() {
    let (content, mut state) = setup(default_def());
    let env = VesselEnv {
        situation: Situation::Orbiting,
        altitude: 90_000.0,
        crew_count: 3,
        ..pad_env()
    };
    set_env(&mut state, &content, env.clone());
    assert_eq!(vessel(&state).env, env);
    assert_eq!(vessel(&state).last_situation, Situation::Orbiting);
}

#[test]
fn replenish_adds_up_to_capacity() {
    let (content, mut state) = setup(default_def());
    vessel_mut(&mut state).resources = ResourceStore::default().with(CHARGE, 10.0, 50.0);
    let command = envelope(
        &state,
        Command::ReplenishResource {
            vessel_id: vessel_id(),
            resource: CHARGE.to_string(),
            amount: 100.0,
        },
    );
    tick(&mut state, &[command], &content, EventLevel::Normal);
    assert!((charge(&state) - 50.0).abs() < 1e-6);
}

#[test]
fn channel_online_toggles_by_id() {
    let (content, mut state) = setup(default_def());
    let command = envelope(
        &state,
        Command::SetChannelOnline {
            vessel_id: vessel_id(),
            channel_id: ChannelId(CHANNEL.to_string()),
            online: false,
        },
    );
    tick(&mut state, &[command], &content, EventLevel::Normal);
    assert!(!vessel(&state).channels[0].online);

    let stranger = stranger_envelope(
        &state,
        Command::SetChannelOnline {
            vessel_id: vessel_id(),
            channel_id: ChannelId(CHANNEL.to_string()),
            online: true,
        },
    );
    tick(&mut state, &[stranger], &content, EventLevel::Normal);
    assert!(!vessel(&state).channels[0].online);
}

#[test]
fn event_ids_are_sequential_across_ticks() {
    let (content, mut state) = setup(default_def());
    let mut events = start_research(&mut state, &content);
    events.extend(run(&mut state, &content, 12));
    assert!(events.len() > 2);
    for (index, event) in events.iter().enumerate() {
        assert_eq!(event.id.0, format!("evt_{index:06}"));
    }
    assert_eq!(state.counters.next_event_id, events.len() as u64);
    assert_eq!(state.meta.tick, 13);
    assert!((state.meta.time - 13.0).abs() < 1e-4);
}
