use super::*;
use crate::test_fixtures::pad_env;

fn env_at(situation: Situation, body: &str) -> VesselEnv {
    VesselEnv {
        situation,
        body: body.to_string(),
        ..pad_env()
    }
}

/// Sends a 100-data payload worth 0.5 per unit, keeping 80% for transmission.
fn transmitted_state() -> (GameContent, GameState) {
    let (content, mut state) = setup(ExperimentDefinition {
        data_size: 100.0,
        data_per_packet: 1.0,
        science_value_per_data: 0.5,
        transmit_value: 0.8,
        ..default_def()
    });
    let runtime = &mut experiment_mut(&mut state).runtime;
    runtime.status = ExperimentStatus::StartTransmit;
    runtime.current_data = 10.0;
    run(&mut state, &content, 12);
    (content, state)
}

#[test]
fn transmission_withholds_value_for_recovery() {
    let (_, state) = transmitted_state();
    assert_eq!(status(&state), ExperimentStatus::Completed);
    assert!((state.ledger.transmitted - 40.0).abs() < 1e-2);
    assert!((experiment(&state).runtime.recovery_value - 10.0).abs() < 1e-2);
    assert!(state.ledger.recovered.abs() < 1e-6);
}

#[test]
fn landing_at_home_pays_withheld_value_once() {
    let (content, mut state) = transmitted_state();
    set_env(&mut state, &content, env_at(Situation::Flying, "Kerbin"));
    assert!(state.ledger.recovered.abs() < 1e-6);

    let events = set_env(&mut state, &content, env_at(Situation::Landed, "Kerbin"));
    assert!((state.ledger.recovered - 10.0).abs() < 1e-2);
    assert!((state.ledger.total() - 50.0).abs() < 1e-2);
    assert!(events
        .iter()
        .any(|e| matches!(e.event, Event::ScienceRecovered { .. })));
    assert!(experiment(&state).runtime.recovery_value.abs() < 1e-6);

    set_env(&mut state, &content, env_at(Situation::SubOrbital, "Kerbin"));
    set_env(&mut state, &content, env_at(Situation::Splashed, "Kerbin"));
    assert!((state.ledger.recovered - 10.0).abs() < 1e-2);
}

#[test]
fn landing_elsewhere_keeps_value_withheld() {
    let (content, mut state) = transmitted_state();
    set_env(&mut state, &content, env_at(Situation::Orbiting, "Mun"));
    set_env(&mut state, &content, env_at(Situation::Landed, "Mun"));
    assert!(state.ledger.recovered.abs() < 1e-6);
    assert!((experiment(&state).runtime.recovery_value - 10.0).abs() < 1e-2);
}

#[test]
fn failed_experiments_forfeit_recovery() {
    let (content, mut state) = setup(default_def());
    let runtime = &mut experiment_mut(&mut state).runtime;
    runtime.status = ExperimentStatus::Failed;
    runtime.recovery_value = 3.0;

    set_env(&mut state, &content, env_at(Situation::Flying, "Kerbin"));
    set_env(&mut state, &content, env_at(Situation::Splashed, "Kerbin"));
    assert!(state.ledger.recovered.abs() < 1e-6);
    assert!((experiment(&state).runtime.recovery_value - 3.0).abs() < 1e-6);
}

#[test]
fn recover_pays_the_sink_directly() {
    let (_, mut state) = setup(default_def());
    experiment_mut(&mut state).runtime.recovery_value = 2.5;
    let mut ledger = ScienceLedger::default();
    let mut events = Vec::new();
    let paid = experiment_mut(&mut state).recover(&vessel_id(), &mut ledger, &mut events);
    assert!((paid - 2.5).abs() < 1e-6);
    assert!((ledger.recovered - 2.5).abs() < 1e-6);
    assert_eq!(events.len(), 1);

    let again = experiment_mut(&mut state).recover(&vessel_id(), &mut ledger, &mut events);
    assert!(again.abs() < 1e-6);
    assert_eq!(events.len(), 1);
}
