use tracing::warn;

use crate::commands::apply_commands;
use crate::{
    emit, CommandEnvelope, Event, EventEnvelope, EventLevel, ExperimentContext, ExperimentStatus,
    GameContent, GameState, ScienceLedger, VesselId, VesselState,
};

/// Advance the simulation by one tick.
///
/// Order of operations:
/// 1. Apply commands scheduled for this tick.
/// 2. Per vessel, in id order: pay recovery value on a return home, tick
///    every experiment, then run transmission steps when one is due.
/// 3. Advance the tick counter and the clock.
///
/// Returns all events produced this tick.
pub fn tick(
    state: &mut GameState,
    commands: &[CommandEnvelope],
    content: &GameContent,
    event_level: EventLevel,
) -> Vec<EventEnvelope> {
    let mut raw = Vec::new();
    apply_commands(state, commands, content, &mut raw);

    let now = state.meta.time + content.constants.seconds_per_tick;
    let interval = content.constants.transmission_interval_ticks.max(1);
    let transmit_due = (state.meta.tick + 1).is_multiple_of(interval);

    let mut vessel_ids: Vec<VesselId> = state.vessels.keys().cloned().collect();
    vessel_ids.sort();
    for vessel_id in &vessel_ids {
        let Some(vessel) = state.vessels.get_mut(vessel_id) else {
            continue;
        };
        pay_recovery(vessel, content, &mut state.ledger, &mut raw);
        tick_experiments(vessel, content, now, event_level, &mut raw);
        if transmit_due {
            run_transmissions(vessel, content, &mut state.ledger, event_level, &mut raw);
        }
    }

    let current_tick = state.meta.tick;
    let events = raw
        .into_iter()
        .map(|event| emit(&mut state.counters, current_tick, event))
        .collect();

    state.meta.tick += 1;
    state.meta.time = now;
    events
}

/// Pays withheld value when the vessel comes down at the home body after
/// being airborne.
fn pay_recovery(
    vessel: &mut VesselState,
    content: &GameContent,
    ledger: &mut ScienceLedger,
    events: &mut Vec<Event>,
) {
    let previous = vessel.last_situation;
    let current = vessel.env.situation;
    vessel.last_situation = current;
    let returned_home = previous.is_airborne()
        && current.is_down()
        && vessel.env.body.eq_ignore_ascii_case(&content.constants.home_body);
    if !returned_home {
        return;
    }
    for experiment in &mut vessel.experiments {
        experiment.recover(&vessel.id, ledger, events);
    }
}

fn tick_experiments(
    vessel: &mut VesselState,
    content: &GameContent,
    now: f32,
    event_level: EventLevel,
    events: &mut Vec<Event>,
) {
    let VesselState {
        ref id,
        ref env,
        ref mut resources,
        ref mut channels,
        ref mut experiments,
        ..
    } = *vessel;

    for index in 0..experiments.len() {
        let sibling_transmitting = experiments
            .iter()
            .enumerate()
            .any(|(other, e)| other != index && e.status() == ExperimentStatus::Transmitting);
        let experiment = &mut experiments[index];
        let Some(def) = content.experiments.get(&experiment.def_id) else {
            warn!(def_id = %experiment.def_id, "experiment definition missing");
            continue;
        };
        let mut ctx = ExperimentContext {
            vessel_id: id,
            env,
            resources: &mut *resources,
            channels: channels.as_mut_slice(),
            sibling_transmitting,
            preference: content.constants.channel_preference,
            event_level,
        };
        experiment.tick(def, &mut ctx, now, events);
    }
}

fn run_transmissions(
    vessel: &mut VesselState,
    content: &GameContent,
    ledger: &mut ScienceLedger,
    event_level: EventLevel,
    events: &mut Vec<Event>,
) {
    let period = content.constants.transmission_step_secs();
    let VesselState {
        ref id,
        ref env,
        ref mut resources,
        ref mut channels,
        ref mut experiments,
        ..
    } = *vessel;

    for experiment in experiments.iter_mut() {
        if !experiment.scheduler.running {
            continue;
        }
        let Some(def) = content.experiments.get(&experiment.def_id) else {
            continue;
        };
        let mut ctx = ExperimentContext {
            vessel_id: id,
            env,
            resources: &mut *resources,
            channels: channels.as_mut_slice(),
            sibling_transmitting: false,
            preference: content.constants.channel_preference,
            event_level,
        };
        experiment.transmit_step(def, &mut ctx, period, ledger, events);
    }
}
