use tracing::{debug, warn};

use crate::{
    ChannelId, Command, CommandEnvelope, Event, ExperimentAction, ExperimentId, GameContent,
    GameState, VesselEnv, VesselId,
};

pub(crate) fn apply_commands(
    state: &mut GameState,
    commands: &[CommandEnvelope],
    content: &GameContent,
    events: &mut Vec<Event>,
) {
    let current_tick = state.meta.tick;

    for envelope in commands {
        if envelope.execute_at_tick != current_tick {
            continue;
        }
        let Some(vessel) = state.vessels.get(envelope.command.vessel_id()) else {
            continue;
        };
        if vessel.owner != envelope.issued_by {
            continue;
        }
        match &envelope.command {
            Command::ExperimentAction {
                vessel_id,
                experiment_id,
                action,
            } => {
                handle_experiment_action(state, vessel_id, experiment_id, *action, content, events);
            }
            Command::SetVesselEnv { vessel_id, env } => {
                handle_set_vessel_env(state, vessel_id, env);
            }
            Command::SetChannelOnline {
                vessel_id,
                channel_id,
                online,
            } => {
                handle_set_channel_online(state, vessel_id, channel_id, *online);
            }
            Command::ReplenishResource {
                vessel_id,
                resource,
                amount,
            } => {
                if let Some(vessel) = state.vessels.get_mut(vessel_id) {
                    vessel.resources.replenish(resource, *amount);
                }
            }
        }
    }
}

fn handle_experiment_action(
    state: &mut GameState,
    vessel_id: &VesselId,
    experiment_id: &ExperimentId,
    action: ExperimentAction,
    content: &GameContent,
    events: &mut Vec<Event>,
) {
    let Some(vessel) = state.vessels.get_mut(vessel_id) else {
        return;
    };
    let Some(experiment) = vessel
        .experiments
        .iter_mut()
        .find(|experiment| &experiment.id == experiment_id)
    else {
        debug!(%vessel_id, %experiment_id, "action for unknown experiment");
        return;
    };
    let Some(def) = content.experiments.get(&experiment.def_id) else {
        warn!(def_id = %experiment.def_id, "experiment definition missing");
        return;
    };
    experiment.apply_action(action, def, vessel_id, &mut vessel.channels, events);
}

fn handle_set_vessel_env(state: &mut GameState, vessel_id: &VesselId, env: &VesselEnv) {
    if let Some(vessel) = state.vessels.get_mut(vessel_id) {
        vessel.env = env.clone();
    }
}

fn handle_set_channel_online(
    state: &mut GameState,
    vessel_id: &VesselId,
    channel_id: &ChannelId,
    online: bool,
) {
    let Some(vessel) = state.vessels.get_mut(vessel_id) else {
        return;
    };
    if let Some(channel) = vessel
        .channels
        .iter_mut()
        .find(|channel| &channel.id == channel_id)
    {
        channel.online = online;
    }
}
