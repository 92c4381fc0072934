use serde::{Deserialize, Serialize};

use science_core::{
    ChannelId, Command, CommandEnvelope, CommandId, ExperimentAction, ExperimentDefinition,
    ExperimentInstance, ExperimentStatus, GameContent, GameState, PrincipalId, VesselEnv,
    VesselId, VesselState,
};

pub trait CommandSource {
    fn generate_commands(
        &mut self,
        state: &GameState,
        content: &GameContent,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope>;
}

const OPERATOR_OWNER: &str = "principal_autopilot";

/// Allocates a command ID and builds a `CommandEnvelope` for the current tick.
fn make_cmd(
    owner: &PrincipalId,
    tick: u64,
    next_id: &mut u64,
    command: Command,
) -> CommandEnvelope {
    let cmd_id = CommandId(format!("cmd_{:06}", *next_id));
    *next_id += 1;
    CommandEnvelope {
        id: cmd_id,
        issued_by: owner.clone(),
        issued_tick: tick,
        execute_at_tick: tick,
        command,
    }
}

/// Vessels in ID order, for deterministic command streams.
fn sorted_vessels(state: &GameState) -> Vec<&VesselState> {
    let mut vessels: Vec<&VesselState> = state.vessels.values().collect();
    vessels.sort_by(|a, b| a.id.cmp(&b.id));
    vessels
}

// ---------------------------------------------------------------------------
// OperatorController
// ---------------------------------------------------------------------------

/// Presses experiment buttons on the vessels it owns:
/// 1. Start research on idle experiments.
/// 2. Start analysis when research is done and the definition does not
///    analyze on its own.
/// 3. Transmit results when ready and the definition does not transmit on
///    its own.
/// 4. Top up any resource that falls below `refill_fraction` of capacity.
pub struct OperatorController {
    owner: PrincipalId,
    refill_fraction: f32,
}

impl Default for OperatorController {
    fn default() -> Self {
        Self {
            owner: PrincipalId(OPERATOR_OWNER.to_string()),
            refill_fraction: 0.1,
        }
    }
}

impl OperatorController {
    pub fn new(owner: PrincipalId) -> Self {
        Self {
            owner,
            ..Self::default()
        }
    }

    /// `0.0` disables refills.
    #[must_use]
    pub fn with_refill_fraction(mut self, fraction: f32) -> Self {
        self.refill_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    fn refill_commands(
        &self,
        vessel: &VesselState,
        tick: u64,
        next_id: &mut u64,
    ) -> Vec<CommandEnvelope> {
        let mut pools: Vec<_> = vessel
            .resources
            .pools
            .iter()
            .filter(|(_, pool)| {
                pool.capacity > 0.0 && pool.amount < pool.capacity * self.refill_fraction
            })
            .collect();
        pools.sort_by(|a, b| a.0.cmp(b.0));
        pools
            .into_iter()
            .map(|(name, pool)| {
                make_cmd(
                    &self.owner,
                    tick,
                    next_id,
                    Command::ReplenishResource {
                        vessel_id: vessel.id.clone(),
                        resource: name.clone(),
                        amount: pool.capacity - pool.amount,
                    },
                )
            })
            .collect()
    }
}

/// The button an operator would press for this experiment, if any.
fn button_for(instance: &ExperimentInstance, def: &ExperimentDefinition) -> Option<ExperimentAction> {
    match instance.status() {
        ExperimentStatus::Idle => Some(ExperimentAction::StartResearch),
        ExperimentStatus::ResearchComplete if !def.auto_analyze => {
            Some(ExperimentAction::StartAnalysis)
        }
        ExperimentStatus::ReadyToTransmit if !def.auto_transmit => {
            Some(ExperimentAction::TransmitResults)
        }
        _ => None,
    }
}

impl CommandSource for OperatorController {
    fn generate_commands(
        &mut self,
        state: &GameState,
        content: &GameContent,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope> {
        let tick = state.meta.tick;
        let mut commands = Vec::new();
        for vessel in sorted_vessels(state) {
            if vessel.owner != self.owner {
                continue;
            }
            for instance in &vessel.experiments {
                let Some(def) = content.experiments.get(&instance.def_id) else {
                    continue;
                };
                if let Some(action) = button_for(instance, def) {
                    commands.push(make_cmd(
                        &self.owner,
                        tick,
                        next_command_id,
                        Command::ExperimentAction {
                            vessel_id: vessel.id.clone(),
                            experiment_id: instance.id.clone(),
                            action,
                        },
                    ));
                }
            }
            if self.refill_fraction > 0.0 {
                commands.extend(self.refill_commands(vessel, tick, next_command_id));
            }
        }
        commands
    }
}

// ---------------------------------------------------------------------------
// FlightPlanController
// ---------------------------------------------------------------------------

/// What happens to a vessel at a scheduled tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlightAction {
    SetEnv { env: Box<VesselEnv> },
    SetChannelOnline { channel_id: ChannelId, online: bool },
    Replenish { resource: String, amount: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlanStep {
    pub tick: u64,
    pub vessel_id: VesselId,
    #[serde(flatten)]
    pub action: FlightAction,
}

/// Replays a scripted flight: each step becomes a command on its tick,
/// issued on behalf of the vessel's owner. Steps whose tick has already
/// passed when the controller first sees them are skipped.
pub struct FlightPlanController {
    steps: Vec<FlightPlanStep>,
    cursor: usize,
}

impl FlightPlanController {
    pub fn new(mut steps: Vec<FlightPlanStep>) -> Self {
        steps.sort_by_key(|step| step.tick);
        Self { steps, cursor: 0 }
    }

    /// Steps not yet issued or skipped.
    pub fn remaining(&self) -> &[FlightPlanStep] {
        &self.steps[self.cursor..]
    }
}

fn flight_command(step: &FlightPlanStep) -> Command {
    let vessel_id = step.vessel_id.clone();
    match &step.action {
        FlightAction::SetEnv { env } => Command::SetVesselEnv {
            vessel_id,
            env: env.clone(),
        },
        FlightAction::SetChannelOnline { channel_id, online } => Command::SetChannelOnline {
            vessel_id,
            channel_id: channel_id.clone(),
            online: *online,
        },
        FlightAction::Replenish { resource, amount } => Command::ReplenishResource {
            vessel_id,
            resource: resource.clone(),
            amount: *amount,
        },
    }
}

impl CommandSource for FlightPlanController {
    fn generate_commands(
        &mut self,
        state: &GameState,
        _content: &GameContent,
        next_command_id: &mut u64,
    ) -> Vec<CommandEnvelope> {
        let tick = state.meta.tick;
        let mut commands = Vec::new();
        while let Some(step) = self.steps.get(self.cursor) {
            if step.tick > tick {
                break;
            }
            self.cursor += 1;
            if step.tick < tick {
                continue;
            }
            let Some(vessel) = state.vessels.get(&step.vessel_id) else {
                continue;
            };
            commands.push(make_cmd(
                &vessel.owner,
                tick,
                next_command_id,
                flight_command(step),
            ));
        }
        commands
    }
}
