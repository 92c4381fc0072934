//! Experiment definitions, per-instance runtime state and the per-tick
//! state machine.
//!
//! Each tick an instance evaluates its conditions exactly once and applies
//! exactly one state rule. Transmission runs separately through
//! [`ExperimentInstance::transmit_step`], driven at a lower frequency and
//! gated by the instance's [`TransmissionScheduler`].

mod definition;
mod runtime;
mod transmission;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use definition::ExperimentDefinition;
pub use runtime::{ExperimentAction, ExperimentRuntime, ExperimentStatus};
pub use transmission::{select_channel, Channel, ChannelPreference, TransmissionScheduler};

use crate::{
    AwardReason, ConditionSet, EvalContext, EvalState, Evaluation, Event, EventLevel,
    ExperimentId, ResourcePool, ValueSink, VesselEnv, VesselId,
};

/// Everything an instance may touch on its vessel during a tick.
pub struct ExperimentContext<'a> {
    pub vessel_id: &'a VesselId,
    pub env: &'a VesselEnv,
    pub resources: &'a mut dyn ResourcePool,
    pub channels: &'a mut [Channel],
    /// True when another instance on the same vessel is `Transmitting`.
    pub sibling_transmitting: bool,
    pub preference: ChannelPreference,
    pub event_level: EventLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentInstance {
    pub id: ExperimentId,
    /// Name of the [`ExperimentDefinition`] this instance runs.
    pub def_id: String,
    pub runtime: ExperimentRuntime,
    /// Cloned from the definition on attach. Resource draws keep their
    /// initial-withdrawal flag here, so this copy is persisted.
    pub conditions: ConditionSet,
    #[serde(default)]
    pub scheduler: TransmissionScheduler,
}

impl ExperimentInstance {
    pub fn attach(id: ExperimentId, def: &ExperimentDefinition, now: f32) -> Self {
        Self {
            id,
            def_id: def.name.clone(),
            runtime: ExperimentRuntime::new(def, now),
            conditions: def.conditions.clone(),
            scheduler: TransmissionScheduler::default(),
        }
    }

    pub fn status(&self) -> ExperimentStatus {
        self.runtime.status
    }

    pub fn tick(
        &mut self,
        def: &ExperimentDefinition,
        ctx: &mut ExperimentContext<'_>,
        now: f32,
        events: &mut Vec<Event>,
    ) {
        let delta_time = (now - self.runtime.last_tick_time).max(0.0);
        let status = self.runtime.status;
        let evaluation = if status.is_terminal() || status == ExperimentStatus::Unknown {
            Evaluation::of(EvalState::Unknown)
        } else {
            self.evaluate(ctx, delta_time, events)
        };

        if def.can_fail_at_any_time && evaluation.state == EvalState::Fail && !status.is_terminal() {
            self.fail(ctx, events);
        } else {
            self.apply_rule(def, ctx, evaluation, delta_time, events);
        }
        self.runtime.last_tick_time = now;
    }

    fn evaluate(
        &mut self,
        ctx: &mut ExperimentContext<'_>,
        delta_time: f32,
        events: &mut Vec<Event>,
    ) -> Evaluation {
        let mut eval_ctx = EvalContext {
            env: ctx.env,
            resources: &mut *ctx.resources,
        };
        let evaluation = self.conditions.evaluate(&mut eval_ctx, delta_time);
        if ctx.event_level == EventLevel::Debug {
            events.push(Event::ConditionsEvaluated {
                vessel_id: ctx.vessel_id.clone(),
                experiment_id: self.id.clone(),
                verdict: evaluation.state,
                data_rate_modifier: evaluation.modifiers.data_rate,
            });
        }
        evaluation
    }

    fn apply_rule(
        &mut self,
        def: &ExperimentDefinition,
        ctx: &mut ExperimentContext<'_>,
        evaluation: Evaluation,
        delta_time: f32,
        events: &mut Vec<Event>,
    ) {
        use ExperimentStatus as S;
        let verdict = evaluation.state;
        match self.runtime.status {
            S::Unknown => self.set_status(S::Idle, ctx.vessel_id, events),
            S::Idle => {
                if verdict == EvalState::Invalid {
                    self.set_status(S::ConditionsNotMet, ctx.vessel_id, events);
                } else {
                    self.on_exclusion(verdict, None, ctx, events);
                }
            }
            S::ConditionsNotMet => {
                if verdict == EvalState::Valid {
                    self.set_status(S::Idle, ctx.vessel_id, events);
                } else {
                    self.on_exclusion(verdict, None, ctx, events);
                }
            }
            S::Paused => {
                self.scheduler.stop(ctx.channels, &self.id);
                self.on_exclusion(verdict, Some(S::Idle), ctx, events);
            }
            S::PausedConnection => {
                self.reconnect(ctx, events);
            }
            S::Researching => self.research(def, ctx, evaluation, delta_time, events),
            S::DataCapReached => {
                // A failing fold carries partial modifiers; only a valid one moves the cap.
                let below_cap = verdict == EvalState::Valid
                    && def
                        .effective_cap(evaluation.modifiers)
                        .map_or(true, |cap| self.runtime.current_data < cap);
                if below_cap {
                    self.set_status(S::Researching, ctx.vessel_id, events);
                }
            }
            S::ResearchPausedConditionsNotMet => {
                if verdict == EvalState::Valid {
                    self.set_status(S::Researching, ctx.vessel_id, events);
                } else {
                    self.on_exclusion(verdict, Some(S::Idle), ctx, events);
                }
            }
            S::ResearchComplete => {
                if def.auto_analyze {
                    self.begin_analysis(def, ctx.vessel_id, events);
                }
            }
            S::Analyzing => {
                self.runtime.analysis_time_remaining -= delta_time;
                if self.runtime.analysis_time_remaining <= 0.0 {
                    self.set_status(S::AnalysisComplete, ctx.vessel_id, events);
                }
            }
            S::AnalysisComplete => self.set_status(S::ReadyToTransmit, ctx.vessel_id, events),
            S::ReadyToTransmit => {
                if def.auto_transmit {
                    self.set_status(S::StartTransmit, ctx.vessel_id, events);
                }
            }
            S::StartTransmit => self.start_transmission(def, ctx, events),
            S::Transmitting => self.resume_transmission(ctx, events),
            S::TransmitComplete => self.finish_transmission(def, ctx, events),
            S::Completed => self.scheduler.stop(ctx.channels, &self.id),
            S::Failed => {}
        }
    }

    /// Handles `Reset` and `Fail` verdicts; other verdicts are ignored.
    fn on_exclusion(
        &mut self,
        verdict: EvalState,
        reset_to: Option<ExperimentStatus>,
        ctx: &mut ExperimentContext<'_>,
        events: &mut Vec<Event>,
    ) {
        match verdict {
            EvalState::Reset => {
                debug!(experiment = %self.id, "conditions reset collected data");
                self.runtime.clear_data();
                if let Some(to) = reset_to {
                    self.scheduler.stop(ctx.channels, &self.id);
                    self.set_status(to, ctx.vessel_id, events);
                }
            }
            EvalState::Fail => self.fail(ctx, events),
            EvalState::Valid | EvalState::Invalid | EvalState::Unknown => {}
        }
    }

    fn research(
        &mut self,
        def: &ExperimentDefinition,
        ctx: &mut ExperimentContext<'_>,
        evaluation: Evaluation,
        delta_time: f32,
        events: &mut Vec<Event>,
    ) {
        if def.is_continuous() && self.scheduler.start() {
            debug!(experiment = %self.id, "continuous transmission started");
        }
        if self.research_finished(def, evaluation, ctx.vessel_id, events) {
            return;
        }
        match evaluation.state {
            EvalState::Valid => {
                let mut collected = self.runtime.current_data
                    + def.research_data_rate * evaluation.modifiers.data_rate * delta_time;
                if let Some(cap) = def.effective_cap(evaluation.modifiers) {
                    collected = collected.min(cap);
                }
                let gathered = (collected - self.runtime.current_data).max(0.0);
                self.runtime.current_data += gathered;
                if def.is_continuous() {
                    self.runtime.data_to_send += gathered;
                    self.runtime.sync_queue(def);
                }
                self.research_finished(def, evaluation, ctx.vessel_id, events);
            }
            EvalState::Invalid | EvalState::Unknown => self.set_status(
                ExperimentStatus::ResearchPausedConditionsNotMet,
                ctx.vessel_id,
                events,
            ),
            EvalState::Reset | EvalState::Fail => {
                self.on_exclusion(evaluation.state, Some(ExperimentStatus::Idle), ctx, events);
            }
        }
    }

    /// Moves to `ResearchComplete` or `DataCapReached` when either applies.
    fn research_finished(
        &mut self,
        def: &ExperimentDefinition,
        evaluation: Evaluation,
        vessel_id: &VesselId,
        events: &mut Vec<Event>,
    ) -> bool {
        let current = self.runtime.current_data;
        if !def.is_continuous() && current >= def.required_data {
            self.set_status(ExperimentStatus::ResearchComplete, vessel_id, events);
            return true;
        }
        match def.effective_cap(evaluation.modifiers) {
            Some(cap) if current >= cap => {
                self.set_status(ExperimentStatus::DataCapReached, vessel_id, events);
                true
            }
            _ => false,
        }
    }

    fn begin_analysis(&mut self, def: &ExperimentDefinition, vessel_id: &VesselId, events: &mut Vec<Event>) {
        self.runtime.analysis_time_remaining = def.analysis_time;
        self.set_status(ExperimentStatus::Analyzing, vessel_id, events);
    }

    fn start_transmission(
        &mut self,
        def: &ExperimentDefinition,
        ctx: &mut ExperimentContext<'_>,
        events: &mut Vec<Event>,
    ) {
        let Some(index) = self.free_channel(ctx) else {
            return;
        };
        self.runtime.transmitted_packets = 0.0;
        self.runtime.data_to_send = def.transmission_payload(self.runtime.current_data);
        self.runtime.sync_queue(def);
        self.open_channel(index, ctx, events);
    }

    /// After a reload the scheduler is not running; pick a channel back up.
    fn resume_transmission(&mut self, ctx: &mut ExperimentContext<'_>, events: &mut Vec<Event>) {
        if self.scheduler.running || self.reconnect(ctx, events) {
            return;
        }
        if select_channel(ctx.channels, ctx.preference).is_none() {
            self.lose_connection(ctx, events);
        }
    }

    /// Reclaims a channel without touching packet counters.
    fn reconnect(&mut self, ctx: &mut ExperimentContext<'_>, events: &mut Vec<Event>) -> bool {
        match self.free_channel(ctx) {
            Some(index) => {
                self.open_channel(index, ctx, events);
                true
            }
            None => false,
        }
    }

    /// Preferred channel, if it is idle and no sibling is transmitting.
    fn free_channel(&self, ctx: &ExperimentContext<'_>) -> Option<usize> {
        if ctx.sibling_transmitting {
            return None;
        }
        let index = select_channel(ctx.channels, ctx.preference)?;
        (!ctx.channels[index].is_busy_for(&self.id)).then_some(index)
    }

    fn open_channel(&mut self, index: usize, ctx: &mut ExperimentContext<'_>, events: &mut Vec<Event>) {
        let channel = &mut ctx.channels[index];
        self.runtime.transmission_rate = channel.rate;
        self.runtime.transmission_resource_cost_per_packet = channel.resource_cost_per_packet;
        self.scheduler.claim(channel, &self.id);
        self.scheduler.start();
        events.push(Event::TransmissionStarted {
            vessel_id: ctx.vessel_id.clone(),
            experiment_id: self.id.clone(),
            channel_id: channel.id.clone(),
        });
        self.set_status(ExperimentStatus::Transmitting, ctx.vessel_id, events);
    }

    fn finish_transmission(
        &mut self,
        def: &ExperimentDefinition,
        ctx: &mut ExperimentContext<'_>,
        events: &mut Vec<Event>,
    ) {
        events.push(Event::TransmissionCompleted {
            vessel_id: ctx.vessel_id.clone(),
            experiment_id: self.id.clone(),
            title: def.title.clone(),
        });
        self.scheduler.stop(ctx.channels, &self.id);
        self.set_status(ExperimentStatus::Completed, ctx.vessel_id, events);
    }

    fn lose_connection(&mut self, ctx: &mut ExperimentContext<'_>, events: &mut Vec<Event>) {
        self.scheduler.stop(ctx.channels, &self.id);
        events.push(Event::ConnectionLost {
            vessel_id: ctx.vessel_id.clone(),
            experiment_id: self.id.clone(),
        });
        self.set_status(ExperimentStatus::PausedConnection, ctx.vessel_id, events);
    }

    fn fail(&mut self, ctx: &mut ExperimentContext<'_>, events: &mut Vec<Event>) {
        self.scheduler.stop(ctx.channels, &self.id);
        self.set_status(ExperimentStatus::Failed, ctx.vessel_id, events);
    }

    fn set_status(&mut self, to: ExperimentStatus, vessel_id: &VesselId, events: &mut Vec<Event>) {
        let from = self.runtime.status;
        if from == to {
            return;
        }
        debug!(experiment = %self.id, ?from, ?to, "experiment state change");
        self.runtime.status = to;
        events.push(Event::ExperimentStateChanged {
            vessel_id: vessel_id.clone(),
            experiment_id: self.id.clone(),
            from,
            to,
        });
    }

    // -----------------------------------------------------------------------
    // Operator actions and recovery
    // -----------------------------------------------------------------------

    /// Applies an operator action. Returns false, changing nothing, when the
    /// current state does not accept it.
    pub fn apply_action(
        &mut self,
        action: ExperimentAction,
        def: &ExperimentDefinition,
        vessel_id: &VesselId,
        channels: &mut [Channel],
        events: &mut Vec<Event>,
    ) -> bool {
        if !action.accepts(self.runtime.status) {
            debug!(experiment = %self.id, ?action, status = ?self.runtime.status, "action rejected");
            return false;
        }
        match action {
            ExperimentAction::StartResearch => {
                self.set_status(ExperimentStatus::Researching, vessel_id, events);
            }
            ExperimentAction::PauseResearch => {
                self.scheduler.stop(channels, &self.id);
                self.set_status(ExperimentStatus::Paused, vessel_id, events);
            }
            ExperimentAction::StartAnalysis => self.begin_analysis(def, vessel_id, events),
            ExperimentAction::TransmitResults => {
                self.set_status(ExperimentStatus::StartTransmit, vessel_id, events);
            }
        }
        true
    }

    /// Pays out withheld value. Failed experiments forfeit it.
    pub fn recover(
        &mut self,
        vessel_id: &VesselId,
        sink: &mut dyn ValueSink,
        events: &mut Vec<Event>,
    ) -> f32 {
        if self.runtime.status == ExperimentStatus::Failed || self.runtime.recovery_value <= 0.0 {
            return 0.0;
        }
        let value = std::mem::take(&mut self.runtime.recovery_value);
        sink.award(value, AwardReason::Recovery);
        events.push(Event::ScienceRecovered {
            vessel_id: vessel_id.clone(),
            experiment_id: self.id.clone(),
            value,
        });
        value
    }
}
