//! `science_core`: deterministic experiment simulation tick.
//!
//! No IO, no network. Conditions are evaluated against a vessel context
//! snapshot supplied by the driver; everything else is plain state.

mod commands;
pub mod conditions;
mod config_node;
mod engine;
pub mod experiment;
mod id;
pub mod metrics;
mod persistence;
mod resources;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use conditions::{
    Condition, ConditionGroup, ConditionKind, ConditionRegistry, ConditionSet, EvalContext,
    EvalState, Evaluation, ExclusionMode, GroupAggregation, LoadError, Modifiers, OrbitBounds,
    ResourceDraw,
};
pub use config_node::ConfigNode;
pub use engine::tick;
pub use experiment::{
    select_channel, Channel, ChannelPreference, ExperimentAction, ExperimentContext,
    ExperimentDefinition, ExperimentInstance, ExperimentRuntime, ExperimentStatus,
    TransmissionScheduler,
};
pub use id::{experiment_id, generate_uuid};
pub use metrics::{
    append_metrics_row, compute_metrics, write_metrics_csv, write_metrics_header, MetricsFileWriter,
    MetricsSnapshot,
};
pub use persistence::{load_game, save_game};
pub use resources::{
    AwardReason, ResourceAmount, ResourcePool, ResourceStore, ScienceLedger, ValueSink,
};
pub use types::*;

pub(crate) fn emit(counters: &mut Counters, tick: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, tick, event }
}

#[cfg(test)]
mod tests;
