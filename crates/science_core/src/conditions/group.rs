use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{
    Condition, ConditionRegistry, EvalContext, EvalState, Evaluation, LoadError, Modifiers,
    CONDITION_NODE, GROUP_NODE,
};
use crate::ConfigNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GroupAggregation {
    And,
    #[default]
    Or,
}

impl GroupAggregation {
    /// Case-insensitive; anything other than `and` is `Or`.
    pub fn parse(label: &str) -> GroupAggregation {
        if label.trim().eq_ignore_ascii_case("and") {
            GroupAggregation::And
        } else {
            GroupAggregation::Or
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GroupAggregation::And => "and",
            GroupAggregation::Or => "or",
        }
    }
}

/// Ordered conditions folded into one verdict. Order matters: both
/// aggregations short-circuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub aggregation: GroupAggregation,
    pub conditions: SmallVec<[Condition; 4]>,
}

impl ConditionGroup {
    pub fn new(aggregation: GroupAggregation, conditions: impl IntoIterator<Item = Condition>) -> Self {
        Self {
            aggregation,
            conditions: conditions.into_iter().collect(),
        }
    }

    pub fn evaluate(&mut self, ctx: &mut EvalContext<'_>, delta_time: f32) -> Evaluation {
        let evaluations = self
            .conditions
            .iter_mut()
            .map(|condition| condition.evaluate(ctx, delta_time));
        match self.aggregation {
            GroupAggregation::And => fold_and(evaluations),
            GroupAggregation::Or => fold_or(evaluations),
        }
    }

    pub(crate) fn load(
        node: &ConfigNode,
        registry: &ConditionRegistry,
        diagnostics: &mut Vec<LoadError>,
    ) -> Self {
        let aggregation = GroupAggregation::parse(node.get_value("groupType").unwrap_or("or"));
        let conditions = registry.load_all(node.get_nodes(CONDITION_NODE), diagnostics);
        Self::new(aggregation, conditions)
    }

    pub fn save(&self) -> ConfigNode {
        let mut node = ConfigNode::new(GROUP_NODE);
        node.add_value("groupType", self.aggregation.label());
        for condition in &self.conditions {
            node.add_node(condition.save());
        }
        node
    }
}

/// Folds modifiers across `Valid` results; the first non-`Valid` result ends
/// the fold and keeps whatever was folded before it.
pub(crate) fn fold_and(evaluations: impl Iterator<Item = Evaluation>) -> Evaluation {
    let mut modifiers = Modifiers::IDENTITY;
    for evaluation in evaluations {
        if evaluation.state != EvalState::Valid {
            return Evaluation {
                state: evaluation.state,
                modifiers,
            };
        }
        modifiers.fold(evaluation.modifiers);
    }
    Evaluation {
        state: EvalState::Valid,
        modifiers,
    }
}

/// First `Valid` wins with its modifiers; `Reset`/`Fail` end the fold bare.
pub(crate) fn fold_or(evaluations: impl Iterator<Item = Evaluation>) -> Evaluation {
    for evaluation in evaluations {
        match evaluation.state {
            EvalState::Valid => {
                let mut modifiers = Modifiers::IDENTITY;
                modifiers.fold(evaluation.modifiers);
                return Evaluation {
                    state: EvalState::Valid,
                    modifiers,
                };
            }
            EvalState::Reset | EvalState::Fail => return Evaluation::of(evaluation.state),
            EvalState::Invalid | EvalState::Unknown => {}
        }
    }
    Evaluation::of(EvalState::Invalid)
}
