//! Condition evaluation engine.
//!
//! A [`Condition`] is one typed predicate over the vessel context plus the
//! common restriction/exclusion/modifier fields. [`ConditionGroup`] folds an
//! ordered list of conditions into one verdict, and [`ConditionSet`] is what an
//! experiment evaluates once per tick.

mod group;
mod kinds;
mod registry;

use serde::{Deserialize, Serialize};

pub use group::{ConditionGroup, GroupAggregation};
pub use kinds::{ConditionKind, OrbitBounds, ResourceDraw};
pub use registry::{ConditionCtor, ConditionRegistry, LoadError};

use crate::{ConfigNode, ResourcePool, VesselEnv};

pub(crate) const CONDITION_NODE: &str = "condition";
pub(crate) const GROUP_NODE: &str = "conditionGroup";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EvalState {
    #[default]
    Unknown,
    Valid,
    Invalid,
    Reset,
    Fail,
}

/// What a holding restriction predicate causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExclusionMode {
    #[default]
    None,
    Reset,
    Fail,
}

impl ExclusionMode {
    /// Case-insensitive; anything other than `reset`/`fail` is `None`.
    pub fn parse(label: &str) -> ExclusionMode {
        let label = label.trim();
        if label.eq_ignore_ascii_case("reset") {
            ExclusionMode::Reset
        } else if label.eq_ignore_ascii_case("fail") {
            ExclusionMode::Fail
        } else {
            ExclusionMode::None
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExclusionMode::None => "",
            ExclusionMode::Reset => "reset",
            ExclusionMode::Fail => "fail",
        }
    }
}

/// Research modifiers carried by a satisfied condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Modifiers {
    pub data_rate: f32,
    pub max_data_cap: f32,
    pub max_data_bonus: f32,
}

impl Modifiers {
    pub const IDENTITY: Modifiers = Modifiers {
        data_rate: 1.0,
        max_data_cap: 1.0,
        max_data_bonus: 0.0,
    };

    /// Rate and cap multiply, bonus adds.
    pub fn fold(&mut self, other: Modifiers) {
        self.data_rate *= other.data_rate;
        self.max_data_cap *= other.max_data_cap;
        self.max_data_bonus += other.max_data_bonus;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub state: EvalState,
    pub modifiers: Modifiers,
}

impl Evaluation {
    pub fn of(state: EvalState) -> Evaluation {
        Evaluation {
            state,
            modifiers: Modifiers::IDENTITY,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.state == EvalState::Valid
    }
}

/// What a condition may look at, and the one thing it may mutate.
pub struct EvalContext<'a> {
    pub env: &'a VesselEnv,
    pub resources: &'a mut dyn ResourcePool,
}

/// Maps a raw predicate result through restriction semantics.
pub fn restriction_verdict(holds: bool, is_restriction: bool, exclusion: ExclusionMode) -> EvalState {
    match (holds, is_restriction) {
        (true, false) | (false, true) => EvalState::Valid,
        (false, false) => EvalState::Invalid,
        (true, true) => match exclusion {
            ExclusionMode::None => EvalState::Invalid,
            ExclusionMode::Reset => EvalState::Reset,
            ExclusionMode::Fail => EvalState::Fail,
        },
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub is_restriction: bool,
    pub exclusion: ExclusionMode,
    pub modifiers: Modifiers,
    pub kind: ConditionKind,
}

impl Condition {
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            is_restriction: false,
            exclusion: ExclusionMode::None,
            modifiers: Modifiers::IDENTITY,
            kind,
        }
    }

    #[must_use]
    pub fn restriction(mut self, exclusion: ExclusionMode) -> Self {
        self.is_restriction = true;
        self.exclusion = exclusion;
        self
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// The kind's requirement, negated for restrictions.
    pub fn describe(&self) -> String {
        let text = self.kind.describe();
        if !self.is_restriction {
            return text;
        }
        match self.exclusion {
            ExclusionMode::None => format!("not {text}"),
            ExclusionMode::Reset => format!("not {text} (resets)"),
            ExclusionMode::Fail => format!("not {text} (fails)"),
        }
    }

    /// Evaluates the predicate and applies restriction semantics. The
    /// condition's modifiers are returned with every verdict; callers decide
    /// whether to fold them.
    pub fn evaluate(&mut self, ctx: &mut EvalContext<'_>, delta_time: f32) -> Evaluation {
        let holds = self.kind.holds(ctx, delta_time);
        Evaluation {
            state: restriction_verdict(holds, self.is_restriction, self.exclusion),
            modifiers: self.modifiers,
        }
    }

    pub(crate) fn from_node(node: &ConfigNode, kind: ConditionKind) -> Self {
        Self {
            is_restriction: node.bool_or("restriction", false),
            exclusion: ExclusionMode::parse(node.get_value("exclusion").unwrap_or_default()),
            modifiers: Modifiers {
                data_rate: node.parse_or("dataRateModifier", 1.0),
                max_data_cap: node.parse_or("maximumDataModifier", 1.0),
                max_data_bonus: node.parse_or("maximumDataBonus", 0.0),
            },
            kind,
        }
    }

    pub fn save(&self) -> ConfigNode {
        let mut node = ConfigNode::new(CONDITION_NODE);
        node.add_value("conditionType", self.type_name());
        node.add_value("restriction", self.is_restriction);
        node.add_value("exclusion", self.exclusion.label());
        node.add_value("dataRateModifier", self.modifiers.data_rate);
        node.add_value("maximumDataModifier", self.modifiers.max_data_cap);
        node.add_value("maximumDataBonus", self.modifiers.max_data_bonus);
        self.kind.save_params(&mut node);
        node
    }
}

// ---------------------------------------------------------------------------
// Condition set
// ---------------------------------------------------------------------------

fn join_described(conditions: &[Condition], separator: &str) -> String {
    conditions
        .iter()
        .map(Condition::describe)
        .collect::<Vec<_>>()
        .join(separator)
}

/// The conditions an experiment evaluates. Groups and a flat list are
/// mutually exclusive; an empty set is always satisfied.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum ConditionSet {
    #[default]
    Empty,
    Flat(Vec<Condition>),
    Groups(Vec<ConditionGroup>),
}

impl ConditionSet {
    /// A flat list folds like an implicit `And` group; multiple groups
    /// combine with `And`.
    pub fn evaluate(&mut self, ctx: &mut EvalContext<'_>, delta_time: f32) -> Evaluation {
        match self {
            ConditionSet::Empty => Evaluation::of(EvalState::Valid),
            ConditionSet::Flat(conditions) => group::fold_and(
                conditions
                    .iter_mut()
                    .map(|condition| condition.evaluate(ctx, delta_time)),
            ),
            ConditionSet::Groups(groups) => group::fold_and(
                groups
                    .iter_mut()
                    .map(|group| group.evaluate(ctx, delta_time)),
            ),
        }
    }

    /// One line for status output; groups are parenthesized.
    pub fn describe(&self) -> String {
        match self {
            ConditionSet::Empty => "always".to_string(),
            ConditionSet::Flat(conditions) => join_described(conditions, " and "),
            ConditionSet::Groups(groups) => groups
                .iter()
                .map(|group| {
                    let separator = format!(" {} ", group.aggregation.label());
                    format!("({})", join_described(&group.conditions, &separator))
                })
                .collect::<Vec<_>>()
                .join(" and "),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ConditionSet::Empty => true,
            ConditionSet::Flat(conditions) => conditions.is_empty(),
            ConditionSet::Groups(groups) => groups.is_empty(),
        }
    }

    /// Reads `conditionGroup` children if any exist, otherwise `condition`
    /// children. Blocks that fail to load are skipped and reported.
    pub fn load(
        node: &ConfigNode,
        registry: &ConditionRegistry,
        diagnostics: &mut Vec<LoadError>,
    ) -> ConditionSet {
        if node.has_node(GROUP_NODE) {
            let groups: Vec<ConditionGroup> = node
                .get_nodes(GROUP_NODE)
                .map(|group_node| ConditionGroup::load(group_node, registry, diagnostics))
                .collect();
            return ConditionSet::Groups(groups);
        }
        let conditions = registry.load_all(node.get_nodes(CONDITION_NODE), diagnostics);
        if conditions.is_empty() {
            ConditionSet::Empty
        } else {
            ConditionSet::Flat(conditions)
        }
    }

    /// Appends this set's blocks as children of `node`.
    pub fn save(&self, node: &mut ConfigNode) {
        match self {
            ConditionSet::Empty => {}
            ConditionSet::Flat(conditions) => {
                for condition in conditions {
                    node.add_node(condition.save());
                }
            }
            ConditionSet::Groups(groups) => {
                for group in groups {
                    node.add_node(group.save());
                }
            }
        }
    }
}
