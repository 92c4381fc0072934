use super::*;
use crate::test_fixtures::pad_env;

fn valid_with_rate(rate: f32) -> Condition {
    Condition::new(ConditionKind::Situation {
        situation: "prelaunch".to_string(),
    })
    .with_modifiers(Modifiers {
        data_rate: rate,
        ..Modifiers::IDENTITY
    })
}

fn invalid() -> Condition {
    Condition::new(ConditionKind::Situation {
        situation: "orbiting".to_string(),
    })
}

fn failing() -> Condition {
    Condition::new(ConditionKind::Biome {
        biome: "LaunchPad".to_string(),
    })
    .restriction(ExclusionMode::Fail)
}

/// Draws one unit of charge when evaluated, which shows whether a fold
/// reached it.
fn charge_draw() -> Condition {
    Condition::new(ConditionKind::Resource(ResourceDraw {
        resource_name: CHARGE.to_string(),
        initial_consumption: 1.0,
        ..ResourceDraw::default()
    }))
}

fn evaluate_group(group: &mut ConditionGroup, store: &mut ResourceStore) -> Evaluation {
    let env = pad_env();
    let mut ctx = EvalContext {
        env: &env,
        resources: store,
    };
    group.evaluate(&mut ctx, 1.0)
}

#[test]
fn or_skips_invalid_and_takes_first_valid_modifiers() {
    let mut group = ConditionGroup::new(GroupAggregation::Or, [invalid(), valid_with_rate(2.0)]);
    let mut store = ResourceStore::default();
    let evaluation = evaluate_group(&mut group, &mut store);
    assert_eq!(evaluation.state, EvalState::Valid);
    assert!((evaluation.modifiers.data_rate - 2.0).abs() < 1e-6);
}

#[test]
fn or_stops_at_first_valid() {
    let mut store = ResourceStore::default().with(CHARGE, 5.0, 5.0);
    let mut group = ConditionGroup::new(GroupAggregation::Or, [valid_with_rate(3.0), charge_draw()]);
    let evaluation = evaluate_group(&mut group, &mut store);
    assert!((evaluation.modifiers.data_rate - 3.0).abs() < 1e-6);
    assert!((store.available(CHARGE) - 5.0).abs() < 1e-6);
}

#[test]
fn or_returns_fail_without_modifiers() {
    let mut group = ConditionGroup::new(
        GroupAggregation::Or,
        [invalid(), failing(), valid_with_rate(4.0)],
    );
    let evaluation = evaluate_group(&mut group, &mut ResourceStore::default());
    assert_eq!(evaluation.state, EvalState::Fail);
    assert!((evaluation.modifiers.data_rate - 1.0).abs() < 1e-6);
}

#[test]
fn or_with_nothing_valid_is_invalid() {
    let mut group = ConditionGroup::new(GroupAggregation::Or, [invalid(), invalid()]);
    let evaluation = evaluate_group(&mut group, &mut ResourceStore::default());
    assert_eq!(evaluation.state, EvalState::Invalid);
}

#[test]
fn and_short_circuits_on_first_non_valid() {
    let mut store = ResourceStore::default().with(CHARGE, 5.0, 5.0);
    let mut group = ConditionGroup::new(
        GroupAggregation::And,
        [valid_with_rate(2.0), invalid(), charge_draw()],
    );
    let evaluation = evaluate_group(&mut group, &mut store);
    assert_eq!(evaluation.state, EvalState::Invalid);
    // Modifiers folded before the break are kept.
    assert!((evaluation.modifiers.data_rate - 2.0).abs() < 1e-6);
    assert!((store.available(CHARGE) - 5.0).abs() < 1e-6);
}

#[test]
fn and_folds_every_valid_modifier() {
    let mut capped = valid_with_rate(3.0);
    capped.modifiers.max_data_cap = 0.5;
    capped.modifiers.max_data_bonus = 2.0;
    let mut bonus = valid_with_rate(1.0);
    bonus.modifiers.max_data_bonus = 1.0;
    let mut group = ConditionGroup::new(
        GroupAggregation::And,
        [valid_with_rate(2.0), capped, bonus],
    );
    let evaluation = evaluate_group(&mut group, &mut ResourceStore::default());
    assert_eq!(evaluation.state, EvalState::Valid);
    assert!((evaluation.modifiers.data_rate - 6.0).abs() < 1e-6);
    assert!((evaluation.modifiers.max_data_cap - 0.5).abs() < 1e-6);
    assert!((evaluation.modifiers.max_data_bonus - 3.0).abs() < 1e-6);
}

#[test]
fn empty_set_is_valid() {
    let env = pad_env();
    let mut store = ResourceStore::default();
    let mut ctx = EvalContext {
        env: &env,
        resources: &mut store,
    };
    let evaluation = ConditionSet::Empty.evaluate(&mut ctx, 1.0);
    assert!(evaluation.is_valid());
    assert_eq!(evaluation.modifiers, Modifiers::IDENTITY);
}

#[test]
fn groups_combine_with_and() {
    let env = pad_env();
    let mut store = ResourceStore::default();
    let mut ctx = EvalContext {
        env: &env,
        resources: &mut store,
    };
    let mut set = ConditionSet::Groups(vec![
        ConditionGroup::new(GroupAggregation::Or, [invalid(), valid_with_rate(2.0)]),
        ConditionGroup::new(GroupAggregation::Or, [valid_with_rate(1.5)]),
    ]);
    let evaluation = set.evaluate(&mut ctx, 1.0);
    assert!(evaluation.is_valid());
    assert!((evaluation.modifiers.data_rate - 3.0).abs() < 1e-6);

    let mut blocked = ConditionSet::Groups(vec![
        ConditionGroup::new(GroupAggregation::Or, [valid_with_rate(2.0)]),
        ConditionGroup::new(GroupAggregation::Or, [invalid()]),
    ]);
    assert_eq!(blocked.evaluate(&mut ctx, 1.0).state, EvalState::Invalid);
}

#[test]
fn load_prefers_groups_over_flat_list() {
    let registry = ConditionRegistry::builtin();
    let mut node = ConfigNode::new("EXPERIMENT");
    node.add_node(invalid().save());
    let group = node.add_node(ConfigNode::new("conditionGroup"));
    group.add_value("groupType", "AND");
    group.add_node(valid_with_rate(2.0).save());

    let mut diagnostics = Vec::new();
    let set = ConditionSet::load(&node, &registry, &mut diagnostics);
    let ConditionSet::Groups(groups) = &set else {
        panic!("expected groups, got {set:?}");
    };
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].aggregation, GroupAggregation::And);
    assert_eq!(groups[0].conditions.len(), 1);
    assert!(diagnostics.is_empty());
}

#[test]
fn group_type_defaults_to_or() {
    let registry = ConditionRegistry::builtin();
    let mut node = ConfigNode::new("conditionGroup");
    node.add_node(invalid().save());
    let group = ConditionGroup::load(&node, &registry, &mut Vec::new());
    assert_eq!(group.aggregation, GroupAggregation::Or);

    let reloaded = ConditionGroup::load(&group.save(), &registry, &mut Vec::new());
    assert_eq!(reloaded, group);
}
