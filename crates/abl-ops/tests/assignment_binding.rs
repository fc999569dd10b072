use std::collections::BTreeMap;

use abl_ops::{Arg, Assignment, RandomOperator};
use serde_json::json;

#[test]
fn constants_are_stored_directly() {
    let mut params = Assignment::new("test_salt");
    assert!(params.is_empty());
    params.set("count", 5).unwrap();
    params.set("label", "a").unwrap();
    assert_eq!(params.get("count"), Some(&json!(5)));
    assert_eq!(params.get("label"), Some(&json!("a")));
    assert_eq!(params.len(), 2);
    assert!(params.get("missing").is_none());
}

#[test]
fn remove_unbinds_a_variable() {
    let mut params = Assignment::new("test_salt");
    params.set("x", 5).unwrap();
    assert!(params.contains("x"));
    assert_eq!(params.remove("x"), Some(json!(5)));
    assert!(!params.contains("x"));
}

#[test]
fn iteration_follows_insertion_order() {
    let mut params = Assignment::new("test_salt");
    params.set("zeta", 1).unwrap();
    params.set("alpha", 2).unwrap();
    params.set("mid", 3).unwrap();
    let names: Vec<&str> = params.iter().map(|(name, _)| name).collect();
    assert_eq!(names, ["zeta", "alpha", "mid"]);
    assert_eq!(params.to_json(), json!({"zeta": 1, "alpha": 2, "mid": 3}));
}

#[test]
fn variable_name_is_the_default_salt() {
    let choices = json!(["a", "b", "c", "d"]);
    for unit in 0..20 {
        let mut implicit = Assignment::new("exp");
        implicit
            .set("color", RandomOperator::uniform_choice(choices.clone()).unit(unit))
            .unwrap();
        let mut explicit = Assignment::new("exp");
        explicit
            .set(
                "other",
                RandomOperator::uniform_choice(choices.clone())
                    .unit(unit)
                    .salt("color"),
            )
            .unwrap();
        assert_eq!(implicit.get("color"), explicit.get("other"));
    }
}

#[test]
fn experiment_salt_changes_outcomes() {
    let mut moved = 0;
    for unit in 0..100 {
        let mut a = Assignment::new("exp_a");
        let mut b = Assignment::new("exp_b");
        a.set("x", RandomOperator::random_integer(0, 99).unit(unit)).unwrap();
        b.set("x", RandomOperator::random_integer(0, 99).unit(unit)).unwrap();
        if a.get("x") != b.get("x") {
            moved += 1;
        }
    }
    assert!(moved > 80);
}

#[test]
fn overrides_suppress_computation() {
    let mut overrides = BTreeMap::new();
    overrides.insert("x".to_string(), json!(42));
    let mut params = Assignment::new("exp");
    params.set_overrides(overrides);
    assert_eq!(params.get("x"), Some(&json!(42)));

    // an invalid operator would fail if it were executed
    params
        .set("x", RandomOperator::bernoulli_trial(7.0).unit(1))
        .unwrap();
    params.set("x", RandomOperator::random_integer(0, 10).unit(1)).unwrap();
    params.set("x", "plain").unwrap();
    assert_eq!(params.get("x"), Some(&json!(42)));

    params.set("y", RandomOperator::random_integer(0, 10).unit(1)).unwrap();
    assert!(params.get("y").is_some());
}

#[test]
fn with_overrides_matches_setter() {
    let mut overrides = BTreeMap::new();
    overrides.insert("flag".to_string(), json!(true));
    let params = Assignment::with_overrides("exp", overrides.clone());
    assert_eq!(params.overrides(), &overrides);
    assert_eq!(params.get("flag"), Some(&json!(true)));
    assert_eq!(params.experiment_salt(), "exp");
}

#[test]
fn nested_operators_resolve_through_the_assignment() {
    let weights = Arg::List(vec![
        Arg::from(1),
        Arg::from(RandomOperator::random_integer(1, 5).unit(9).salt("w")),
    ]);
    let mut params = Assignment::new("exp");
    params
        .set(
            "choice",
            RandomOperator::weighted_choice(json!(["a", "b"]), weights.clone()).unit(9),
        )
        .unwrap();
    let first = params.get("choice").cloned();
    let mut again = Assignment::new("exp");
    again
        .set(
            "choice",
            RandomOperator::weighted_choice(json!(["a", "b"]), weights).unit(9),
        )
        .unwrap();
    assert_eq!(first, again.get("choice").cloned());

    let mut listed = Assignment::new("exp");
    listed
        .set(
            "pair",
            Arg::List(vec![
                Arg::from("fixed"),
                Arg::from(RandomOperator::random_integer(1, 5).unit(9).salt("w")),
            ]),
        )
        .unwrap();
    let pair = listed.get("pair").unwrap().as_array().unwrap().clone();
    assert_eq!(pair[0], json!("fixed"));
    let drawn = pair[1].as_i64().unwrap();
    assert!((1..=5).contains(&drawn));
}

#[test]
fn nested_unit_can_be_computed() {
    let mut params = Assignment::new("exp");
    params
        .set(
            "x",
            RandomOperator::bernoulli_trial(0.5).unit(RandomOperator::random_integer(0, 3).unit(1).salt("u")),
        )
        .unwrap();
    let value = params.get("x").unwrap().as_i64().unwrap();
    assert!(value == 0 || value == 1);
}

#[test]
fn composite_units_hash_every_part() {
    let mut differing = 0;
    for userid in 0..50 {
        let mut single = Assignment::new("exp");
        single
            .set("x", RandomOperator::random_integer(0, 1_000_000).unit(userid))
            .unwrap();
        let mut pair = Assignment::new("exp");
        pair
            .set(
                "x",
                RandomOperator::random_integer(0, 1_000_000).unit(json!([userid, "name"])),
            )
            .unwrap();
        if single.get("x") != pair.get("x") {
            differing += 1;
        }
    }
    assert!(differing >= 49);
}
