use std::collections::BTreeMap;

use abl_ops::{Assignment, RandomOperator};
use serde_json::Value;

/// z_(alpha/2) for alpha = .001, i.e. a 99.9% confidence interval.
pub const Z: f64 = 3.29;

/// Runs `op_for(unit)` as variable `x` for units `0..n` under `salt`.
pub fn draw_many<F>(salt: &str, n: usize, op_for: F) -> Vec<Value>
where
    F: Fn(usize) -> RandomOperator,
{
    (0..n)
        .map(|unit| {
            let mut params = Assignment::new(salt);
            params.set("x", op_for(unit)).unwrap();
            params.get("x").cloned().unwrap()
        })
        .collect()
}

/// Normal approximation of the binomial confidence interval.
pub fn assert_prop(observed: f64, expected: f64, n: f64) {
    let se = Z * (expected * (1.0 - expected) / n).sqrt();
    assert!(
        (observed - expected).abs() <= se,
        "observed {observed} outside {expected} +/- {se}"
    );
}

/// Checks that every observed value has roughly its expected density.
pub fn assert_probs(values: &[Value], expected_mass: &[(Value, f64)]) {
    let total_mass: f64 = expected_mass.iter().map(|(_, mass)| mass).sum();
    let mut hist: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        *hist.entry(value.to_string()).or_default() += 1;
    }
    let n = values.len() as f64;
    for (value, mass) in expected_mass {
        let observed = *hist.get(&value.to_string()).unwrap_or(&0) as f64 / n;
        assert_prop(observed, mass / total_mass, n);
    }
    for key in hist.keys() {
        assert!(
            expected_mass.iter().any(|(value, _)| &value.to_string() == key),
            "unexpected outcome {key}"
        );
    }
}
