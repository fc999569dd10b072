//! Selection algorithms behind each [`RandomKind`](crate::RandomKind).
//!
//! Every function validates its parameters before the first hash is drawn.

use abl_core::errors::{AblError, ErrorInfo};
use abl_core::hash::SaltedHasher;
use abl_core::value::{as_integer, as_number, hash_string};
use serde_json::Value;

use crate::operator::Params;

fn operator_error(params: &Params, code: &str, message: String) -> ErrorInfo {
    ErrorInfo::new(code, format!("{}: {message}", params.kind()))
        .with_context("operator", params.kind().name())
}

fn probability(params: &Params) -> Result<f64, AblError> {
    let raw = params.require("p")?;
    match raw.as_f64() {
        Some(p) if (0.0..=1.0).contains(&p) => Ok(p),
        _ => Err(AblError::Operator(
            operator_error(
                params,
                "invalid-probability",
                format!("'p' must be a number between 0.0 and 1.0, not {raw}"),
            )
            .with_context("p", raw.to_string()),
        )),
    }
}

fn sequence(params: &Params, name: &str) -> Result<Vec<Value>, AblError> {
    match params.require(name)? {
        Value::Array(items) => Ok(items.clone()),
        // keyed collections are reduced to their values
        Value::Object(map) => Ok(map.values().cloned().collect()),
        other => Err(AblError::Operator(
            operator_error(
                params,
                "non-array-choices",
                format!("'{name}' must be an array, not {other}"),
            )
            .with_context("argument", name),
        )),
    }
}

fn non_empty_choices(params: &Params) -> Result<Vec<Value>, AblError> {
    let choices = sequence(params, "choices")?;
    if choices.is_empty() {
        return Err(AblError::Operator(
            operator_error(params, "empty-choices", "'choices' must not be empty".into())
                .with_context("argument", "choices"),
        ));
    }
    Ok(choices)
}

fn bounds<T: PartialOrd + ToString>(params: &Params, min: T, max: T) -> Result<(T, T), AblError> {
    if min > max {
        return Err(AblError::Operator(
            operator_error(params, "invalid-range", "'min' must not exceed 'max'".into())
                .with_context("min", min.to_string())
                .with_context("max", max.to_string()),
        ));
    }
    Ok((min, max))
}

/// Uniform float in `[min, max)`; `min == max` yields `min`.
pub fn random_float(params: &Params, hasher: &SaltedHasher<'_>) -> Result<Value, AblError> {
    let min = as_number(params.require("min")?, "min")?;
    let max = as_number(params.require("max")?, "max")?;
    let (min, max) = bounds(params, min, max)?;
    Ok(Value::from(hasher.uniform(min, max, None)))
}

/// `min + hash mod (max - min + 1)`.
pub fn random_integer(params: &Params, hasher: &SaltedHasher<'_>) -> Result<Value, AblError> {
    let min = as_integer(params.require("min")?, "min")?;
    let max = as_integer(params.require("max")?, "max")?;
    let (min, max) = bounds(params, min, max)?;
    let span = (i128::from(max) - i128::from(min) + 1) as u128;
    let offset = (u128::from(hasher.hash(None)) % span) as i128;
    Ok(Value::from((i128::from(min) + offset) as i64))
}

/// `1` when the uniform draw is at most `p`, else `0`.
pub fn bernoulli_trial(params: &Params, hasher: &SaltedHasher<'_>) -> Result<Value, AblError> {
    let p = probability(params)?;
    let hit = p > 0.0 && hasher.uniform(0.0, 1.0, None) <= p;
    Ok(Value::from(u8::from(hit)))
}

/// Keeps each choice whose own draw, salted with the choice itself, is at most `p`.
pub fn bernoulli_filter(params: &Params, hasher: &SaltedHasher<'_>) -> Result<Value, AblError> {
    let p = probability(params)?;
    let choices = sequence(params, "choices")?;
    let kept = choices
        .into_iter()
        .filter(|item| p > 0.0 && hasher.uniform(0.0, 1.0, Some(item)) <= p)
        .collect();
    Ok(Value::Array(kept))
}

/// `choices[hash mod len]`.
pub fn uniform_choice(params: &Params, hasher: &SaltedHasher<'_>) -> Result<Value, AblError> {
    let mut choices = non_empty_choices(params)?;
    let idx = (hasher.hash(None) % choices.len() as u64) as usize;
    Ok(choices.swap_remove(idx))
}

/// First choice whose cumulative weight reaches a uniform draw on `[0, total)`.
pub fn weighted_choice(params: &Params, hasher: &SaltedHasher<'_>) -> Result<Value, AblError> {
    let choices = non_empty_choices(params)?;
    let raw_weights = sequence(params, "weights")?;
    if raw_weights.len() != choices.len() {
        return Err(AblError::Operator(
            operator_error(
                params,
                "length-mismatch",
                "'choices' and 'weights' must have the same length".into(),
            )
            .with_context("choices", choices.len().to_string())
            .with_context("weights", raw_weights.len().to_string()),
        ));
    }

    let mut cumulative = Vec::with_capacity(raw_weights.len());
    let mut total = 0.0;
    for (idx, raw) in raw_weights.iter().enumerate() {
        let weight = raw.as_f64().ok_or_else(|| {
            AblError::Operator(
                operator_error(params, "invalid-weight", format!("weight {raw} is not a number"))
                    .with_context("index", idx.to_string()),
            )
        })?;
        if weight < 0.0 {
            return Err(AblError::Operator(
                operator_error(params, "negative-weight", format!("weight {weight} is negative"))
                    .with_context("index", idx.to_string()),
            ));
        }
        total += weight;
        cumulative.push(total);
    }
    if total <= 0.0 {
        return Err(AblError::Operator(operator_error(
            params,
            "zero-total-weight",
            "weights must sum to a positive total".into(),
        )));
    }

    let stop = hasher.uniform(0.0, total, None);
    let idx = cumulative
        .iter()
        .position(|&cum| stop <= cum)
        .unwrap_or(cumulative.len() - 1);
    Ok(choices[idx].clone())
}

/// Deterministic partial Fisher-Yates shuffle truncated to `draws` elements.
pub fn sample(params: &Params, hasher: &SaltedHasher<'_>) -> Result<Value, AblError> {
    let mut choices = non_empty_choices(params)?;
    let draws = match params.get("draws") {
        None => choices.len(),
        Some(raw) => {
            let invalid = || {
                AblError::Operator(
                    operator_error(
                        params,
                        "invalid-draws",
                        format!("'draws' must be a non-negative integer, not {raw}"),
                    )
                    .with_context("draws", hash_string(raw)),
                )
            };
            let draws = as_integer(raw, "draws").map_err(|_| invalid())?;
            usize::try_from(draws).map_err(|_| invalid())?
        }
    };
    if draws > choices.len() {
        return Err(AblError::Operator(
            operator_error(
                params,
                "draws-exceed-population",
                format!("cannot draw {draws} from {} choices", choices.len()),
            )
            .with_context("draws", draws.to_string())
            .with_context("choices", choices.len().to_string()),
        ));
    }

    for i in (1..choices.len()).rev() {
        let j = (hasher.hash(Some(&Value::from(i))) % (i as u64 + 1)) as usize;
        choices.swap(i, j);
    }
    choices.truncate(draws);
    Ok(Value::Array(choices))
}
