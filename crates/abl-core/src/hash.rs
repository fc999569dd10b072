//! Salted deterministic hashing.
//!
//! A draw is keyed by `experiment_salt.variable_salt.unit_1.unit_2...`. The
//! key is digested with SHA-1 and the first 15 hex digits (the top 60 bits)
//! are read as an unsigned integer. Nothing here keeps state, so the same key
//! always yields the same draw, across runs and across machines.

use serde_json::Value;
use sha1::{Digest, Sha1};

use crate::value::hash_string;

/// Normalisation constant mapping a 60-bit draw into `[0, 1]`.
pub const LONG_SCALE: f64 = 0xFFF_FFFF_FFFF_FFFF_u64 as f64;

/// Number of leading hex digits of the digest kept as the draw.
pub const HASH_HEX_DIGITS: usize = 15;

/// Builds the dot-joined hash key for a draw.
pub fn hash_key(
    experiment_salt: &str,
    variable_salt: &str,
    unit: &[Value],
    appended_unit: Option<&Value>,
) -> String {
    let mut key = String::with_capacity(experiment_salt.len() + variable_salt.len() + 16);
    key.push_str(experiment_salt);
    key.push('.');
    key.push_str(variable_salt);
    key.push('.');
    let parts = unit
        .iter()
        .chain(appended_unit)
        .map(hash_string)
        .collect::<Vec<_>>();
    key.push_str(&parts.join("."));
    key
}

/// Digests a hash key into a 60-bit unsigned draw.
pub fn digest_key(key: &str) -> u64 {
    let digest = Sha1::digest(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    // 15 hex digits are the top 60 of the first 64 bits.
    u64::from_be_bytes(head) >> 4
}

/// Hashing context for one random variable: both salts plus the unit parts.
#[derive(Debug, Clone, PartialEq)]
pub struct SaltedHasher<'a> {
    experiment_salt: &'a str,
    variable_salt: &'a str,
    unit: Vec<Value>,
}

impl<'a> SaltedHasher<'a> {
    /// Creates a hasher for the given salts and unit parts.
    pub fn new(experiment_salt: &'a str, variable_salt: &'a str, unit: Vec<Value>) -> Self {
        Self {
            experiment_salt,
            variable_salt,
            unit,
        }
    }

    /// Returns the unit parts the hasher was built with.
    pub fn unit(&self) -> &[Value] {
        &self.unit
    }

    /// Draws the 60-bit hash, optionally appending one extra unit part.
    pub fn hash(&self, appended_unit: Option<&Value>) -> u64 {
        digest_key(&hash_key(
            self.experiment_salt,
            self.variable_salt,
            &self.unit,
            appended_unit,
        ))
    }

    /// Maps the draw linearly onto `[min, max)`.
    pub fn uniform(&self, min: f64, max: f64, appended_unit: Option<&Value>) -> f64 {
        let zero_to_one = self.hash(appended_unit) as f64 / LONG_SCALE;
        min + zero_to_one * (max - min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_joins_salts_and_units_with_dots() {
        let key = hash_key("exp", "x", &[json!(42), json!("abc")], Some(&json!(3)));
        assert_eq!(key, "exp.x.42.abc.3");
        assert_eq!(hash_key("exp", "x", &[json!(7)], None), "exp.x.7");
    }

    #[test]
    fn digest_matches_hex_prefix() {
        let key = "exp.x.42";
        let hex = format!("{:x}", Sha1::digest(key.as_bytes()));
        let expected = u64::from_str_radix(&hex[..HASH_HEX_DIGITS], 16).unwrap();
        assert_eq!(digest_key(key), expected);
    }

    #[test]
    fn draws_stay_below_sixty_bits() {
        for unit in 0..200 {
            let hasher = SaltedHasher::new("exp", "v", vec![json!(unit)]);
            assert!(hasher.hash(None) < (1u64 << 60));
            let u = hasher.uniform(0.0, 1.0, None);
            assert!((0.0..=1.0).contains(&u));
        }
    }
}
