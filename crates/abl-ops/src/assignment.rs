use std::collections::BTreeMap;

use abl_core::errors::{AblError, ErrorInfo};
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::arg::Arg;
use crate::operator::SALT_ARG;

/// Named variable bindings sharing one experiment salt.
///
/// Random operators written through [`Assignment::set`] are salted with the
/// variable name (unless they carry an explicit salt) and evaluated on the
/// spot, so only resolved values are stored. Overridden names are never
/// recomputed: writing to them is a no-op.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    experiment_salt: String,
    overrides: BTreeMap<String, Value>,
    data: IndexMap<String, Value>,
}

impl Assignment {
    /// Creates an empty assignment for the given experiment salt.
    pub fn new(experiment_salt: impl Into<String>) -> Self {
        Self {
            experiment_salt: experiment_salt.into(),
            overrides: BTreeMap::new(),
            data: IndexMap::new(),
        }
    }

    /// Creates an assignment whose `overrides` take precedence over every write.
    pub fn with_overrides(
        experiment_salt: impl Into<String>,
        overrides: BTreeMap<String, Value>,
    ) -> Self {
        let mut assignment = Self::new(experiment_salt);
        assignment.set_overrides(overrides);
        assignment
    }

    /// Installs overrides. Their values become visible immediately.
    pub fn set_overrides(&mut self, overrides: BTreeMap<String, Value>) {
        for (name, value) in &overrides {
            self.data.insert(name.clone(), value.clone());
        }
        self.overrides = overrides;
    }

    /// Overrides currently in force.
    pub fn overrides(&self) -> &BTreeMap<String, Value> {
        &self.overrides
    }

    /// Salt shared by every variable of this assignment.
    pub fn experiment_salt(&self) -> &str {
        &self.experiment_salt
    }

    /// Binds `name` to `value`.
    ///
    /// Operators without a salt get `name` as their salt before they run.
    /// Errors from the operator are returned and leave the assignment
    /// unchanged.
    pub fn set(&mut self, name: &str, value: impl Into<Arg>) -> Result<(), AblError> {
        if self.overrides.contains_key(name) {
            log::trace!("'{name}' is overridden, skipping evaluation");
            return Ok(());
        }
        let resolved = match value.into() {
            Arg::Op(mut op) => {
                if !op.has_salt() {
                    op.set_arg(SALT_ARG, name);
                }
                op.execute(self)?
            }
            other => self.evaluate(&other)?,
        };
        self.data.insert(name.to_string(), resolved);
        Ok(())
    }

    /// Resolves an argument: literals as-is, lists element-wise and nested
    /// operators by executing them against this assignment.
    ///
    /// Nested operators have no variable name to borrow, so they must carry
    /// an explicit salt.
    pub fn evaluate(&self, arg: &Arg) -> Result<Value, AblError> {
        match arg {
            Arg::Literal(value) => Ok(value.clone()),
            Arg::List(items) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Arg::Op(op) => {
                if !op.has_salt() {
                    return Err(AblError::Assignment(
                        ErrorInfo::new(
                            "missing-salt",
                            format!("nested {} needs an explicit salt", op.kind()),
                        )
                        .with_context("operator", op.kind().name())
                        .with_hint("call .salt(..) on the nested operator"),
                    ));
                }
                op.execute(self)
            }
        }
    }

    /// Value bound to `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Whether `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    /// Unbinds `name`, returning the previous value. Overrides are kept.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.data.shift_remove(name)
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing is bound yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Bindings as a JSON object.
    pub fn to_map(&self) -> Map<String, Value> {
        self.data
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Bindings as a JSON value.
    pub fn to_json(&self) -> Value {
        Value::Object(self.to_map())
    }
}
