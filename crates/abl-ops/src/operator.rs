use std::collections::BTreeMap;
use std::fmt;

use abl_core::errors::{AblError, ErrorInfo};
use abl_core::hash::SaltedHasher;
use abl_core::value::{hash_string, unit_parts};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::arg::Arg;
use crate::assignment::Assignment;
use crate::random;

/// Reserved argument naming the hashing subject.
pub const UNIT_ARG: &str = "unit";
/// Reserved argument naming the variable salt.
pub const SALT_ARG: &str = "salt";

/// Declares one argument accepted by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    /// Argument name.
    pub name: &'static str,
    /// Whether execution fails when the argument is absent.
    pub required: bool,
    /// Human readable description.
    pub description: &'static str,
}

const fn required(name: &'static str, description: &'static str) -> OptionSpec {
    OptionSpec {
        name,
        required: true,
        description,
    }
}

const fn optional(name: &'static str, description: &'static str) -> OptionSpec {
    OptionSpec {
        name,
        required: false,
        description,
    }
}

const UNIT: OptionSpec = required(UNIT_ARG, "unit of randomization, a value or array of values");
const SALT: OptionSpec = optional(
    SALT_ARG,
    "salt for the hash, defaults to the name of the assigned variable",
);

const RANDOM_FLOAT: &[OptionSpec] = &[
    UNIT,
    SALT,
    required("min", "min (float) value drawn"),
    required("max", "max (float) value drawn"),
];
const RANDOM_INTEGER: &[OptionSpec] = &[
    UNIT,
    SALT,
    required("min", "min (int) value drawn"),
    required("max", "max (int) value drawn"),
];
const BERNOULLI_TRIAL: &[OptionSpec] = &[UNIT, SALT, required("p", "probability of drawing 1")];
const BERNOULLI_FILTER: &[OptionSpec] = &[
    UNIT,
    SALT,
    required("p", "probability of retaining element"),
    required("choices", "array of elements being filtered"),
];
const UNIFORM_CHOICE: &[OptionSpec] = &[
    UNIT,
    SALT,
    required("choices", "array of elements to draw from"),
];
const WEIGHTED_CHOICE: &[OptionSpec] = &[
    UNIT,
    SALT,
    required("choices", "array of elements to draw from"),
    required("weights", "array of weights, positionally matching choices"),
];
const SAMPLE: &[OptionSpec] = &[
    UNIT,
    SALT,
    required("choices", "array of choices to sample"),
    optional("draws", "number of samples to draw, defaults to all choices"),
];

/// The family of random operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RandomKind {
    /// Uniform float in `[min, max)`.
    RandomFloat,
    /// Uniform integer in `[min, max]`.
    RandomInteger,
    /// `1` with probability `p`, else `0`.
    BernoulliTrial,
    /// Keeps each choice independently with probability `p`.
    BernoulliFilter,
    /// One choice, uniformly.
    UniformChoice,
    /// One choice, proportionally to its weight.
    WeightedChoice,
    /// `draws` choices without replacement.
    Sample,
}

impl RandomKind {
    /// Stable operator name.
    pub fn name(&self) -> &'static str {
        match self {
            RandomKind::RandomFloat => "RandomFloat",
            RandomKind::RandomInteger => "RandomInteger",
            RandomKind::BernoulliTrial => "BernoulliTrial",
            RandomKind::BernoulliFilter => "BernoulliFilter",
            RandomKind::UniformChoice => "UniformChoice",
            RandomKind::WeightedChoice => "WeightedChoice",
            RandomKind::Sample => "Sample",
        }
    }

    /// Arguments accepted by the operator.
    pub fn options(&self) -> &'static [OptionSpec] {
        match self {
            RandomKind::RandomFloat => RANDOM_FLOAT,
            RandomKind::RandomInteger => RANDOM_INTEGER,
            RandomKind::BernoulliTrial => BERNOULLI_TRIAL,
            RandomKind::BernoulliFilter => BERNOULLI_FILTER,
            RandomKind::UniformChoice => UNIFORM_CHOICE,
            RandomKind::WeightedChoice => WEIGHTED_CHOICE,
            RandomKind::Sample => SAMPLE,
        }
    }
}

impl fmt::Display for RandomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fully evaluated arguments handed to an operator algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    kind: RandomKind,
    values: BTreeMap<String, Value>,
}

impl Params {
    pub(crate) fn new(kind: RandomKind, values: BTreeMap<String, Value>) -> Self {
        Self { kind, values }
    }

    /// Operator the parameters belong to.
    pub fn kind(&self) -> RandomKind {
        self.kind
    }

    /// Looks up an optional parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Looks up a parameter that `options()` declares as required.
    pub fn require(&self, name: &str) -> Result<&Value, AblError> {
        self.values
            .get(name)
            .ok_or_else(|| missing_argument(self.kind, name))
    }
}

pub(crate) fn missing_argument(kind: RandomKind, name: &str) -> AblError {
    let code = match name {
        UNIT_ARG => "missing-unit",
        SALT_ARG => "missing-salt",
        _ => "missing-argument",
    };
    AblError::Operator(
        ErrorInfo::new(code, format!("{kind}: input '{name}' required"))
            .with_context("operator", kind.name())
            .with_context("argument", name),
    )
}

/// A random operator: a kind plus its unevaluated arguments.
///
/// The operator is inert until [`RandomOperator::execute`] resolves its
/// arguments against an [`Assignment`] and hashes
/// `experiment_salt.salt.unit` to pick an outcome. Identical resolved
/// arguments under the same experiment salt always give the same outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomOperator {
    kind: RandomKind,
    args: BTreeMap<String, Arg>,
}

impl RandomOperator {
    /// Creates an operator with no arguments.
    pub fn new(kind: RandomKind) -> Self {
        Self {
            kind,
            args: BTreeMap::new(),
        }
    }

    /// `RandomFloat(min, max)`.
    pub fn random_float(min: impl Into<Arg>, max: impl Into<Arg>) -> Self {
        Self::new(RandomKind::RandomFloat)
            .arg("min", min)
            .arg("max", max)
    }

    /// `RandomInteger(min, max)`.
    pub fn random_integer(min: impl Into<Arg>, max: impl Into<Arg>) -> Self {
        Self::new(RandomKind::RandomInteger)
            .arg("min", min)
            .arg("max", max)
    }

    /// `BernoulliTrial(p)`.
    pub fn bernoulli_trial(p: impl Into<Arg>) -> Self {
        Self::new(RandomKind::BernoulliTrial).arg("p", p)
    }

    /// `BernoulliFilter(p, choices)`.
    pub fn bernoulli_filter(p: impl Into<Arg>, choices: impl Into<Arg>) -> Self {
        Self::new(RandomKind::BernoulliFilter)
            .arg("p", p)
            .arg("choices", choices)
    }

    /// `UniformChoice(choices)`.
    pub fn uniform_choice(choices: impl Into<Arg>) -> Self {
        Self::new(RandomKind::UniformChoice).arg("choices", choices)
    }

    /// `WeightedChoice(choices, weights)`.
    pub fn weighted_choice(choices: impl Into<Arg>, weights: impl Into<Arg>) -> Self {
        Self::new(RandomKind::WeightedChoice)
            .arg("choices", choices)
            .arg("weights", weights)
    }

    /// `Sample(choices)`; chain [`RandomOperator::draws`] to limit the size.
    pub fn sample(choices: impl Into<Arg>) -> Self {
        Self::new(RandomKind::Sample).arg("choices", choices)
    }

    /// Sets an arbitrary argument.
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.set_arg(name, value);
        self
    }

    /// Sets the hashing unit.
    pub fn unit(self, unit: impl Into<Arg>) -> Self {
        self.arg(UNIT_ARG, unit)
    }

    /// Sets an explicit variable salt.
    pub fn salt(self, salt: impl Into<String>) -> Self {
        self.arg(SALT_ARG, salt.into())
    }

    /// Sets the number of draws of a `Sample`.
    pub fn draws(self, draws: impl Into<Arg>) -> Self {
        self.arg("draws", draws)
    }

    /// Sets an argument in place.
    pub fn set_arg(&mut self, name: impl Into<String>, value: impl Into<Arg>) {
        self.args.insert(name.into(), value.into());
    }

    /// Operator kind.
    pub fn kind(&self) -> RandomKind {
        self.kind
    }

    /// Unevaluated arguments.
    pub fn args(&self) -> &BTreeMap<String, Arg> {
        &self.args
    }

    /// Whether an explicit salt was provided.
    pub fn has_salt(&self) -> bool {
        self.args.contains_key(SALT_ARG)
    }

    /// Arguments accepted by this operator.
    pub fn options(&self) -> &'static [OptionSpec] {
        self.kind.options()
    }

    /// Description of an argument, falling back to its name.
    pub fn option_description<'a>(&self, name: &'a str) -> &'a str {
        self.options()
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.description)
            .unwrap_or(name)
    }

    /// Whether an argument is required. Unknown arguments count as required.
    pub fn option_required(&self, name: &str) -> bool {
        self.options()
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.required)
            .unwrap_or(true)
    }

    /// Resolves every argument through `assignment` and runs the operator.
    pub fn execute(&self, assignment: &Assignment) -> Result<Value, AblError> {
        for spec in self.options().iter().filter(|spec| spec.required) {
            if !self.args.contains_key(spec.name) {
                return Err(missing_argument(self.kind, spec.name));
            }
        }
        if !self.has_salt() {
            return Err(missing_argument(self.kind, SALT_ARG));
        }

        let mut values = BTreeMap::new();
        for (name, arg) in &self.args {
            values.insert(name.clone(), assignment.evaluate(arg)?);
        }
        let params = Params::new(self.kind, values);

        let salt = hash_string(params.require(SALT_ARG)?);
        let unit = unit_parts(params.require(UNIT_ARG)?);
        let hasher = SaltedHasher::new(assignment.experiment_salt(), &salt, unit);

        match self.kind {
            RandomKind::RandomFloat => random::random_float(&params, &hasher),
            RandomKind::RandomInteger => random::random_integer(&params, &hasher),
            RandomKind::BernoulliTrial => random::bernoulli_trial(&params, &hasher),
            RandomKind::BernoulliFilter => random::bernoulli_filter(&params, &hasher),
            RandomKind::UniformChoice => random::uniform_choice(&params, &hasher),
            RandomKind::WeightedChoice => random::weighted_choice(&params, &hasher),
            RandomKind::Sample => random::sample(&params, &hasher),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_describe_arguments() {
        let op = RandomOperator::bernoulli_trial(0.5);
        assert_eq!(op.option_description("p"), "probability of drawing 1");
        assert_eq!(op.option_description("bogus"), "bogus");
        assert!(op.option_required("p"));
        assert!(!op.option_required(SALT_ARG));
        assert!(op.option_required("bogus"));
        assert!(!RandomOperator::sample(vec![Arg::from(1)]).option_required("draws"));
    }

    #[test]
    fn builder_records_salt_and_unit() {
        let op = RandomOperator::uniform_choice(Arg::literal(vec![1, 2]))
            .unit(7)
            .salt("color");
        assert!(op.has_salt());
        assert_eq!(op.args().get(UNIT_ARG), Some(&Arg::from(7)));
        assert_eq!(op.kind().to_string(), "UniformChoice");
    }
}
