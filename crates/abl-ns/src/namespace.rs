//! Segment allocation and unit resolution.
//!
//! A namespace splits `[0, num_segments)` between experiments. Each
//! experiment receives a pseudo-random, name-determined subset of the free
//! segments; each unit hashes to exactly one segment and is served by its
//! owner, or by the default experiment when the segment is free.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use abl_core::errors::{AblError, ErrorInfo};
use abl_core::value::Inputs;
use abl_exp::{DefaultExperiment, Experiment};
use abl_ops::{Assignment, RandomOperator};
use serde_json::{Map, Value};

use crate::config::{NamespaceConfig, PrimaryUnit};
use crate::registry::{ExperimentFactory, ExperimentRegistry};

const SAMPLED_SEGMENTS: &str = "sampled_segments";
const SEGMENT: &str = "segment";

/// Where a unit landed.
pub struct Resolution {
    segment: u64,
    owner: Option<String>,
    experiment: Box<dyn Experiment>,
}

impl Resolution {
    /// Segment the unit hashed to.
    pub fn segment(&self) -> u64 {
        self.segment
    }

    /// Namespace-local name of the owning experiment, if the segment is allocated.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Whether the unit is served by an allocated experiment.
    pub fn in_experiment(&self) -> bool {
        self.owner.is_some()
    }

    /// The experiment serving the unit.
    pub fn experiment(&self) -> &dyn Experiment {
        self.experiment.as_ref()
    }

    /// Mutable access to the experiment serving the unit.
    pub fn experiment_mut(&mut self) -> &mut dyn Experiment {
        self.experiment.as_mut()
    }

    /// Takes ownership of the experiment.
    pub fn into_experiment(self) -> Box<dyn Experiment> {
        self.experiment
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("segment", &self.segment)
            .field("owner", &self.owner)
            .field("experiment", &self.experiment.name())
            .finish()
    }
}

/// Segment allocator multiplexing experiments over a fixed bucket space.
///
/// `available` and the keys of `allocations` always partition
/// `0..num_segments`. Admission and removal are safe no-ops on bad input:
/// they return `false` and log a warning instead of failing.
#[derive(Clone)]
pub struct Namespace {
    name: String,
    salt: String,
    primary_unit: PrimaryUnit,
    num_segments: u64,
    available: BTreeSet<u64>,
    allocations: BTreeMap<u64, String>,
    experiments: BTreeMap<String, ExperimentFactory>,
    default_params: Map<String, Value>,
    default_factory: Option<ExperimentFactory>,
}

impl Namespace {
    /// Empty namespace with every segment available.
    pub fn new(config: &NamespaceConfig) -> Result<Self, AblError> {
        config.validate()?;
        Ok(Self {
            name: config.name.clone(),
            salt: config.salt().to_string(),
            primary_unit: config.primary_unit.clone(),
            num_segments: config.num_segments,
            available: (0..config.num_segments).collect(),
            allocations: BTreeMap::new(),
            experiments: BTreeMap::new(),
            default_params: config.default_params.clone(),
            default_factory: None,
        })
    }

    /// Builds the namespace and admits the configured experiments in order.
    ///
    /// Every design must be registered; slots the allocator rejects are
    /// skipped with a warning.
    pub fn from_config(
        config: &NamespaceConfig,
        registry: &ExperimentRegistry,
    ) -> Result<Self, AblError> {
        let factories = config
            .experiments
            .iter()
            .map(|slot| registry.factory(&slot.design))
            .collect::<Result<Vec<_>, _>>()?;
        let mut namespace = Self::new(config)?;
        for (slot, factory) in config.experiments.iter().zip(factories) {
            namespace.add_experiment(&slot.name, factory, slot.segments);
        }
        Ok(namespace)
    }

    /// Replaces the fallback experiment served from free segments.
    pub fn with_default_factory(mut self, factory: ExperimentFactory) -> Self {
        self.default_factory = Some(factory);
        self
    }

    /// Namespace name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace salt.
    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// Input key(s) used for placement.
    pub fn primary_unit(&self) -> &PrimaryUnit {
        &self.primary_unit
    }

    /// Size of the segment space.
    pub fn num_segments(&self) -> u64 {
        self.num_segments
    }

    /// Parameters served by the built-in default experiment.
    pub fn default_params(&self) -> &Map<String, Value> {
        &self.default_params
    }

    /// Segments not owned by any experiment.
    pub fn available_segments(&self) -> &BTreeSet<u64> {
        &self.available
    }

    /// Owned segments and their experiment.
    pub fn segment_allocations(&self) -> &BTreeMap<u64, String> {
        &self.allocations
    }

    /// Segments owned by `name`, ascending.
    pub fn segments_of(&self, name: &str) -> Vec<u64> {
        self.allocations
            .iter()
            .filter(|(_, owner)| owner.as_str() == name)
            .map(|(&segment, _)| segment)
            .collect()
    }

    /// Admitted experiment names, sorted.
    pub fn experiment_names(&self) -> impl Iterator<Item = &str> {
        self.experiments.keys().map(String::as_str)
    }

    /// Whether `name` is admitted.
    pub fn contains_experiment(&self, name: &str) -> bool {
        self.experiments.contains_key(name)
    }

    /// Grants `segments` free segments to a new experiment.
    ///
    /// Which segments are granted depends only on the namespace salt, the
    /// experiment name and the current free set. Returns `false` without
    /// changing anything when `name` is taken, `segments` is zero, or fewer
    /// than `segments` segments are free.
    pub fn add_experiment(
        &mut self,
        name: &str,
        factory: ExperimentFactory,
        segments: u64,
    ) -> bool {
        if self.experiments.contains_key(name) {
            log::warn!("namespace {}: experiment {name} already exists", self.name);
            return false;
        }
        if segments == 0 {
            log::warn!("namespace {}: experiment {name} requested no segments", self.name);
            return false;
        }
        if segments > self.available.len() as u64 {
            log::warn!(
                "namespace {}: experiment {name} requested {segments} segments, {} available",
                self.name,
                self.available.len()
            );
            return false;
        }

        let granted = match self.sample_segments(name, segments) {
            Ok(granted) => granted,
            Err(err) => {
                log::error!("namespace {}: sampling segments for {name} failed: {err}", self.name);
                return false;
            }
        };
        for &segment in &granted {
            self.available.remove(&segment);
            self.allocations.insert(segment, name.to_string());
        }
        self.experiments.insert(name.to_string(), factory);
        log::info!(
            "namespace {}: admitted {name} with {segments} segments, {} left",
            self.name,
            self.available.len()
        );
        true
    }

    fn sample_segments(&self, name: &str, segments: u64) -> Result<Vec<u64>, AblError> {
        let choices: Vec<Value> = self.available.iter().map(|&s| Value::from(s)).collect();
        let mut params = Assignment::new(self.salt.clone());
        params.set(
            SAMPLED_SEGMENTS,
            RandomOperator::sample(Value::Array(choices))
                .draws(segments)
                .unit(name),
        )?;
        let drawn = params.get(SAMPLED_SEGMENTS).and_then(Value::as_array);
        drawn
            .map(|values| values.iter().filter_map(Value::as_u64).collect::<Vec<_>>())
            .filter(|granted| granted.len() as u64 == segments)
            .ok_or_else(|| {
                AblError::Namespace(
                    ErrorInfo::new("segment-sample", "sample did not yield the requested segments")
                        .with_context("experiment", name),
                )
            })
    }

    /// Frees every segment owned by `name`. Returns `false` if it was not admitted.
    pub fn remove_experiment(&mut self, name: &str) -> bool {
        if self.experiments.remove(name).is_none() {
            log::warn!("namespace {}: no experiment {name} to remove", self.name);
            return false;
        }
        let freed = self.segments_of(name);
        for segment in &freed {
            self.allocations.remove(segment);
            self.available.insert(*segment);
        }
        log::info!(
            "namespace {}: removed {name}, reclaimed {} segments",
            self.name,
            freed.len()
        );
        true
    }

    fn unit_of(&self, inputs: &Inputs) -> Result<Value, AblError> {
        let keys = self.primary_unit.keys();
        let mut values = Vec::with_capacity(keys.len());
        for key in &keys {
            let value = inputs.get(*key).ok_or_else(|| {
                AblError::Namespace(
                    ErrorInfo::new(
                        "missing-primary-unit",
                        format!("namespace {} needs input '{key}'", self.name),
                    )
                    .with_context("namespace", self.name.clone())
                    .with_context("input", *key),
                )
            })?;
            values.push(value.clone());
        }
        if let (PrimaryUnit::One(_), [value]) = (&self.primary_unit, values.as_slice()) {
            return Ok(value.clone());
        }
        Ok(Value::Array(values))
    }

    /// Segment the unit described by `inputs` hashes to.
    pub fn get_segment(&self, inputs: &Inputs) -> Result<u64, AblError> {
        let unit = self.unit_of(inputs)?;
        let max = self.num_segments.saturating_sub(1);
        let mut params = Assignment::new(self.salt.clone());
        params.set(SEGMENT, RandomOperator::random_integer(0u64, max).unit(unit))?;
        params.get(SEGMENT).and_then(Value::as_u64).ok_or_else(|| {
            AblError::Namespace(ErrorInfo::new("segment-draw", "segment draw was not an integer"))
        })
    }

    /// Resolves the unit to its segment and the experiment serving it.
    ///
    /// Allocated experiments are renamed `{namespace}-{experiment}` and salted
    /// `{namespace}.{experiment}`, so one design reused across namespaces
    /// draws independently in each. Free segments get the default experiment,
    /// flagged as not in experiment.
    pub fn resolve(&self, inputs: &Inputs) -> Result<Resolution, AblError> {
        let segment = self.get_segment(inputs)?;
        let owner = self.allocations.get(&segment);
        let factory = owner.and_then(|name| self.experiments.get(name));

        let experiment = match (owner, factory) {
            (Some(name), Some(factory)) => {
                let mut experiment = factory(inputs);
                experiment.set_name(&format!("{}-{}", self.name, name));
                experiment.set_salt(&format!("{}.{}", self.name, name));
                log::debug!("namespace {}: segment {segment} -> {name}", self.name);
                experiment
            }
            _ => {
                let mut experiment = match &self.default_factory {
                    Some(factory) => factory(inputs),
                    None => Box::new(DefaultExperiment::defaults(
                        inputs.clone(),
                        self.default_params.clone(),
                    )) as Box<dyn Experiment>,
                };
                experiment.set_in_experiment(false);
                log::debug!("namespace {}: segment {segment} is free", self.name);
                experiment
            }
        };
        Ok(Resolution {
            segment,
            owner: owner.filter(|_| factory.is_some()).cloned(),
            experiment,
        })
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("salt", &self.salt)
            .field("primary_unit", &self.primary_unit)
            .field("num_segments", &self.num_segments)
            .field("available", &self.available.len())
            .field("experiments", &self.experiments.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Wraps a closure as an [`ExperimentFactory`].
pub fn experiment_factory<F>(build: F) -> ExperimentFactory
where
    F: Fn(&Inputs) -> Box<dyn Experiment> + Send + Sync + 'static,
{
    Arc::new(build)
}
