use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use abl_core::errors::AblError;
use abl_core::value::Inputs;
use abl_exp::{Experiment, ExperimentDesign, ExposureLogger, SimpleExperiment};

use crate::config::unknown_design;

/// Builds an experiment instance for one unit's inputs.
pub type ExperimentFactory = Arc<dyn Fn(&Inputs) -> Box<dyn Experiment> + Send + Sync>;

/// Named experiment factories, resolved when a namespace admits a slot.
#[derive(Clone, Default)]
pub struct ExperimentRegistry {
    factories: BTreeMap<String, ExperimentFactory>,
    logger: Option<Arc<dyn ExposureLogger>>,
}

impl ExperimentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Logger handed to experiments built by [`ExperimentRegistry::register_design`].
    pub fn with_logger(mut self, logger: Arc<dyn ExposureLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Registers a raw factory, replacing any previous one under `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: ExperimentFactory) -> &mut Self {
        self.factories.insert(name.into(), factory);
        self
    }

    /// Registers a design wrapped in a [`SimpleExperiment`].
    pub fn register_design<D>(&mut self, name: impl Into<String>, design: D) -> &mut Self
    where
        D: ExperimentDesign + Clone + 'static,
    {
        let logger = self.logger.clone();
        let factory: ExperimentFactory = Arc::new(move |inputs: &Inputs| {
            let experiment = SimpleExperiment::new(design.clone(), inputs.clone());
            let experiment = match &logger {
                Some(logger) => experiment.with_logger(Arc::clone(logger)),
                None => experiment,
            };
            Box::new(experiment) as Box<dyn Experiment>
        });
        self.register(name, factory)
    }

    /// Looks up a factory, failing with `unknown-design`.
    pub fn factory(&self, name: &str) -> Result<ExperimentFactory, AblError> {
        self.factories
            .get(name)
            .cloned()
            .ok_or_else(|| unknown_design(name))
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ExperimentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentRegistry")
            .field("designs", &self.factories.keys().collect::<Vec<_>>())
            .field("logger", &self.logger.is_some())
            .finish()
    }
}
