use abl_core::errors::AblError;
use abl_core::value::Inputs;
use serde_json::{Map, Value};

use crate::namespace::{Namespace, Resolution};
use crate::registry::ExperimentFactory;

/// One unit's view of a namespace.
///
/// The unit is resolved on first use and the resolution is memoized. Reads
/// go to the resolved experiment, so the first read of an allocated
/// experiment logs its exposure.
#[derive(Debug)]
pub struct NamespaceSession {
    namespace: Namespace,
    inputs: Inputs,
    resolved: Option<Resolution>,
    auto_exposure_log: bool,
}

impl NamespaceSession {
    /// Opens a session for `inputs` over its own copy of `namespace`.
    pub fn new(namespace: Namespace, inputs: Inputs) -> Self {
        Self {
            namespace,
            inputs,
            resolved: None,
            auto_exposure_log: true,
        }
    }

    /// The namespace the session resolves against.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Inputs describing the unit.
    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    fn resolution(&mut self) -> Result<&mut Resolution, AblError> {
        let resolution = match self.resolved.take() {
            Some(resolution) => resolution,
            None => {
                let mut resolution = self.namespace.resolve(&self.inputs)?;
                if !self.auto_exposure_log {
                    resolution.experiment_mut().set_auto_exposure_logging(false);
                }
                resolution
            }
        };
        Ok(self.resolved.insert(resolution))
    }

    /// Segment the unit hashed to.
    pub fn segment(&mut self) -> Result<u64, AblError> {
        Ok(self.resolution()?.segment())
    }

    /// Whether the unit landed in an allocated experiment.
    pub fn in_experiment(&mut self) -> Result<bool, AblError> {
        Ok(self.resolution()?.in_experiment())
    }

    /// Name of the serving experiment, e.g. `{namespace}-{experiment}` or `default`.
    pub fn experiment_name(&mut self) -> Result<String, AblError> {
        Ok(self.resolution()?.experiment().name().to_string())
    }

    /// Namespace-local name of the owning experiment, if any.
    pub fn owner(&mut self) -> Result<Option<String>, AblError> {
        Ok(self.resolution()?.owner().map(str::to_string))
    }

    /// Reads a parameter of the serving experiment.
    pub fn get(&mut self, name: &str) -> Result<Option<Value>, AblError> {
        self.resolution()?.experiment_mut().get(name)
    }

    /// Reads a parameter, falling back to `default`.
    pub fn get_or(&mut self, name: &str, default: Value) -> Result<Value, AblError> {
        self.resolution()?.experiment_mut().get_or(name, default)
    }

    /// Every parameter of the serving experiment.
    pub fn params(&mut self) -> Result<Map<String, Value>, AblError> {
        self.resolution()?.experiment_mut().params()
    }

    /// Enables or disables automatic exposure logging.
    pub fn set_auto_exposure_logging(&mut self, enabled: bool) {
        self.auto_exposure_log = enabled;
        if let Some(resolution) = self.resolved.as_mut() {
            resolution.experiment_mut().set_auto_exposure_logging(enabled);
        }
    }

    /// Logs an exposure on the serving experiment.
    pub fn log_exposure(&mut self, extras: Option<Value>) -> Result<(), AblError> {
        self.resolution()?.experiment_mut().log_exposure(extras)
    }

    /// Logs an arbitrary event on the serving experiment.
    pub fn log_event(&mut self, event_type: &str, extras: Option<Value>) -> Result<(), AblError> {
        self.resolution()?
            .experiment_mut()
            .log_event(event_type, extras)
    }

    /// Admits an experiment into the session's namespace.
    ///
    /// A unit sitting in a free segment is re-resolved on next use.
    pub fn add_experiment(
        &mut self,
        name: &str,
        factory: ExperimentFactory,
        segments: u64,
    ) -> bool {
        let changed = self.namespace.add_experiment(name, factory, segments);
        if changed && self.resolved.as_ref().is_some_and(|r| !r.in_experiment()) {
            self.resolved = None;
        }
        changed
    }

    /// Removes an experiment from the session's namespace.
    ///
    /// A unit resolved into that experiment is re-resolved on next use.
    pub fn remove_experiment(&mut self, name: &str) -> bool {
        let changed = self.namespace.remove_experiment(name);
        if changed && self.resolved.as_ref().and_then(Resolution::owner) == Some(name) {
            log::debug!("namespace {}: invalidating resolution into {name}", self.namespace.name());
            self.resolved = None;
        }
        changed
    }
}
