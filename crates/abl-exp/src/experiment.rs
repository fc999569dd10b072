use std::collections::BTreeMap;
use std::sync::Arc;

use abl_core::errors::AblError;
use abl_core::value::Inputs;
use abl_ops::Assignment;
use log::Level;
use serde_json::{Map, Value};

use crate::ledger::{AlwaysLogged, ExposureLedger, NeverLogged};
use crate::logger::{ExposureLogger, FacadeLogger, NullLogger};

/// Event type recorded by [`Experiment::log_exposure`].
pub const EXPOSURE_EVENT: &str = "exposure";

/// Parameter that, when assigned a boolean, decides whether a unit is in
/// the experiment.
pub const IN_EXPERIMENT_PARAM: &str = "in_experiment";

/// Contract between experiments and whoever hosts them (e.g. a namespace).
pub trait Experiment: Send {
    /// Current experiment name.
    fn name(&self) -> &str;

    /// Renames the experiment. Whitespace runs collapse to `-`.
    fn set_name(&mut self, name: &str);

    /// Experiment-level salt; defaults to the name.
    fn salt(&self) -> &str;

    /// Replaces the experiment-level salt.
    fn set_salt(&mut self, salt: &str);

    /// Whether the unit takes part in the experiment.
    fn in_experiment(&self) -> bool;

    /// Forces the in-experiment flag.
    fn set_in_experiment(&mut self, value: bool);

    /// Whether an exposure was already logged for this instance.
    fn exposure_logged(&self) -> bool;

    /// Enables or disables exposure logging on first read.
    fn set_auto_exposure_logging(&mut self, enabled: bool);

    /// Reads a parameter. Triggers the exposure log.
    fn get(&mut self, name: &str) -> Result<Option<Value>, AblError>;

    /// Reads a parameter, falling back to `default`. Triggers the exposure log.
    fn get_or(&mut self, name: &str, default: Value) -> Result<Value, AblError> {
        Ok(self.get(name)?.unwrap_or(default))
    }

    /// All parameters. Triggers the exposure log.
    fn params(&mut self) -> Result<Map<String, Value>, AblError>;

    /// Logs an exposure event, with optional extra data.
    fn log_exposure(&mut self, extras: Option<Value>) -> Result<(), AblError>;

    /// Logs an arbitrary event, with optional extra data.
    fn log_event(&mut self, event_type: &str, extras: Option<Value>) -> Result<(), AblError>;
}

/// Knobs a design may adjust before the first assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentSettings {
    /// Experiment name.
    pub name: String,
    /// Explicit salt; the name is used when unset.
    pub salt: Option<String>,
    /// Level exposures are logged at.
    pub log_level: Level,
}

/// User-supplied experiment logic.
pub trait ExperimentDesign: Send + Sync {
    /// Adjusts name, salt or log level. The default keeps them.
    fn setup(&self, _settings: &mut ExperimentSettings) {}

    /// Binds the experiment parameters for `inputs`.
    fn assign(&self, params: &mut Assignment, inputs: &Inputs) -> Result<(), AblError>;
}

fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Experiment wrapper driving a design.
///
/// The assignment is computed lazily on the first read, using whatever name
/// and salt are current at that point, so a host can rename and re-salt the
/// experiment right after construction. Reads log one exposure per instance
/// unless auto logging is off, the unit is outside the experiment, or the
/// ledger reports the exposure as already recorded.
pub struct SimpleExperiment<D> {
    design: D,
    inputs: Inputs,
    name: String,
    salt: Option<String>,
    log_level: Level,
    logger: Arc<dyn ExposureLogger>,
    ledger: Arc<dyn ExposureLedger>,
    overrides: BTreeMap<String, Value>,
    assignment: Option<Assignment>,
    in_experiment: bool,
    exposure_logged: bool,
    auto_exposure_log: bool,
}

impl<D: ExperimentDesign> SimpleExperiment<D> {
    /// Wraps `design` for `inputs`, logging through the `log` facade.
    pub fn new(design: D, inputs: Inputs) -> Self {
        let mut settings = ExperimentSettings {
            name: short_type_name::<D>(),
            salt: None,
            log_level: Level::Info,
        };
        design.setup(&mut settings);
        Self {
            design,
            inputs,
            name: normalize_name(&settings.name),
            salt: settings.salt,
            log_level: settings.log_level,
            logger: Arc::new(FacadeLogger),
            ledger: Arc::new(NeverLogged),
            overrides: BTreeMap::new(),
            assignment: None,
            in_experiment: true,
            exposure_logged: false,
            auto_exposure_log: true,
        }
    }

    /// Replaces the exposure logger.
    pub fn with_logger(mut self, logger: Arc<dyn ExposureLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Replaces the dedup ledger.
    pub fn with_ledger(mut self, ledger: Arc<dyn ExposureLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Pins parameters to fixed values, bypassing the design for them.
    pub fn with_overrides(mut self, overrides: BTreeMap<String, Value>) -> Self {
        self.overrides = overrides;
        self.assignment = None;
        self
    }

    /// The wrapped design.
    pub fn design(&self) -> &D {
        &self.design
    }

    /// Inputs the experiment was built for.
    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    /// Level exposures are logged at.
    pub fn log_level(&self) -> Level {
        self.log_level
    }

    /// Full exposure record as JSON. Triggers the exposure log.
    pub fn to_json(&mut self) -> Result<Value, AblError> {
        self.ensure_assigned()?;
        self.requires_exposure_logging()?;
        Ok(Value::Object(self.as_blob(Map::new())))
    }

    fn ensure_assigned(&mut self) -> Result<(), AblError> {
        if self.assignment.is_some() {
            return Ok(());
        }
        let mut params =
            Assignment::with_overrides(self.salt().to_string(), self.overrides.clone());
        self.design.assign(&mut params, &self.inputs)?;
        if let Some(flag) = params.get(IN_EXPERIMENT_PARAM).and_then(Value::as_bool) {
            self.in_experiment = flag;
        }
        // a reassignment must not forget an exposure this instance already logged
        self.exposure_logged |= self.ledger.already_logged(&self.name, &self.inputs);
        log::debug!(
            "experiment {} assigned {} params (in_experiment={})",
            self.name,
            params.len(),
            self.in_experiment
        );
        self.assignment = Some(params);
        Ok(())
    }

    fn requires_exposure_logging(&mut self) -> Result<(), AblError> {
        if self.auto_exposure_log && self.in_experiment && !self.exposure_logged {
            self.log_exposure(None)?;
        }
        Ok(())
    }

    fn param_map(&self) -> Map<String, Value> {
        self.assignment
            .as_ref()
            .map(Assignment::to_map)
            .unwrap_or_default()
    }

    fn as_blob(&self, extras: Map<String, Value>) -> Map<String, Value> {
        let mut blob = Map::new();
        blob.insert("name".into(), Value::from(self.name.clone()));
        blob.insert("time".into(), Value::from(chrono::Utc::now().timestamp()));
        blob.insert("salt".into(), Value::from(self.salt().to_string()));
        blob.insert("inputs".into(), Value::Object(self.inputs.clone()));
        blob.insert("params".into(), Value::Object(self.param_map()));
        blob.extend(extras);
        blob
    }
}

impl SimpleExperiment<DefaultDesign> {
    /// Fallback experiment that binds fixed parameters and never logs.
    pub fn defaults(inputs: Inputs, params: Map<String, Value>) -> Self {
        SimpleExperiment::new(DefaultDesign::new(params), inputs)
            .with_logger(Arc::new(NullLogger))
            .with_ledger(Arc::new(AlwaysLogged))
    }
}

impl<D: ExperimentDesign> Experiment for SimpleExperiment<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: &str) {
        self.name = normalize_name(name);
        if self.salt.is_none() {
            // the name doubles as the salt
            self.assignment = None;
        }
    }

    fn salt(&self) -> &str {
        self.salt.as_deref().unwrap_or(&self.name)
    }

    fn set_salt(&mut self, salt: &str) {
        self.salt = Some(salt.to_string());
        // a cached assignment was hashed under the old salt
        self.assignment = None;
    }

    fn in_experiment(&self) -> bool {
        self.in_experiment
    }

    fn set_in_experiment(&mut self, value: bool) {
        self.in_experiment = value;
    }

    fn exposure_logged(&self) -> bool {
        self.exposure_logged
    }

    fn set_auto_exposure_logging(&mut self, enabled: bool) {
        self.auto_exposure_log = enabled;
    }

    fn get(&mut self, name: &str) -> Result<Option<Value>, AblError> {
        self.ensure_assigned()?;
        self.requires_exposure_logging()?;
        Ok(self
            .assignment
            .as_ref()
            .and_then(|params| params.get(name))
            .cloned())
    }

    fn params(&mut self) -> Result<Map<String, Value>, AblError> {
        self.ensure_assigned()?;
        self.requires_exposure_logging()?;
        Ok(self.param_map())
    }

    fn log_exposure(&mut self, extras: Option<Value>) -> Result<(), AblError> {
        self.ensure_assigned()?;
        self.exposure_logged = true;
        self.log_event(EXPOSURE_EVENT, extras)
    }

    fn log_event(&mut self, event_type: &str, extras: Option<Value>) -> Result<(), AblError> {
        self.ensure_assigned()?;
        let mut payload = Map::new();
        payload.insert("event".into(), Value::from(event_type));
        if let Some(extras) = extras {
            payload.insert("extra_data".into(), extras);
        }
        let blob = Value::Object(self.as_blob(payload));
        let message = format!("{} with event type: {}", self.name, event_type);
        self.logger.log(self.log_level, &message, &blob)
    }
}

/// Design binding a fixed parameter map, used for units outside every
/// experiment of a namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultDesign {
    params: Map<String, Value>,
}

impl DefaultDesign {
    /// Creates a design binding `params`.
    pub fn new(params: Map<String, Value>) -> Self {
        Self { params }
    }
}

impl ExperimentDesign for DefaultDesign {
    fn setup(&self, settings: &mut ExperimentSettings) {
        settings.name = "default".to_string();
    }

    fn assign(&self, params: &mut Assignment, _inputs: &Inputs) -> Result<(), AblError> {
        for (name, value) in &self.params {
            params.set(name, value.clone())?;
        }
        Ok(())
    }
}

/// Fallback experiment of a namespace.
pub type DefaultExperiment = SimpleExperiment<DefaultDesign>;
