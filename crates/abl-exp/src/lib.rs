#![deny(missing_docs)]

//! Experiments: a design plus inputs, assigned lazily and logged on exposure.
//!
//! ```
//! use abl_core::errors::AblError;
//! use abl_core::value::Inputs;
//! use abl_exp::{Experiment, ExperimentDesign, SimpleExperiment};
//! use abl_ops::{Assignment, RandomOperator};
//! use serde_json::json;
//!
//! struct ButtonTest;
//!
//! impl ExperimentDesign for ButtonTest {
//!     fn assign(&self, params: &mut Assignment, inputs: &Inputs) -> Result<(), AblError> {
//!         let unit = inputs["userid"].clone();
//!         params.set("color", RandomOperator::uniform_choice(json!(["red", "blue"])).unit(unit))
//!     }
//! }
//!
//! let inputs = json!({"userid": 7}).as_object().cloned().unwrap();
//! let mut exp = SimpleExperiment::new(ButtonTest, inputs);
//! assert_eq!(exp.name(), "ButtonTest");
//! assert!(exp.get("color").unwrap().is_some());
//! assert!(exp.exposure_logged());
//! ```

mod experiment;
pub mod ledger;
pub mod logger;

pub use experiment::{
    DefaultDesign, DefaultExperiment, Experiment, ExperimentDesign, ExperimentSettings,
    SimpleExperiment, EXPOSURE_EVENT, IN_EXPERIMENT_PARAM,
};
pub use ledger::{AlwaysLogged, ExposureLedger, NeverLogged};
pub use logger::{
    parse_log_level, ExposureLogger, FacadeLogger, JsonLinesLogger, LogRecord, MemoryLogger,
    NullLogger, ALLOWED_LOG_LEVELS, EXPOSURE_TARGET,
};
