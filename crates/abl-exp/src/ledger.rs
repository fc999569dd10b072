//! "Already logged" checks. Persistence stays with the caller.

use abl_core::value::Inputs;

/// Answers whether an exposure for `(experiment, inputs)` was recorded before.
///
/// Queried once, when an experiment computes its assignment.
pub trait ExposureLedger: Send + Sync {
    /// Returns `true` when the exposure should not be logged again.
    fn already_logged(&self, experiment: &str, inputs: &Inputs) -> bool;
}

/// Every exposure is new.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverLogged;

impl ExposureLedger for NeverLogged {
    fn already_logged(&self, _experiment: &str, _inputs: &Inputs) -> bool {
        false
    }
}

/// Every exposure counts as recorded, so nothing is ever logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysLogged;

impl ExposureLedger for AlwaysLogged {
    fn already_logged(&self, _experiment: &str, _inputs: &Inputs) -> bool {
        true
    }
}

impl<F> ExposureLedger for F
where
    F: Fn(&str, &Inputs) -> bool + Send + Sync,
{
    fn already_logged(&self, experiment: &str, inputs: &Inputs) -> bool {
        self(experiment, inputs)
    }
}
