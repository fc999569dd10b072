use std::sync::Arc;

use abl_core::errors::AblError;
use abl_core::value::Inputs;
use parking_lot::RwLock;

use crate::namespace::{Namespace, Resolution};
use crate::registry::ExperimentFactory;
use crate::session::NamespaceSession;

/// Namespace handle shared between request handlers.
///
/// Resolution takes the read lock, so any number of units resolve
/// concurrently. Admission and removal take the write lock.
#[derive(Debug, Clone)]
pub struct SharedNamespace {
    inner: Arc<RwLock<Namespace>>,
}

impl SharedNamespace {
    /// Wraps a namespace.
    pub fn new(namespace: Namespace) -> Self {
        Self {
            inner: Arc::new(RwLock::new(namespace)),
        }
    }

    /// Resolves a unit against the current allocation.
    pub fn resolve(&self, inputs: &Inputs) -> Result<Resolution, AblError> {
        self.inner.read().resolve(inputs)
    }

    /// Segment the unit hashed to.
    pub fn get_segment(&self, inputs: &Inputs) -> Result<u64, AblError> {
        self.inner.read().get_segment(inputs)
    }

    /// Opens a session over a snapshot of the current allocation.
    pub fn session(&self, inputs: Inputs) -> NamespaceSession {
        NamespaceSession::new(self.snapshot(), inputs)
    }

    /// Copy of the current namespace state.
    pub fn snapshot(&self) -> Namespace {
        self.inner.read().clone()
    }

    /// Runs `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&Namespace) -> R) -> R {
        f(&self.inner.read())
    }

    /// Admits an experiment; see [`Namespace::add_experiment`].
    pub fn add_experiment(&self, name: &str, factory: ExperimentFactory, segments: u64) -> bool {
        self.inner.write().add_experiment(name, factory, segments)
    }

    /// Removes an experiment; see [`Namespace::remove_experiment`].
    pub fn remove_experiment(&self, name: &str) -> bool {
        self.inner.write().remove_experiment(name)
    }
}

impl From<Namespace> for SharedNamespace {
    fn from(namespace: Namespace) -> Self {
        Self::new(namespace)
    }
}
