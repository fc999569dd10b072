#![deny(missing_docs)]

//! Namespaces: mutually exclusive experiments over a fixed segment space.
//!
//! ```
//! use abl_ns::{ExperimentRegistry, Namespace, NamespaceConfig};
//! use serde_json::json;
//!
//! let config = NamespaceConfig::new("homepage", "userid", 100);
//! let registry = ExperimentRegistry::new();
//! let namespace = Namespace::from_config(&config, &registry).unwrap();
//! let inputs = json!({"userid": 3}).as_object().cloned().unwrap();
//! let resolution = namespace.resolve(&inputs).unwrap();
//! assert!(resolution.segment() < 100);
//! assert!(!resolution.in_experiment());
//! ```

pub mod config;
mod namespace;
mod registry;
mod session;
mod shared;

pub use config::{ExperimentSlot, NamespaceConfig, PrimaryUnit};
pub use namespace::{experiment_factory, Namespace, Resolution};
pub use registry::{ExperimentFactory, ExperimentRegistry};
pub use session::NamespaceSession;
pub use shared::SharedNamespace;
