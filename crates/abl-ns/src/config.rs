//! Declarative namespace configuration loaded from YAML or JSON.

use std::fs;
use std::path::Path;

use abl_core::errors::{AblError, ErrorInfo};
use abl_core::serde::{from_json_slice, from_yaml_slice, to_yaml_string};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn config_error(code: &str, message: impl Into<String>) -> AblError {
    AblError::Config(ErrorInfo::new(code, message))
}

/// Input key(s) whose values place a unit into a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryUnit {
    /// A single input key, e.g. `userid`.
    One(String),
    /// Several input keys hashed together, in the listed order.
    Many(Vec<String>),
}

impl PrimaryUnit {
    /// Input keys in hashing order.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            PrimaryUnit::One(key) => vec![key.as_str()],
            PrimaryUnit::Many(keys) => keys.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for PrimaryUnit {
    fn from(key: &str) -> Self {
        PrimaryUnit::One(key.to_string())
    }
}

impl From<Vec<String>> for PrimaryUnit {
    fn from(keys: Vec<String>) -> Self {
        PrimaryUnit::Many(keys)
    }
}

/// One experiment admitted when a namespace is built from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentSlot {
    /// Name the experiment is known by inside the namespace.
    pub name: String,
    /// Registry key of the experiment design.
    pub design: String,
    /// Number of segments requested.
    pub segments: u64,
}

/// Declarative namespace description.
///
/// ```yaml
/// name: checkout
/// primary_unit: userid
/// num_segments: 1000
/// default_params:
///   button: grey
/// experiments:
///   - { name: colors, design: ButtonColors, segments: 300 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Namespace name.
    pub name: String,
    /// Namespace salt; the name is used when absent.
    #[serde(default)]
    pub salt: Option<String>,
    /// Input key(s) used for segment placement.
    pub primary_unit: PrimaryUnit,
    /// Size of the segment space.
    pub num_segments: u64,
    /// Parameters served to units outside every experiment.
    #[serde(default)]
    pub default_params: Map<String, Value>,
    /// Experiments admitted in declaration order.
    #[serde(default)]
    pub experiments: Vec<ExperimentSlot>,
}

impl NamespaceConfig {
    /// Minimal configuration with no experiments.
    pub fn new(
        name: impl Into<String>,
        primary_unit: impl Into<PrimaryUnit>,
        num_segments: u64,
    ) -> Self {
        Self {
            name: name.into(),
            salt: None,
            primary_unit: primary_unit.into(),
            num_segments,
            default_params: Map::new(),
            experiments: Vec::new(),
        }
    }

    /// Sets an explicit salt.
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Sets the fallback parameters.
    pub fn with_default_params(mut self, params: Map<String, Value>) -> Self {
        self.default_params = params;
        self
    }

    /// Appends an experiment slot.
    pub fn with_experiment(
        mut self,
        name: impl Into<String>,
        design: impl Into<String>,
        segments: u64,
    ) -> Self {
        self.experiments.push(ExperimentSlot {
            name: name.into(),
            design: design.into(),
            segments,
        });
        self
    }

    /// Effective salt.
    pub fn salt(&self) -> &str {
        self.salt.as_deref().unwrap_or(&self.name)
    }

    /// Checks the invariants that deserialization cannot express.
    pub fn validate(&self) -> Result<(), AblError> {
        if self.num_segments == 0 {
            return Err(AblError::Config(
                ErrorInfo::new(
                    "invalid-num-segments",
                    format!("namespace {} needs at least one segment", self.name),
                )
                .with_context("namespace", self.name.clone()),
            ));
        }
        if self.primary_unit.keys().is_empty() {
            return Err(AblError::Config(
                ErrorInfo::new(
                    "missing-primary-unit",
                    format!("namespace {} declares no primary unit", self.name),
                )
                .with_context("namespace", self.name.clone()),
            ));
        }
        Ok(())
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml(bytes: &[u8]) -> Result<Self, AblError> {
        let config: Self = from_yaml_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a JSON document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, AblError> {
        let config: Self = from_json_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the configuration as a YAML document.
    pub fn to_yaml(&self) -> Result<String, AblError> {
        to_yaml_string(self)
    }

    /// Loads a `.json` file as JSON and anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AblError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| {
            AblError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&bytes),
            _ => Self::from_yaml(&bytes),
        }
    }
}

pub(crate) fn unknown_design(design: &str) -> AblError {
    config_error("unknown-design", format!("no experiment design registered as {design}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_accepts_one_or_many_primary_units() {
        let single =
            NamespaceConfig::from_yaml(b"name: ns\nprimary_unit: userid\nnum_segments: 10\n")
                .unwrap();
        assert_eq!(single.primary_unit.keys(), ["userid"]);
        assert_eq!(single.salt(), "ns");
        assert!(single.experiments.is_empty());

        let many = NamespaceConfig::from_yaml(
            b"name: ns\nsalt: s\nprimary_unit: [userid, device]\nnum_segments: 10\n",
        )
        .unwrap();
        assert_eq!(many.primary_unit.keys(), ["userid", "device"]);
        assert_eq!(many.salt(), "s");
    }

    #[test]
    fn zero_segments_is_rejected() {
        let err =
            NamespaceConfig::from_json(br#"{"name":"ns","primary_unit":"u","num_segments":0}"#)
                .unwrap_err();
        assert_eq!(err.code(), "invalid-num-segments");
    }

    #[test]
    fn yaml_rendering_reloads_to_the_same_config() {
        let keys = vec!["userid".to_string(), "device".to_string()];
        let config = NamespaceConfig::new("ns", keys, 25)
            .with_salt("ns-v2")
            .with_experiment("colors", "ButtonColors", 10);
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("num_segments: 25"));
        assert_eq!(NamespaceConfig::from_yaml(yaml.as_bytes()).unwrap(), config);
    }

    #[test]
    fn malformed_documents_are_serde_errors() {
        let err = NamespaceConfig::from_yaml(b"name: [").unwrap_err();
        assert!(matches!(err, AblError::Serde(_)));
    }
}
