//! Metric catalog: which readings to pull out of the sensor tree.
//!
//! The catalog is a JSON document kept next to the deployment:
//!
//! ```json
//! { "metrics": [
//!     { "name": "cpu_temp_tctl", "description": "CPU Tctl",
//!       "path": ["CPU", "Temperatures", "Core (Tctl/Tdie)|Tctl"], "unit": "°C" }
//! ] }
//! ```
//!
//! It is loaded once at startup and never changes afterwards.

use std::{collections::HashSet, fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::{Validate, ValidationError};

use super::ConfigError;

/// Snapshot keys owned by the extractor itself.
pub const RESERVED_KEYS: [&str; 3] = ["timestamp", "pc_name", "_unresolved"];

/// Declarative description of one scalar metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MetricDefinition {
    /// Key under which the value is published.
    #[validate(
        length(min = 1, message = "Metric name must not be empty"),
        custom(function = "validate_not_reserved")
    )]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// One `|`-separated pattern per tree level, outermost first.
    #[serde(default)]
    pub path: Vec<String>,

    /// Unit token stripped from the leaf reading, e.g. `°C` or `W`.
    #[serde(default)]
    pub unit: String,
}

fn validate_not_reserved(name: &str) -> Result<(), ValidationError> {
    if RESERVED_KEYS.contains(&name) {
        let mut err = ValidationError::new("reserved_metric_name");
        err.message = Some(format!("Metric name '{}' is reserved", name).into());
        return Err(err);
    }
    Ok(())
}

fn validate_unique_names(metrics: &[MetricDefinition]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for metric in metrics {
        if !seen.insert(metric.name.as_str()) {
            let mut err = ValidationError::new("duplicate_metric_name");
            err.message = Some(format!("Metric name '{}' is defined twice", metric.name).into());
            return Err(err);
        }
    }
    Ok(())
}

/// Ordered set of metric definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct MetricsCatalog {
    #[validate(nested, custom(function = "validate_unique_names"))]
    pub metrics: Vec<MetricDefinition>,
}

impl MetricsCatalog {
    pub fn new(metrics: Vec<MetricDefinition>) -> Self {
        Self { metrics }
    }

    /// Reads, parses and validates a catalog file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the file is missing or unreadable, is not
    /// valid JSON of the expected shape, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            ConfigError::Config(format!(
                "cannot read metric catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    /// Parses and validates a catalog from its JSON text.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let catalog: MetricsCatalog =
            serde_json::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        catalog
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        for metric in catalog.metrics.iter().filter(|m| m.path.is_empty()) {
            warn!(
                "Metric '{}' has an empty path and will always report 0",
                metric.name
            );
        }

        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.metrics.iter()
    }
}

/// `[metrics]` section of the application config.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct MetricsConfig {
    /// Path of the JSON metric catalog.
    #[validate(length(min = 1, message = "Metric catalog path must not be empty"))]
    pub definitions: String,

    /// Append an `_unresolved` array of metric names to every payload.
    pub report_unresolved: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            definitions: "metrics-config.json".to_string(),
            report_unresolved: false,
        }
    }
}
