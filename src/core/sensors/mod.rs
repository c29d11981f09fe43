//! Sensor tree model and the lookup machinery that runs over it.
//!
//! The hardware monitor exposes its readings as a nested JSON tree whose shape
//! is vendor-defined: machines contain components, components contain sensor
//! categories, categories contain the leaf readings. Nothing about the depth
//! or the labels is fixed, so metrics are located declaratively with a path of
//! `|`-separated label patterns (see [`matcher`] and [`path`]) and the leaf text
//! is turned into a number by [`value`].
//!
//! A tree is rebuilt from scratch on every fetch and dropped after extraction.

use serde::{Deserialize, Serialize};

pub mod matcher;
pub mod path;
pub mod value;

pub use matcher::find_match;
pub use path::{extract, resolve, UnresolvedReason};
pub use value::{parse_reading, parse_value};

/// One entry of the sensor tree: a hardware component, a sensor category or a
/// leaf reading.
///
/// Branch nodes usually carry an empty `Value`, leaf nodes carry no children.
/// Extra fields emitted by the monitor (`Min`, `Max`, `ImageURL`, `id`, ...)
/// are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorNode {
    /// Display label of the node, e.g. `"CPU Package"` or `"Core Tctl"`.
    #[serde(rename = "Text", default)]
    pub text: String,

    /// Raw reading with its unit suffix, e.g. `"55.0 °C"`.
    #[serde(rename = "Value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Ordered child nodes.
    #[serde(rename = "Children", default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SensorNode>,
}

impl SensorNode {
    /// Creates a branch node with the given children.
    pub fn branch(text: impl Into<String>, children: Vec<SensorNode>) -> Self {
        Self {
            text: text.into(),
            value: None,
            children,
        }
    }

    /// Creates a leaf node carrying a raw reading.
    pub fn leaf(text: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: Some(value.into()),
            children: Vec::new(),
        }
    }

    /// Raw reading text, empty when the node has none.
    pub fn raw_value(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

/// Root document returned by the monitor: one top-level node per machine.
///
/// Only the first machine is consumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorTree {
    #[serde(rename = "Children", default)]
    pub children: Vec<SensorNode>,
}

impl SensorTree {
    pub fn new(children: Vec<SensorNode>) -> Self {
        Self { children }
    }

    /// The monitored machine, if the monitor reported any.
    pub fn host(&self) -> Option<&SensorNode> {
        self.children.first()
    }
}
