//! Walking a pattern path from a host node down to a leaf reading.

use std::fmt;

use super::{matcher::find_match, value::parse_reading, SensorNode};

/// Why a metric path produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The metric has no path steps.
    EmptyPath,
    /// No node at `step` (zero-based) matched `pattern`.
    NoMatch { step: usize, pattern: String },
    /// The leaf was found but its text is not a number.
    Unparseable { raw: String },
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::EmptyPath => write!(f, "empty path"),
            UnresolvedReason::NoMatch { step, pattern } => {
                write!(f, "no node matched '{}' at step {}", pattern, step)
            }
            UnresolvedReason::Unparseable { raw } => write!(f, "unparseable reading '{}'", raw),
        }
    }
}

/// Resolves `path` below `root` and parses the leaf reading.
///
/// Matching starts at the children of `root`. Each step descends into the
/// children of the node matched by the previous step; the last step's node
/// supplies the reading.
pub fn resolve(root: &SensorNode, path: &[String], unit: &str) -> Result<f64, UnresolvedReason> {
    let Some((last, steps)) = path.split_last() else {
        return Err(UnresolvedReason::EmptyPath);
    };

    let mut current = root.children.as_slice();
    for (step, pattern) in steps.iter().enumerate() {
        let node = find_match(current, pattern).ok_or_else(|| UnresolvedReason::NoMatch {
            step,
            pattern: pattern.clone(),
        })?;
        current = node.children.as_slice();
    }

    let leaf = find_match(current, last).ok_or_else(|| UnresolvedReason::NoMatch {
        step: steps.len(),
        pattern: last.clone(),
    })?;

    parse_reading(leaf.raw_value(), unit).ok_or_else(|| UnresolvedReason::Unparseable {
        raw: leaf.raw_value().to_string(),
    })
}

/// Sentinel form of [`resolve`]: any failure yields `0.0`.
pub fn extract(root: &SensorNode, path: &[String], unit: &str) -> f64 {
    resolve(root, path, unit).unwrap_or(0.0)
}
