//! Label matching for a single tree level.

use super::SensorNode;

/// Finds the first sibling whose label contains any `|`-separated alternative.
///
/// Sibling order wins over alternative order: every alternative is tried
/// against the first sibling before moving to the second. Matching is a
/// case-sensitive substring test on the trimmed alternative.
pub fn find_match<'a>(siblings: &'a [SensorNode], pattern: &str) -> Option<&'a SensorNode> {
    let alternatives: Vec<&str> = pattern.split('|').map(str::trim).collect();

    siblings.iter().find(|node| {
        alternatives
            .iter()
            .any(|alternative| node.text.contains(*alternative))
    })
}
