//! Applies the metric catalog to one sensor tree and produces a snapshot.

use serde::{ser::SerializeMap, Serialize, Serializer};

use super::sensors::{resolve, SensorTree, UnresolvedReason};
use crate::config::metrics::{MetricDefinition, MetricsCatalog};

/// Outcome of resolving one metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Resolved(f64),
    Unresolved(UnresolvedReason),
}

impl MetricValue {
    /// Published value: unresolved metrics are reported as `0.0`.
    pub fn value(&self) -> f64 {
        match self {
            MetricValue::Resolved(v) => *v,
            MetricValue::Unresolved(_) => 0.0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, MetricValue::Resolved(_))
    }
}

/// One named metric of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricReading {
    pub name: String,
    pub unit: String,
    pub value: MetricValue,
}

/// Flat result of one poll cycle.
///
/// Serializes to a JSON object with `timestamp`, `pc_name` (when the tree had
/// a host) and one key per catalog metric, in catalog order. Use
/// [`MetricSnapshot::wire`] to control whether `_unresolved` is appended.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    /// Unix time of extraction, in seconds.
    pub timestamp: i64,
    /// Label of the monitored machine.
    pub host: Option<String>,
    readings: Vec<MetricReading>,
}

impl MetricSnapshot {
    pub fn new(timestamp: i64, host: Option<String>, readings: Vec<MetricReading>) -> Self {
        Self {
            timestamp,
            host,
            readings,
        }
    }

    pub fn readings(&self) -> &[MetricReading] {
        &self.readings
    }

    /// Published value of `name`, if the metric is part of this snapshot.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.reading(name).map(|r| r.value.value())
    }

    pub fn reading(&self, name: &str) -> Option<&MetricReading> {
        self.readings.iter().find(|r| r.name == name)
    }

    /// Names of metrics whose path or reading could not be resolved.
    pub fn unresolved(&self) -> Vec<&str> {
        self.readings
            .iter()
            .filter(|r| !r.value.is_resolved())
            .map(|r| r.name.as_str())
            .collect()
    }

    /// Keys present in the serialized form (without `_unresolved`).
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = vec!["timestamp"];
        if self.host.is_some() {
            keys.push("pc_name");
        }
        keys.extend(self.readings.iter().map(|r| r.name.as_str()));
        keys
    }

    /// Serializable view used by publishers.
    pub fn wire(&self, report_unresolved: bool) -> WireSnapshot<'_> {
        WireSnapshot {
            snapshot: self,
            report_unresolved,
        }
    }

    /// Human-readable `name=value unit` list of resolved metrics.
    pub fn summary(&self) -> String {
        self.readings
            .iter()
            .filter_map(|r| match r.value {
                MetricValue::Resolved(v) if r.unit.is_empty() => {
                    Some(format!("{}={:.1}", r.name, v))
                }
                MetricValue::Resolved(v) => Some(format!("{}={:.1}{}", r.name, v, r.unit)),
                MetricValue::Unresolved(_) => None,
            })
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl Serialize for MetricSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.wire(false).serialize(serializer)
    }
}

/// Wire form of a snapshot, optionally carrying the `_unresolved` array.
pub struct WireSnapshot<'a> {
    snapshot: &'a MetricSnapshot,
    report_unresolved: bool,
}

impl Serialize for WireSnapshot<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let snapshot = self.snapshot;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("timestamp", &snapshot.timestamp)?;
        if let Some(host) = &snapshot.host {
            map.serialize_entry("pc_name", host)?;
        }
        for reading in &snapshot.readings {
            map.serialize_entry(&reading.name, &reading.value.value())?;
        }
        if self.report_unresolved {
            map.serialize_entry("_unresolved", &snapshot.unresolved())?;
        }
        map.end()
    }
}

/// Current Unix time in seconds.
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Resolves one definition against the host node.
fn read_metric(host: &super::sensors::SensorNode, metric: &MetricDefinition) -> MetricReading {
    let value = match resolve(host, &metric.path, &metric.unit) {
        Ok(v) => MetricValue::Resolved(v),
        Err(reason) => MetricValue::Unresolved(reason),
    };
    MetricReading {
        name: metric.name.clone(),
        unit: metric.unit.clone(),
        value,
    }
}

/// Extracts every catalog metric from `tree`, stamped with `timestamp`.
///
/// An empty tree yields a snapshot holding only the timestamp: no host and no
/// metric keys. Otherwise every catalog metric is present, unresolved ones
/// with a zero value.
pub fn extract_all_at(tree: &SensorTree, catalog: &MetricsCatalog, timestamp: i64) -> MetricSnapshot {
    let Some(host) = tree.host() else {
        return MetricSnapshot::new(timestamp, None, Vec::new());
    };

    let readings = catalog
        .iter()
        .map(|metric| read_metric(host, metric))
        .collect();

    MetricSnapshot::new(timestamp, Some(host.text.clone()), readings)
}

/// [`extract_all_at`] with the current Unix time.
pub fn extract_all(tree: &SensorTree, catalog: &MetricsCatalog) -> MetricSnapshot {
    extract_all_at(tree, catalog, unix_now())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::core::sensors::SensorNode;

    fn metric(name: &str, path: &[&str], unit: &str) -> MetricDefinition {
        MetricDefinition {
            name: name.into(),
            description: String::new(),
            path: path.iter().map(|s| s.to_string()).collect(),
            unit: unit.into(),
        }
    }

    fn catalog() -> MetricsCatalog {
        MetricsCatalog::new(vec![
            metric("cpu_temp_tctl", &["CPU", "Core Tctl|Tctl"], "°C"),
            metric("cpu_power", &["CPU", "Package"], "W"),
            metric("gpu_temp", &["GPU", "GPU Core"], "°C"),
        ])
    }

    fn tree() -> SensorTree {
        SensorTree::new(vec![SensorNode::branch(
            "PC",
            vec![SensorNode::branch(
                "CPU",
                vec![
                    SensorNode::leaf("Core Tctl", "55.0 °C"),
                    SensorNode::leaf("Package", "N/A"),
                ],
            )],
        )])
    }

    #[test]
    fn test_end_to_end_tree() {
        let tree: SensorTree = serde_json::from_str(
            r#"{"Children":[{"Text":"PC","Children":[{"Text":"CPU","Children":[{"Text":"Core Tctl","Value":"55.0 °C"}]}]}]}"#,
        )
        .unwrap();
        let catalog = MetricsCatalog::from_json(
            r#"{"metrics":[{"name":"cpu_temp_tctl","description":"","path":["CPU","Core Tctl|Tctl"],"unit":"°C"}]}"#,
        )
        .unwrap();

        let snapshot = extract_all(&tree, &catalog);
        assert_eq!(snapshot.get("cpu_temp_tctl"), Some(55.0));
        assert_eq!(snapshot.host.as_deref(), Some("PC"));

        let json: serde_json::Value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["cpu_temp_tctl"], 55.0);
        assert_eq!(json["pc_name"], "PC");
        assert!(json["timestamp"].is_i64());
    }

    #[test]
    fn test_empty_tree_only_timestamp() {
        let snapshot = extract_all_at(&SensorTree::default(), &catalog(), 1_700_000_000);

        assert_eq!(snapshot.keys(), vec!["timestamp"]);
        assert!(snapshot.host.is_none());
        assert_eq!(
            serde_json::to_string(&snapshot).unwrap(),
            r#"{"timestamp":1700000000}"#
        );
    }

    #[test]
    fn test_key_set_matches_catalog() {
        let snapshot = extract_all(&tree(), &catalog());
        let json: serde_json::Value = serde_json::to_value(&snapshot).unwrap();

        let keys: BTreeSet<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        let expected: BTreeSet<&str> = ["timestamp", "pc_name", "cpu_temp_tctl", "cpu_power", "gpu_temp"]
            .into_iter()
            .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_unresolved_metrics_publish_zero() {
        let snapshot = extract_all(&tree(), &catalog());

        assert_eq!(snapshot.get("cpu_power"), Some(0.0));
        assert_eq!(snapshot.get("gpu_temp"), Some(0.0));
        assert_eq!(snapshot.unresolved(), vec!["cpu_power", "gpu_temp"]);
        assert!(matches!(
            snapshot.reading("cpu_power").unwrap().value,
            MetricValue::Unresolved(UnresolvedReason::Unparseable { .. })
        ));
        assert!(matches!(
            snapshot.reading("gpu_temp").unwrap().value,
            MetricValue::Unresolved(UnresolvedReason::NoMatch { step: 0, .. })
        ));
    }

    #[test]
    fn test_serialization_follows_catalog_order() {
        let snapshot = extract_all_at(&tree(), &catalog(), 42);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(
            json,
            r#"{"timestamp":42,"pc_name":"PC","cpu_temp_tctl":55.0,"cpu_power":0.0,"gpu_temp":0.0}"#
        );
    }

    #[test]
    fn test_wire_reports_unresolved_on_request() {
        let snapshot = extract_all_at(&tree(), &catalog(), 42);
        let json: serde_json::Value =
            serde_json::to_value(snapshot.wire(true)).unwrap();
        assert_eq!(json["_unresolved"], serde_json::json!(["cpu_power", "gpu_temp"]));

        let plain: serde_json::Value = serde_json::to_value(snapshot.wire(false)).unwrap();
        assert!(plain.get("_unresolved").is_none());
    }

    #[test]
    fn test_overflowing_reading_publishes_zero() {
        let tree = SensorTree::new(vec![SensorNode::branch(
            "PC",
            vec![SensorNode::leaf("Fan", "1e999 W")],
        )]);
        let catalog = MetricsCatalog::new(vec![metric("fan", &["Fan"], "W")]);

        let snapshot = extract_all_at(&tree, &catalog, 1);
        assert_eq!(snapshot.unresolved(), vec!["fan"]);
        assert_eq!(
            serde_json::to_string(&snapshot).unwrap(),
            r#"{"timestamp":1,"pc_name":"PC","fan":0.0}"#
        );
    }

    #[test]
    fn test_only_first_host_is_used() {
        let mut tree = tree();
        tree.children.push(SensorNode::branch(
            "SECOND",
            vec![SensorNode::branch("GPU", vec![SensorNode::leaf("GPU Core", "70 °C")])],
        ));

        let snapshot = extract_all(&tree, &catalog());
        assert_eq!(snapshot.host.as_deref(), Some("PC"));
        assert_eq!(snapshot.get("gpu_temp"), Some(0.0));
    }

    #[test]
    fn test_empty_catalog_keeps_host() {
        let snapshot = extract_all(&tree(), &MetricsCatalog::default());
        assert_eq!(snapshot.keys(), vec!["timestamp", "pc_name"]);
    }

    #[test]
    fn test_summary_lists_resolved_only() {
        let snapshot = extract_all(&tree(), &catalog());
        assert_eq!(snapshot.summary(), "cpu_temp_tctl=55.0°C");
    }
}
