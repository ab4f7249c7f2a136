//! Nested stats payloads and their flattening into dotted leaves.

use std::collections::BTreeMap;

use serde_json::Value;

use super::types::StatLeaf;

/// A stats payload of arbitrary depth.
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    Number(f64),
    Map(BTreeMap<String, StatValue>),
}

impl StatValue {
    /// Converts a JSON document, keeping only numbers and objects.
    ///
    /// Strings, booleans, nulls and arrays carry no gauge value and are
    /// dropped. Returns `None` when nothing numeric remains at the root.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(StatValue::Number),
            Value::Object(map) => Some(StatValue::Map(
                map.iter()
                    .filter_map(|(k, v)| Self::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Top level entries when this is a map.
    pub fn groups(&self) -> Option<&BTreeMap<String, StatValue>> {
        match self {
            StatValue::Map(map) => Some(map),
            StatValue::Number(_) => None,
        }
    }

    /// Flattens every numeric leaf under `prefix`, joining path segments with `.`.
    pub fn flatten(&self, prefix: &str) -> Vec<StatLeaf> {
        let mut leaves = Vec::new();
        self.flatten_into(prefix.to_string(), &mut leaves);
        leaves
    }

    fn flatten_into(&self, path: String, leaves: &mut Vec<StatLeaf>) {
        match self {
            StatValue::Number(value) => leaves.push(StatLeaf {
                name: path,
                value: *value,
            }),
            StatValue::Map(map) => {
                for (key, child) in map {
                    child.flatten_into(format!("{path}.{key}"), leaves);
                }
            }
        }
    }
}

impl From<f64> for StatValue {
    fn from(value: f64) -> Self {
        StatValue::Number(value)
    }
}

impl<K: Into<String>> FromIterator<(K, StatValue)> for StatValue {
    fn from_iter<T: IntoIterator<Item = (K, StatValue)>>(iter: T) -> Self {
        StatValue::Map(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::*;

    fn leaf(name: &str, value: f64) -> StatLeaf {
        StatLeaf {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn flatten_joins_nested_keys() {
        let stats = StatValue::from_json(&json!({"rd": 12, "wr": {"bytes": 99}})).unwrap();

        assert_eq!(
            stats.flatten("vms.web.one-7-0"),
            vec![leaf("vms.web.one-7-0.rd", 12.0), leaf("vms.web.one-7-0.wr.bytes", 99.0)]
        );
    }

    #[test]
    fn flatten_handles_arbitrary_depth() {
        let stats = StatValue::from_json(&json!({"a": {"b": {"c": {"d": {"e": 1.5}}}}})).unwrap();

        assert_eq!(stats.flatten("p"), vec![leaf("p.a.b.c.d.e", 1.5)]);
    }

    #[test]
    fn flatten_visits_each_leaf_once() {
        let stats = StatValue::from_json(&json!({
            "rd": 1,
            "rd_bytes": 2,
            "rd_latency": {"avgcount": 3, "sum": 4.25},
            "wr": 5,
        }))
        .unwrap();

        let leaves = stats.flatten("x");
        let names: Vec<&str> = leaves.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "x.rd",
                "x.rd_bytes",
                "x.rd_latency.avgcount",
                "x.rd_latency.sum",
                "x.wr"
            ]
        );
    }

    #[test]
    fn non_numeric_values_are_dropped() {
        let stats = StatValue::from_json(&json!({
            "name": "rbd0",
            "enabled": true,
            "hist": [1, 2, 3],
            "none": null,
            "ops": 7,
        }))
        .unwrap();

        assert_eq!(stats.flatten("d"), vec![leaf("d.ops", 7.0)]);
    }

    #[test]
    fn scalar_root_flattens_to_prefix() {
        assert_eq!(StatValue::from(3.0).flatten("p"), vec![leaf("p", 3.0)]);
    }

    #[test]
    fn non_numeric_root_is_none() {
        assert_eq!(StatValue::from_json(&json!("text")), None);
        assert_eq!(StatValue::from_json(&json!([1, 2])), None);
    }

    #[test]
    fn empty_map_has_no_leaves() {
        let stats = StatValue::from_json(&json!({})).unwrap();
        assert!(stats.flatten("p").is_empty());
    }
}
