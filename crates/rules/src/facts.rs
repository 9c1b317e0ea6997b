//! The fact table a rule is evaluated against.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Nested key-value data (patient attributes, readings, …).
///
/// Paths are dotted: `patient.vitals.heartRate`. A numeric segment indexes
/// into an array, so `readings.0.value` reads the first reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactTable(Value);

impl FactTable {
    pub fn new(facts: Value) -> Self {
        Self(facts)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Resolve a dotted path. `None` means the path is absent; a present
    /// `null` resolves to `Some(Value::Null)`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(&self.0);
        }
        path.split('.').try_fold(&self.0, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}

impl From<Value> for FactTable {
    fn from(facts: Value) -> Self {
        Self(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_and_indexed_paths() {
        let facts = FactTable::new(json!({
            "patient": { "age": 42, "flags": null },
            "readings": [{ "value": 7.5 }]
        }));
        assert_eq!(facts.lookup("patient.age"), Some(&json!(42)));
        assert_eq!(facts.lookup("patient.flags"), Some(&Value::Null));
        assert_eq!(facts.lookup("readings.0.value"), Some(&json!(7.5)));
    }

    #[test]
    fn absent_paths_resolve_to_none() {
        let facts = FactTable::new(json!({ "patient": { "age": 42 } }));
        assert_eq!(facts.lookup("patient.weight"), None);
        assert_eq!(facts.lookup("patient.age.years"), None);
        assert_eq!(facts.lookup("visits.3"), None);
    }
}
