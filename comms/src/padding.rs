use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::msg::Batch;

/// Per field pad values used to even out array valued fields of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaddingConfig {
    fields: BTreeMap<String, Value>,
}

impl PaddingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pad value of `field`, replacing any previous one.
    pub fn insert(&mut self, field: impl Into<String>, pad_value: Value) {
        self.fields.insert(field.into(), pad_value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Merges `other` into this config, `other`'s entries win on conflict.
    pub fn merge(&mut self, other: PaddingConfig) {
        self.fields.extend(other.fields);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Extends every configured array field of the batch to the longest
    /// length found for that field, using the field's pad value.
    ///
    /// Samples that aren't objects or don't carry the field are left untouched.
    pub fn pad(&self, batch: &mut Batch) {
        for (field, pad_value) in &self.fields {
            let longest = batch
                .iter()
                .filter_map(|sample| sample.get(field)?.as_array().map(Vec::len))
                .max();

            let Some(longest) = longest else {
                continue;
            };

            for sample in batch.iter_mut() {
                if let Some(Value::Array(values)) = sample.get_mut(field) {
                    values.resize(longest, pad_value.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn pad_evens_out_configured_fields() {
        let mut config = PaddingConfig::new();
        config.insert("tokens", json!(0));

        let mut batch = vec![
            json!({ "tokens": [1, 2, 3], "mask": [1] }),
            json!({ "tokens": [4], "mask": [1, 1] }),
            json!("not an object"),
        ];
        config.pad(&mut batch);

        assert_eq!(batch[0], json!({ "tokens": [1, 2, 3], "mask": [1] }));
        assert_eq!(batch[1], json!({ "tokens": [4, 0, 0], "mask": [1, 1] }));
        assert_eq!(batch[2], json!("not an object"));
    }

    #[test]
    fn merge_prefers_latest_entries() {
        let mut a = PaddingConfig::new();
        a.insert("tokens", json!(0));
        a.insert("mask", json!(0));

        let mut b = PaddingConfig::new();
        b.insert("tokens", json!(-1));

        a.merge(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.get("tokens"), Some(&json!(-1)));
    }

    #[test]
    fn deserializes_from_a_plain_map() {
        let config: PaddingConfig = serde_json::from_str(r#"{ "tokens": 0 }"#).unwrap();
        assert_eq!(config.get("tokens"), Some(&json!(0)));
    }
}
