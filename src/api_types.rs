//! Wire shapes the classifier is asked to produce.
//!
//! Models drift between snake_case and camelCase, quote numbers and booleans,
//! and wrap the result array under different keys. Everything here is
//! loose; the engine turns it into [`crate::models::StanceResult`].

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// One per-comment record as returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawResult {
    #[serde(alias = "commentId", alias = "id", deserialize_with = "loose_string")]
    pub comment_id: String,
    #[serde(default, deserialize_with = "loose_opt_string")]
    pub label: Option<String>,
    #[serde(default, alias = "stance_score", alias = "stanceScore", deserialize_with = "loose_f64")]
    pub score: Option<f64>,
    #[serde(default, alias = "stanceDirection", alias = "direction", deserialize_with = "loose_opt_string")]
    pub stance_direction: Option<String>,
    #[serde(default, alias = "stanceIntensity", alias = "intensity", deserialize_with = "loose_f64")]
    pub stance_intensity: Option<f64>,
    #[serde(default, alias = "emotionPolarity", alias = "emotion", deserialize_with = "loose_opt_string")]
    pub emotion_polarity: Option<String>,
    #[serde(default, deserialize_with = "loose_opt_string")]
    pub target: Option<String>,
    #[serde(default, alias = "confidenceLevel", alias = "confidence", deserialize_with = "loose_f64")]
    pub confidence_level: Option<f64>,
    #[serde(default, alias = "evidenceText", alias = "evidence", deserialize_with = "loose_opt_string")]
    pub evidence_text: Option<String>,
    #[serde(default, alias = "replyRelation", alias = "relation", deserialize_with = "loose_opt_string")]
    pub reply_relation: Option<String>,
    #[serde(default, alias = "isSarcasm", alias = "sarcasm", deserialize_with = "loose_bool")]
    pub is_sarcasm: Option<bool>,
    #[serde(default, deserialize_with = "loose_opt_string")]
    pub reason: Option<String>,
}

impl RawResult {
    /// True when the record carries neither shape of stance information.
    pub fn has_stance(&self) -> bool {
        self.score.is_some() || self.label.is_some() || self.stance_direction.is_some()
    }
}

/// Key under which a model wrapped its result array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKey {
    Analyses,
    Comments,
    Results,
}

impl ContainerKey {
    pub const ALL: [ContainerKey; 3] = [
        ContainerKey::Analyses,
        ContainerKey::Comments,
        ContainerKey::Results,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKey::Analyses => "analyses",
            ContainerKey::Comments => "comments",
            ContainerKey::Results => "results",
        }
    }
}

/// The shapes a parsed response may take.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseContainer {
    Bare(Vec<Value>),
    Keyed { key: ContainerKey, items: Vec<Value> },
    /// An object with none of the known keys, taken as a single record.
    Single(Map<String, Value>),
    /// A scalar: nothing usable.
    Empty,
}

impl ResponseContainer {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) => ResponseContainer::Bare(items),
            Value::Object(mut map) => {
                for key in ContainerKey::ALL {
                    match map.remove(key.as_str()) {
                        Some(Value::Array(items)) => {
                            return ResponseContainer::Keyed { key, items };
                        }
                        Some(Value::Object(inner)) => {
                            return ResponseContainer::Keyed {
                                key,
                                items: vec![Value::Object(inner)],
                            };
                        }
                        Some(other) => {
                            // not a container after all, put it back
                            map.insert(key.as_str().to_string(), other);
                        }
                        None => {}
                    }
                }
                ResponseContainer::Single(map)
            }
            _ => ResponseContainer::Empty,
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            ResponseContainer::Bare(_) => "array",
            ResponseContainer::Keyed { key, .. } => key.as_str(),
            ResponseContainer::Single(_) => "single_object",
            ResponseContainer::Empty => "empty",
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            ResponseContainer::Bare(items) | ResponseContainer::Keyed { items, .. } => items,
            ResponseContainer::Single(map) => vec![Value::Object(map)],
            ResponseContainer::Empty => Vec::new(),
        }
    }
}

fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_start_matches('+').parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
    .filter(|x| x.is_finite())
}

fn value_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn loose_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(value_as_f64))
}

fn loose_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        Some(Value::Number(n)) => n.as_f64().map(|x| x != 0.0),
        _ => None,
    })
}

fn loose_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(value_as_string).filter(|s| !s.is_empty()))
}

fn loose_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = Value::deserialize(d)?;
    value_as_string(&v)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| serde::de::Error::custom("comment id must be a non-empty string or number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_result_accepts_camel_and_snake_case() {
        let camel: RawResult = serde_json::from_value(json!({
            "commentId": "c1", "stanceDirection": "oppose", "stanceIntensity": "0.7",
            "replyRelation": "disagree", "isSarcasm": "false"
        }))
        .unwrap();
        let snake: RawResult = serde_json::from_value(json!({
            "comment_id": "c1", "stance_direction": "oppose", "stance_intensity": 0.7,
            "reply_relation": "disagree", "is_sarcasm": false
        }))
        .unwrap();
        assert_eq!(camel, snake);
        assert!(camel.has_stance());
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let r: RawResult = serde_json::from_value(json!({"id": 17, "score": -0.4})).unwrap();
        assert_eq!(r.comment_id, "17");
        assert_eq!(r.score, Some(-0.4));
        assert!(r.label.is_none());
    }

    #[test]
    fn record_without_id_is_rejected() {
        assert!(serde_json::from_value::<RawResult>(json!({"score": 0.2})).is_err());
    }

    #[test]
    fn container_recognizes_each_wrapper_key() {
        for key in ContainerKey::ALL {
            let value = json!({ key.as_str(): [{"commentId": "c1"}] });
            let container = ResponseContainer::from_value(value);
            assert_eq!(container.shape(), key.as_str());
            assert_eq!(container.into_items().len(), 1);
        }
    }

    #[test]
    fn unknown_object_falls_back_to_single_item() {
        let container =
            ResponseContainer::from_value(json!({"commentId": "c9", "label": "Support"}));
        assert_eq!(container.shape(), "single_object");
        assert_eq!(container.into_items(), vec![json!({"commentId": "c9", "label": "Support"})]);
    }

    #[test]
    fn non_array_wrapper_value_is_not_a_container() {
        let container = ResponseContainer::from_value(json!({"comments": "none", "id": "c3"}));
        match container {
            ResponseContainer::Single(map) => assert_eq!(map["comments"], json!("none")),
            other => panic!("expected single object, got {:?}", other),
        }
    }

    #[test]
    fn scalar_payload_is_empty() {
        assert_eq!(ResponseContainer::from_value(json!(42)).into_items(), Vec::<Value>::new());
    }
}
