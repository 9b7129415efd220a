//! Metrics as they travel through the gateway.
//!
//! Producers hand the pipeline loosely shaped JSON records. A record is
//! accepted only if it carries a string `type` and a numeric `timestamp`;
//! everything else about its shape belongs to the producer. Accepted records
//! become `Metric`s, which keep the well-known fields typed and preserve the
//! rest verbatim.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error;
use std::fmt;

mod definition;

pub use self::definition::{Definition, DefinitionError, Definitions, Kind};

/// Producer defined tags of a `Metric`.
pub type TagMap = BTreeMap<String, Value>;

/// A single timestamped observation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metric {
    /// The producer which reported the metric. Empty if the record carried
    /// none, or carried one which is not a string.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    /// The metric type, `energy` or `system` say.
    #[serde(rename = "type")]
    pub metric_type: String,
    /// The metric name, `power` say. Producers are free to omit it.
    #[serde(rename = "metric", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Seconds since the unix epoch.
    pub timestamp: f64,
    /// Tags as reported by the producer.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: TagMap,
    /// The flat value of the metric, if it has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Named values of the metric, for metrics reporting several at once.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, f64>,
    /// Every other field of the original record.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Reasons a raw record is refused at ingestion.
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationError {
    /// The record is not a JSON object.
    NotAnObject,
    /// A required key is absent.
    Missing(&'static str),
    /// A required key has the wrong type. The second member names the type
    /// that was expected.
    WrongType(&'static str, &'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ValidationError::NotAnObject => write!(f, "Metric should be an object"),
            ValidationError::Missing(key) => {
                write!(f, "Metric should contain keys type, timestamp; missing {}", key)
            }
            ValidationError::WrongType(key, expected) => {
                write!(f, "Metric key {} should be of type {}", key, expected)
            }
        }
    }
}

impl error::Error for ValidationError {
    fn description(&self) -> &str {
        match *self {
            ValidationError::NotAnObject => "metric is not an object",
            ValidationError::Missing(_) => "metric is missing a required key",
            ValidationError::WrongType(_, _) => "metric key has the wrong type",
        }
    }
}

fn take_string(obj: &mut Map<String, Value>, key: &str) -> Option<String> {
    match obj.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            obj.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

fn take_number(obj: &mut Map<String, Value>, key: &str) -> Option<f64> {
    match obj.remove(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(other) => {
            obj.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

fn take_object(obj: &mut Map<String, Value>, key: &str) -> Option<Map<String, Value>> {
    match obj.remove(key) {
        Some(Value::Object(inner)) => Some(inner),
        Some(other) => {
            obj.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

impl Metric {
    /// Create a bare metric with no name, tags or values.
    pub fn new<S>(source: S, metric_type: S, timestamp: f64) -> Metric
    where
        S: Into<String>,
    {
        Metric {
            source: source.into(),
            metric_type: metric_type.into(),
            name: None,
            timestamp: timestamp,
            tags: TagMap::new(),
            value: None,
            values: BTreeMap::new(),
            fields: Map::new(),
        }
    }

    /// Validate a raw producer record and convert it into a `Metric`.
    ///
    /// Only `type` (a string) and `timestamp` (a number) are required. The
    /// well-known optional keys are picked up when they have the expected
    /// shape and otherwise left among `fields` untouched.
    pub fn from_value(raw: Value) -> Result<Metric, ValidationError> {
        let mut obj = match raw {
            Value::Object(obj) => obj,
            _ => return Err(ValidationError::NotAnObject),
        };
        let metric_type = match obj.remove("type") {
            Some(Value::String(s)) => s,
            Some(_) => return Err(ValidationError::WrongType("type", "string")),
            None => return Err(ValidationError::Missing("type")),
        };
        let timestamp = match obj.remove("timestamp") {
            Some(Value::Number(n)) => match n.as_f64() {
                Some(ts) => ts,
                None => return Err(ValidationError::WrongType("timestamp", "number")),
            },
            Some(_) => return Err(ValidationError::WrongType("timestamp", "number")),
            None => return Err(ValidationError::Missing("timestamp")),
        };

        let source = take_string(&mut obj, "source").unwrap_or_default();
        let name = take_string(&mut obj, "metric");
        let value = take_number(&mut obj, "value");
        let tags = take_object(&mut obj, "tags")
            .map(|tags| tags.into_iter().collect())
            .unwrap_or_default();
        let values = match take_object(&mut obj, "values") {
            Some(values) => {
                if values.values().all(Value::is_number) {
                    values
                        .into_iter()
                        .filter_map(|(k, v)| v.as_f64().map(|v| (k, v)))
                        .collect()
                } else {
                    // mixed values are the producer's business, keep them as
                    // they came
                    obj.insert("values".to_string(), Value::Object(values));
                    BTreeMap::new()
                }
            }
            None => BTreeMap::new(),
        };

        Ok(Metric {
            source: source,
            metric_type: metric_type,
            name: name,
            timestamp: timestamp,
            tags: tags,
            value: value,
            values: values,
            fields: obj,
        })
    }

    /// Serialize the metric back into the record shape producers emit.
    pub fn to_value(&self) -> Value {
        // Metric holds only JSON representable data; NaN values become null.
        ::serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Set the name of the metric.
    pub fn name<S>(mut self, name: S) -> Metric
    where
        S: Into<String>,
    {
        self.name = Some(name.into());
        self
    }

    /// Set the flat value of the metric.
    pub fn value(mut self, value: f64) -> Metric {
        self.value = Some(value);
        self
    }

    /// Add a named value to the metric.
    pub fn overlay_value<S>(mut self, key: S, value: f64) -> Metric
    where
        S: Into<String>,
    {
        self.values.insert(key.into(), value);
        self
    }

    /// Add a tag to the metric, replacing any previous tag of the same key.
    pub fn overlay_tag<S, V>(mut self, key: S, value: V) -> Metric
    where
        S: Into<String>,
        V: Into<Value>,
    {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Add a free-form top-level field to the metric.
    pub fn overlay_field<S, V>(mut self, key: S, value: V) -> Metric
    where
        S: Into<String>,
        V: Into<Value>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The key under which this metric's throughput is counted:
    /// `"<source>.<type>"`, lowercased.
    pub fn rate_key(&self) -> String {
        rate_key(&self.source, &self.metric_type)
    }

    /// Look up the value of an identity tag.
    ///
    /// Tags are searched first. Producers which predate tags report identity
    /// as top-level fields so those are consulted second.
    pub fn identity(&self, tag: &str) -> Option<&Value> {
        self.tags.get(tag).or_else(|| self.fields.get(tag))
    }
}

/// Build a rate key from a source and a metric type.
pub fn rate_key(source: &str, metric_type: &str) -> String {
    format!("{}.{}", source.to_lowercase(), metric_type.to_lowercase())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn malformed_source_is_written_once() {
        let metric = Metric::from_value(json!({
            "source": 7,
            "type": "energy",
            "timestamp": 1,
        })).unwrap();
        assert_eq!("", metric.source);
        let line = ::serde_json::to_string(&metric).unwrap();
        assert_eq!(1, line.matches("\"source\"").count());
        assert_eq!(Some(&Value::from(7)), metric.to_value().get("source"));
    }

    #[test]
    fn accepts_minimal_record() {
        let metric = Metric::from_value(json!({"type": "energy", "timestamp": 1000}))
            .expect("minimal record refused");
        assert_eq!("", metric.source);
        assert_eq!("energy", metric.metric_type);
        assert_eq!(1000.0, metric.timestamp);
        assert_eq!(None, metric.name);
        assert_eq!(".energy", metric.rate_key());
    }

    #[test]
    fn accepts_float_timestamp() {
        let metric = Metric::from_value(json!({"type": "energy", "timestamp": 1000.25}))
            .unwrap();
        assert_eq!(1000.25, metric.timestamp);
    }

    #[test]
    fn rejects_missing_type() {
        assert_eq!(
            Err(ValidationError::Missing("type")),
            Metric::from_value(json!({"source": "OM", "timestamp": 1000}))
        );
    }

    #[test]
    fn rejects_non_string_type() {
        assert_eq!(
            Err(ValidationError::WrongType("type", "string")),
            Metric::from_value(json!({"type": 12, "timestamp": 1000}))
        );
    }

    #[test]
    fn rejects_missing_timestamp() {
        assert_eq!(
            Err(ValidationError::Missing("timestamp")),
            Metric::from_value(json!({"type": "energy"}))
        );
    }

    #[test]
    fn rejects_non_numeric_timestamp() {
        assert_eq!(
            Err(ValidationError::WrongType("timestamp", "number")),
            Metric::from_value(json!({"type": "energy", "timestamp": "1000"}))
        );
    }

    #[test]
    fn rejects_non_object() {
        assert_eq!(
            Err(ValidationError::NotAnObject),
            Metric::from_value(json!(["energy", 1000]))
        );
    }

    #[test]
    fn validation_messages_name_the_field() {
        let missing = format!("{}", ValidationError::Missing("type"));
        assert!(missing.contains("type"));
        let wrong = format!("{}", ValidationError::WrongType("timestamp", "number"));
        assert!(wrong.contains("timestamp"));
        assert!(wrong.contains("number"));
    }

    #[test]
    fn parses_hardware_shaped_record() {
        let metric = Metric::from_value(json!({
            "source": "OpenMotics",
            "type": "energy",
            "metric": "power",
            "timestamp": 1497677091,
            "device": "OpenMotics energy ID1",
            "id": 0,
            "value": 1234
        })).unwrap();
        assert_eq!("OpenMotics", metric.source);
        assert_eq!(Some("power".to_string()), metric.name);
        assert_eq!(Some(1234.0), metric.value);
        assert_eq!(Some(&json!(0)), metric.identity("id"));
        assert_eq!(Some(&json!("OpenMotics energy ID1")), metric.identity("device"));
        assert_eq!("openmotics.energy", metric.rate_key());
    }

    #[test]
    fn parses_tags_and_values() {
        let metric = Metric::from_value(json!({
            "source": "OpenMotics",
            "type": "system",
            "timestamp": 10,
            "tags": {"name": "gateway", "target": "plugins"},
            "values": {"queue_length": 4}
        })).unwrap();
        assert_eq!(Some(&json!("plugins")), metric.identity("target"));
        assert_eq!(Some(&4.0), metric.values.get("queue_length"));
        assert!(metric.fields.is_empty());
    }

    #[test]
    fn tags_shadow_fields_for_identity() {
        let metric = Metric::new("OM", "energy", 1.0)
            .overlay_field("id", 1)
            .overlay_tag("id", 2);
        assert_eq!(Some(&json!(2)), metric.identity("id"));
    }

    #[test]
    fn malformed_optional_keys_are_kept() {
        let metric = Metric::from_value(json!({
            "source": 7,
            "type": "energy",
            "timestamp": 1,
            "value": "high",
            "values": {"a": 1, "b": "two"}
        })).unwrap();
        assert_eq!("", metric.source);
        assert_eq!(None, metric.value);
        assert!(metric.values.is_empty());
        assert_eq!(Some(&json!(7)), metric.fields.get("source"));
        assert_eq!(Some(&json!("high")), metric.fields.get("value"));
        assert_eq!(Some(&json!({"a": 1, "b": "two"})), metric.fields.get("values"));
    }

    #[test]
    fn serializes_back_to_record_shape() {
        let metric = Metric::new("OM", "energy", 5.0)
            .name("power")
            .value(20.0)
            .overlay_field("id", 0);
        assert_eq!(
            json!({
                "source": "OM",
                "type": "energy",
                "metric": "power",
                "timestamp": 5.0,
                "value": 20.0,
                "id": 0
            }),
            metric.to_value()
        );
    }

    #[test]
    fn clones_are_independent() {
        let original = Metric::new("OM", "energy", 5.0).value(1.0);
        let mut copy = original.clone();
        copy.value = Some(2.0);
        copy.tags.insert("id".to_string(), json!(3));
        assert_eq!(Some(1.0), original.value);
        assert!(original.tags.is_empty());
    }

    #[test]
    fn rate_key_is_lowercase() {
        assert_eq!("openmotics.energy", rate_key("OpenMotics", "Energy"));
    }
}
