//! Advisory metric definitions.
//!
//! A definition describes a metric's shape and, more importantly for us, the
//! ordered list of tags that identify one series of the metric. Definitions
//! are never enforced at ingestion. They are only consulted by the cloud
//! cache to decide when two metrics are the same observation.

use constants;
use serde_json::Value;
use std::collections::HashMap;
use std::error;
use std::fmt;

/// The aggregation kind of a defined metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// A monotonically increasing count.
    Counter,
    /// A point-in-time reading.
    Gauge,
}

/// Schema of one metric, identified by source, type and name.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Definition {
    /// The metric type this definition applies to.
    #[serde(rename = "type")]
    pub metric_type: String,
    /// The metric name this definition applies to.
    pub name: String,
    /// Human readable description.
    pub description: String,
    /// Counter or gauge.
    #[serde(rename = "mtype")]
    pub kind: Kind,
    /// Unit of the metric's values, possibly empty.
    pub unit: String,
    /// Tags which, together, identify one series of the metric.
    pub tags: Vec<String>,
}

/// Reasons a raw definition record is refused.
#[derive(Clone, Debug, PartialEq)]
pub enum DefinitionError {
    /// The record is not a JSON object.
    NotAnObject,
    /// A required key is absent.
    Missing(&'static str),
    /// A required key has the wrong type. The second member names the type
    /// that was expected.
    WrongType(&'static str, &'static str),
}

const REQUIRED_KEYS: &str = "type, name, description, mtype, unit, tags";

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            DefinitionError::NotAnObject => write!(f, "Metric definition should be an object"),
            DefinitionError::Missing(key) => write!(
                f,
                "Metric definition should contain keys: {}; missing {}",
                REQUIRED_KEYS, key
            ),
            DefinitionError::WrongType(key, expected) => {
                write!(f, "Metric definition key {} should be of type {}", key, expected)
            }
        }
    }
}

impl error::Error for DefinitionError {
    fn description(&self) -> &str {
        match *self {
            DefinitionError::NotAnObject => "definition is not an object",
            DefinitionError::Missing(_) => "definition is missing a required key",
            DefinitionError::WrongType(_, _) => "definition key has the wrong type",
        }
    }
}

fn required_str<'a>(raw: &'a Value, key: &'static str) -> Result<&'a str, DefinitionError> {
    match raw.get(key) {
        Some(&Value::String(ref s)) => Ok(s.as_str()),
        Some(_) => Err(DefinitionError::WrongType(key, "string")),
        None => Err(DefinitionError::Missing(key)),
    }
}

impl Definition {
    /// Create a definition with an empty description and unit and no
    /// identity tags.
    pub fn new<S>(metric_type: S, name: S, kind: Kind) -> Definition
    where
        S: Into<String>,
    {
        Definition {
            metric_type: metric_type.into(),
            name: name.into(),
            description: String::new(),
            kind: kind,
            unit: String::new(),
            tags: Vec::new(),
        }
    }

    /// Set the description of the definition.
    pub fn description<S>(mut self, description: S) -> Definition
    where
        S: Into<String>,
    {
        self.description = description.into();
        self
    }

    /// Set the unit of the definition.
    pub fn unit<S>(mut self, unit: S) -> Definition
    where
        S: Into<String>,
    {
        self.unit = unit.into();
        self
    }

    /// Append an identity tag.
    pub fn tag<S>(mut self, tag: S) -> Definition
    where
        S: Into<String>,
    {
        self.tags.push(tag.into());
        self
    }

    /// Validate and convert a raw definition record.
    ///
    /// > {"type": "energy", "name": "power", "description": "Total energy
    /// > consumed (in kWh)", "mtype": "counter", "unit": "Wh",
    /// > "tags": ["device", "id"]}
    ///
    /// Keys are checked in the order type, name, description, mtype, unit,
    /// tags and the first offending key is reported.
    pub fn from_value(raw: &Value) -> Result<Definition, DefinitionError> {
        if !raw.is_object() {
            return Err(DefinitionError::NotAnObject);
        }
        let metric_type = required_str(raw, "type")?;
        let name = required_str(raw, "name")?;
        let description = required_str(raw, "description")?;
        let kind = match required_str(raw, "mtype")? {
            "counter" => Kind::Counter,
            "gauge" => Kind::Gauge,
            _ => return Err(DefinitionError::WrongType("mtype", "counter|gauge")),
        };
        let unit = required_str(raw, "unit")?;
        let tags = match raw.get("tags") {
            Some(&Value::Array(ref tags)) => {
                let mut res = Vec::with_capacity(tags.len());
                for tag in tags {
                    match tag.as_str() {
                        Some(tag) => res.push(tag.to_string()),
                        None => return Err(DefinitionError::WrongType("tags", "list of strings")),
                    }
                }
                res
            }
            Some(_) => return Err(DefinitionError::WrongType("tags", "list")),
            None => return Err(DefinitionError::Missing("tags")),
        };
        Ok(Definition {
            metric_type: metric_type.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            kind: kind,
            unit: unit.to_string(),
            tags: tags,
        })
    }
}

lazy_static! {
    static ref SYSTEM_DEFINITIONS: Vec<Definition> = vec![
        Definition::new(constants::SYSTEM, "metrics_in", Kind::Counter)
            .description("Inbound metrics processed")
            .tag("name")
            .tag("namespace"),
        Definition::new(constants::SYSTEM, "metrics_out", Kind::Counter)
            .description("Outbound metrics processed")
            .tag("name")
            .tag("namespace"),
        Definition::new(constants::SYSTEM, "queue_length", Kind::Gauge)
            .description("Metrics queue length")
            .tag("name")
            .tag("target"),
        Definition::new(constants::SYSTEM, "metric_interval", Kind::Gauge)
            .description("Interval on which OM metrics are collected")
            .unit("seconds")
            .tag("name")
            .tag("metric_type"),
    ];
}

type ByName = HashMap<String, Definition>;
type ByType = HashMap<String, ByName>;

/// Definitions keyed by source, then type, then name.
#[derive(Clone, Debug, Default)]
pub struct Definitions {
    inner: HashMap<String, ByType>,
}

impl Definitions {
    /// Create an empty registry.
    pub fn new() -> Definitions {
        Definitions::default()
    }

    /// Create a registry holding the gateway's own system definitions.
    pub fn with_system() -> Definitions {
        let mut defs = Definitions::new();
        for def in SYSTEM_DEFINITIONS.iter() {
            defs.insert(constants::OPENMOTICS, def.clone());
        }
        defs
    }

    /// Register a definition for `source`, replacing any previous definition
    /// of the same type and name.
    pub fn insert<S>(&mut self, source: S, definition: Definition)
    where
        S: Into<String>,
    {
        self.inner
            .entry(source.into())
            .or_insert_with(Default::default)
            .entry(definition.metric_type.clone())
            .or_insert_with(Default::default)
            .insert(definition.name.clone(), definition);
    }

    /// Validate and register raw definition records for `source`.
    ///
    /// Each refused record is reported once through `log` and skipped. The
    /// number of registered definitions is returned.
    pub fn load<F>(&mut self, source: &str, raw: &[Value], mut log: F) -> usize
    where
        F: FnMut(&str),
    {
        let mut loaded = 0;
        for record in raw {
            match Definition::from_value(record) {
                Ok(def) => {
                    self.insert(source, def);
                    loaded += 1;
                }
                Err(e) => log(&format!("{}", e)),
            }
        }
        loaded
    }

    /// Look up the definition of a metric.
    pub fn get(&self, source: &str, metric_type: &str, name: &str) -> Option<&Definition> {
        self.inner
            .get(source)
            .and_then(|types| types.get(metric_type))
            .and_then(|names| names.get(name))
    }

    /// Total number of registered definitions.
    pub fn len(&self) -> usize {
        self.inner
            .values()
            .flat_map(|types| types.values())
            .map(|names| names.len())
            .sum()
    }

    /// True if no definition is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn power() -> Value {
        json!({
            "type": "energy",
            "name": "power",
            "description": "Total energy consumed (in kWh)",
            "mtype": "counter",
            "unit": "Wh",
            "tags": ["device", "id"]
        })
    }

    #[test]
    fn parses_complete_definition() {
        let def = Definition::from_value(&power()).unwrap();
        assert_eq!("energy", def.metric_type);
        assert_eq!("power", def.name);
        assert_eq!(Kind::Counter, def.kind);
        assert_eq!(vec!["device".to_string(), "id".to_string()], def.tags);
    }

    #[test]
    fn reports_first_missing_key() {
        let mut raw = power();
        raw.as_object_mut().unwrap().remove("unit");
        raw.as_object_mut().unwrap().remove("tags");
        assert_eq!(Err(DefinitionError::Missing("unit")), Definition::from_value(&raw));
    }

    #[test]
    fn rejects_unknown_mtype() {
        let mut raw = power();
        raw["mtype"] = json!("histogram");
        assert_eq!(
            Err(DefinitionError::WrongType("mtype", "counter|gauge")),
            Definition::from_value(&raw)
        );
    }

    #[test]
    fn rejects_non_list_tags() {
        let mut raw = power();
        raw["tags"] = json!("id");
        assert_eq!(
            Err(DefinitionError::WrongType("tags", "list")),
            Definition::from_value(&raw)
        );
        raw["tags"] = json!(["id", 4]);
        assert_eq!(
            Err(DefinitionError::WrongType("tags", "list of strings")),
            Definition::from_value(&raw)
        );
    }

    #[test]
    fn load_logs_each_refusal_once() {
        let mut defs = Definitions::new();
        let mut bad = power();
        bad["description"] = json!(12);
        let mut logged = Vec::new();
        let loaded = defs.load("plugin", &[power(), bad, json!(3)], |msg| {
            logged.push(msg.to_string())
        });
        assert_eq!(1, loaded);
        assert_eq!(2, logged.len());
        assert!(logged[0].contains("description"));
        assert!(defs.get("plugin", "energy", "power").is_some());
        assert!(defs.get("other", "energy", "power").is_none());
    }

    #[test]
    fn system_definitions_are_registered() {
        let defs = Definitions::with_system();
        assert_eq!(4, defs.len());
        let queue = defs
            .get(constants::OPENMOTICS, constants::SYSTEM, "queue_length")
            .unwrap();
        assert_eq!(Kind::Gauge, queue.kind);
        assert_eq!(vec!["name".to_string(), "target".to_string()], queue.tags);
    }

    #[test]
    fn insert_replaces_same_name() {
        let mut defs = Definitions::new();
        defs.insert("OM", Definition::new("energy", "power", Kind::Counter));
        defs.insert("OM", Definition::new("energy", "power", Kind::Gauge).tag("id"));
        assert_eq!(1, defs.len());
        assert_eq!(Kind::Gauge, defs.get("OM", "energy", "power").unwrap().kind);
    }
}
