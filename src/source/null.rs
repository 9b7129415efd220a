use metric::Metric;
use serde_json::Value;
use sink::DeliveryError;
use source::{Collector, PluginRuntime, Producer, ProducerError};
use std::collections::HashMap;

/// Null plugin runtime
///
/// A runtime with no plugins: it produces nothing, reaches no subscriber and
/// has no delivery queues. Intended for testing and for running the pipeline
/// on its own self-telemetry.
#[derive(Debug, Default)]
pub struct NullRuntime {}

impl Producer for NullRuntime {
    fn collect(&self) -> Result<Vec<Value>, ProducerError> {
        Ok(Vec::new())
    }
}

impl PluginRuntime for NullRuntime {
    fn distribute(&self, _: &Metric) -> Result<usize, DeliveryError> {
        // no subscribers, nothing reached
        Ok(0)
    }

    fn queue_depths(&self) -> Result<HashMap<String, usize>, ProducerError> {
        Ok(HashMap::new())
    }
}

/// Null hardware collector
///
/// Produces nothing and collects nothing on any interval.
#[derive(Debug, Default)]
pub struct NullCollector {}

impl Producer for NullCollector {
    fn collect(&self) -> Result<Vec<Value>, ProducerError> {
        Ok(Vec::new())
    }
}

impl Collector for NullCollector {
    fn intervals(&self) -> Result<HashMap<String, u64>, ProducerError> {
        Ok(HashMap::new())
    }
}
