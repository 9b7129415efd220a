use metric::Metric;
use serde_json;
use sink::{DeliveryError, Receiver};
use std::io::{self, Write};

/// Console receiver
///
/// Prints every metric it receives to stdout, one JSON document per line.
/// Intended for demonstration and debugging.
#[derive(Debug, Default)]
pub struct Console {
    delivered: u64,
}

impl Console {
    /// Create a new Console receiver
    pub fn new() -> Console {
        Console::default()
    }

    /// Number of metrics printed so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

/// Render a metric as a single line.
pub fn fmt_line(metric: &Metric) -> Result<String, DeliveryError> {
    serde_json::to_string(metric).map_err(|e| DeliveryError::Rejected(format!("{}", e)))
}

impl Receiver for Console {
    fn receive(&mut self, metric: &Metric) -> Result<(), DeliveryError> {
        let line = fmt_line(metric)?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{}", line).map_err(|e| DeliveryError::Rejected(format!("{}", e)))?;
        self.delivered += 1;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json;

    #[test]
    fn line_is_json() {
        let metric = Metric::new("OM", "energy", 12.0).name("power").value(3.5);
        let line = fmt_line(&metric).unwrap();
        assert!(!line.contains('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(metric.to_value(), parsed);
    }

    #[test]
    fn counts_deliveries() {
        let mut console = Console::new();
        console.receive(&Metric::new("OM", "energy", 12.0)).unwrap();
        assert_eq!(1, console.delivered());
    }
}
