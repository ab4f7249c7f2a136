use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::domain::Gauge;
use crate::domain::GaugePublisher;

pub mod encoders;
use encoders::create_encoder;
use encoders::MetricsEncoder;

/// Publishes gauges as encoded lines on the `metrics` tracing target.
///
/// The logging layer routes that target to the metrics file.
pub struct MetricsPublisher {
    encoder: Box<dyn MetricsEncoder + Send + Sync>,
    host: String,
}

impl MetricsPublisher {
    pub fn new(metrics_format: &str, host: impl Into<String>) -> Self {
        Self {
            encoder: create_encoder(metrics_format),
            host: host.into(),
        }
    }

    pub fn encode(&self, gauge: &Gauge, timestamp: i64) -> String {
        self.encoder
            .encode_gauge(&gauge.name, gauge.value, &gauge.instance, &self.host, timestamp)
    }
}

impl GaugePublisher for MetricsPublisher {
    fn publish(&self, gauge: Gauge, timestamp: i64) {
        let metrics_str = self.encode(&gauge, timestamp);
        tracing::info!(
            target: "metrics",
            msg = %metrics_str,
        );
    }
}

/// Milliseconds since the Unix epoch
pub fn current_time() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gauge() -> Gauge {
        Gauge {
            name: "nebulaceph.webserver__.one-7-0-1.rd".to_string(),
            value: 12.0,
            instance: "7".to_string(),
        }
    }

    #[test]
    fn encodes_with_host_and_instance() {
        let publisher = MetricsPublisher::new("influx", "node1");

        let line = publisher.encode(&gauge(), 1000);

        assert!(line.starts_with("nebulaceph.webserver__.one-7-0-1.rd,host=node1,instance=7 "));
        assert!(line.contains("value=12"));
    }

    #[test]
    fn json_format() {
        let publisher = MetricsPublisher::new("json", "node1");

        let parsed: serde_json::Value =
            serde_json::from_str(&publisher.encode(&gauge(), 1000)).unwrap();

        assert_eq!(parsed["measure"], "nebulaceph.webserver__.one-7-0-1.rd");
        assert_eq!(parsed["tag"]["instance"], "7");
    }

    #[test]
    fn publish_does_not_panic_without_subscriber() {
        MetricsPublisher::new("influx", "node1").publish(gauge(), current_time());
    }

    #[test]
    fn current_time_is_milliseconds() {
        // after 2020-01-01 and before 2100-01-01
        let now = current_time();
        assert!(now > 1_577_836_800_000);
        assert!(now < 4_102_444_800_000);
    }
}
