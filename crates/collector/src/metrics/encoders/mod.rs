use std::collections::BTreeMap;

pub mod influx;
pub mod json;

/// Trait for encoding metrics data into different formats
pub trait MetricsEncoder: Send + Sync {
    /// Encode metrics with measurement name, tags, fields, and timestamp
    fn encode_metrics(
        &self,
        measurement: &str,
        tags: &BTreeMap<String, String>,
        fields: &BTreeMap<String, f64>,
        timestamp: i64,
    ) -> String;

    /// Encode one gauge sample: the metric name is the measurement, `value` the only field
    fn encode_gauge(
        &self,
        name: &str,
        value: f64,
        instance: &str,
        host: &str,
        timestamp: i64,
    ) -> String {
        let mut tags = BTreeMap::new();
        tags.insert("host".to_string(), host.to_string());
        tags.insert("instance".to_string(), instance.to_string());

        let mut fields = BTreeMap::new();
        fields.insert("value".to_string(), value);

        self.encode_metrics(name, &tags, &fields, timestamp)
    }
}

/// Factory function to create encoders based on format string
pub fn create_encoder(format: &str) -> Box<dyn MetricsEncoder + Send + Sync> {
    match format.to_lowercase().as_str() {
        "json" => Box::new(json::JsonEncoder::new()),
        _ => Box::new(influx::InfluxEncoder::new()),
    }
}
