use std::collections::BTreeMap;

use influxdb_line_protocol::LineProtocolBuilder;

use super::MetricsEncoder;

/// InfluxDB line protocol encoder
pub struct InfluxEncoder;

impl InfluxEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InfluxEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsEncoder for InfluxEncoder {
    fn encode_metrics(
        &self,
        measurement: &str,
        tags: &BTreeMap<String, String>,
        fields: &BTreeMap<String, f64>,
        timestamp: i64,
    ) -> String {
        let mut builder = LineProtocolBuilder::new().measurement(measurement);

        for (key, value) in tags {
            builder = builder.tag(key, value);
        }

        // The first field moves the builder into its AfterField state
        let mut entries = fields.iter();
        let lp_built = match entries.next() {
            Some((first_key, first_value)) => {
                let mut after_first_field = builder.field(first_key, *first_value);
                for (key, value) in entries {
                    after_first_field = after_first_field.field(key, *value);
                }
                after_first_field.timestamp(timestamp).close_line().build()
            }
            None => builder
                .field("_empty", true)
                .timestamp(timestamp)
                .close_line()
                .build(),
        };
        String::from_utf8_lossy(&lp_built).into_owned()
    }
}
