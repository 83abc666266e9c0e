use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

// ─── Public types ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    /// Monotonic, cumulative temporality.
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Double(f64),
}

/// One data point, ready for the collector.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub name: String,
    pub unit: String,
    pub kind: MetricKind,
    pub value: MetricValue,
    pub time_unix_nano: u64,
    pub attributes: Vec<(String, String)>,
}

/// Builds records stamped with this process's `source` attribute.
#[derive(Debug, Clone)]
pub struct MetricEncoder {
    source: String,
}

/// Request body of one metrics push.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsBatch {
    pub resource_metrics: [ResourceMetrics; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetrics {
    pub scope_metrics: [ScopeMetrics; 1],
}

#[derive(Debug, Serialize)]
pub struct ScopeMetrics {
    pub metrics: Vec<MetricRecord>,
}

// ─── Impl ────────────────────────────────────────────────────────

impl MetricEncoder {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Attributes keep the caller's order, with `source` appended last.
    pub fn encode(
        &self,
        name: &str,
        value: MetricValue,
        unit: &str,
        kind: MetricKind,
        attributes: &[(&str, &str)],
    ) -> MetricRecord {
        let mut attrs: Vec<(String, String)> = attributes
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        attrs.push(("source".into(), self.source.clone()));

        MetricRecord {
            name: name.to_owned(),
            unit: unit.to_owned(),
            kind,
            value,
            time_unix_nano: now_unix_nanos(),
            attributes: attrs,
        }
    }

    pub fn gauge_int(&self, name: &str, value: i64, attributes: &[(&str, &str)]) -> MetricRecord {
        self.encode(name, MetricValue::Int(value), "1", MetricKind::Gauge, attributes)
    }

    pub fn gauge_double(
        &self,
        name: &str,
        value: f64,
        unit: &str,
        attributes: &[(&str, &str)],
    ) -> MetricRecord {
        self.encode(name, MetricValue::Double(value), unit, MetricKind::Gauge, attributes)
    }
}

impl MetricsBatch {
    pub fn new(metrics: Vec<MetricRecord>) -> Self {
        Self {
            resource_metrics: [ResourceMetrics {
                scope_metrics: [ScopeMetrics { metrics }],
            }],
        }
    }
}

pub fn now_unix_nanos() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

// ─── Wire format ─────────────────────────────────────────────────

impl Serialize for MetricRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("unit", &self.unit)?;
        let body = Aggregation(self);
        match self.kind {
            MetricKind::Gauge => map.serialize_entry("gauge", &body)?,
            MetricKind::Sum => map.serialize_entry("sum", &body)?,
        }
        map.end()
    }
}

/// The `gauge` / `sum` object of a record.
struct Aggregation<'a>(&'a MetricRecord);

impl Serialize for Aggregation<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let record = self.0;
        let is_sum = record.kind == MetricKind::Sum;
        let mut s = serializer.serialize_struct("Aggregation", if is_sum { 3 } else { 1 })?;
        s.serialize_field("dataPoints", &[DataPoint(record)])?;
        if is_sum {
            s.serialize_field("aggregationTemporality", "AGGREGATION_TEMPORALITY_CUMULATIVE")?;
            s.serialize_field("isMonotonic", &true)?;
        }
        s.end()
    }
}

struct DataPoint<'a>(&'a MetricRecord);

impl Serialize for DataPoint<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let record = self.0;
        let mut map = serializer.serialize_map(Some(3))?;
        match record.value {
            MetricValue::Int(v) => map.serialize_entry("asInt", &v)?,
            MetricValue::Double(v) => map.serialize_entry("asDouble", &v)?,
        }
        map.serialize_entry("timeUnixNano", &record.time_unix_nano)?;
        let attributes: Vec<Attribute<'_>> = record
            .attributes
            .iter()
            .map(|(key, value)| Attribute {
                key,
                value: StringValue { string_value: value },
            })
            .collect();
        map.serialize_entry("attributes", &attributes)?;
        map.end()
    }
}

#[derive(Serialize)]
struct Attribute<'a> {
    key: &'a str,
    value: StringValue<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StringValue<'a> {
    string_value: &'a str,
}
