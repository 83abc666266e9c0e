pub mod record;
pub mod reporter;
pub mod sampler;
pub mod store;

pub use record::{MetricEncoder, MetricKind, MetricRecord, MetricValue, MetricsBatch};
pub use reporter::Reporter;
pub use sampler::{OsProbe, ResourceSampler, SystemProbe};
pub use store::{CounterSnapshot, CounterStore, EndpointTimer};
