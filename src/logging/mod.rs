pub mod sanitize;
pub mod shipper;

pub use sanitize::sanitize;
pub use shipper::{status_to_level, EventType, HttpLogRecord, LogEvent, LogLevel, LogShipper};
