pub mod aggregation;
pub mod calendar;
pub mod report;
pub mod session_log;
pub mod session_meter;
pub mod status_payload;
