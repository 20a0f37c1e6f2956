pub mod display_log;
pub mod metrics;
