mod app;
mod config;
mod logging;
mod telemetry;
mod terminal;

pub use app::run_from_args;
