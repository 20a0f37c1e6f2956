use crate::infra::display_log::{DisplayEventType, DisplayLogger, LoggedSink};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry::{self, MetricsProbe};
use crate::runtime::terminal::TerminalSink;
use speedo_core::{
    DriveProfile, FrameScheduler, LocationDriver, SchedulerConfig, SignalDropout,
    SimulatedLocation, SpeedMonitor, SpeedReporter, TimeBase,
};
use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

type HudSink = LoggedSink<TerminalSink>;
type HudMonitor = SpeedMonitor<HudSink, Rc<SimulatedLocation>>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to initialize logging: {0}")]
    Logging(#[source] io::Error),
    #[error("failed to open display log {}: {source}", .path.display())]
    DisplayLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn run_from_args() -> ExitCode {
    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("speedo: {e}");
            return ExitCode::from(2);
        }
    };
    if config.show_help {
        RuntimeConfig::print_help();
        return ExitCode::SUCCESS;
    }
    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("speedo: {e}");
            ExitCode::FAILURE
        }
    }
}

pub fn run(config: RuntimeConfig) -> Result<(), AppError> {
    let _log_guard =
        init_tracing(config.json_logs, config.log_file.as_deref()).map_err(AppError::Logging)?;

    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let timebase = TimeBase::new();
    let display_log = init_display_log(config.display_log.as_deref(), timebase)?;

    record(
        display_log.as_deref(),
        DisplayEventType::SystemStart,
        serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "fps": config.fps,
            "refresh": format!("{:?}", config.refresh),
            "hidden": config.hidden,
        }),
    );

    let location = Rc::new(SimulatedLocation::new(DriveProfile {
        warmup_s: config.warmup_s,
        cruise_mph: config.cruise_mph,
        ..DriveProfile::default()
    }));
    let resolved_log = display_log.clone();
    location.subscribe_location_first_set(move |point| {
        record(
            resolved_log.as_deref(),
            DisplayEventType::LocationResolved,
            serde_json::json!({
                "latitude": point.latitude,
                "longitude": point.longitude,
            }),
        );
    });
    location.subscribe_maptiles_loaded(|| info!("Map tiles loaded"));

    let monitor: Rc<RefCell<HudMonitor>> = Rc::new(RefCell::new(SpeedMonitor::new(config.refresh)));
    {
        let mut monitor = monitor.borrow_mut();
        monitor.bind_sink(LoggedSink::new(TerminalSink::stdout(), display_log.clone()));
        monitor.bind_provider(Rc::clone(&location));
        if config.hidden {
            monitor.set_display_visible(false);
        }
    }

    let mut scheduler = FrameScheduler::new(SchedulerConfig::with_fps(config.fps), timebase);
    scheduler.register(LocationDriver::new(Rc::clone(&location)));
    if let Some(start_s) = config.drop_signal_at {
        scheduler.register(SignalDropout::new(
            Rc::clone(&location),
            start_s,
            config.drop_signal_for,
        ));
    }
    scheduler.register(Rc::clone(&monitor));
    scheduler.register(SpeedReporter::new(Rc::clone(&monitor), config.report_every));
    scheduler.register(MetricsProbe::new(Rc::clone(&monitor)));

    let stop = Arc::new(AtomicBool::new(false));
    if let Some(seconds) = config.run_seconds {
        info!(seconds, "Running for limited duration");
        let stop_timer = Arc::clone(&stop);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(seconds));
            stop_timer.store(true, Ordering::Relaxed);
        });
    }

    {
        let monitor = monitor.borrow();
        info!(
            fps = config.fps,
            refresh = ?monitor.policy(),
            provider_bound = monitor.has_provider(),
            warmup_s = config.warmup_s,
            drop_signal_at = ?config.drop_signal_at,
            "Starting speed readout"
        );
    }
    scheduler.run(&stop);

    let mut monitor = monitor.borrow_mut();
    if let Some(sink) = monitor.sink_mut() {
        sink.inner_mut().finish();
    }
    let scheduler_stats = scheduler.stats();
    let monitor_stats = monitor.stats();
    let final_text = monitor
        .sink()
        .map(|sink| sink.inner().text().to_string())
        .unwrap_or_default();

    info!(
        frames_executed = scheduler_stats.frames_executed,
        frames_missed = scheduler_stats.frames_missed,
        max_jitter_us = scheduler_stats.max_jitter_us,
        display_writes = monitor_stats.display_writes,
        provider_faults = monitor_stats.provider_faults,
        final_speed_mph = monitor.current_speed(),
        final_text = %final_text,
        "Run complete"
    );

    record(
        display_log.as_deref(),
        DisplayEventType::SystemShutdown,
        serde_json::json!({
            "scheduler": scheduler_stats,
            "monitor": monitor_stats,
        }),
    );

    Ok(())
}

fn init_display_log(
    path: Option<&Path>,
    timebase: TimeBase,
) -> Result<Option<Arc<DisplayLogger>>, AppError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let logger = DisplayLogger::new(path, timebase).map_err(|source| AppError::DisplayLog {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Display logging enabled");
    Ok(Some(Arc::new(logger)))
}

fn record(logger: Option<&DisplayLogger>, event_type: DisplayEventType, details: serde_json::Value) {
    if let Some(logger) = logger {
        if let Err(e) = logger.log_event(event_type, details) {
            warn!(error = %e, "Failed to append to display log");
        }
    }
}
