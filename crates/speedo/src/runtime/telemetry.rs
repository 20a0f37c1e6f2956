use crate::infra::metrics::{
    init_metrics, serve_metrics, DISPLAYED_SPEED_MPH, DISPLAY_WRITES, FRAMES, PROVIDER_FAULTS,
};
use speedo_core::{FrameComponent, FrameContext, LocationProvider, SpeedMonitor, TextSink};
use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use tracing::info;

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

/// Copies monitor state into the Prometheus collectors once per frame.
pub struct MetricsProbe<S, P> {
    monitor: Rc<RefCell<SpeedMonitor<S, P>>>,
    last_writes: u64,
    last_faults: u64,
}

impl<S: TextSink, P: LocationProvider> MetricsProbe<S, P> {
    pub fn new(monitor: Rc<RefCell<SpeedMonitor<S, P>>>) -> Self {
        Self {
            monitor,
            last_writes: 0,
            last_faults: 0,
        }
    }
}

impl<S: TextSink, P: LocationProvider> FrameComponent for MetricsProbe<S, P> {
    fn on_start(&mut self) {}

    fn on_tick(&mut self, _ctx: &FrameContext) {
        let monitor = self.monitor.borrow();
        let stats = monitor.stats();

        FRAMES.inc();
        DISPLAYED_SPEED_MPH.set(monitor.current_speed());
        if stats.display_writes > self.last_writes {
            DISPLAY_WRITES.inc_by(stats.display_writes - self.last_writes);
            self.last_writes = stats.display_writes;
        }
        if stats.provider_faults > self.last_faults {
            PROVIDER_FAULTS.inc_by(stats.provider_faults - self.last_faults);
            self.last_faults = stats.provider_faults;
        }
    }
}
