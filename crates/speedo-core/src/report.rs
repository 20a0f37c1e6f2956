use crate::format::{format_speed, SPEED_UNIT};
use crate::frame::{FrameComponent, FrameContext};
use crate::monitor::SpeedMonitor;
use crate::provider::LocationProvider;
use crate::sink::TextSink;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

pub trait SpeedSource {
    fn current_speed(&self) -> f64;
}

impl<S: TextSink, P: LocationProvider> SpeedSource for SpeedMonitor<S, P> {
    fn current_speed(&self) -> f64 {
        SpeedMonitor::current_speed(self)
    }
}

impl<T: SpeedSource + ?Sized> SpeedSource for Rc<RefCell<T>> {
    fn current_speed(&self) -> f64 {
        self.borrow().current_speed()
    }
}

/// Logs the displayed speed every `interval` frames while moving.
pub struct SpeedReporter<S> {
    source: S,
    interval: u64,
    reports: u64,
}

impl<S: SpeedSource> SpeedReporter<S> {
    pub fn new(source: S, interval: u64) -> Self {
        Self {
            source,
            interval: interval.max(1),
            reports: 0,
        }
    }

    pub fn reports(&self) -> u64 {
        self.reports
    }
}

impl<S: SpeedSource> FrameComponent for SpeedReporter<S> {
    fn on_start(&mut self) {}

    fn on_tick(&mut self, ctx: &FrameContext) {
        if ctx.frame % self.interval != 0 {
            return;
        }
        let speed = self.source.current_speed();
        if speed > 0.0 {
            self.reports += 1;
            info!(frame = ctx.frame, "Current speed: {} {SPEED_UNIT}", format_speed(speed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Gauge(Rc<Cell<f64>>);

    impl SpeedSource for Gauge {
        fn current_speed(&self) -> f64 {
            self.0.get()
        }
    }

    fn frame(n: u64) -> FrameContext {
        FrameContext {
            frame: n,
            timestamp_us: n * 16_667,
            dt_s: 1.0 / 60.0,
        }
    }

    #[test]
    fn reports_only_on_interval_while_moving() {
        let speed = Rc::new(Cell::new(0.0));
        let mut reporter = SpeedReporter::new(Gauge(Rc::clone(&speed)), 10);

        for n in 0..20 {
            reporter.on_tick(&frame(n));
        }
        assert_eq!(reporter.reports(), 0);

        speed.set(12.3);
        for n in 20..45 {
            reporter.on_tick(&frame(n));
        }
        // frames 20, 30 and 40
        assert_eq!(reporter.reports(), 3);
    }

    #[test]
    fn zero_interval_reports_every_frame() {
        let speed = Rc::new(Cell::new(1.0));
        let mut reporter = SpeedReporter::new(Gauge(speed), 0);
        reporter.on_tick(&frame(1));
        reporter.on_tick(&frame(2));
        assert_eq!(reporter.reports(), 2);
    }
}
