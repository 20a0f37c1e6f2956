use crate::timebase::{Clock, TimeBase};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-frame data handed to every component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub frame: u64,
    pub timestamp_us: u64,
    pub dt_s: f64,
}

/// Something the host drives: one start signal, then one tick per frame.
pub trait FrameComponent {
    fn on_start(&mut self);
    fn on_tick(&mut self, ctx: &FrameContext);
}

impl<T: FrameComponent + ?Sized> FrameComponent for Box<T> {
    fn on_start(&mut self) {
        (**self).on_start();
    }

    fn on_tick(&mut self, ctx: &FrameContext) {
        (**self).on_tick(ctx);
    }
}

impl<T: FrameComponent + ?Sized> FrameComponent for Rc<RefCell<T>> {
    fn on_start(&mut self) {
        self.borrow_mut().on_start();
    }

    fn on_tick(&mut self, ctx: &FrameContext) {
        self.borrow_mut().on_tick(ctx);
    }
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub frame_time: Duration,
    pub overrun_limit: Duration,
}

impl SchedulerConfig {
    pub fn with_fps(fps: u32) -> Self {
        Self {
            frame_time: Duration::from_secs_f64(1.0 / f64::from(fps.max(1))),
            ..Self::default()
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_time: Duration::from_micros(16_667),
            overrun_limit: Duration::from_millis(250),
        }
    }
}

#[derive(Clone, Default, Debug, Serialize)]
pub struct SchedulerStats {
    pub frames_executed: u64,
    pub frames_missed: u64,
    pub max_jitter_us: u64,
    pub overruns: u64,
}

pub struct FrameScheduler<C: Clock = TimeBase> {
    components: Vec<Box<dyn FrameComponent>>,
    config: SchedulerConfig,
    clock: C,
    stats: SchedulerStats,
    started: bool,
    frame: u64,
}

impl<C: Clock> FrameScheduler<C> {
    pub fn new(config: SchedulerConfig, clock: C) -> Self {
        Self {
            components: Vec::new(),
            config,
            clock,
            stats: SchedulerStats::default(),
            started: false,
            frame: 0,
        }
    }

    /// Add a component. Ticks are delivered in registration order. A component
    /// registered after `start` receives its start signal immediately.
    pub fn register<F: FrameComponent + 'static>(&mut self, component: F) {
        let mut component: Box<dyn FrameComponent> = Box::new(component);
        if self.started {
            component.on_start();
        }
        self.components.push(component);
    }

    /// Deliver the start signal to every registered component. Only the first call has effect.
    pub fn start(&mut self) {
        if self.started {
            debug!("Scheduler already started");
            return;
        }
        self.started = true;
        debug!(components = self.components.len(), "Starting frame components");
        for component in &mut self.components {
            component.on_start();
        }
    }

    /// Run a single frame. Starts the scheduler first if needed.
    pub fn step(&mut self, dt: Duration) -> FrameContext {
        if !self.started {
            self.start();
        }

        let ctx = FrameContext {
            frame: self.frame,
            timestamp_us: self.clock.now_us(),
            dt_s: dt.as_secs_f64(),
        };
        for component in &mut self.components {
            component.on_tick(&ctx);
        }

        self.frame += 1;
        self.stats.frames_executed += 1;
        ctx
    }

    /// Pace frames at `frame_time` until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        self.start();

        let frame_time = self.config.frame_time;
        let mut next_frame = Instant::now();

        while !stop.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now < next_frame {
                thread::sleep(next_frame - now);
            } else if now > next_frame {
                self.stats.frames_missed += 1;
                let overrun = now.duration_since(next_frame);
                if overrun > self.config.overrun_limit {
                    self.stats.overruns += 1;
                    warn!(
                        overrun_ms = overrun.as_millis() as u64,
                        frame = self.frame,
                        "Frame overrun, resynchronizing"
                    );
                    next_frame = now;
                }
            }

            let frame_start = Instant::now();
            self.step(frame_time);

            let frame_duration = frame_start.elapsed();
            let jitter_us = frame_duration.saturating_sub(frame_time).as_micros() as u64;
            self.stats.max_jitter_us = self.stats.max_jitter_us.max(jitter_us);

            next_frame += frame_time;
        }
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}
