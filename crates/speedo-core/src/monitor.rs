use crate::format::display_text;
use crate::frame::{FrameComponent, FrameContext};
use crate::provider::{LocationProvider, ProviderError};
use crate::sink::TextSink;
use serde::Serialize;
use std::rc::Rc;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// When a successful reading is written to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Write only when the reading differs from the displayed speed.
    #[default]
    OnChange,
    /// Write every successful reading, even if unchanged.
    Always,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown refresh policy '{0}' (expected on-change or always)")]
pub struct ParsePolicyError(pub String);

impl FromStr for RefreshPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on-change" | "on_change" => Ok(Self::OnChange),
            "always" => Ok(Self::Always),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    #[default]
    Unstarted,
    Running,
}

#[derive(Clone, Default, Debug, PartialEq, Serialize)]
pub struct MonitorStats {
    pub ticks: u64,
    pub samples: u64,
    pub display_writes: u64,
    pub provider_faults: u64,
}

/// Keeps a text sink showing the user's current speed.
///
/// `current_speed` always equals the last value written to the sink (0 before
/// the first write). Provider failures never escape: they reset the readout
/// to `0.0 mph` on every faulting tick.
pub struct SpeedMonitor<S, P = Rc<dyn LocationProvider>> {
    provider: Option<P>,
    sink: Option<S>,
    current_speed: f64,
    policy: RefreshPolicy,
    state: MonitorState,
    armed_samplers: u32,
    consecutive_faults: u64,
    stats: MonitorStats,
}

impl<S: TextSink, P: LocationProvider> SpeedMonitor<S, P> {
    pub fn new(policy: RefreshPolicy) -> Self {
        Self {
            provider: None,
            sink: None,
            current_speed: 0.0,
            policy,
            state: MonitorState::Unstarted,
            armed_samplers: 0,
            consecutive_faults: 0,
            stats: MonitorStats::default(),
        }
    }

    pub fn with_collaborators(provider: P, sink: S, policy: RefreshPolicy) -> Self {
        let mut monitor = Self::new(policy);
        monitor.provider = Some(provider);
        monitor.sink = Some(sink);
        monitor
    }

    /// Replace the location provider. Allowed before or after `start`.
    pub fn bind_provider(&mut self, provider: P) {
        self.provider = Some(provider);
        debug!("Location provider bound");
    }

    pub fn unbind_provider(&mut self) -> Option<P> {
        self.provider.take()
    }

    /// Replace the text sink, returning the previous one. A sink bound while
    /// sampling is running is brought up to date immediately.
    pub fn bind_sink(&mut self, sink: S) -> Option<S> {
        let previous = self.sink.replace(sink);
        if self.state == MonitorState::Running && self.provider.is_some() {
            self.refresh_display();
        }
        previous
    }

    /// Arm per-tick sampling. The first call moves the monitor to `Running`
    /// and refreshes the readout if a provider is bound. A repeated call arms
    /// one more sampler per tick, which only repeats the same read.
    pub fn start(&mut self) {
        if self.state == MonitorState::Running {
            warn!(armed = self.armed_samplers + 1, "Speed monitor started again");
        } else {
            info!(policy = ?self.policy, "Speed monitor started");
        }
        self.state = MonitorState::Running;

        if self.provider.is_some() {
            self.refresh_display();
        }
        self.armed_samplers += 1;
    }

    fn sample(&mut self) {
        let Some(provider) = self.provider.as_ref() else {
            return;
        };
        self.stats.samples += 1;

        let reading = provider.user_speed().and_then(|speed| {
            if speed.is_finite() {
                Ok(speed)
            } else {
                Err(ProviderError::NonFinite { value: speed })
            }
        });

        match reading {
            Ok(speed) => {
                if self.consecutive_faults > 0 {
                    info!(
                        faults = self.consecutive_faults,
                        speed_mph = speed,
                        "Location provider recovered"
                    );
                    self.consecutive_faults = 0;
                }
                if self.policy == RefreshPolicy::Always || speed != self.current_speed {
                    self.current_speed = speed;
                    self.refresh_display();
                }
            }
            Err(err) => {
                self.stats.provider_faults += 1;
                self.consecutive_faults += 1;
                if self.consecutive_faults == 1 {
                    warn!(error = %err, "Failed to read user speed, showing zero");
                } else {
                    debug!(error = %err, faults = self.consecutive_faults, "User speed still unavailable");
                }
                self.current_speed = 0.0;
                self.refresh_display();
            }
        }
    }

    fn refresh_display(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            sink.set_text(&display_text(self.current_speed));
            self.stats.display_writes += 1;
        }
    }

    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }

    pub fn set_display_visible(&mut self, visible: bool) {
        if let Some(sink) = self.sink.as_mut() {
            sink.set_visible(visible);
            debug!(visible, "Speed display visibility changed");
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn sink(&self) -> Option<&S> {
        self.sink.as_ref()
    }

    pub fn sink_mut(&mut self) -> Option<&mut S> {
        self.sink.as_mut()
    }
}

impl<S: TextSink, P: LocationProvider> Default for SpeedMonitor<S, P> {
    fn default() -> Self {
        Self::new(RefreshPolicy::default())
    }
}

impl<S: TextSink, P: LocationProvider> FrameComponent for SpeedMonitor<S, P> {
    fn on_start(&mut self) {
        self.start();
    }

    fn on_tick(&mut self, _ctx: &FrameContext) {
        self.stats.ticks += 1;
        if self.state != MonitorState::Running {
            return;
        }
        for _ in 0..self.armed_samplers {
            self.sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FixedSpeed;
    use crate::sink::MemorySink;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays a fixed sequence of readings, repeating the last one.
    struct Scripted {
        readings: RefCell<VecDeque<Result<f64, ProviderError>>>,
        last: RefCell<Result<f64, ProviderError>>,
    }

    impl Scripted {
        fn new(readings: Vec<Result<f64, ProviderError>>) -> Rc<Self> {
            Rc::new(Self {
                readings: RefCell::new(readings.into()),
                last: RefCell::new(Ok(0.0)),
            })
        }

        fn push(&self, reading: Result<f64, ProviderError>) {
            self.readings.borrow_mut().push_back(reading);
        }
    }

    impl LocationProvider for Scripted {
        fn user_speed(&self) -> Result<f64, ProviderError> {
            if let Some(next) = self.readings.borrow_mut().pop_front() {
                *self.last.borrow_mut() = next;
            }
            self.last.borrow().clone()
        }
    }

    fn fault() -> Result<f64, ProviderError> {
        Err(ProviderError::LocationUnresolved)
    }

    fn tick<S: TextSink, P: LocationProvider>(monitor: &mut SpeedMonitor<S, P>) {
        monitor.on_tick(&FrameContext {
            frame: 0,
            timestamp_us: 0,
            dt_s: 1.0 / 60.0,
        });
    }

    fn monitor_with(
        provider: Rc<Scripted>,
        policy: RefreshPolicy,
    ) -> SpeedMonitor<MemorySink, Rc<Scripted>> {
        SpeedMonitor::with_collaborators(provider, MemorySink::with_text("--"), policy)
    }

    fn text<P: LocationProvider>(monitor: &SpeedMonitor<MemorySink, P>) -> String {
        monitor.sink().map(|s| s.text().to_string()).unwrap_or_default()
    }

    #[test]
    fn start_zero_then_speed_then_fault() {
        let provider = Scripted::new(vec![]);
        let mut monitor = monitor_with(Rc::clone(&provider), RefreshPolicy::OnChange);

        monitor.start();
        assert_eq!(text(&monitor), "0.0 mph");
        assert_eq!(monitor.state(), MonitorState::Running);

        provider.push(Ok(30.25));
        tick(&mut monitor);
        assert_eq!(text(&monitor), "30.3 mph");
        assert_eq!(monitor.current_speed(), 30.25);

        provider.push(fault());
        tick(&mut monitor);
        assert_eq!(text(&monitor), "0.0 mph");
        assert_eq!(monitor.current_speed(), 0.0);
    }

    #[test]
    fn every_fault_tick_rewrites_zero() {
        let provider = Scripted::new(vec![fault(), fault(), fault()]);
        let mut monitor = monitor_with(provider, RefreshPolicy::OnChange);
        monitor.start();
        let after_start = monitor.sink().map(MemorySink::writes).unwrap_or_default();

        for _ in 0..3 {
            tick(&mut monitor);
        }

        assert_eq!(text(&monitor), "0.0 mph");
        let writes = monitor.sink().map(MemorySink::writes).unwrap_or_default();
        assert_eq!(writes - after_start, 3);
        assert_eq!(monitor.stats().provider_faults, 3);
    }

    #[test]
    fn unchanged_reading_is_not_rewritten() {
        let provider = Scripted::new(vec![Ok(12.0), Ok(12.0), Ok(12.0)]);
        let mut monitor = monitor_with(provider, RefreshPolicy::OnChange);
        monitor.start();
        for _ in 0..3 {
            tick(&mut monitor);
        }
        assert_eq!(text(&monitor), "12.0 mph");
        // start + the single change
        assert_eq!(monitor.stats().display_writes, 2);
    }

    #[test]
    fn always_policy_rewrites_every_reading() {
        let provider = Scripted::new(vec![Ok(12.0), Ok(12.0), Ok(12.0)]);
        let mut monitor = monitor_with(provider, RefreshPolicy::Always);
        monitor.start();
        for _ in 0..3 {
            tick(&mut monitor);
        }
        assert_eq!(text(&monitor), "12.0 mph");
        assert_eq!(monitor.stats().display_writes, 4);
    }

    #[test]
    fn missing_provider_leaves_display_untouched() {
        let mut monitor: SpeedMonitor<MemorySink, Rc<Scripted>> = SpeedMonitor::default();
        monitor.bind_sink(MemorySink::with_text("--"));
        monitor.start();
        for _ in 0..5 {
            tick(&mut monitor);
        }
        assert_eq!(text(&monitor), "--");
        assert_eq!(monitor.stats().samples, 0);
        assert_eq!(monitor.stats().ticks, 5);
    }

    #[test]
    fn sink_bound_after_start_shows_current_speed() {
        let mut monitor: SpeedMonitor<MemorySink, FixedSpeed> = SpeedMonitor::default();
        monitor.bind_provider(FixedSpeed(8.0));
        monitor.start();
        tick(&mut monitor);
        assert!(monitor.has_provider());

        let previous = monitor.bind_sink(MemorySink::with_text("--"));
        assert!(previous.is_none());
        assert_eq!(text(&monitor), "8.0 mph");

        for _ in 0..100 {
            tick(&mut monitor);
        }
        assert_eq!(text(&monitor), "8.0 mph");
        assert_eq!(monitor.sink().map(MemorySink::writes), Some(1));
    }

    #[test]
    fn sink_bound_before_start_is_left_alone() {
        let mut monitor: SpeedMonitor<MemorySink, FixedSpeed> =
            SpeedMonitor::new(RefreshPolicy::Always);
        monitor.bind_provider(FixedSpeed(8.0));
        monitor.bind_sink(MemorySink::with_text("--"));
        assert_eq!(text(&monitor), "--");
        assert_eq!(monitor.policy(), RefreshPolicy::Always);
    }

    #[test]
    fn missing_sink_still_tracks_speed() {
        let provider = Scripted::new(vec![Ok(8.0)]);
        let mut monitor: SpeedMonitor<MemorySink, Rc<Scripted>> = SpeedMonitor::default();
        monitor.bind_provider(provider);
        monitor.start();
        tick(&mut monitor);
        assert_eq!(monitor.current_speed(), 8.0);
        assert_eq!(monitor.stats().display_writes, 0);
    }

    #[test]
    fn ticks_before_start_do_nothing() {
        let provider = Scripted::new(vec![Ok(55.0)]);
        let mut monitor = monitor_with(provider, RefreshPolicy::OnChange);
        tick(&mut monitor);
        assert_eq!(monitor.state(), MonitorState::Unstarted);
        assert_eq!(text(&monitor), "--");
        assert_eq!(monitor.current_speed(), 0.0);
    }

    #[test]
    fn provider_can_be_rebound_after_start() {
        let first = Scripted::new(vec![Ok(10.0)]);
        let second = Scripted::new(vec![Ok(20.5)]);
        let mut monitor = monitor_with(first, RefreshPolicy::OnChange);
        monitor.start();
        tick(&mut monitor);
        assert_eq!(text(&monitor), "10.0 mph");

        monitor.bind_provider(second);
        tick(&mut monitor);
        assert_eq!(text(&monitor), "20.5 mph");

        assert!(monitor.unbind_provider().is_some());
        tick(&mut monitor);
        assert_eq!(text(&monitor), "20.5 mph");
    }

    #[test]
    fn non_finite_reading_counts_as_fault() {
        let provider = Scripted::new(vec![Ok(40.0), Ok(f64::NAN)]);
        let mut monitor = monitor_with(provider, RefreshPolicy::OnChange);
        monitor.start();
        tick(&mut monitor);
        assert_eq!(text(&monitor), "40.0 mph");
        tick(&mut monitor);
        assert_eq!(text(&monitor), "0.0 mph");
        assert_eq!(monitor.stats().provider_faults, 1);
    }

    #[test]
    fn second_start_arms_harmless_duplicate() {
        let provider = Scripted::new(vec![Ok(15.0)]);
        let mut monitor = monitor_with(provider, RefreshPolicy::OnChange);
        monitor.start();
        monitor.start();
        tick(&mut monitor);
        assert_eq!(text(&monitor), "15.0 mph");
        assert_eq!(monitor.stats().samples, 2);
        assert_eq!(monitor.current_speed(), 15.0);
    }

    #[test]
    fn refresh_twice_yields_identical_text() {
        let provider = Scripted::new(vec![Ok(42.849)]);
        let mut monitor = monitor_with(provider, RefreshPolicy::OnChange);
        monitor.start();
        tick(&mut monitor);
        monitor.refresh_display();
        let first = text(&monitor);
        monitor.refresh_display();
        assert_eq!(first, "42.8 mph");
        assert_eq!(text(&monitor), first);
    }

    #[test]
    fn visibility_is_forwarded_to_sink() {
        let provider = Scripted::new(vec![]);
        let mut monitor = monitor_with(provider, RefreshPolicy::OnChange);
        monitor.set_display_visible(false);
        assert_eq!(monitor.sink().map(MemorySink::is_visible), Some(false));
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!("on-change".parse::<RefreshPolicy>(), Ok(RefreshPolicy::OnChange));
        assert_eq!("always".parse::<RefreshPolicy>(), Ok(RefreshPolicy::Always));
        assert!("sometimes".parse::<RefreshPolicy>().is_err());
    }
}
