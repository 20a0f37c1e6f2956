pub mod format;
pub mod frame;
pub mod monitor;
pub mod provider;
pub mod report;
#[cfg(feature = "simulation")]
pub mod sim;
pub mod sink;
pub mod tags;
pub mod timebase;

pub use format::{display_text, format_speed, SPEED_UNIT};
pub use frame::{FrameComponent, FrameContext, FrameScheduler, SchedulerConfig, SchedulerStats};
pub use monitor::{MonitorState, MonitorStats, ParsePolicyError, RefreshPolicy, SpeedMonitor};
pub use provider::{FixedSpeed, GeoPoint, LocationProvider, ProviderError};
pub use report::{SpeedReporter, SpeedSource};
#[cfg(feature = "simulation")]
pub use sim::{DrivePhase, DriveProfile, LocationDriver, SignalDropout, SimulatedLocation};
pub use sink::{MemorySink, TextSink};
pub use timebase::{Clock, ManualClock, TimeBase};
