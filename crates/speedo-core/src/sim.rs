use crate::frame::{FrameComponent, FrameContext};
use crate::provider::{GeoPoint, LocationProvider, ProviderError};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, info};

const MPS_PER_MPH: f64 = 0.44704;
const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone)]
pub struct DriveProfile {
    /// Seconds before the first location fix.
    pub warmup_s: f64,
    pub cruise_mph: f64,
    pub accel_mph_per_s: f64,
    pub brake_mph_per_s: f64,
    pub cruise_s: f64,
    pub idle_s: f64,
    pub heading_deg: f64,
    pub origin: GeoPoint,
}

impl Default for DriveProfile {
    fn default() -> Self {
        Self {
            warmup_s: 2.0,
            cruise_mph: 30.0,
            accel_mph_per_s: 6.0,
            brake_mph_per_s: 10.0,
            cruise_s: 5.0,
            idle_s: 2.0,
            heading_deg: 90.0,
            origin: GeoPoint {
                latitude: 37.7749,
                longitude: -122.4194,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrivePhase {
    Idle,
    Accelerating,
    Cruising,
    Braking,
}

#[derive(Debug, Clone)]
struct VehicleState {
    elapsed_s: f64,
    phase: DrivePhase,
    phase_elapsed_s: f64,
    speed_mph: f64,
    location: Option<GeoPoint>,
}

type FirstSetCallback = Box<dyn FnMut(GeoPoint)>;
type TilesLoadedCallback = Box<dyn FnMut()>;

/// Simulated vehicle running a repeating drive cycle.
///
/// Speed reads fail with `LocationUnresolved` until `warmup_s` has elapsed.
pub struct SimulatedLocation {
    profile: DriveProfile,
    state: RefCell<VehicleState>,
    signal_lost: Cell<bool>,
    first_set: RefCell<Vec<FirstSetCallback>>,
    maptiles_loaded: RefCell<Vec<TilesLoadedCallback>>,
}

impl SimulatedLocation {
    pub fn new(profile: DriveProfile) -> Self {
        Self {
            profile,
            state: RefCell::new(VehicleState {
                elapsed_s: 0.0,
                phase: DrivePhase::Idle,
                phase_elapsed_s: 0.0,
                speed_mph: 0.0,
                location: None,
            }),
            signal_lost: Cell::new(false),
            first_set: RefCell::new(Vec::new()),
            maptiles_loaded: RefCell::new(Vec::new()),
        }
    }

    pub fn profile(&self) -> &DriveProfile {
        &self.profile
    }

    pub fn phase(&self) -> DrivePhase {
        self.state.borrow().phase
    }

    pub fn is_resolved(&self) -> bool {
        self.state.borrow().location.is_some()
    }

    /// Simulate a positioning outage; reads fail while set.
    pub fn set_signal_lost(&self, lost: bool) {
        self.signal_lost.set(lost);
    }

    /// Run `callback` once when the first fix arrives, or right away if it already has.
    pub fn subscribe_location_first_set(&self, mut callback: impl FnMut(GeoPoint) + 'static) {
        let resolved = self.state.borrow().location;
        match resolved {
            Some(point) => callback(point),
            None => self.first_set.borrow_mut().push(Box::new(callback)),
        }
    }

    /// Run `callback` once the map tiles around the first fix are loaded.
    /// The simulation loads them on the same frame the location resolves.
    pub fn subscribe_maptiles_loaded(&self, mut callback: impl FnMut() + 'static) {
        if self.is_resolved() {
            callback();
        } else {
            self.maptiles_loaded.borrow_mut().push(Box::new(callback));
        }
    }

    pub fn advance(&self, dt_s: f64) {
        let first_fix = {
            let mut state = self.state.borrow_mut();
            state.elapsed_s += dt_s;

            if state.location.is_none() {
                if state.elapsed_s < self.profile.warmup_s {
                    return;
                }
                state.location = Some(self.profile.origin);
                state.location
            } else {
                self.step_motion(&mut state, dt_s);
                None
            }
        };

        if let Some(point) = first_fix {
            info!(
                latitude = point.latitude,
                longitude = point.longitude,
                "User location first set"
            );
            let callbacks = std::mem::take(&mut *self.first_set.borrow_mut());
            for mut callback in callbacks {
                callback(point);
            }

            debug!("Map tiles loaded");
            let callbacks = std::mem::take(&mut *self.maptiles_loaded.borrow_mut());
            for mut callback in callbacks {
                callback();
            }
        }
    }

    fn step_motion(&self, state: &mut VehicleState, dt_s: f64) {
        let p = &self.profile;
        state.phase_elapsed_s += dt_s;

        let next = match state.phase {
            DrivePhase::Idle => {
                state.speed_mph = 0.0;
                (state.phase_elapsed_s >= p.idle_s).then_some(DrivePhase::Accelerating)
            }
            DrivePhase::Accelerating => {
                state.speed_mph = (state.speed_mph + p.accel_mph_per_s * dt_s).min(p.cruise_mph);
                (state.speed_mph >= p.cruise_mph).then_some(DrivePhase::Cruising)
            }
            DrivePhase::Cruising => {
                (state.phase_elapsed_s >= p.cruise_s).then_some(DrivePhase::Braking)
            }
            DrivePhase::Braking => {
                state.speed_mph = (state.speed_mph - p.brake_mph_per_s * dt_s).max(0.0);
                (state.speed_mph <= 0.0).then_some(DrivePhase::Idle)
            }
        };

        if let Some(phase) = next {
            debug!(from = ?state.phase, to = ?phase, speed_mph = state.speed_mph, "Drive phase change");
            state.phase = phase;
            state.phase_elapsed_s = 0.0;
        }

        if let Some(location) = state.location.as_mut() {
            let distance_m = state.speed_mph * MPS_PER_MPH * dt_s;
            let heading = p.heading_deg.to_radians();
            let lat_rad = location.latitude.to_radians();
            location.latitude += (distance_m * heading.cos() / EARTH_RADIUS_M).to_degrees();
            location.longitude +=
                (distance_m * heading.sin() / (EARTH_RADIUS_M * lat_rad.cos())).to_degrees();
        }
    }
}

impl Default for SimulatedLocation {
    fn default() -> Self {
        Self::new(DriveProfile::default())
    }
}

impl LocationProvider for SimulatedLocation {
    fn user_speed(&self) -> Result<f64, ProviderError> {
        if self.signal_lost.get() {
            return Err(ProviderError::Unavailable("signal lost".to_string()));
        }
        let state = self.state.borrow();
        match state.location {
            Some(_) => Ok(state.speed_mph),
            None => Err(ProviderError::LocationUnresolved),
        }
    }

    fn user_location(&self) -> Option<GeoPoint> {
        if self.signal_lost.get() {
            return None;
        }
        self.state.borrow().location
    }
}

/// Advances a shared `SimulatedLocation` once per frame.
pub struct LocationDriver {
    location: Rc<SimulatedLocation>,
}

impl LocationDriver {
    pub fn new(location: Rc<SimulatedLocation>) -> Self {
        Self { location }
    }
}

impl FrameComponent for LocationDriver {
    fn on_start(&mut self) {
        debug!(warmup_s = self.location.profile().warmup_s, "Location simulation started");
    }

    fn on_tick(&mut self, ctx: &FrameContext) {
        self.location.advance(ctx.dt_s);
    }
}

/// Drops the positioning signal of a shared `SimulatedLocation` for a
/// window of simulated time, then restores it.
pub struct SignalDropout {
    location: Rc<SimulatedLocation>,
    start_s: f64,
    duration_s: f64,
    elapsed_s: f64,
}

impl SignalDropout {
    pub fn new(location: Rc<SimulatedLocation>, start_s: f64, duration_s: f64) -> Self {
        Self {
            location,
            start_s,
            duration_s,
            elapsed_s: 0.0,
        }
    }
}

impl FrameComponent for SignalDropout {
    fn on_start(&mut self) {
        debug!(
            start_s = self.start_s,
            duration_s = self.duration_s,
            "Signal dropout scheduled"
        );
    }

    fn on_tick(&mut self, ctx: &FrameContext) {
        self.elapsed_s += ctx.dt_s;
        let lost = self.elapsed_s >= self.start_s && self.elapsed_s < self.start_s + self.duration_s;
        if lost != self.location.signal_lost.get() {
            info!(lost, elapsed_s = self.elapsed_s, "Simulated signal state changed");
            self.location.set_signal_lost(lost);
        }
    }
}
