use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("user location has not been resolved yet")]
    LocationUnresolved,
    #[error("provider returned a non-finite speed: {value}")]
    NonFinite { value: f64 },
    #[error("location provider unavailable: {0}")]
    Unavailable(String),
}

/// Source of the user's position and speed (mph).
///
/// Readings may fail until the provider has resolved a first fix.
pub trait LocationProvider {
    fn user_speed(&self) -> Result<f64, ProviderError>;

    fn user_location(&self) -> Option<GeoPoint> {
        None
    }
}

impl<T: LocationProvider + ?Sized> LocationProvider for &T {
    fn user_speed(&self) -> Result<f64, ProviderError> {
        (**self).user_speed()
    }

    fn user_location(&self) -> Option<GeoPoint> {
        (**self).user_location()
    }
}

impl<T: LocationProvider + ?Sized> LocationProvider for Box<T> {
    fn user_speed(&self) -> Result<f64, ProviderError> {
        (**self).user_speed()
    }

    fn user_location(&self) -> Option<GeoPoint> {
        (**self).user_location()
    }
}

impl<T: LocationProvider + ?Sized> LocationProvider for Rc<T> {
    fn user_speed(&self) -> Result<f64, ProviderError> {
        (**self).user_speed()
    }

    fn user_location(&self) -> Option<GeoPoint> {
        (**self).user_location()
    }
}

impl<T: LocationProvider + ?Sized> LocationProvider for RefCell<T> {
    fn user_speed(&self) -> Result<f64, ProviderError> {
        self.borrow().user_speed()
    }

    fn user_location(&self) -> Option<GeoPoint> {
        self.borrow().user_location()
    }
}

/// A provider that always reports the same speed. Handy for wiring checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedSpeed(pub f64);

impl LocationProvider for FixedSpeed {
    fn user_speed(&self) -> Result<f64, ProviderError> {
        Ok(self.0)
    }
}
