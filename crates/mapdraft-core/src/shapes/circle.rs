//! Circles measured in meters and in pixels.
//!
//! The two kinds carry different unit types so a radius can never be read
//! in the wrong unit. Converting meters to pixels needs a view and goes
//! through [`crate::view::MapView::geodesic_radius_px`].

use super::ValidationError;
use crate::geo::{LatLng, Meters, Pixels};
use serde::{Deserialize, Serialize};

/// A circle on the ground; its on-screen size changes with zoom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeodesicCircle {
    pub center: LatLng,
    pub radius: Meters,
}

impl GeodesicCircle {
    pub const DEFAULT_RADIUS: Meters = Meters(50_000.0);

    pub fn new(center: LatLng, radius: Meters) -> Self {
        Self { center, radius }
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if !self.center.is_valid() {
            return Err(ValidationError::InvalidPoint(self.center));
        }
        validate_radius(self.radius.0)
    }
}

/// A circle of fixed screen size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelCircle {
    pub center: LatLng,
    pub radius: Pixels,
}

impl PixelCircle {
    pub const DEFAULT_RADIUS: Pixels = Pixels(10.0);
    /// Exclusive upper bound on the radius.
    pub const MAX_RADIUS: Pixels = Pixels(200.0);

    pub fn new(center: LatLng, radius: Pixels) -> Self {
        Self { center, radius }
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if !self.center.is_valid() {
            return Err(ValidationError::InvalidPoint(self.center));
        }
        validate_radius(self.radius.0)?;
        if self.radius.0 >= Self::MAX_RADIUS.0 {
            return Err(ValidationError::InvalidRadius(self.radius.0));
        }
        Ok(())
    }
}

fn validate_radius(radius: f64) -> Result<(), ValidationError> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidRadius(radius))
    }
}
