//! Point markers.

use super::ValidationError;
use crate::geo::LatLng;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Symbol drawn for a point marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerShape {
    #[default]
    Circle,
    Square,
    Triangle,
    Hexagon,
}

impl MarkerShape {
    pub const ALL: [MarkerShape; 4] = [
        MarkerShape::Circle,
        MarkerShape::Square,
        MarkerShape::Triangle,
        MarkerShape::Hexagon,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MarkerShape::Circle => "circle",
            MarkerShape::Square => "square",
            MarkerShape::Triangle => "triangle",
            MarkerShape::Hexagon => "hexagon",
        }
    }

    /// Lenient parse; unknown shapes draw as circles.
    pub fn parse(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
            .unwrap_or_else(|| {
                log::warn!("Unknown marker shape '{}', using circle", name);
                MarkerShape::Circle
            })
    }

    /// Outline vertices around `center` for a marker `size` pixels across.
    ///
    /// Returns `None` for the circle, which is drawn as an arc.
    pub fn outline(&self, center: Point, size: f64) -> Option<Vec<Point>> {
        let half = size / 2.0;
        let Point { x, y } = center;
        match self {
            MarkerShape::Circle => None,
            MarkerShape::Square => Some(vec![
                Point::new(x - half, y - half),
                Point::new(x + half, y - half),
                Point::new(x + half, y + half),
                Point::new(x - half, y + half),
            ]),
            MarkerShape::Triangle => Some(vec![
                Point::new(x, y - half),
                Point::new(x + half, y + half),
                Point::new(x - half, y + half),
            ]),
            MarkerShape::Hexagon => Some(
                (0..6)
                    .map(|i| {
                        let angle = PI / 3.0 * i as f64 - PI / 2.0;
                        Point::new(x + half * angle.cos(), y + half * angle.sin())
                    })
                    .collect(),
            ),
        }
    }
}

/// A symbol pinned to one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub position: LatLng,
    pub shape: MarkerShape,
    /// Symbol size in pixels.
    pub size: f64,
}

impl Marker {
    pub const DEFAULT_SIZE: f64 = 24.0;

    pub fn new(position: LatLng, shape: MarkerShape) -> Self {
        Self {
            position,
            shape,
            size: Self::DEFAULT_SIZE,
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if !self.position.is_valid() {
            return Err(ValidationError::InvalidPoint(self.position));
        }
        if !(self.size.is_finite() && self.size > 0.0) {
            return Err(ValidationError::InvalidSize(self.size));
        }
        Ok(())
    }
}
