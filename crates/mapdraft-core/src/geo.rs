//! Geographic primitives and distance units.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Equatorial radius of the spherical Earth, in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite coordinates with a latitude inside [-90, 90].
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite() && (-90.0..=90.0).contains(&self.lat)
    }

    /// The point lying `distance` east of this one on the same parallel.
    ///
    /// Uses the spherical approximation: one degree of longitude shrinks with
    /// `cos(latitude)` as meridians converge.
    pub fn offset_east(&self, distance: Meters) -> LatLng {
        let cos_lat = self.lat.to_radians().cos().abs().max(f64::EPSILON);
        let delta_lng = distance.0 / (EARTH_RADIUS_M * cos_lat) * 180.0 / PI;
        LatLng::new(self.lat, self.lng + delta_lng)
    }

    /// Lenient reader for `{ "lat": .., "lng": .. }` objects.
    ///
    /// Also accepts `[lat, lng]` pairs. Returns `None` for anything that
    /// does not yield a valid position.
    pub fn from_value(value: &serde_json::Value) -> Option<LatLng> {
        let point = if let Some(arr) = value.as_array() {
            LatLng::new(arr.first()?.as_f64()?, arr.get(1)?.as_f64()?)
        } else {
            LatLng::new(
                value.get("lat").and_then(|v| v.as_f64())?,
                value.get("lng").and_then(|v| v.as_f64())?,
            )
        };
        point.is_valid().then_some(point)
    }
}

/// Axis-aligned geographic bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    /// Smallest bounds containing every point, or `None` for an empty input.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a LatLng>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        let mut bounds = Self::new(first, first);
        for p in iter {
            bounds.extend(*p);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, p: LatLng) {
        self.south_west.lat = self.south_west.lat.min(p.lat);
        self.south_west.lng = self.south_west.lng.min(p.lng);
        self.north_east.lat = self.north_east.lat.max(p.lat);
        self.north_east.lng = self.north_east.lng.max(p.lng);
    }

    pub fn contains(&self, p: LatLng) -> bool {
        (self.south_west.lat..=self.north_east.lat).contains(&p.lat)
            && (self.south_west.lng..=self.north_east.lng).contains(&p.lng)
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }
}

/// Real-world distance in meters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meters(pub f64);

/// Screen distance in CSS pixels, constant across zoom levels.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pixels(pub f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latlng_validity() {
        assert!(LatLng::new(48.8566, 2.3522).is_valid());
        assert!(!LatLng::new(91.0, 0.0).is_valid());
        assert!(!LatLng::new(f64::NAN, 0.0).is_valid());
        assert!(!LatLng::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_offset_east_at_equator() {
        let origin = LatLng::new(0.0, 0.0);
        // One degree of longitude at the equator.
        let meters = Meters(EARTH_RADIUS_M * PI / 180.0);
        let moved = origin.offset_east(meters);
        assert!((moved.lng - 1.0).abs() < 1e-9);
        assert!((moved.lat - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_offset_east_grows_with_latitude() {
        let meters = Meters(10_000.0);
        let equator = LatLng::new(0.0, 0.0).offset_east(meters);
        let north = LatLng::new(60.0, 0.0).offset_east(meters);
        // cos(60°) = 0.5, so the longitude delta doubles.
        assert!((north.lng - 2.0 * equator.lng).abs() < 1e-9);
    }

    #[test]
    fn test_from_value() {
        let v = serde_json::json!({"lat": 48.0, "lng": 2.0});
        assert_eq!(LatLng::from_value(&v), Some(LatLng::new(48.0, 2.0)));
        let pair = serde_json::json!([10.0, 20.0]);
        assert_eq!(LatLng::from_value(&pair), Some(LatLng::new(10.0, 20.0)));
        assert_eq!(LatLng::from_value(&serde_json::json!({"lat": 120.0, "lng": 0.0})), None);
        assert_eq!(LatLng::from_value(&serde_json::json!("nope")), None);
    }

    #[test]
    fn test_bounds_from_points() {
        let pts = [
            LatLng::new(1.0, 5.0),
            LatLng::new(-2.0, 3.0),
            LatLng::new(4.0, -1.0),
        ];
        let b = LatLngBounds::from_points(&pts).unwrap();
        assert_eq!(b.south_west, LatLng::new(-2.0, -1.0));
        assert_eq!(b.north_east, LatLng::new(4.0, 5.0));
        assert!(b.contains(LatLng::new(0.0, 0.0)));
        assert!(LatLngBounds::from_points(&[]).is_none());
    }
}
