//! Map view and spherical Web Mercator projection.

use crate::geo::{LatLng, LatLngBounds, Meters};
use kurbo::{Affine, Point, Size, Vec2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Edge length of one map tile at integer zoom, in pixels.
pub const TILE_SIZE: f64 = 256.0;

/// Latitude limit of the Web Mercator square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// The visible map viewport.
///
/// Converts geographic positions to container pixels (the coordinate space
/// of the on-screen map element) and, through [`MapView::transform`], to
/// capture pixels scaled by the device pixel ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    /// Geographic center of the viewport.
    pub center: LatLng,
    /// Fractional zoom level.
    pub zoom: f64,
    /// Container size in CSS pixels.
    pub size: Size,
    /// Capture pixel density factor.
    pub pixel_ratio: f64,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: LatLng::new(46.603354, 1.888334),
            zoom: 6.0,
            size: Size::new(1024.0, 768.0),
            pixel_ratio: 1.0,
        }
    }
}

impl MapView {
    pub fn new(center: LatLng, zoom: f64, size: Size) -> Self {
        Self {
            center,
            zoom,
            size,
            pixel_ratio: 1.0,
        }
    }

    pub fn with_pixel_ratio(mut self, pixel_ratio: f64) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    /// Move the view without changing the container.
    pub fn set_view(&mut self, center: LatLng, zoom: f64) {
        self.center = center;
        self.zoom = zoom;
    }

    /// Size of the whole world in pixels at the current zoom.
    pub fn world_size(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom)
    }

    /// Project a position to absolute world pixels.
    pub fn project(&self, p: LatLng) -> Point {
        let scale = self.world_size();
        let lat = p.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = (p.lng + 180.0) / 360.0 * scale;
        let y = (0.5 - (PI / 4.0 + lat / 2.0).tan().ln() / (2.0 * PI)) * scale;
        Point::new(x, y)
    }

    /// Inverse of [`MapView::project`].
    pub fn unproject(&self, world: Point) -> LatLng {
        let scale = self.world_size();
        let lng = world.x / scale * 360.0 - 180.0;
        let n = PI * (1.0 - 2.0 * world.y / scale);
        let lat = n.sinh().atan().to_degrees();
        LatLng::new(lat, lng)
    }

    /// World pixel of the container's top-left corner.
    fn pixel_origin(&self) -> Point {
        self.project(self.center) - Vec2::new(self.size.width / 2.0, self.size.height / 2.0)
    }

    /// Project a position to container pixels.
    pub fn latlng_to_container_point(&self, p: LatLng) -> Point {
        let origin = self.pixel_origin();
        (self.project(p) - origin).to_point()
    }

    /// Convert a container pixel back to a position.
    pub fn container_point_to_latlng(&self, point: Point) -> LatLng {
        let origin = self.pixel_origin();
        self.unproject(origin + point.to_vec2())
    }

    /// Geographic bounds of the container.
    pub fn bounds(&self) -> LatLngBounds {
        let sw = self.container_point_to_latlng(Point::new(0.0, self.size.height));
        let ne = self.container_point_to_latlng(Point::new(self.size.width, 0.0));
        LatLngBounds::new(sw, ne)
    }

    /// Container size that shows exactly `bounds` at the current zoom.
    pub fn size_for_bounds(&self, bounds: &LatLngBounds) -> Option<Size> {
        let sw = self.project(bounds.south_west);
        let ne = self.project(bounds.north_east);
        let size = Size::new((ne.x - sw.x).abs(), (sw.y - ne.y).abs());
        (size.is_finite() && size.width >= 1.0 && size.height >= 1.0).then_some(size)
    }

    /// Container pixels to capture pixels.
    pub fn transform(&self) -> Affine {
        Affine::scale(self.pixel_ratio)
    }

    /// Project a position straight to capture pixels.
    pub fn to_capture_point(&self, p: LatLng) -> Point {
        self.transform() * self.latlng_to_container_point(p)
    }

    /// Capture raster size in whole pixels.
    pub fn capture_size(&self) -> (u32, u32) {
        (
            (self.size.width * self.pixel_ratio).round().max(1.0) as u32,
            (self.size.height * self.pixel_ratio).round().max(1.0) as u32,
        )
    }

    /// Pixel radius of a geodesic circle at the current zoom, in container pixels.
    ///
    /// Projects the center and the point `radius` east of it and measures the
    /// on-screen distance between them.
    pub fn geodesic_radius_px(&self, center: LatLng, radius: Meters) -> f64 {
        let edge = center.offset_east(radius);
        let a = self.latlng_to_container_point(center);
        let b = self.latlng_to_container_point(edge);
        a.distance(b)
    }

    /// Meters per container pixel at the view center.
    pub fn meters_per_pixel(&self) -> f64 {
        let cos_lat = self.center.lat.to_radians().cos();
        2.0 * PI * crate::geo::EARTH_RADIUS_M * cos_lat / self.world_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> MapView {
        MapView::new(LatLng::new(0.0, 0.0), 2.0, Size::new(512.0, 512.0))
    }

    #[test]
    fn test_center_projects_to_container_middle() {
        let v = MapView::new(LatLng::new(48.8566, 2.3522), 12.0, Size::new(800.0, 600.0));
        let p = v.latlng_to_container_point(v.center);
        assert!((p.x - 400.0).abs() < 1e-6);
        assert!((p.y - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_project_world_corners() {
        let v = view();
        // World is 1024 px wide at zoom 2.
        let west = v.project(LatLng::new(0.0, -180.0));
        let east = v.project(LatLng::new(0.0, 180.0));
        assert!((west.x - 0.0).abs() < 1e-9);
        assert!((east.x - 1024.0).abs() < 1e-9);
        assert!((west.y - 512.0).abs() < 1e-9);
    }

    #[test]
    fn test_unproject_roundtrip() {
        let v = MapView::new(LatLng::new(45.0, 5.0), 9.5, Size::new(640.0, 480.0));
        let p = LatLng::new(44.7, 5.6);
        let back = v.container_point_to_latlng(v.latlng_to_container_point(p));
        assert!((back.lat - p.lat).abs() < 1e-9);
        assert!((back.lng - p.lng).abs() < 1e-9);
    }

    #[test]
    fn test_bounds_contains_center() {
        let v = MapView::new(LatLng::new(10.0, 20.0), 5.0, Size::new(400.0, 300.0));
        let b = v.bounds();
        assert!(b.contains(v.center));
        assert!(b.south_west.lat < b.north_east.lat);
    }

    #[test]
    fn test_size_for_bounds_inverts_bounds() {
        let v = MapView::new(LatLng::new(45.0, 5.0), 7.0, Size::new(900.0, 500.0));
        let size = v.size_for_bounds(&v.bounds()).unwrap();
        assert!((size.width - 900.0).abs() < 1e-6);
        assert!((size.height - 500.0).abs() < 1e-6);
    }

    #[test]
    fn test_pixel_ratio_scales_capture_points() {
        let v = view().with_pixel_ratio(2.0);
        let p = v.to_capture_point(LatLng::new(0.0, 0.0));
        assert!((p.x - 512.0).abs() < 1e-9);
        assert!((p.y - 512.0).abs() < 1e-9);
        assert_eq!(v.capture_size(), (1024, 1024));
    }

    #[test]
    fn test_geodesic_radius_matches_meters_per_pixel() {
        let v = MapView::new(LatLng::new(0.0, 0.0), 10.0, Size::new(800.0, 600.0));
        let r = v.geodesic_radius_px(v.center, Meters(5_000.0));
        let expected = 5_000.0 / v.meters_per_pixel();
        assert!((r - expected).abs() < 1e-6);
    }

    #[test]
    fn test_geodesic_radius_doubles_per_zoom() {
        let center = LatLng::new(45.0, 3.0);
        let mut v = MapView::new(center, 8.0, Size::new(800.0, 600.0));
        let r8 = v.geodesic_radius_px(center, Meters(1_000.0));
        v.set_view(center, 9.0);
        let r9 = v.geodesic_radius_px(center, Meters(1_000.0));
        assert!((r9 / r8 - 2.0).abs() < 1e-9);
    }
}
