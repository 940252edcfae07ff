//! Arrowhead geometry in screen space.

use kurbo::{Affine, Point, Vec2};

/// A filled isosceles triangle whose tip sits on a polyline end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arrowhead {
    pub tip: Point,
    /// Direction the arrow points, in radians.
    pub angle: f64,
    pub length: f64,
    pub width: f64,
}

impl Arrowhead {
    /// Arrowhead at `last`, pointing along `prev → last`.
    ///
    /// Size grows with the stroke weight but is clamped so thin lines still
    /// get a visible head.
    pub fn at_end(prev: Point, last: Point, weight: f64, scale: f64) -> Self {
        let angle = (last.y - prev.y).atan2(last.x - prev.x);
        Self::sized(last, angle, weight, scale)
    }

    /// Arrowhead at `first`, pointing away from `next`.
    pub fn at_start(first: Point, next: Point, weight: f64, scale: f64) -> Self {
        let angle = (next.y - first.y).atan2(next.x - first.x) + std::f64::consts::PI;
        Self::sized(first, angle, weight, scale)
    }

    fn sized(tip: Point, angle: f64, weight: f64, scale: f64) -> Self {
        let base = weight.max(3.0) * scale;
        Self {
            tip,
            angle,
            length: (base * 6.0).max(20.0),
            width: (base * 3.0).max(12.0),
        }
    }

    /// Triangle vertices, tip first.
    pub fn vertices(&self) -> [Point; 3] {
        let xf = Affine::translate(self.tip.to_vec2()) * Affine::rotate(self.angle);
        [
            xf * Point::ZERO,
            xf * Point::new(-self.length, -self.width / 2.0),
            xf * Point::new(-self.length, self.width / 2.0),
        ]
    }

    /// Unit vector along the arrow.
    pub fn direction(&self) -> Vec2 {
        Vec2::from_angle(self.angle)
    }
}

/// Small arrowhead used in legend symbols.
///
/// `symbol_width` is the width of the symbol box; the head is a fifth of it,
/// capped at 8 pixels.
pub fn legend_arrowhead(tip: Point, angle: f64, symbol_width: f64) -> Arrowhead {
    let size = (symbol_width * 0.2).min(8.0);
    Arrowhead {
        tip,
        angle,
        length: size,
        width: size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_arrow_points_along_segment() {
        let head = Arrowhead::at_end(Point::new(0.0, 0.0), Point::new(100.0, 0.0), 3.0, 1.0);
        assert!(head.angle.abs() < 1e-12);
        let [tip, left, right] = head.vertices();
        assert_eq!(tip, Point::new(100.0, 0.0));
        // base = 3, length = max(18, 20) = 20, width = max(9, 12) = 12
        assert!((left.x - 80.0).abs() < 1e-9);
        assert!((left.y + 6.0).abs() < 1e-9);
        assert!((right.y - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_thin_strokes_clamp_to_minimum() {
        let head = Arrowhead::at_end(Point::ZERO, Point::new(0.0, 10.0), 1.0, 1.0);
        assert!((head.length - 20.0).abs() < f64::EPSILON);
        assert!((head.width - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_heavy_strokes_scale() {
        let head = Arrowhead::at_end(Point::ZERO, Point::new(10.0, 0.0), 5.0, 2.0);
        assert!((head.length - 60.0).abs() < 1e-9);
        assert!((head.width - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_start_arrow_is_reversed() {
        let head = Arrowhead::at_start(Point::new(0.0, 0.0), Point::new(10.0, 0.0), 3.0, 1.0);
        assert!((head.direction().x + 1.0).abs() < 1e-9);
        let [_, left, _] = head.vertices();
        // The base sits back along the line.
        assert!(left.x > 0.0);
    }

    #[test]
    fn test_legend_arrowhead_size() {
        assert!((legend_arrowhead(Point::ZERO, 0.0, 20.0).length - 4.0).abs() < 1e-9);
        assert!((legend_arrowhead(Point::ZERO, 0.0, 100.0).length - 8.0).abs() < 1e-9);
    }
}
