//! Draw actions coming from the drawing tools.

use super::{
    ArrowType, GeodesicCircle, GeometryKind, Marker, MarkerShape, PixelCircle, Polygon, Polyline,
    ValidationError,
};
use crate::geo::{LatLng, Meters, Pixels};

/// A finished draw gesture.
///
/// Tools may produce shapes the model does not store directly (rectangles);
/// [`DrawAction::into_kind`] normalizes them.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawAction {
    Marker {
        position: LatLng,
        shape: MarkerShape,
        size: Option<f64>,
    },
    Polyline {
        vertices: Vec<LatLng>,
        arrow: ArrowType,
    },
    Polygon {
        vertices: Vec<LatLng>,
    },
    /// Axis-aligned box between two opposite corners.
    Rectangle {
        corner_a: LatLng,
        corner_b: LatLng,
    },
    Circle {
        center: LatLng,
        radius: Meters,
    },
    CircleMarker {
        center: LatLng,
        radius: Pixels,
    },
}

impl DrawAction {
    /// Validated geometry kind for this action. Rectangles become polygons.
    pub fn into_kind(self) -> Result<GeometryKind, ValidationError> {
        let kind = match self {
            DrawAction::Marker {
                position,
                shape,
                size,
            } => {
                let marker = Marker::new(position, shape);
                GeometryKind::Marker(match size {
                    Some(s) => marker.with_size(s),
                    None => marker,
                })
            }
            DrawAction::Polyline { vertices, arrow } => {
                GeometryKind::Polyline(Polyline::new(vertices).with_arrow(arrow))
            }
            DrawAction::Polygon { vertices } => GeometryKind::Polygon(Polygon::new(vertices)),
            DrawAction::Rectangle { corner_a, corner_b } => {
                let south = corner_a.lat.min(corner_b.lat);
                let north = corner_a.lat.max(corner_b.lat);
                let west = corner_a.lng.min(corner_b.lng);
                let east = corner_a.lng.max(corner_b.lng);
                GeometryKind::Polygon(Polygon::new(vec![
                    LatLng::new(south, west),
                    LatLng::new(north, west),
                    LatLng::new(north, east),
                    LatLng::new(south, east),
                ]))
            }
            DrawAction::Circle { center, radius } => {
                GeometryKind::GeodesicCircle(GeodesicCircle::new(center, radius))
            }
            DrawAction::CircleMarker { center, radius } => {
                GeometryKind::PixelCircle(PixelCircle::new(center, radius))
            }
        }
        .normalized();
        kind.validate()?;
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_becomes_polygon() {
        let action = DrawAction::Rectangle {
            corner_a: LatLng::new(10.0, 20.0),
            corner_b: LatLng::new(5.0, 25.0),
        };
        let kind = action.into_kind().unwrap();
        let GeometryKind::Polygon(poly) = &kind else {
            panic!("expected polygon, got {:?}", kind);
        };
        assert_eq!(kind.type_name(), "Polygon");
        assert_eq!(poly.outer().len(), 4);
        assert_eq!(poly.outer()[0], LatLng::new(5.0, 20.0));
        assert_eq!(poly.outer()[2], LatLng::new(10.0, 25.0));
    }

    #[test]
    fn test_invalid_action_rejected() {
        let action = DrawAction::Polyline {
            vertices: vec![LatLng::new(0.0, 0.0)],
            arrow: ArrowType::End,
        };
        assert!(action.into_kind().is_err());
    }

    #[test]
    fn test_marker_size_override() {
        let kind = DrawAction::Marker {
            position: LatLng::new(1.0, 1.0),
            shape: MarkerShape::Square,
            size: Some(32.0),
        }
        .into_kind()
        .unwrap();
        let GeometryKind::Marker(m) = kind else {
            panic!("expected marker");
        };
        assert!((m.size - 32.0).abs() < f64::EPSILON);
    }
}
