//! Polylines with optional arrowheads and curved segments.

use super::ValidationError;
use crate::geo::LatLng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of straight steps used to draw one curved segment.
pub const CURVE_STEPS: usize = 20;

/// Control points keyed by segment index (segment `i` joins vertex `i` and `i + 1`).
pub type SegmentCurves = BTreeMap<usize, LatLng>;

/// Arrow decoration at the ends of a polyline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrowType {
    #[default]
    None,
    /// Arrowhead on the last vertex.
    #[serde(alias = "arrow")]
    End,
    /// Arrowheads on both ends.
    #[serde(alias = "doubleArrow")]
    Both,
}

impl ArrowType {
    pub fn has_end(&self) -> bool {
        matches!(self, ArrowType::End | ArrowType::Both)
    }

    pub fn has_start(&self) -> bool {
        matches!(self, ArrowType::Both)
    }

    pub fn is_decorated(&self) -> bool {
        !matches!(self, ArrowType::None)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArrowType::None => "none",
            ArrowType::End => "end",
            ArrowType::Both => "both",
        }
    }

    /// Lenient parse accepting both naming schemes.
    pub fn parse(s: &str) -> Self {
        match s {
            "end" | "arrow" => ArrowType::End,
            "both" | "doubleArrow" => ArrowType::Both,
            _ => ArrowType::None,
        }
    }
}

/// An open path through two or more vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub vertices: Vec<LatLng>,
    #[serde(default)]
    pub arrow: ArrowType,
    #[serde(default)]
    pub curves: SegmentCurves,
}

impl Polyline {
    pub fn new(vertices: Vec<LatLng>) -> Self {
        Self {
            vertices,
            arrow: ArrowType::None,
            curves: SegmentCurves::new(),
        }
    }

    pub fn with_arrow(mut self, arrow: ArrowType) -> Self {
        self.arrow = arrow;
        self
    }

    pub fn segment_count(&self) -> usize {
        self.vertices.len().saturating_sub(1)
    }

    pub fn is_curved(&self) -> bool {
        !self.curves.is_empty()
    }

    /// Bend segment `segment` through a quadratic control point.
    pub fn set_curve(&mut self, segment: usize, control: LatLng) -> Result<(), ValidationError> {
        if segment >= self.segment_count() {
            return Err(ValidationError::SegmentOutOfRange {
                segment,
                segments: self.segment_count(),
            });
        }
        if !control.is_valid() {
            return Err(ValidationError::InvalidPoint(control));
        }
        self.curves.insert(segment, control);
        Ok(())
    }

    /// The vertices actually drawn: curved segments are expanded into
    /// [`CURVE_STEPS`] points each, straight ones contribute their end vertex.
    pub fn rendered_vertices(&self) -> Vec<LatLng> {
        let Some(first) = self.vertices.first() else {
            return Vec::new();
        };
        let mut out = vec![*first];
        for (i, pair) in self.vertices.windows(2).enumerate() {
            let (start, end) = (pair[0], pair[1]);
            match self.curves.get(&i) {
                Some(control) => {
                    for step in 1..=CURVE_STEPS {
                        let t = step as f64 / CURVE_STEPS as f64;
                        out.push(quadratic_point(start, *control, end, t));
                    }
                }
                None => out.push(end),
            }
        }
        out
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.vertices.is_empty() {
            return Err(ValidationError::EmptyCoordinates);
        }
        if let Some(bad) = self.vertices.iter().find(|v| !v.is_valid()) {
            return Err(ValidationError::InvalidPoint(*bad));
        }
        if self.vertices.len() < 2 {
            return Err(ValidationError::TooFewVertices {
                kind: "Polyline",
                required: 2,
                found: self.vertices.len(),
            });
        }
        let segments = self.segment_count();
        for (&segment, control) in &self.curves {
            if segment >= segments {
                return Err(ValidationError::SegmentOutOfRange { segment, segments });
            }
            if !control.is_valid() {
                return Err(ValidationError::InvalidPoint(*control));
            }
        }
        Ok(())
    }
}

/// Point at `t` on the quadratic Bézier `start → control → end`.
pub fn quadratic_point(start: LatLng, control: LatLng, end: LatLng, t: f64) -> LatLng {
    let u = 1.0 - t;
    let a = u * u;
    let b = 2.0 * u * t;
    let c = t * t;
    LatLng::new(
        a * start.lat + b * control.lat + c * end.lat,
        a * start.lng + b * control.lng + c * end.lng,
    )
}
