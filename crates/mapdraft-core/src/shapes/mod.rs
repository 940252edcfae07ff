//! Geometry kinds and their styling.

mod arrow;
mod circle;
mod draw;
mod marker;
mod polygon;
mod polyline;

pub use arrow::{Arrowhead, legend_arrowhead};
pub use circle::{GeodesicCircle, PixelCircle};
pub use draw::DrawAction;
pub use marker::{Marker, MarkerShape};
pub use polygon::Polygon;
pub use polyline::{ArrowType, CURVE_STEPS, Polyline, SegmentCurves, quadratic_point};

use crate::geo::LatLng;
use peniko::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a set of coordinates cannot back a geometry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Coordinates are empty")]
    EmptyCoordinates,
    #[error("Invalid position: {0:?}")]
    InvalidPoint(LatLng),
    #[error("{kind} needs at least {required} valid vertices, got {found}")]
    TooFewVertices {
        kind: &'static str,
        required: usize,
        found: usize,
    },
    #[error("Invalid radius: {0}")]
    InvalidRadius(f64),
    #[error("Segment {segment} does not exist (polyline has {segments} segments)")]
    SegmentOutOfRange { segment: usize, segments: usize },
    #[error("Invalid size: {0}")]
    InvalidSize(f64),
    #[error("Unknown geometry type: {0}")]
    UnknownType(String),
    #[error("Cannot turn a {from} into a {to}")]
    KindChange { from: String, to: String },
}

/// Serializable color representation (RGBA8).
///
/// Serialized as a CSS hex string: `#rrggbb`, or `#rrggbbaa` when not opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            3 => {
                let nib = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
                Some(Self::rgb(nib(0)?, nib(1)?, nib(2)?))
            }
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl TryFrom<String> for SerializableColor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_hex(&value).ok_or_else(|| format!("invalid color: {value}"))
    }
}

impl From<SerializableColor> for String {
    fn from(color: SerializableColor) -> Self {
        color.to_hex()
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Stroke dash pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineDash {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl LineDash {
    /// Dash/gap lengths at unit scale, or `None` for a continuous stroke.
    pub fn dash_array(&self) -> Option<[f64; 2]> {
        match self {
            LineDash::Solid => None,
            LineDash::Dashed => Some([10.0, 10.0]),
            LineDash::Dotted => Some([2.0, 6.0]),
        }
    }

    /// Lenient parse; anything unrecognized is solid.
    pub fn parse(s: &str) -> Self {
        match s {
            "dashed" => LineDash::Dashed,
            "dotted" => LineDash::Dotted,
            _ => LineDash::Solid,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LineDash::Solid => "solid",
            LineDash::Dashed => "dashed",
            LineDash::Dotted => "dotted",
        }
    }
}

/// Visual style of a geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryStyle {
    /// Fill color (markers, polygons, circles).
    pub fill_color: SerializableColor,
    /// Stroke color.
    pub stroke_color: SerializableColor,
    /// Opacity in [0, 1].
    opacity: f64,
    /// Stroke width in pixels.
    pub stroke_width: f64,
    /// Stroke dash pattern.
    #[serde(default)]
    pub dash: LineDash,
}

impl Default for GeometryStyle {
    fn default() -> Self {
        Self::area()
    }
}

impl GeometryStyle {
    pub const VECTOR_BLUE: SerializableColor = SerializableColor::rgb(0x33, 0x88, 0xff);
    pub const MARKER_BLUE: SerializableColor = SerializableColor::rgb(0x00, 0x7b, 0xff);

    pub fn new(
        fill_color: SerializableColor,
        stroke_color: SerializableColor,
        opacity: f64,
        stroke_width: f64,
        dash: LineDash,
    ) -> Self {
        Self {
            fill_color,
            stroke_color,
            opacity: clamp_opacity(opacity),
            stroke_width,
            dash,
        }
    }

    /// Point marker defaults.
    pub fn marker() -> Self {
        Self::new(Self::MARKER_BLUE, SerializableColor::black(), 1.0, 2.0, LineDash::Solid)
    }

    /// Polyline defaults.
    pub fn line() -> Self {
        Self::new(Self::VECTOR_BLUE, Self::VECTOR_BLUE, 1.0, 3.0, LineDash::Solid)
    }

    /// Polygon and circle defaults.
    pub fn area() -> Self {
        Self::new(Self::VECTOR_BLUE, Self::VECTOR_BLUE, 0.2, 3.0, LineDash::Solid)
    }

    /// Defaults appropriate for a geometry kind.
    pub fn default_for(kind: &GeometryKind) -> Self {
        match kind {
            GeometryKind::Marker(_) => Self::marker(),
            GeometryKind::Polyline(_) => Self::line(),
            GeometryKind::Polygon(_)
            | GeometryKind::GeodesicCircle(_)
            | GeometryKind::PixelCircle(_) => Self::area(),
        }
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = clamp_opacity(opacity);
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.set_opacity(opacity);
        self
    }

    /// Apply the fields present in a patch, leaving the rest untouched.
    pub fn apply(&mut self, patch: &StylePatch) {
        if let Some(c) = patch.fill_color {
            self.fill_color = c;
        }
        if let Some(c) = patch.stroke_color {
            self.stroke_color = c;
        }
        if let Some(o) = patch.opacity {
            self.set_opacity(o);
        }
        if let Some(w) = patch.stroke_width {
            if w.is_finite() && w >= 0.0 {
                self.stroke_width = w;
            }
        }
        if let Some(d) = patch.dash {
            self.dash = d;
        }
    }
}

fn clamp_opacity(opacity: f64) -> f64 {
    if opacity.is_nan() {
        1.0
    } else {
        opacity.clamp(0.0, 1.0)
    }
}

/// A partial style edit. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StylePatch {
    #[serde(alias = "color")]
    pub fill_color: Option<SerializableColor>,
    #[serde(alias = "lineColor")]
    pub stroke_color: Option<SerializableColor>,
    pub opacity: Option<f64>,
    #[serde(alias = "lineWeight")]
    pub stroke_width: Option<f64>,
    #[serde(alias = "lineDash")]
    pub dash: Option<LineDash>,
    /// Marker size in pixels; ignored for other kinds.
    #[serde(alias = "markerSize")]
    pub marker_size: Option<f64>,
}

/// The shape of a geometry, decided when it is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeometryKind {
    Marker(Marker),
    Polygon(Polygon),
    Polyline(Polyline),
    GeodesicCircle(GeodesicCircle),
    PixelCircle(PixelCircle),
}

impl GeometryKind {
    /// Document type tag: `Marker_<shape>`, `Polygon`, `Polyline`,
    /// `Circle` (meters) or `CircleMarker` (pixels).
    pub fn type_name(&self) -> String {
        match self {
            GeometryKind::Marker(m) => format!("Marker_{}", m.shape.name()),
            GeometryKind::Polygon(_) => "Polygon".to_string(),
            GeometryKind::Polyline(_) => "Polyline".to_string(),
            GeometryKind::GeodesicCircle(_) => "Circle".to_string(),
            GeometryKind::PixelCircle(_) => "CircleMarker".to_string(),
        }
    }

    /// Drop parts that would be discarded on import anyway.
    pub fn normalized(self) -> Self {
        match self {
            GeometryKind::Polygon(p) => GeometryKind::Polygon(p.without_degenerate_holes()),
            other => other,
        }
    }

    /// Check that the coordinates are well formed for the kind.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            GeometryKind::Marker(m) => m.validate(),
            GeometryKind::Polygon(p) => p.validate(),
            GeometryKind::Polyline(p) => p.validate(),
            GeometryKind::GeodesicCircle(c) => c.validate(),
            GeometryKind::PixelCircle(c) => c.validate(),
        }
    }

    /// Every position the geometry touches, for bounds and hit testing.
    pub fn positions(&self) -> Vec<LatLng> {
        match self {
            GeometryKind::Marker(m) => vec![m.position],
            GeometryKind::Polygon(p) => p.rings.iter().flatten().copied().collect(),
            GeometryKind::Polyline(p) => p.vertices.clone(),
            GeometryKind::GeodesicCircle(c) => vec![c.center],
            GeometryKind::PixelCircle(c) => vec![c.center],
        }
    }

    pub fn is_polyline(&self) -> bool {
        matches!(self, GeometryKind::Polyline(_))
    }

    pub fn as_polyline(&self) -> Option<&Polyline> {
        match self {
            GeometryKind::Polyline(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_polyline_mut(&mut self) -> Option<&mut Polyline> {
        match self {
            GeometryKind::Polyline(p) => Some(p),
            _ => None,
        }
    }

    /// Arrow decoration, `None` for everything but decorated polylines.
    pub fn arrow(&self) -> ArrowType {
        self.as_polyline().map(|p| p.arrow).unwrap_or_default()
    }
}

/// A document type tag parsed back into a kind selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryType {
    Marker(MarkerShape),
    /// Legacy free-form marker; the shape comes from the record.
    CustomMarker,
    Polygon,
    Polyline,
    /// Geodesic circle, radius in meters.
    Circle,
    /// Pixel circle, radius in pixels.
    CircleMarker,
}

impl GeometryType {
    /// Parse a document type tag.
    ///
    /// `CircleMarker` is tested before `Circle`, and `Marker_` prefixes before
    /// the exact tags, so overlapping names can never resolve to the wrong
    /// unit. Rectangles are read as polygons.
    pub fn parse(tag: &str) -> Result<Self, ValidationError> {
        if tag.starts_with("CircleMarker") {
            return Ok(GeometryType::CircleMarker);
        }
        if tag.starts_with("Circle") {
            return Ok(GeometryType::Circle);
        }
        if let Some(shape) = tag.strip_prefix("Marker_") {
            return Ok(GeometryType::Marker(MarkerShape::parse(shape)));
        }
        match tag {
            "CustomMarker" | "Marker" => Ok(GeometryType::CustomMarker),
            "Polygon" | "Rectangle" => Ok(GeometryType::Polygon),
            "Polyline" => Ok(GeometryType::Polyline),
            other => Err(ValidationError::UnknownType(other.to_string())),
        }
    }
}
