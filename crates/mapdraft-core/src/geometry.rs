//! The geometry record.

use crate::legend::NodeId;
use crate::shapes::{GeometryKind, GeometryStyle};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable geometry identity. Assigned once, preserved across export/import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeometryId(pub u64);

impl fmt::Display for GeometryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One shape on the map, with its style and legend assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub id: GeometryId,
    pub name: String,
    pub kind: GeometryKind,
    pub style: GeometryStyle,
    /// Owning legend part or sub-part; `None` means unclassified.
    pub legend_part: Option<NodeId>,
    /// Tool-specific line variant, carried through documents untouched.
    pub line_type: Option<String>,
}

impl Geometry {
    pub fn new(id: GeometryId, kind: GeometryKind, style: GeometryStyle) -> Self {
        let name = format!("{} {}", label(&kind), id);
        Self {
            id,
            name,
            kind,
            style,
            legend_part: None,
            line_type: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn type_name(&self) -> String {
        self.kind.type_name()
    }

    pub fn is_classified(&self) -> bool {
        self.legend_part.is_some()
    }
}

fn label(kind: &GeometryKind) -> &'static str {
    match kind {
        GeometryKind::Marker(_) => "Marker",
        GeometryKind::Polygon(_) => "Polygon",
        GeometryKind::Polyline(_) => "Line",
        GeometryKind::GeodesicCircle(_) => "Circle",
        GeometryKind::PixelCircle(_) => "Point",
    }
}
