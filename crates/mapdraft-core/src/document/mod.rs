//! Portable map documents.
//!
//! A [`Document`] is the self-describing JSON snapshot of a
//! [`crate::composition::Composition`]: view, geometries with their legend
//! assignment, legend hierarchy and symbol palette placements.

mod export;
mod import;

pub use export::export_document;
pub use import::{ImportReport, SkippedGeometry, import_document, import_json};

use crate::geo::{LatLng, LatLngBounds};
use crate::geometry::GeometryId;
use crate::legend::NodeId;
use crate::shapes::SegmentCurves;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Format version written by this crate.
pub const DOCUMENT_VERSION: &str = "1.0.0";

/// Document errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid document: {0}")]
    Invalid(String),
    #[error(transparent)]
    Model(#[from] crate::model::ModelError),
}

/// Result type for document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Serialized composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub version: String,
    /// RFC 3339 timestamp of the export.
    #[serde(default)]
    pub export_date: String,
    #[serde(default)]
    pub map_title: String,
    pub map_view: ViewRecord,
    #[serde(default = "default_tile_layer")]
    pub tile_layer: String,
    #[serde(default)]
    pub geometries: Vec<GeometryRecord>,
    #[serde(default)]
    pub legend_parts: Vec<PartRecord>,
    #[serde(default)]
    pub symbol_palette: PaletteRecord,
}

fn default_tile_layer() -> String {
    crate::composition::DEFAULT_TILE_LAYER.to_string()
}

impl Document {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Strict parse of a whole document.
    ///
    /// [`import_json`] is the lenient path that tolerates malformed
    /// geometry records.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Copy with the volatile export timestamp blanked, for comparisons.
    pub fn without_timestamp(&self) -> Self {
        Self {
            export_date: String::new(),
            ..self.clone()
        }
    }
}

/// Map viewport at export time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRecord {
    pub center: LatLng,
    pub zoom: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<LatLngBounds>,
}

/// One geometry.
///
/// `coordinates` depends on `type`: `{lat, lng}` for markers and pixel
/// circles, `{center, radius}` (meters) for geodesic circles, a vertex array
/// for polylines and an array of rings for polygons. Only pixel circles
/// carry a root-level `radius`, in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryRecord {
    pub id: GeometryId,
    #[serde(default)]
    pub index: usize,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub coordinates: serde_json::Value,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub line_color: Option<String>,
    #[serde(default)]
    pub opacity: Option<f64>,
    #[serde(default)]
    pub line_dash: Option<String>,
    #[serde(default)]
    pub line_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrow_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_type: Option<String>,
    #[serde(default)]
    pub segment_curves: Option<SegmentCurves>,
    #[serde(default)]
    pub is_curved: bool,
    #[serde(default)]
    pub part_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

/// A legend part; members are positional geometry indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartRecord {
    pub id: NodeId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub geometries: Vec<usize>,
    #[serde(default)]
    pub sub_parts: Vec<SubPartRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubPartRecord {
    pub id: NodeId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub geometries: Vec<usize>,
}

/// Symbol palette state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteRecord {
    #[serde(default)]
    pub used_symbols: Vec<SymbolRecord>,
    #[serde(default)]
    pub drop_zones_state: Vec<ZoneRecord>,
}

/// One tracked symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRecord {
    pub symbol_id: GeometryId,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub line_color: Option<String>,
    #[serde(default)]
    pub opacity: Option<f64>,
    #[serde(default)]
    pub line_weight: Option<f64>,
    #[serde(default)]
    pub line_dash: Option<String>,
    /// Placed in a slot rather than sitting in storage.
    #[serde(default)]
    pub dropped: bool,
    #[serde(default)]
    pub drop_zone_id: Option<usize>,
    #[serde(default)]
    pub stable_id: Option<GeometryId>,
}

/// One slot of the palette row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneRecord {
    pub zone_index: usize,
    #[serde(default)]
    pub symbol_id: Option<GeometryId>,
    #[serde(default)]
    pub is_filled: bool,
    #[serde(default)]
    pub position: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::Composition;
    use crate::geo::{Meters, Pixels};
    use crate::shapes::{ArrowType, DrawAction, MarkerShape};
    use crate::surface::HeadlessSurface;
    use chrono::{TimeZone, Utc};

    fn sample(surface: &mut HeadlessSurface) -> Composition {
        let mut comp = Composition::new();
        comp.set_title("Field survey").unwrap();
        let hex = comp
            .draw(
                DrawAction::Marker {
                    position: LatLng::new(48.85, 2.35),
                    shape: MarkerShape::Hexagon,
                    size: Some(30.0),
                },
                surface,
            )
            .unwrap();
        let line = comp
            .draw(
                DrawAction::Polyline {
                    vertices: vec![
                        LatLng::new(48.80, 2.30),
                        LatLng::new(48.82, 2.40),
                        LatLng::new(48.90, 2.42),
                    ],
                    arrow: ArrowType::Both,
                },
                surface,
            )
            .unwrap();
        comp.apply_curve(line, 1, LatLng::new(48.87, 2.47), surface).unwrap();
        let rect = comp
            .draw(
                DrawAction::Rectangle {
                    corner_a: LatLng::new(48.86, 2.33),
                    corner_b: LatLng::new(48.84, 2.37),
                },
                surface,
            )
            .unwrap();
        let circle = comp
            .draw(
                DrawAction::Circle {
                    center: LatLng::new(48.85, 2.35),
                    radius: Meters(2500.0),
                },
                surface,
            )
            .unwrap();
        comp.draw(
            DrawAction::CircleMarker {
                center: LatLng::new(48.83, 2.31),
                radius: Pixels(9.0),
            },
            surface,
        )
        .unwrap();

        let part = comp.add_part("Infrastructure").unwrap();
        let subs = comp.add_sub_parts(&part, 2).unwrap();
        comp.assign_to_part(circle, Some(&part)).unwrap();
        comp.assign_to_part(hex, Some(&part)).unwrap();
        comp.assign_to_part(line, Some(&subs[1])).unwrap();
        comp.assign_to_part(rect, Some(&subs[0])).unwrap();
        comp.place_symbol(line, 0).unwrap();
        comp.place_symbol(hex, 7).unwrap();
        comp
    }

    #[test]
    fn test_export_import_roundtrip() {
        let at = Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap();
        let mut surface = HeadlessSurface::new();
        let original = sample(&mut surface);
        let first = export_document(&original, at);
        let json = first.to_json().unwrap();

        let mut target_surface = HeadlessSurface::new();
        let mut restored = Composition::new();
        let parsed = Document::from_json(&json).unwrap();
        let report = import_document(&mut restored, &parsed, &mut target_surface).unwrap();
        assert!(report.is_complete());
        assert!(report.warnings.is_empty());
        assert_eq!(target_surface.live_count(), original.model().len());

        let second = export_document(&restored, at);
        assert_eq!(second, first);
        assert_eq!(restored.legend(), original.legend());
        assert_eq!(restored.palette(), original.palette());
    }

    #[test]
    fn test_membership_follows_part_id_not_lists() {
        let mut surface = HeadlessSurface::new();
        let original = sample(&mut surface);
        let mut doc = export_document(&original, Utc::now());
        // A stale list entry claims the circle for the sub-part.
        doc.legend_parts[0].sub_parts[0].geometries.push(3);

        let mut restored = Composition::new();
        import_document(&mut restored, &doc, &mut HeadlessSurface::new()).unwrap();
        let part = &doc.legend_parts[0].id;
        let circle = doc.geometries[3].id;
        assert_eq!(restored.legend().resolve_part_of(circle), Some(part));
        assert_eq!(restored.legend().membership_count(circle), 1);
    }

    #[test]
    fn test_reimport_is_stable_for_curves_and_arrows() {
        let mut surface = HeadlessSurface::new();
        let original = sample(&mut surface);
        let doc = export_document(&original, Utc::now());
        let line = &doc.geometries[1];
        assert_eq!(line.arrow_type.as_deref(), Some("both"));
        assert!(line.is_curved);
        assert!(line.segment_curves.as_ref().unwrap().contains_key(&1));

        let rect = &doc.geometries[2];
        assert_eq!(rect.type_name, "Polygon");
        assert_eq!(rect.coordinates[0].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_minimal_document_parses() {
        let json = r#"{
            "version": "1.0.0",
            "mapView": {"center": {"lat": 46.6, "lng": 1.9}, "zoom": 6}
        }"#;
        let doc = Document::from_json(json).unwrap();
        assert_eq!(doc.tile_layer, "osm");
        assert!(doc.geometries.is_empty());
        assert!(doc.symbol_palette.used_symbols.is_empty());
    }

    #[test]
    fn test_record_field_names() {
        let record = GeometryRecord {
            id: GeometryId(3),
            index: 0,
            type_name: "CircleMarker".to_string(),
            name: "Dot".to_string(),
            coordinates: serde_json::json!({"lat": 1.0, "lng": 2.0}),
            color: Some("#3388ff".to_string()),
            line_color: Some("#3388ff".to_string()),
            opacity: Some(0.2),
            line_dash: Some("solid".to_string()),
            line_weight: Some(3.0),
            shape: None,
            marker_size: None,
            arrow_type: None,
            line_type: None,
            segment_curves: None,
            is_curved: false,
            part_id: None,
            radius: Some(8.0),
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["type"], "CircleMarker");
        assert_eq!(v["lineColor"], "#3388ff");
        assert_eq!(v["radius"], 8.0);
        assert!(v["partId"].is_null());
        assert!(v.get("shape").is_none());
    }
}
