//! Document to composition.
//!
//! Import replaces the composition wholesale. Geometry records are rebuilt
//! one at a time: a record that cannot be turned into a valid geometry is
//! reported and skipped, the rest of the document still loads.

use super::{
    Document, DocumentError, DocumentResult, GeometryRecord, PaletteRecord, PartRecord,
    ViewRecord,
};
use crate::composition::Composition;
use crate::geo::{LatLng, Meters, Pixels};
use crate::geometry::{Geometry, GeometryId};
use crate::legend::NodeId;
use crate::model::ModelError;
use crate::shapes::{
    ArrowType, GeodesicCircle, GeometryKind, GeometryStyle, GeometryType, LineDash, Marker,
    MarkerShape, PixelCircle, Polygon, Polyline, SerializableColor, ValidationError,
};
use crate::surface::DisplaySurface;
use serde_json::Value;
use std::collections::HashMap;

/// A geometry record that did not make it into the composition.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedGeometry {
    /// The record's `index` in the document.
    pub index: usize,
    pub id: Option<GeometryId>,
    pub reason: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    /// Ids of the rebuilt geometries, in document order.
    pub imported: Vec<GeometryId>,
    pub skipped: Vec<SkippedGeometry>,
    /// Non-fatal problems: unknown legend nodes, bad palette slots.
    pub warnings: Vec<String>,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    fn warn(&mut self, message: String) {
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Replace the composition's contents with a document.
///
/// Fails only when the composition is busy exporting; per-record problems
/// end up in the returned report.
pub fn import_document(
    comp: &mut Composition,
    doc: &Document,
    surface: &mut dyn DisplaySurface,
) -> DocumentResult<ImportReport> {
    if !comp.is_idle() {
        return Err(ModelError::Busy(comp.state()).into());
    }
    let mut report = ImportReport::default();

    comp.clear(surface)?;
    restore_view(comp, &doc.map_view, &mut report);
    comp.set_tile_layer(doc.tile_layer.clone())?;
    restore_legend(comp, &doc.legend_parts, &mut report);

    // Fallback membership for records without a partId.
    let mut listed_in: HashMap<usize, NodeId> = HashMap::new();
    for part in &doc.legend_parts {
        for &i in &part.geometries {
            listed_in.entry(i).or_insert_with(|| part.id.clone());
        }
        for sub in &part.sub_parts {
            for &i in &sub.geometries {
                listed_in.entry(i).or_insert_with(|| sub.id.clone());
            }
        }
    }

    let mut by_index: HashMap<usize, GeometryId> = HashMap::new();
    let mut assignments: Vec<(GeometryId, NodeId)> = Vec::new();
    for record in &doc.geometries {
        let geometry = match geometry_from_record(record) {
            Ok(g) => g,
            Err(e) => {
                skip(&mut report, record.index, Some(record.id), e.to_string());
                continue;
            }
        };
        match comp.model_mut().insert(geometry, surface) {
            Ok(id) => {
                report.imported.push(id);
                by_index.insert(record.index, id);
                let node = record
                    .part_id
                    .clone()
                    .or_else(|| listed_in.get(&record.index).cloned());
                if let Some(node) = node {
                    assignments.push((id, node));
                }
            }
            Err(e) => skip(&mut report, record.index, Some(record.id), e.to_string()),
        }
    }

    for (id, node) in assignments {
        if !comp.legend().node_exists(&node) {
            report.warn(format!(
                "Geometry {} refers to unknown legend node {}, left unclassified",
                id, node
            ));
            continue;
        }
        if let Err(e) = comp.assign_unchecked(id, Some(&node)) {
            report.warn(format!("Could not assign geometry {} to {}: {}", id, node, e));
        }
    }
    order_legend(comp, &doc.legend_parts, &by_index);

    comp.sync_palette();
    restore_palette(comp, &doc.symbol_palette, &mut report);

    comp.set_title(doc.map_title.clone())?;
    log::info!(
        "Imported {} geometries ({} skipped) into '{}'",
        report.imported.len(),
        report.skipped.len(),
        comp.title()
    );
    Ok(report)
}

/// Lenient import from JSON text.
///
/// Only a missing or non-object root is fatal. Records that do not even
/// deserialize are reported as skipped like any other invalid geometry.
pub fn import_json(
    comp: &mut Composition,
    json: &str,
    surface: &mut dyn DisplaySurface,
) -> DocumentResult<ImportReport> {
    let root: Value = serde_json::from_str(json)?;
    let obj = root
        .as_object()
        .ok_or_else(|| DocumentError::Invalid("document root is not an object".to_string()))?;

    let mut early = ImportReport::default();

    let map_view = match obj.get("mapView").cloned().map(serde_json::from_value::<ViewRecord>) {
        Some(Ok(view)) => view,
        Some(Err(e)) => {
            early.warn(format!("Unreadable mapView ({}), keeping the current view", e));
            current_view(comp)
        }
        None => current_view(comp),
    };

    let mut geometries = Vec::new();
    for (position, value) in list(obj.get("geometries")).iter().enumerate() {
        match serde_json::from_value::<GeometryRecord>(value.clone()) {
            Ok(mut record) => {
                if value.get("index").is_none() {
                    record.index = position;
                }
                geometries.push(record);
            }
            Err(e) => {
                let id = value.get("id").and_then(Value::as_u64).map(GeometryId);
                skip(&mut early, position, id, e.to_string());
            }
        }
    }

    let legend_parts = list(obj.get("legendParts"))
        .iter()
        .filter_map(|v| match serde_json::from_value::<PartRecord>(v.clone()) {
            Ok(part) => Some(part),
            Err(e) => {
                early.warn(format!("Skipping unreadable legend part: {}", e));
                None
            }
        })
        .collect();

    let symbol_palette = match obj.get("symbolPalette") {
        Some(v) => lenient_palette(v, &mut early),
        None => PaletteRecord::default(),
    };

    let doc = Document {
        version: str_field(obj.get("version")).unwrap_or_default(),
        export_date: str_field(obj.get("exportDate")).unwrap_or_default(),
        map_title: str_field(obj.get("mapTitle")).unwrap_or_default(),
        map_view,
        tile_layer: str_field(obj.get("tileLayer"))
            .unwrap_or_else(|| crate::composition::DEFAULT_TILE_LAYER.to_string()),
        geometries,
        legend_parts,
        symbol_palette,
    };

    let mut report = import_document(comp, &doc, surface)?;
    report.skipped.extend(early.skipped);
    report.skipped.sort_by_key(|s| s.index);
    let mut warnings = early.warnings;
    warnings.append(&mut report.warnings);
    report.warnings = warnings;
    Ok(report)
}

fn list(value: Option<&Value>) -> Vec<Value> {
    value.and_then(Value::as_array).cloned().unwrap_or_default()
}

fn str_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn current_view(comp: &Composition) -> ViewRecord {
    ViewRecord {
        center: comp.view().center,
        zoom: comp.view().zoom,
        bounds: None,
    }
}

fn lenient_palette(value: &Value, report: &mut ImportReport) -> PaletteRecord {
    let mut palette = PaletteRecord::default();
    for v in list(value.get("usedSymbols")) {
        match serde_json::from_value(v) {
            Ok(symbol) => palette.used_symbols.push(symbol),
            Err(e) => report.warn(format!("Skipping unreadable palette symbol: {}", e)),
        }
    }
    for v in list(value.get("dropZonesState")) {
        match serde_json::from_value(v) {
            Ok(zone) => palette.drop_zones_state.push(zone),
            Err(e) => report.warn(format!("Skipping unreadable palette slot: {}", e)),
        }
    }
    palette
}

fn skip(report: &mut ImportReport, index: usize, id: Option<GeometryId>, reason: String) {
    log::warn!("Skipping geometry record {} ({:?}): {}", index, id, reason);
    report.skipped.push(SkippedGeometry { index, id, reason });
}

fn restore_view(comp: &mut Composition, view: &ViewRecord, report: &mut ImportReport) {
    if !view.center.is_valid() || !view.zoom.is_finite() {
        report.warn(format!(
            "Invalid map view {:?} at zoom {}, keeping the current view",
            view.center, view.zoom
        ));
        return;
    }
    comp.restore_view(view.center, view.zoom, view.bounds);
}

fn restore_legend(comp: &mut Composition, parts: &[PartRecord], report: &mut ImportReport) {
    for part in parts {
        if let Err(e) = comp.legend_mut().insert_part(part.id.clone(), part.title.clone()) {
            report.warn(format!("Skipping legend part '{}': {}", part.title, e));
            continue;
        }
        for sub in &part.sub_parts {
            if let Err(e) = comp
                .legend_mut()
                .insert_sub_part(&part.id, sub.id.clone(), sub.title.clone())
            {
                report.warn(format!("Skipping legend sub-part '{}': {}", sub.title, e));
            }
        }
    }
}

/// Put members back in the order the document lists them.
fn order_legend(comp: &mut Composition, parts: &[PartRecord], by_index: &HashMap<usize, GeometryId>) {
    let ids = |indices: &[usize]| -> Vec<GeometryId> {
        indices.iter().filter_map(|i| by_index.get(i).copied()).collect()
    };
    for part in parts {
        comp.legend_mut().order_members(&part.id, &ids(&part.geometries));
        for sub in &part.sub_parts {
            comp.legend_mut().order_members(&sub.id, &ids(&sub.geometries));
        }
    }
}

fn restore_palette(comp: &mut Composition, record: &PaletteRecord, report: &mut ImportReport) {
    let placements: Vec<(GeometryId, usize)> = if record.drop_zones_state.is_empty() {
        record
            .used_symbols
            .iter()
            .filter(|s| s.dropped)
            .filter_map(|s| Some((s.stable_id.unwrap_or(s.symbol_id), s.drop_zone_id?)))
            .collect()
    } else {
        record
            .drop_zones_state
            .iter()
            .filter_map(|z| Some((z.symbol_id?, z.zone_index)))
            .collect()
    };

    for (id, slot) in placements {
        if !comp.model().contains(id) {
            report.warn(format!("Palette slot {} refers to missing geometry {}", slot, id));
            continue;
        }
        if let Err(e) = comp.palette_mut().place(id, slot) {
            report.warn(format!("Could not restore palette slot {}: {}", slot, e));
        }
    }
}

/// Rebuild one geometry from its record.
pub(crate) fn geometry_from_record(record: &GeometryRecord) -> Result<Geometry, ValidationError> {
    let kind = match GeometryType::parse(&record.type_name)? {
        GeometryType::Marker(shape) => marker(record, shape)?,
        GeometryType::CustomMarker => {
            let shape = record
                .shape
                .as_deref()
                .map(MarkerShape::parse)
                .unwrap_or_default();
            marker(record, shape)?
        }
        GeometryType::Polyline => polyline(record)?,
        GeometryType::Polygon => polygon(&record.coordinates)?,
        GeometryType::Circle => geodesic_circle(record)?,
        GeometryType::CircleMarker => pixel_circle(record)?,
    };
    kind.validate()?;

    let style = style(record, &kind);
    let mut geometry = Geometry::new(record.id, kind, style);
    if !record.name.is_empty() {
        geometry.name = record.name.clone();
    }
    geometry.line_type = record.line_type.clone();
    Ok(geometry)
}

fn point(value: &Value) -> Result<LatLng, ValidationError> {
    if value.is_null() {
        return Err(ValidationError::EmptyCoordinates);
    }
    LatLng::from_value(value).ok_or_else(|| {
        ValidationError::InvalidPoint(LatLng::new(
            value.get("lat").and_then(Value::as_f64).unwrap_or(f64::NAN),
            value.get("lng").and_then(Value::as_f64).unwrap_or(f64::NAN),
        ))
    })
}

/// Positions of a vertex list, invalid entries dropped.
fn vertices(value: &Value) -> Vec<LatLng> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    let points: Vec<LatLng> = items.iter().filter_map(LatLng::from_value).collect();
    if points.len() != items.len() {
        log::warn!("Dropped {} invalid vertices", items.len() - points.len());
    }
    points
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

fn marker(record: &GeometryRecord, shape: MarkerShape) -> Result<GeometryKind, ValidationError> {
    let position = point(&record.coordinates)?;
    let size = positive(record.marker_size).unwrap_or(Marker::DEFAULT_SIZE);
    Ok(GeometryKind::Marker(Marker::new(position, shape).with_size(size)))
}

fn polyline(record: &GeometryRecord) -> Result<GeometryKind, ValidationError> {
    let points = vertices(&record.coordinates);
    if points.len() < 2 {
        return Err(ValidationError::TooFewVertices {
            kind: "Polyline",
            required: 2,
            found: points.len(),
        });
    }
    let arrow = record
        .arrow_type
        .as_deref()
        .map(ArrowType::parse)
        .unwrap_or_default();
    let mut line = Polyline::new(points).with_arrow(arrow);
    if let Some(curves) = &record.segment_curves {
        for (&segment, &control) in curves {
            if let Err(e) = line.set_curve(segment, control) {
                log::warn!("Dropping curve on geometry {}: {}", record.id, e);
            }
        }
    }
    Ok(GeometryKind::Polyline(line))
}

fn polygon(value: &Value) -> Result<GeometryKind, ValidationError> {
    let Some(items) = value.as_array() else {
        return Err(ValidationError::EmptyCoordinates);
    };
    // Older documents store a single flat ring.
    let rings: Vec<Vec<LatLng>> = if items.first().is_some_and(Value::is_object) {
        vec![vertices(value)]
    } else {
        items.iter().map(vertices).collect()
    };
    let polygon = Polygon { rings }.sanitized();
    let found = polygon.outer().len();
    if found < 3 {
        return Err(ValidationError::TooFewVertices {
            kind: "Polygon",
            required: 3,
            found,
        });
    }
    Ok(GeometryKind::Polygon(polygon))
}

fn geodesic_circle(record: &GeometryRecord) -> Result<GeometryKind, ValidationError> {
    let coords = &record.coordinates;
    let center = match coords.get("center") {
        Some(c) => point(c)?,
        None => point(coords)?,
    };
    let radius = match coords.get("radius").and_then(Value::as_f64).or(record.radius) {
        Some(r) if r.is_finite() && r > 0.0 => r,
        Some(r) => return Err(ValidationError::InvalidRadius(r)),
        None => GeodesicCircle::DEFAULT_RADIUS.0,
    };
    Ok(GeometryKind::GeodesicCircle(GeodesicCircle::new(center, Meters(radius))))
}

fn pixel_circle(record: &GeometryRecord) -> Result<GeometryKind, ValidationError> {
    let coords = &record.coordinates;
    let center = match coords.get("center") {
        Some(c) => point(c)?,
        None => point(coords)?,
    };
    let below_max = |r: &f64| *r < PixelCircle::MAX_RADIUS.0;
    let radius = positive(record.radius.filter(below_max))
        .or_else(|| positive(record.marker_size.filter(below_max)))
        .unwrap_or(PixelCircle::DEFAULT_RADIUS.0);
    Ok(GeometryKind::PixelCircle(PixelCircle::new(center, Pixels(radius))))
}

fn color(value: Option<&str>, fallback: SerializableColor, id: GeometryId) -> SerializableColor {
    match value {
        Some(s) => SerializableColor::parse_hex(s).unwrap_or_else(|| {
            log::warn!("Geometry {} has unreadable color '{}'", id, s);
            fallback
        }),
        None => fallback,
    }
}

fn style(record: &GeometryRecord, kind: &GeometryKind) -> GeometryStyle {
    let mut style = GeometryStyle::default_for(kind);
    style.fill_color = color(record.color.as_deref(), style.fill_color, record.id);
    style.stroke_color = color(record.line_color.as_deref(), style.stroke_color, record.id);
    if let Some(opacity) = record.opacity.filter(|o| o.is_finite()) {
        style.set_opacity(opacity);
    }
    if let Some(weight) = record.line_weight.filter(|w| w.is_finite() && *w >= 0.0) {
        style.stroke_width = weight;
    }
    if let Some(dash) = &record.line_dash {
        style.dash = LineDash::parse(dash);
    }
    style
}
