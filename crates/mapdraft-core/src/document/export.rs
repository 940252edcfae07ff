//! Composition to document.

use super::{
    DOCUMENT_VERSION, Document, GeometryRecord, PaletteRecord, PartRecord, SubPartRecord,
    SymbolRecord, ViewRecord, ZoneRecord,
};
use crate::composition::Composition;
use crate::geo::LatLng;
use crate::geometry::{Geometry, GeometryId};
use crate::shapes::GeometryKind;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Snapshot a composition.
///
/// Legend membership is written twice: as `partId` on every geometry and as
/// positional index lists under each part. Importers treat `partId` as
/// authoritative and use the lists for ordering only.
pub fn export_document(comp: &Composition, exported_at: DateTime<Utc>) -> Document {
    let model = comp.model();
    let positions: HashMap<GeometryId, usize> = model
        .ids()
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i))
        .collect();

    let geometries: Vec<GeometryRecord> = model
        .iter()
        .enumerate()
        .map(|(index, g)| geometry_record(comp, index, g))
        .collect();

    let legend_parts = comp
        .legend()
        .parts()
        .iter()
        .map(|part| PartRecord {
            id: part.id.clone(),
            title: part.title.clone(),
            geometries: indices(&part.members, &positions),
            sub_parts: part
                .sub_parts
                .iter()
                .map(|sub| SubPartRecord {
                    id: sub.id.clone(),
                    title: sub.title.clone(),
                    geometries: indices(&sub.members, &positions),
                })
                .collect(),
        })
        .collect();

    let view = comp.view();
    let doc = Document {
        version: DOCUMENT_VERSION.to_string(),
        export_date: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        map_title: comp.title().to_string(),
        map_view: ViewRecord {
            center: view.center,
            zoom: view.zoom,
            bounds: Some(comp.view_bounds()),
        },
        tile_layer: comp.tile_layer().to_string(),
        geometries,
        legend_parts,
        symbol_palette: palette_record(comp),
    };
    log::info!(
        "Exported {} geometries, {} legend parts",
        doc.geometries.len(),
        doc.legend_parts.len()
    );
    doc
}

fn indices(members: &[GeometryId], positions: &HashMap<GeometryId, usize>) -> Vec<usize> {
    members
        .iter()
        .filter_map(|id| {
            let index = positions.get(id).copied();
            if index.is_none() {
                log::warn!("Legend lists unknown geometry {}, skipping", id);
            }
            index
        })
        .collect()
}

fn point(p: LatLng) -> Value {
    json!({ "lat": p.lat, "lng": p.lng })
}

fn coordinates(kind: &GeometryKind) -> Value {
    match kind {
        GeometryKind::Marker(m) => point(m.position),
        GeometryKind::PixelCircle(c) => point(c.center),
        GeometryKind::GeodesicCircle(c) => json!({
            "center": point(c.center),
            "radius": c.radius.0,
        }),
        GeometryKind::Polyline(p) => Value::Array(p.vertices.iter().copied().map(point).collect()),
        GeometryKind::Polygon(p) => {
            if p.rings.is_empty() {
                log::warn!("Polygon without rings exported with empty coordinates");
            }
            Value::Array(
                p.rings
                    .iter()
                    .map(|ring| Value::Array(ring.iter().copied().map(point).collect()))
                    .collect(),
            )
        }
    }
}

fn geometry_record(comp: &Composition, index: usize, g: &Geometry) -> GeometryRecord {
    let part_id = comp.legend().resolve_part_of(g.id).cloned();
    if part_id != g.legend_part {
        log::warn!(
            "Geometry {} legend field disagrees with the hierarchy, exporting {:?}",
            g.id,
            part_id
        );
    }

    let mut record = GeometryRecord {
        id: g.id,
        index,
        type_name: g.type_name(),
        name: g.name.clone(),
        coordinates: coordinates(&g.kind),
        color: Some(g.style.fill_color.to_hex()),
        line_color: Some(g.style.stroke_color.to_hex()),
        opacity: Some(g.style.opacity()),
        line_dash: Some(g.style.dash.name().to_string()),
        line_weight: Some(g.style.stroke_width),
        shape: None,
        marker_size: None,
        arrow_type: None,
        line_type: g.line_type.clone(),
        segment_curves: None,
        is_curved: false,
        part_id,
        radius: None,
    };

    match &g.kind {
        GeometryKind::Marker(m) => {
            record.shape = Some(m.shape.name().to_string());
            record.marker_size = Some(m.size);
        }
        GeometryKind::Polyline(p) => {
            record.arrow_type = Some(p.arrow.name().to_string());
            if p.is_curved() {
                record.segment_curves = Some(p.curves.clone());
                record.is_curved = true;
            }
        }
        GeometryKind::PixelCircle(c) => record.radius = Some(c.radius.0),
        GeometryKind::Polygon(_) | GeometryKind::GeodesicCircle(_) => {}
    }
    record
}

fn palette_record(comp: &Composition) -> PaletteRecord {
    let palette = comp.palette();
    let used_symbols = comp
        .model()
        .iter()
        .filter_map(|g| palette.entry(g.id))
        .map(|entry| SymbolRecord {
            symbol_id: entry.geometry,
            name: entry.name.clone(),
            type_name: entry.type_name.clone(),
            color: Some(entry.fill.to_hex()),
            line_color: Some(entry.stroke.to_hex()),
            opacity: Some(entry.opacity),
            line_weight: Some(entry.stroke_width),
            line_dash: Some(entry.dash.name().to_string()),
            dropped: entry.is_placed(),
            drop_zone_id: entry.slot,
            stable_id: Some(entry.geometry),
        })
        .collect();

    let drop_zones_state = palette
        .slots()
        .iter()
        .enumerate()
        .map(|(i, occupant)| ZoneRecord {
            zone_index: i,
            symbol_id: *occupant,
            is_filled: occupant.is_some(),
            position: i,
        })
        .collect();

    PaletteRecord {
        used_symbols,
        drop_zones_state,
    }
}
