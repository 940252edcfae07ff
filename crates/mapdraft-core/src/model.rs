//! Geometry model: the canonical set of geometries and their render handles.

use crate::composition::CaptureState;
use crate::geo::LatLng;
use crate::geometry::{Geometry, GeometryId};
use crate::legend::{LegendError, NodeId};
use crate::palette::PaletteError;
use crate::shapes::{ArrowType, GeometryKind, GeometryStyle, StylePatch, ValidationError};
use crate::surface::{DisplaySurface, RenderHandle, RenderSpec};
use std::collections::HashMap;
use std::mem::discriminant;
use thiserror::Error;

/// Model errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Geometry id {0} already exists")]
    IdentityConflict(GeometryId),
    #[error("Render handle creation failed: {0}")]
    RenderResource(String),
    #[error("Unknown geometry: {0}")]
    UnknownGeometry(GeometryId),
    #[error("Geometry {0} is not a polyline")]
    NotAPolyline(GeometryId),
    #[error("Composition is busy ({0:?})")]
    Busy(CaptureState),
    #[error(transparent)]
    Legend(#[from] LegendError),
    #[error(transparent)]
    Palette(#[from] PaletteError),
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// All geometries in draw order, plus one render handle per geometry.
///
/// Handles are never restructured in place: any change to a geometry's
/// vertex list destroys its handle and creates a new one.
#[derive(Debug, Default)]
pub struct GeometryModel {
    geometries: HashMap<GeometryId, Geometry>,
    /// Draw order (back to front).
    order: Vec<GeometryId>,
    handles: HashMap<GeometryId, RenderHandle>,
    /// Highest id ever handed out or imported.
    last_id: u64,
}

impl GeometryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: GeometryId) -> bool {
        self.geometries.contains_key(&id)
    }

    pub fn get(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: GeometryId) -> Option<&mut Geometry> {
        self.geometries.get_mut(&id)
    }

    /// Geometries in draw order.
    pub fn iter(&self) -> impl Iterator<Item = &Geometry> {
        self.order.iter().filter_map(|id| self.geometries.get(id))
    }

    pub fn ids(&self) -> &[GeometryId] {
        &self.order
    }

    /// Position of a geometry in draw order.
    pub fn index_of(&self, id: GeometryId) -> Option<usize> {
        self.order.iter().position(|&g| g == id)
    }

    pub fn has_handle(&self, id: GeometryId) -> bool {
        self.handles.contains_key(&id)
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// The id the next created geometry will get.
    pub fn peek_next_id(&self) -> GeometryId {
        GeometryId(self.last_id + 1)
    }

    /// Add a geometry with a freshly minted id.
    pub fn create(
        &mut self,
        kind: GeometryKind,
        style: GeometryStyle,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<GeometryId> {
        let kind = kind.normalized();
        kind.validate()?;
        let id = self.peek_next_id();
        self.insert(Geometry::new(id, kind, style), surface)
    }

    /// Add a geometry that already carries its id (import path).
    pub fn insert(
        &mut self,
        geometry: Geometry,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<GeometryId> {
        let id = geometry.id;
        if self.geometries.contains_key(&id) {
            log::warn!("Rejecting duplicate geometry id {}", id);
            return Err(ModelError::IdentityConflict(id));
        }
        geometry.kind.validate()?;

        let handle = surface
            .create_handle(&RenderSpec::from_geometry(&geometry))
            .map_err(|e| ModelError::RenderResource(e.to_string()))?;

        self.last_id = self.last_id.max(id.0);
        self.handles.insert(id, handle);
        self.order.push(id);
        self.geometries.insert(id, geometry);
        log::debug!("Geometry {} added", id);
        Ok(id)
    }

    /// Replace a geometry's coordinates and rebuild its handle.
    ///
    /// Unknown ids are logged and ignored (`Ok(false)`). The new coordinates
    /// must describe the same kind of geometry.
    pub fn mutate_coordinates(
        &mut self,
        id: GeometryId,
        kind: GeometryKind,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<bool> {
        let Some(geometry) = self.geometries.get_mut(&id) else {
            log::warn!("mutate_coordinates: unknown geometry {}", id);
            return Ok(false);
        };
        if discriminant(&geometry.kind) != discriminant(&kind) {
            return Err(ValidationError::KindChange {
                from: geometry.kind.type_name(),
                to: kind.type_name(),
            }
            .into());
        }
        let kind = kind.normalized();
        kind.validate()?;
        geometry.kind = kind;
        self.rebuild_handle(id, surface)?;
        Ok(true)
    }

    /// Apply a partial style. Handles are restyled in place unless the
    /// marker size changed, which needs a new handle.
    pub fn mutate_style(
        &mut self,
        id: GeometryId,
        patch: &StylePatch,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<()> {
        let geometry = self
            .geometries
            .get_mut(&id)
            .ok_or(ModelError::UnknownGeometry(id))?;
        geometry.style.apply(patch);

        let mut resized = false;
        if let (GeometryKind::Marker(marker), Some(size)) = (&mut geometry.kind, patch.marker_size) {
            if size.is_finite() && size > 0.0 && (marker.size - size).abs() > f64::EPSILON {
                marker.size = size;
                resized = true;
            }
        }

        if resized {
            self.rebuild_handle(id, surface)
        } else {
            if let Some(handle) = self.handles.get(&id) {
                surface.set_handle_style(handle, &geometry.style);
            }
            Ok(())
        }
    }

    /// Bend one polyline segment through a control point.
    pub fn apply_curve(
        &mut self,
        id: GeometryId,
        segment: usize,
        control: LatLng,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<()> {
        self.polyline_mut(id)?.set_curve(segment, control)?;
        self.rebuild_handle(id, surface)
    }

    /// Straighten every segment of a polyline.
    pub fn clear_curves(
        &mut self,
        id: GeometryId,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<()> {
        self.polyline_mut(id)?.curves.clear();
        self.rebuild_handle(id, surface)
    }

    pub fn set_arrow(
        &mut self,
        id: GeometryId,
        arrow: ArrowType,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<()> {
        self.polyline_mut(id)?.arrow = arrow;
        self.rebuild_handle(id, surface)
    }

    pub fn rename(&mut self, id: GeometryId, name: impl Into<String>) -> ModelResult<()> {
        let geometry = self
            .geometries
            .get_mut(&id)
            .ok_or(ModelError::UnknownGeometry(id))?;
        geometry.name = name.into();
        Ok(())
    }

    pub(crate) fn set_legend_part(&mut self, id: GeometryId, part: Option<NodeId>) -> bool {
        match self.geometries.get_mut(&id) {
            Some(g) => {
                g.legend_part = part;
                true
            }
            None => false,
        }
    }

    /// Remove a geometry, detaching its handle first.
    pub fn remove(&mut self, id: GeometryId, surface: &mut dyn DisplaySurface) -> Option<Geometry> {
        if let Some(handle) = self.handles.remove(&id) {
            surface.destroy_handle(handle);
        }
        self.order.retain(|&g| g != id);
        self.geometries.remove(&id)
    }

    /// Remove everything, destroying every handle before dropping records.
    ///
    /// Ids are not recycled: the counter keeps its high-water mark.
    pub fn clear(&mut self, surface: &mut dyn DisplaySurface) {
        for (_, handle) in self.handles.drain() {
            surface.destroy_handle(handle);
        }
        self.order.clear();
        self.geometries.clear();
    }

    fn polyline_mut(&mut self, id: GeometryId) -> ModelResult<&mut crate::shapes::Polyline> {
        self.geometries
            .get_mut(&id)
            .ok_or(ModelError::UnknownGeometry(id))?
            .kind
            .as_polyline_mut()
            .ok_or(ModelError::NotAPolyline(id))
    }

    /// Destroy then recreate the handle for a geometry.
    fn rebuild_handle(&mut self, id: GeometryId, surface: &mut dyn DisplaySurface) -> ModelResult<()> {
        if let Some(old) = self.handles.remove(&id) {
            surface.destroy_handle(old);
        }
        let geometry = self
            .geometries
            .get(&id)
            .ok_or(ModelError::UnknownGeometry(id))?;
        match surface.create_handle(&RenderSpec::from_geometry(geometry)) {
            Ok(handle) => {
                self.handles.insert(id, handle);
                Ok(())
            }
            Err(e) => {
                log::error!("Could not recreate handle for geometry {}: {}", id, e);
                Err(ModelError::RenderResource(e.to_string()))
            }
        }
    }
}
