//! Composition: the map being edited.
//!
//! Owns the geometry model, the legend and the symbol palette, and keeps
//! the invariants that span them. Also carries the capture state machine:
//! while an export is capturing or compositing, every mutation is rejected.

use crate::geo::{LatLng, LatLngBounds};
use crate::geometry::{Geometry, GeometryId};
use crate::legend::{Direction, LegendHierarchy, NodeId};
use crate::model::{GeometryModel, ModelError, ModelResult};
use crate::palette::SymbolPalette;
use crate::shapes::{ArrowType, DrawAction, GeometryKind, GeometryStyle, StylePatch};
use crate::surface::DisplaySurface;
use crate::view::MapView;
use serde::{Deserialize, Serialize};

/// Background tile layer used when none is set.
pub const DEFAULT_TILE_LAYER: &str = "osm";

/// Export pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureState {
    #[default]
    Idle,
    /// Display state is being altered and rasters captured.
    Capturing,
    /// Captured rasters are being composited.
    Compositing,
}

/// An annotated map.
#[derive(Debug)]
pub struct Composition {
    model: GeometryModel,
    legend: LegendHierarchy,
    palette: SymbolPalette,
    title: String,
    view: MapView,
    /// Bounds restored from a document, until the view changes.
    view_bounds: Option<LatLngBounds>,
    tile_layer: String,
    state: CaptureState,
}

impl Default for Composition {
    fn default() -> Self {
        Self::new()
    }
}

impl Composition {
    pub fn new() -> Self {
        Self {
            model: GeometryModel::new(),
            legend: LegendHierarchy::new(),
            palette: SymbolPalette::default(),
            title: String::new(),
            view: MapView::default(),
            view_bounds: None,
            tile_layer: DEFAULT_TILE_LAYER.to_string(),
            state: CaptureState::Idle,
        }
    }

    pub fn with_palette_slots(mut self, slots: usize) -> Self {
        self.palette = SymbolPalette::new(slots);
        self
    }

    pub fn model(&self) -> &GeometryModel {
        &self.model
    }

    pub fn legend(&self) -> &LegendHierarchy {
        &self.legend
    }

    pub fn palette(&self) -> &SymbolPalette {
        &self.palette
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn view(&self) -> &MapView {
        &self.view
    }

    /// Geographic bounds of the visible map.
    pub fn view_bounds(&self) -> LatLngBounds {
        self.view_bounds.unwrap_or_else(|| self.view.bounds())
    }

    pub fn tile_layer(&self) -> &str {
        &self.tile_layer
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == CaptureState::Idle
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.model.get(id)
    }

    /// Whether any polyline carries an arrowhead.
    pub fn has_arrows(&self) -> bool {
        self.model.iter().any(|g| g.kind.arrow().is_decorated())
    }

    fn ensure_idle(&self) -> ModelResult<()> {
        if self.is_idle() {
            Ok(())
        } else {
            log::warn!("Mutation rejected while {:?}", self.state);
            Err(ModelError::Busy(self.state))
        }
    }

    // Geometry operations

    pub fn create(
        &mut self,
        kind: GeometryKind,
        style: GeometryStyle,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<GeometryId> {
        self.ensure_idle()?;
        let id = self.model.create(kind, style, surface)?;
        if let Some(g) = self.model.get(id) {
            self.palette.ensure_entry(g);
        }
        Ok(id)
    }

    /// Create a geometry from a draw gesture with the kind's default style.
    pub fn draw(
        &mut self,
        action: DrawAction,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<GeometryId> {
        let kind = action.into_kind()?;
        let style = GeometryStyle::default_for(&kind);
        self.create(kind, style, surface)
    }

    pub fn mutate_coordinates(
        &mut self,
        id: GeometryId,
        kind: GeometryKind,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<bool> {
        self.ensure_idle()?;
        self.model.mutate_coordinates(id, kind, surface)
    }

    pub fn mutate_style(
        &mut self,
        id: GeometryId,
        patch: &StylePatch,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<()> {
        self.ensure_idle()?;
        self.model.mutate_style(id, patch, surface)?;
        self.refresh_symbol(id);
        Ok(())
    }

    pub fn apply_curve(
        &mut self,
        id: GeometryId,
        segment: usize,
        control: LatLng,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<()> {
        self.ensure_idle()?;
        self.model.apply_curve(id, segment, control, surface)
    }

    pub fn clear_curves(&mut self, id: GeometryId, surface: &mut dyn DisplaySurface) -> ModelResult<()> {
        self.ensure_idle()?;
        self.model.clear_curves(id, surface)
    }

    pub fn set_arrow(
        &mut self,
        id: GeometryId,
        arrow: ArrowType,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<()> {
        self.ensure_idle()?;
        self.model.set_arrow(id, arrow, surface)
    }

    pub fn rename(&mut self, id: GeometryId, name: impl Into<String>) -> ModelResult<()> {
        self.ensure_idle()?;
        self.model.rename(id, name)?;
        self.refresh_symbol(id);
        Ok(())
    }

    /// Delete a geometry: detach its handle, drop it from the legend and
    /// from palette tracking.
    pub fn delete(
        &mut self,
        id: GeometryId,
        surface: &mut dyn DisplaySurface,
    ) -> ModelResult<Geometry> {
        self.ensure_idle()?;
        let geometry = self
            .model
            .remove(id, surface)
            .ok_or(ModelError::UnknownGeometry(id))?;
        self.legend.remove_member(id);
        self.palette.remove(id);
        log::info!("Deleted geometry {} ({})", id, geometry.name);
        Ok(geometry)
    }

    /// Put a geometry under a legend node, or clear it with `None`.
    ///
    /// The geometry leaves any previous node first; assigning to the node it
    /// already belongs to changes nothing.
    pub fn assign_to_part(&mut self, id: GeometryId, node: Option<&NodeId>) -> ModelResult<()> {
        self.ensure_idle()?;
        self.assign_unchecked(id, node)
    }

    pub(crate) fn assign_unchecked(&mut self, id: GeometryId, node: Option<&NodeId>) -> ModelResult<()> {
        if !self.model.contains(id) {
            return Err(ModelError::UnknownGeometry(id));
        }
        match node {
            Some(node) => {
                if self.legend.resolve_part_of(id) == Some(node) {
                    return Ok(());
                }
                self.legend.insert_member(node, id)?;
                self.model.set_legend_part(id, Some(node.clone()));
            }
            None => {
                self.legend.remove_member(id);
                self.model.set_legend_part(id, None);
            }
        }
        Ok(())
    }

    /// Geometries with no legend node, in draw order.
    pub fn unclassified(&self) -> Vec<GeometryId> {
        self.model
            .iter()
            .filter(|g| g.legend_part.is_none())
            .map(|g| g.id)
            .collect()
    }

    // Legend operations

    pub fn add_part(&mut self, title: impl Into<String>) -> ModelResult<NodeId> {
        self.ensure_idle()?;
        Ok(self.legend.add_part(title))
    }

    pub fn add_sub_parts(&mut self, part: &NodeId, count: usize) -> ModelResult<Vec<NodeId>> {
        self.ensure_idle()?;
        Ok(self.legend.add_sub_parts(part, count)?)
    }

    pub fn rename_part(&mut self, part: &NodeId, title: impl Into<String>) -> ModelResult<()> {
        self.ensure_idle()?;
        Ok(self.legend.rename_part(part, title)?)
    }

    pub fn rename_sub_part(&mut self, sub_part: &NodeId, title: impl Into<String>) -> ModelResult<()> {
        self.ensure_idle()?;
        Ok(self.legend.rename_sub_part(sub_part, title)?)
    }

    /// Delete a part and its sub-parts; their geometries become unclassified.
    pub fn delete_part(&mut self, part: &NodeId) -> ModelResult<Vec<GeometryId>> {
        self.ensure_idle()?;
        let released = self.legend.delete_part(part)?;
        self.release(&released);
        Ok(released)
    }

    /// Delete a sub-part; its geometries become unclassified.
    pub fn delete_sub_part(&mut self, sub_part: &NodeId) -> ModelResult<Vec<GeometryId>> {
        self.ensure_idle()?;
        let released = self.legend.delete_sub_part(sub_part)?;
        self.release(&released);
        Ok(released)
    }

    pub fn move_part(&mut self, part: &NodeId, direction: Direction) -> ModelResult<bool> {
        self.ensure_idle()?;
        Ok(self.legend.move_part(part, direction)?)
    }

    fn release(&mut self, ids: &[GeometryId]) {
        for &id in ids {
            self.model.set_legend_part(id, None);
        }
        // Anything still pointing at a node that no longer exists.
        let dangling: Vec<GeometryId> = self
            .model
            .iter()
            .filter(|g| g.legend_part.as_ref().is_some_and(|n| !self.legend.node_exists(n)))
            .map(|g| g.id)
            .collect();
        for id in dangling {
            log::warn!("Geometry {} referenced a deleted legend node", id);
            self.model.set_legend_part(id, None);
        }
    }

    // Palette operations

    /// Place a geometry's symbol into a slot. Returns the evicted occupant.
    pub fn place_symbol(&mut self, id: GeometryId, slot: usize) -> ModelResult<Option<GeometryId>> {
        self.ensure_idle()?;
        let geometry = self.model.get(id).ok_or(ModelError::UnknownGeometry(id))?;
        self.palette.ensure_entry(geometry);
        Ok(self.palette.place(id, slot)?)
    }

    pub fn unplace_symbol(&mut self, id: GeometryId) -> ModelResult<Option<usize>> {
        self.ensure_idle()?;
        Ok(self.palette.unplace(id)?)
    }

    fn refresh_symbol(&mut self, id: GeometryId) {
        if let Some(g) = self.model.get(id) {
            self.palette.refresh(g);
        }
    }

    // Map settings

    pub fn set_title(&mut self, title: impl Into<String>) -> ModelResult<()> {
        self.ensure_idle()?;
        self.title = title.into();
        Ok(())
    }

    pub fn set_view(&mut self, view: MapView) -> ModelResult<()> {
        self.ensure_idle()?;
        self.view = view;
        self.view_bounds = None;
        Ok(())
    }

    pub fn set_tile_layer(&mut self, layer: impl Into<String>) -> ModelResult<()> {
        self.ensure_idle()?;
        self.tile_layer = layer.into();
        Ok(())
    }

    /// Remove every geometry, legend node and palette entry.
    pub fn clear(&mut self, surface: &mut dyn DisplaySurface) -> ModelResult<()> {
        self.ensure_idle()?;
        self.model.clear(surface);
        self.legend.clear();
        self.palette.clear();
        Ok(())
    }

    // Internal access for the document importer

    pub(crate) fn model_mut(&mut self) -> &mut GeometryModel {
        &mut self.model
    }

    pub(crate) fn legend_mut(&mut self) -> &mut LegendHierarchy {
        &mut self.legend
    }

    pub(crate) fn palette_mut(&mut self) -> &mut SymbolPalette {
        &mut self.palette
    }

    pub(crate) fn sync_palette(&mut self) {
        self.palette.sync(self.model.iter());
    }

    /// Move to a stored view. The container is resized to fit `bounds` when
    /// they describe a usable area.
    pub(crate) fn restore_view(&mut self, center: LatLng, zoom: f64, bounds: Option<LatLngBounds>) {
        self.view.set_view(center, zoom);
        self.view_bounds = None;
        if let Some(bounds) = bounds {
            if let Some(size) = self.view.size_for_bounds(&bounds) {
                self.view.size = size;
                self.view_bounds = Some(bounds);
            }
        }
    }

    // Capture state machine

    /// `Idle → Capturing`. Fails if an export is already running.
    pub fn begin_capture(&mut self) -> ModelResult<()> {
        if self.state != CaptureState::Idle {
            return Err(ModelError::Busy(self.state));
        }
        self.state = CaptureState::Capturing;
        log::debug!("Capture started");
        Ok(())
    }

    /// `Capturing → Compositing`.
    pub fn enter_compositing(&mut self) {
        if self.state == CaptureState::Capturing {
            self.state = CaptureState::Compositing;
        } else {
            log::warn!("enter_compositing called while {:?}", self.state);
        }
    }

    /// Back to `Idle` from any state.
    pub fn finish_capture(&mut self) {
        self.state = CaptureState::Idle;
        log::debug!("Capture finished");
    }
}
