//! Display surface abstraction.
//!
//! The interactive map widget lives outside this crate. The model talks to
//! it through [`DisplaySurface`], which hands out one exclusively owned
//! [`RenderHandle`] per geometry.

use crate::geo::{LatLng, Meters, Pixels};
use crate::geometry::{Geometry, GeometryId};
use crate::shapes::{ArrowType, GeometryKind, GeometryStyle, MarkerShape};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Display surface errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurfaceError {
    #[error("Handle creation failed: {0}")]
    CreateFailed(String),
}

/// Opaque token for an on-screen renderable.
///
/// Not `Clone`: exactly one owner exists, and destroying it consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct RenderHandle(u64);

impl RenderHandle {
    /// Mint a handle. Only surfaces should call this.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// What a surface must draw for one geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderShape {
    Marker {
        position: LatLng,
        shape: MarkerShape,
        size: f64,
    },
    /// Already expanded through any curved segments.
    Polyline {
        vertices: Vec<LatLng>,
        arrow: ArrowType,
    },
    Polygon {
        rings: Vec<Vec<LatLng>>,
    },
    GeodesicCircle {
        center: LatLng,
        radius: Meters,
    },
    PixelCircle {
        center: LatLng,
        radius: Pixels,
    },
}

/// Handle creation request.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSpec {
    pub geometry: GeometryId,
    pub shape: RenderShape,
    pub style: GeometryStyle,
}

impl RenderSpec {
    pub fn from_geometry(geometry: &Geometry) -> Self {
        let shape = match &geometry.kind {
            GeometryKind::Marker(m) => RenderShape::Marker {
                position: m.position,
                shape: m.shape,
                size: m.size,
            },
            GeometryKind::Polyline(p) => RenderShape::Polyline {
                vertices: p.rendered_vertices(),
                arrow: p.arrow,
            },
            GeometryKind::Polygon(p) => RenderShape::Polygon {
                rings: p.rings.clone(),
            },
            GeometryKind::GeodesicCircle(c) => RenderShape::GeodesicCircle {
                center: c.center,
                radius: c.radius,
            },
            GeometryKind::PixelCircle(c) => RenderShape::PixelCircle {
                center: c.center,
                radius: c.radius,
            },
        };
        Self {
            geometry: geometry.id,
            shape,
            style: geometry.style.clone(),
        }
    }
}

/// The on-screen map the model keeps in sync.
pub trait DisplaySurface {
    /// Register a renderable for a geometry.
    fn create_handle(&mut self, spec: &RenderSpec) -> Result<RenderHandle, SurfaceError>;

    /// Remove a renderable from the surface.
    fn destroy_handle(&mut self, handle: RenderHandle);

    /// Restyle a renderable in place.
    fn set_handle_style(&mut self, handle: &RenderHandle, style: &GeometryStyle);
}

/// In-memory surface for headless rendering and tests.
///
/// Tracks every live handle so leaks are observable.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    next: u64,
    live: HashMap<u64, RenderSpec>,
    failing: HashSet<GeometryId>,
    created: usize,
    destroyed: usize,
    restyled: usize,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make handle creation fail for one geometry.
    pub fn fail_creation_for(&mut self, id: GeometryId) {
        self.failing.insert(id);
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn created_count(&self) -> usize {
        self.created
    }

    pub fn destroyed_count(&self) -> usize {
        self.destroyed
    }

    pub fn restyled_count(&self) -> usize {
        self.restyled
    }

    /// The live spec drawn for a geometry, if any.
    pub fn spec_for(&self, id: GeometryId) -> Option<&RenderSpec> {
        self.live.values().find(|s| s.geometry == id)
    }
}

impl DisplaySurface for HeadlessSurface {
    fn create_handle(&mut self, spec: &RenderSpec) -> Result<RenderHandle, SurfaceError> {
        if self.failing.contains(&spec.geometry) {
            return Err(SurfaceError::CreateFailed(format!(
                "surface refused geometry {}",
                spec.geometry
            )));
        }
        self.next += 1;
        self.created += 1;
        self.live.insert(self.next, spec.clone());
        Ok(RenderHandle::new(self.next))
    }

    fn destroy_handle(&mut self, handle: RenderHandle) {
        if self.live.remove(&handle.raw()).is_some() {
            self.destroyed += 1;
        } else {
            log::warn!("Destroying unknown render handle {}", handle.raw());
        }
    }

    fn set_handle_style(&mut self, handle: &RenderHandle, style: &GeometryStyle) {
        if let Some(spec) = self.live.get_mut(&handle.raw()) {
            spec.style = style.clone();
            self.restyled += 1;
        }
    }
}
