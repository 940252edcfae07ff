//! Polygons with optional holes.

use super::ValidationError;
use crate::geo::LatLng;
use serde::{Deserialize, Serialize};

/// A closed area. The first ring is the outer boundary, later rings are holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub rings: Vec<Vec<LatLng>>,
}

impl Polygon {
    pub fn new(outer: Vec<LatLng>) -> Self {
        Self { rings: vec![outer] }
    }

    pub fn with_holes(outer: Vec<LatLng>, holes: Vec<Vec<LatLng>>) -> Self {
        let mut rings = vec![outer];
        rings.extend(holes);
        Self { rings }
    }

    pub fn outer(&self) -> &[LatLng] {
        self.rings.first().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn holes(&self) -> &[Vec<LatLng>] {
        self.rings.get(1..).unwrap_or(&[])
    }

    /// Drop invalid vertices and degenerate holes.
    ///
    /// The outer ring keeps only valid positions; holes with fewer than three
    /// valid vertices are removed.
    pub fn sanitized(mut self) -> Self {
        for ring in &mut self.rings {
            ring.retain(LatLng::is_valid);
        }
        let mut rings = self.rings.into_iter();
        let outer = rings.next().unwrap_or_default();
        let holes = rings.filter(|r| r.len() >= 3).collect();
        Self::with_holes(outer, holes)
    }

    /// Remove holes with fewer than three valid vertices.
    pub fn without_degenerate_holes(mut self) -> Self {
        let mut rings = std::mem::take(&mut self.rings).into_iter();
        let outer = rings.next().unwrap_or_default();
        let holes = rings
            .filter(|r| r.iter().filter(|v| v.is_valid()).count() >= 3)
            .collect();
        Self::with_holes(outer, holes)
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        let outer = self.outer();
        if outer.is_empty() {
            return Err(ValidationError::EmptyCoordinates);
        }
        if let Some(bad) = self.rings.iter().flatten().find(|v| !v.is_valid()) {
            return Err(ValidationError::InvalidPoint(*bad));
        }
        if let Some(short) = self.rings.iter().find(|r| r.len() < 3) {
            return Err(ValidationError::TooFewVertices {
                kind: "Polygon",
                required: 3,
                found: short.len(),
            });
        }
        Ok(())
    }
}
