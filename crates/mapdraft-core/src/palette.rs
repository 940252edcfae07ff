//! Symbol palette: legend symbols placed into a fixed row of slots.

use crate::geometry::{Geometry, GeometryId};
use crate::shapes::{LineDash, SerializableColor};
use std::collections::BTreeMap;
use thiserror::Error;

/// Default number of placement slots.
pub const PALETTE_SLOTS: usize = 10;

/// Palette errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaletteError {
    #[error("No palette symbol for geometry {0}")]
    UnknownSymbol(GeometryId),
    #[error("Slot {slot} out of range (palette has {slots} slots)")]
    SlotOutOfRange { slot: usize, slots: usize },
}

/// Result type for palette operations.
pub type PaletteResult<T> = Result<T, PaletteError>;

/// A geometry's legend symbol and its placement.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteEntry {
    pub geometry: GeometryId,
    pub name: String,
    pub type_name: String,
    pub fill: SerializableColor,
    pub stroke: SerializableColor,
    pub opacity: f64,
    pub stroke_width: f64,
    pub dash: LineDash,
    /// Slot holding the symbol, `None` while it sits in storage.
    pub slot: Option<usize>,
}

impl PaletteEntry {
    fn from_geometry(geometry: &Geometry) -> Self {
        let mut entry = Self {
            geometry: geometry.id,
            name: String::new(),
            type_name: String::new(),
            fill: geometry.style.fill_color,
            stroke: geometry.style.stroke_color,
            opacity: 1.0,
            stroke_width: 0.0,
            dash: LineDash::Solid,
            slot: None,
        };
        entry.refresh(geometry);
        entry
    }

    fn refresh(&mut self, geometry: &Geometry) {
        self.name = geometry.name.clone();
        self.type_name = geometry.type_name();
        self.fill = geometry.style.fill_color;
        self.stroke = geometry.style.stroke_color;
        self.opacity = geometry.style.opacity();
        self.stroke_width = geometry.style.stroke_width;
        self.dash = geometry.style.dash;
    }

    pub fn is_placed(&self) -> bool {
        self.slot.is_some()
    }
}

/// Palette entries, one per geometry, plus the slot row.
///
/// A slot holds at most one entry, and `entry.slot == Some(i)` exactly when
/// slot `i` holds that entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolPalette {
    entries: BTreeMap<GeometryId, PaletteEntry>,
    slots: Vec<Option<GeometryId>>,
}

impl Default for SymbolPalette {
    fn default() -> Self {
        Self::new(PALETTE_SLOTS)
    }
}

impl SymbolPalette {
    pub fn new(slot_count: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            slots: vec![None; slot_count],
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Option<GeometryId>] {
        &self.slots
    }

    pub fn entry(&self, id: GeometryId) -> Option<&PaletteEntry> {
        self.entries.get(&id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &PaletteEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn occupant(&self, slot: usize) -> Option<GeometryId> {
        self.slots.get(slot).copied().flatten()
    }

    /// Track a geometry's symbol if it is not tracked yet.
    pub fn ensure_entry(&mut self, geometry: &Geometry) -> &PaletteEntry {
        self.entries
            .entry(geometry.id)
            .or_insert_with(|| PaletteEntry::from_geometry(geometry))
    }

    /// Copy a geometry's current name and style into its entry.
    pub fn refresh(&mut self, geometry: &Geometry) {
        if let Some(entry) = self.entries.get_mut(&geometry.id) {
            entry.refresh(geometry);
        }
    }

    /// Stop tracking a geometry, vacating its slot.
    pub fn remove(&mut self, id: GeometryId) -> Option<PaletteEntry> {
        let entry = self.entries.remove(&id)?;
        if let Some(slot) = entry.slot {
            self.slots[slot] = None;
        }
        Some(entry)
    }

    /// Put a symbol into a slot.
    ///
    /// The symbol leaves its previous slot. Whatever occupied the target slot
    /// goes back to storage and is returned.
    pub fn place(&mut self, id: GeometryId, slot: usize) -> PaletteResult<Option<GeometryId>> {
        if slot >= self.slots.len() {
            return Err(PaletteError::SlotOutOfRange {
                slot,
                slots: self.slots.len(),
            });
        }
        let previous = self
            .entries
            .get(&id)
            .ok_or(PaletteError::UnknownSymbol(id))?
            .slot;
        if previous == Some(slot) {
            return Ok(None);
        }
        if let Some(old) = previous {
            self.slots[old] = None;
        }

        let evicted = self.slots[slot].take();
        if let Some(other) = evicted {
            if let Some(e) = self.entries.get_mut(&other) {
                e.slot = None;
            }
            log::debug!("Symbol {} returned to storage from slot {}", other, slot);
        }

        self.slots[slot] = Some(id);
        if let Some(e) = self.entries.get_mut(&id) {
            e.slot = Some(slot);
        }
        Ok(evicted)
    }

    /// Return a symbol to storage. Returns the slot it left, if any.
    pub fn unplace(&mut self, id: GeometryId) -> PaletteResult<Option<usize>> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(PaletteError::UnknownSymbol(id))?;
        let slot = entry.slot.take();
        if let Some(s) = slot {
            self.slots[s] = None;
        }
        Ok(slot)
    }

    /// Align entries with a geometry set: create missing entries, refresh
    /// existing ones and drop entries whose geometry is gone.
    pub fn sync<'a>(&mut self, geometries: impl IntoIterator<Item = &'a Geometry>) {
        let mut seen = Vec::new();
        for geometry in geometries {
            self.ensure_entry(geometry);
            self.refresh(geometry);
            seen.push(geometry.id);
        }
        let stale: Vec<GeometryId> = self
            .entries
            .keys()
            .filter(|id| !seen.contains(id))
            .copied()
            .collect();
        for id in stale {
            self.remove(id);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    /// Check the slot/entry cross references.
    pub fn is_consistent(&self) -> bool {
        let slots_ok = self.slots.iter().enumerate().all(|(i, s)| match s {
            Some(id) => self.entries.get(id).is_some_and(|e| e.slot == Some(i)),
            None => true,
        });
        let entries_ok = self
            .entries
            .values()
            .all(|e| e.slot.is_none_or(|s| self.slots.get(s) == Some(&Some(e.geometry))));
        slots_ok && entries_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::LatLng;
    use crate::shapes::{GeometryKind, GeometryStyle, Marker, MarkerShape};

    fn geometry(id: u64) -> Geometry {
        Geometry::new(
            GeometryId(id),
            GeometryKind::Marker(Marker::new(LatLng::new(0.0, 0.0), MarkerShape::Circle)),
            GeometryStyle::marker(),
        )
    }

    fn palette_with(ids: &[u64]) -> SymbolPalette {
        let mut palette = SymbolPalette::default();
        for &id in ids {
            palette.ensure_entry(&geometry(id));
        }
        palette
    }

    #[test]
    fn test_ensure_entry_is_idempotent() {
        let mut palette = SymbolPalette::default();
        palette.ensure_entry(&geometry(1));
        palette.ensure_entry(&geometry(1));
        assert_eq!(palette.len(), 1);
        assert_eq!(palette.slot_count(), PALETTE_SLOTS);
    }

    #[test]
    fn test_place_and_unplace() {
        let mut palette = palette_with(&[1]);
        assert_eq!(palette.place(GeometryId(1), 3), Ok(None));
        assert_eq!(palette.occupant(3), Some(GeometryId(1)));
        assert!(palette.entry(GeometryId(1)).unwrap().is_placed());
        assert_eq!(palette.unplace(GeometryId(1)), Ok(Some(3)));
        assert_eq!(palette.occupant(3), None);
        assert!(palette.is_consistent());
    }

    #[test]
    fn test_place_into_occupied_slot_evicts() {
        let mut palette = palette_with(&[1, 2]);
        palette.place(GeometryId(1), 0).unwrap();
        assert_eq!(palette.place(GeometryId(2), 0), Ok(Some(GeometryId(1))));
        assert_eq!(palette.entry(GeometryId(1)).unwrap().slot, None);
        assert_eq!(palette.occupant(0), Some(GeometryId(2)));
        assert!(palette.is_consistent());
    }

    #[test]
    fn test_moving_vacates_old_slot() {
        let mut palette = palette_with(&[1]);
        palette.place(GeometryId(1), 0).unwrap();
        palette.place(GeometryId(1), 5).unwrap();
        assert_eq!(palette.occupant(0), None);
        assert_eq!(palette.occupant(5), Some(GeometryId(1)));
        assert!(palette.is_consistent());
    }

    #[test]
    fn test_place_errors() {
        let mut palette = palette_with(&[1]);
        assert_eq!(
            palette.place(GeometryId(1), 10),
            Err(PaletteError::SlotOutOfRange { slot: 10, slots: 10 })
        );
        assert_eq!(
            palette.place(GeometryId(9), 0),
            Err(PaletteError::UnknownSymbol(GeometryId(9)))
        );
    }

    #[test]
    fn test_sync_drops_stale_and_vacates() {
        let mut palette = palette_with(&[1, 2]);
        palette.place(GeometryId(2), 4).unwrap();
        let keep = [geometry(1), geometry(3)];
        palette.sync(keep.iter());
        assert!(palette.entry(GeometryId(2)).is_none());
        assert!(palette.entry(GeometryId(3)).is_some());
        assert_eq!(palette.occupant(4), None);
        assert!(palette.is_consistent());
    }

    #[test]
    fn test_refresh_copies_style() {
        let mut palette = palette_with(&[1]);
        let mut g = geometry(1);
        g.style.stroke_width = 9.0;
        g.name = "Depot".to_string();
        palette.refresh(&g);
        let e = palette.entry(GeometryId(1)).unwrap();
        assert_eq!(e.name, "Depot");
        assert!((e.stroke_width - 9.0).abs() < f64::EPSILON);
    }
}
