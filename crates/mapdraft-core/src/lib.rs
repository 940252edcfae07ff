//! Mapdraft Core Library
//!
//! Data model and document format for annotated maps: geometries drawn over
//! a tiled base map, a legend hierarchy that classifies them, and a symbol
//! palette.

pub mod composition;
pub mod document;
pub mod geo;
pub mod geometry;
pub mod legend;
pub mod model;
pub mod palette;
pub mod shapes;
pub mod storage;
pub mod surface;
pub mod view;

pub use composition::{CaptureState, Composition};
pub use document::{Document, DocumentError, ImportReport, export_document, import_document, import_json};
pub use geo::{LatLng, LatLngBounds, Meters, Pixels};
pub use geometry::{Geometry, GeometryId};
pub use legend::{Direction, LegendHierarchy, NodeId};
pub use model::{GeometryModel, ModelError, ModelResult};
pub use palette::SymbolPalette;
pub use shapes::{ArrowType, DrawAction, GeometryKind, GeometryStyle, MarkerShape, StylePatch};
pub use surface::{DisplaySurface, HeadlessSurface, RenderHandle, RenderShape, RenderSpec};
pub use view::MapView;
