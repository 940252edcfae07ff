//! Mapdraft Render Library
//!
//! Raster export for mapdraft compositions. Geometries are redrawn with
//! tiny-skia over a captured base map, with a title band, overlays and the
//! legend panel composited on top.

pub mod capture;
pub mod legend_overlay;
pub mod manual;
pub mod painter;
mod renderer;
pub mod title;

pub use capture::{CaptureError, CaptureHost, CaptureResult, MapExporter, decode_raster, encode_png};
pub use legend_overlay::{LegendPanelCapture, LegendSymbolBox, composite_legend};
pub use manual::ManualRenderer;
pub use painter::Painter;
pub use renderer::{ExportConfig, RenderContext, RenderResult, RendererError, SettleStrategy};
pub use title::TitleRenderer;
