//! Render configuration and per-export context.

use kurbo::{Point, Size};
use mapdraft_core::{Composition, LatLng, MapView};
use mapdraft_core::shapes::SerializableColor;
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Initialization failed: {0}")]
    InitFailed(String),
    #[error("Render failed: {0}")]
    RenderFailed(String),
    #[error("Surface error: {0}")]
    Surface(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

/// How the exporter waits for the display to repaint after toggling
/// controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SettleStrategy {
    /// Sleep for a fixed time.
    Delay { millis: u64 },
    /// The host signals when layout is done.
    Callback,
}

impl Default for SettleStrategy {
    fn default() -> Self {
        SettleStrategy::Delay { millis: 300 }
    }
}

impl SettleStrategy {
    /// Time to wait, `None` when the host reports completion itself.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            SettleStrategy::Delay { millis } => Some(Duration::from_millis(*millis)),
            SettleStrategy::Callback => None,
        }
    }
}

/// Export settings.
///
/// Every field has a default, so a partial JSON file is enough to override
/// a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Capture pixels per container pixel.
    pub pixel_ratio: f64,
    /// Height of the title band in capture pixels.
    pub title_band_height: f64,
    pub title_font_family: String,
    pub title_font_size: f32,
    pub background_color: SerializableColor,
    /// Tile layers whose pixels can be read back from a live snapshot.
    pub cors_safe_tiles: Vec<String>,
    pub settle: SettleStrategy,
    /// Distance of the scale bar and orientation overlays from the edges.
    pub overlay_padding: f64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            pixel_ratio: 2.0,
            title_band_height: 80.0,
            title_font_family: "Arial".to_string(),
            title_font_size: 48.0,
            background_color: SerializableColor::white(),
            cors_safe_tiles: vec!["osm".to_string(), "cartodb".to_string()],
            settle: SettleStrategy::default(),
            overlay_padding: 20.0,
        }
    }
}

impl ExportConfig {
    pub fn is_cors_safe(&self, tile_layer: &str) -> bool {
        self.cors_safe_tiles.iter().any(|t| t == tile_layer)
    }

    /// Title band height for a given title, zero when there is none.
    pub fn title_height(&self, title: &str) -> f64 {
        if title.trim().is_empty() {
            0.0
        } else {
            self.title_band_height
        }
    }
}

/// Context for a single export.
pub struct RenderContext<'a> {
    /// The composition to draw.
    pub composition: &'a Composition,
    /// View the geometries are projected through.
    pub view: &'a MapView,
    /// Capture pixels per container pixel.
    pub scale_factor: f64,
    /// Background color of the title band and of uncovered areas.
    pub background_color: Color,
    /// Vertical offset of the map area, in capture pixels.
    pub title_offset: f64,
}

impl<'a> RenderContext<'a> {
    /// Create a new render context using the view's own pixel ratio.
    pub fn new(composition: &'a Composition, view: &'a MapView) -> Self {
        Self {
            composition,
            view,
            scale_factor: view.pixel_ratio,
            background_color: Color::WHITE,
            title_offset: 0.0,
        }
    }

    /// Set the scale factor for HiDPI.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Shift the map area down, leaving room for a title band.
    pub fn with_title_offset(mut self, offset: f64) -> Self {
        self.title_offset = offset;
        self
    }

    /// Position in output pixels.
    pub fn to_output(&self, p: LatLng) -> Point {
        self.container_to_output(self.view.latlng_to_container_point(p))
    }

    /// Container pixel to output pixel.
    pub fn container_to_output(&self, p: Point) -> Point {
        Point::new(p.x * self.scale_factor, p.y * self.scale_factor + self.title_offset)
    }

    /// Size of the map area in output pixels.
    pub fn map_size(&self) -> Size {
        self.view.size * self.scale_factor
    }
}
