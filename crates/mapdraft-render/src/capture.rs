//! Export pipeline.
//!
//! The exporter prefers a direct snapshot of the live map. When the tile
//! layer cannot be read back or a polyline carries arrowheads, it captures
//! a bare base raster and redraws everything on top of it. Display state
//! changed along the way is restored by a guard on every exit path.

use crate::legend_overlay::{LegendPanelCapture, composite_legend};
use crate::manual::ManualRenderer;
use crate::painter::Painter;
use crate::renderer::{ExportConfig, RenderContext, RendererError, SettleStrategy};
use crate::title::TitleRenderer;
use mapdraft_core::{CaptureState, Composition, MapView};
use tiny_skia::{ColorU8, IntSize, Pixmap};
use thiserror::Error;

/// Capture pipeline errors.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("An export is already running ({0:?})")]
    Busy(CaptureState),
    #[error("Capture failed: {0}")]
    Capture(String),
    #[error("Raster error: {0}")]
    Raster(String),
    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

impl From<RendererError> for CaptureError {
    fn from(err: RendererError) -> Self {
        CaptureError::Raster(err.to_string())
    }
}

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// The live map, as seen by the exporter.
///
/// Rasters are returned at the requested pixel ratio.
pub trait CaptureHost {
    /// Everything currently on screen.
    fn snapshot_direct(&mut self, pixel_ratio: f64) -> CaptureResult<Pixmap>;

    /// Background tiles only.
    fn capture_base(&mut self, pixel_ratio: f64) -> CaptureResult<Pixmap>;

    fn capture_scale_bar(&mut self, pixel_ratio: f64) -> CaptureResult<Option<Pixmap>>;

    fn capture_orientation(&mut self, pixel_ratio: f64) -> CaptureResult<Option<Pixmap>>;

    fn capture_legend(&mut self, pixel_ratio: f64) -> CaptureResult<Option<LegendPanelCapture>>;

    /// Show or hide zoom buttons, the legend and other interactive controls.
    fn set_controls_visible(&mut self, visible: bool);

    /// Take geometry renderables off the live map.
    fn detach_overlays(&mut self);

    fn reattach_overlays(&mut self);

    /// Block until the display has repainted.
    ///
    /// Only called with [`SettleStrategy::Callback`].
    fn wait_for_layout(&mut self);
}

/// Restores the display and the state machine when dropped.
struct CaptureGuard<'a> {
    composition: &'a mut Composition,
    host: &'a mut dyn CaptureHost,
    detached: bool,
    controls_hidden: bool,
}

impl<'a> CaptureGuard<'a> {
    fn begin(composition: &'a mut Composition, host: &'a mut dyn CaptureHost) -> CaptureResult<Self> {
        if let Err(err) = composition.begin_capture() {
            log::warn!("Export rejected: {}", err);
            return Err(CaptureError::Busy(composition.state()));
        }
        Ok(Self {
            composition,
            host,
            detached: false,
            controls_hidden: false,
        })
    }

    fn detach_overlays(&mut self) {
        self.host.detach_overlays();
        self.detached = true;
    }

    fn hide_controls(&mut self) {
        self.host.set_controls_visible(false);
        self.controls_hidden = true;
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        if self.controls_hidden {
            self.host.set_controls_visible(true);
        }
        if self.detached {
            self.host.reattach_overlays();
        }
        self.composition.finish_capture();
    }
}

/// Pre-captured pieces composited over the base raster.
struct Overlays {
    scale_bar: Option<Pixmap>,
    orientation: Option<Pixmap>,
    legend: Option<LegendPanelCapture>,
}

/// Produces the exported raster of a composition.
pub struct MapExporter {
    config: ExportConfig,
    title: TitleRenderer,
    renderer: ManualRenderer,
}

impl MapExporter {
    pub fn new(config: ExportConfig) -> Self {
        let title = TitleRenderer::from_config(&config);
        Self {
            config,
            title,
            renderer: ManualRenderer::new(),
        }
    }

    pub fn with_title_renderer(mut self, title: TitleRenderer) -> Self {
        self.title = title;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Whether the direct snapshot can be used for this composition.
    pub fn can_snapshot_directly(&self, composition: &Composition) -> bool {
        self.config.is_cors_safe(composition.tile_layer()) && !composition.has_arrows()
    }

    /// Export the composition as one raster.
    ///
    /// Rejected with [`CaptureError::Busy`] while another export runs.
    pub fn export(
        &self,
        composition: &mut Composition,
        host: &mut dyn CaptureHost,
    ) -> CaptureResult<Pixmap> {
        let mut guard = CaptureGuard::begin(composition, host)?;

        if self.can_snapshot_directly(&*guard.composition) {
            match self.export_direct(&mut guard) {
                Ok(pixmap) => return Ok(pixmap),
                Err(err) => log::warn!("Direct snapshot failed, using manual capture: {}", err),
            }
        }

        self.export_manual(&mut guard).inspect_err(|err| {
            log::error!("Export failed: {}", err);
        })
    }

    fn export_direct(&self, guard: &mut CaptureGuard<'_>) -> CaptureResult<Pixmap> {
        let snapshot = guard.host.snapshot_direct(self.config.pixel_ratio)?;
        guard.composition.enter_compositing();

        let title = guard.composition.title();
        let title_height = self.config.title_height(title);
        let mut painter = Painter::new(
            snapshot.width(),
            snapshot.height() + title_height.round() as u32,
            self.config.background_color,
        )?;
        self.title.draw(&mut painter, title, title_height);
        painter.draw_image(&snapshot, 0.0, title_height);
        log::info!("Exported {}x{} from a direct snapshot", painter.width(), painter.height());
        Ok(painter.into_pixmap())
    }

    fn export_manual(&self, guard: &mut CaptureGuard<'_>) -> CaptureResult<Pixmap> {
        let ratio = self.config.pixel_ratio;

        guard.detach_overlays();
        let overlays = Overlays {
            scale_bar: guard.host.capture_scale_bar(ratio)?,
            orientation: guard.host.capture_orientation(ratio)?,
            legend: guard.host.capture_legend(ratio)?,
        };
        guard.hide_controls();
        self.settle(&mut *guard.host);
        let base = guard.host.capture_base(ratio)?;

        guard.composition.enter_compositing();
        let composition: &Composition = &*guard.composition;
        let view: MapView = composition.view().clone().with_pixel_ratio(ratio);
        if (base.width(), base.height()) != view.capture_size() {
            log::warn!(
                "Base raster is {}x{}, expected {:?}",
                base.width(),
                base.height(),
                view.capture_size()
            );
        }

        let title_height = self.config.title_height(composition.title());
        let ctx = RenderContext::new(composition, &view)
            .with_background(self.config.background_color.into())
            .with_title_offset(title_height);
        let mut painter = Painter::from_pixmap(self.renderer.render(&ctx, &base)?);
        self.title.draw(&mut painter, composition.title(), title_height);
        self.draw_overlays(&mut painter, &ctx, &overlays);

        log::info!("Exported {}x{} through manual capture", painter.width(), painter.height());
        Ok(painter.into_pixmap())
    }

    fn settle(&self, host: &mut dyn CaptureHost) {
        match self.config.settle {
            SettleStrategy::Callback => host.wait_for_layout(),
            SettleStrategy::Delay { millis: 0 } => {}
            SettleStrategy::Delay { millis } => {
                std::thread::sleep(std::time::Duration::from_millis(millis));
            }
        }
    }

    /// Scale bar bottom-left, orientation top-left, then the legend panel.
    fn draw_overlays(&self, painter: &mut Painter, ctx: &RenderContext, overlays: &Overlays) {
        let padding = self.config.overlay_padding;
        if let Some(bar) = &overlays.scale_bar {
            let y = painter.height() as f64 - bar.height() as f64 - padding;
            painter.draw_image(bar, padding, y);
        }
        if let Some(rose) = &overlays.orientation {
            painter.draw_image(rose, padding, ctx.title_offset + padding);
        }
        if let Some(panel) = &overlays.legend {
            composite_legend(painter, ctx, panel);
        }
    }
}

/// Encode a raster as an RGBA PNG.
pub fn encode_png(pixmap: &Pixmap) -> CaptureResult<Vec<u8>> {
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, pixmap.width(), pixmap.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
        writer
            .write_image_data(&rgba)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;
    }
    Ok(out)
}

/// Decode PNG, JPEG or WebP bytes into a raster.
pub fn decode_raster(bytes: &[u8]) -> CaptureResult<Pixmap> {
    let decoded = ::image::load_from_memory(bytes)
        .map_err(|e| CaptureError::Raster(e.to_string()))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    let size = IntSize::from_wh(width, height)
        .ok_or_else(|| CaptureError::Raster(format!("Invalid raster size {}x{}", width, height)))?;

    let mut data = Vec::with_capacity(decoded.as_raw().len());
    for px in decoded.pixels() {
        let [r, g, b, a] = px.0;
        let p = ColorU8::from_rgba(r, g, b, a).premultiply();
        data.extend_from_slice(&[p.red(), p.green(), p.blue(), p.alpha()]);
    }
    Pixmap::from_vec(data, size)
        .ok_or_else(|| CaptureError::Raster("Raster data does not match its size".to_string()))
}
