//! Legend panel compositing.
//!
//! A raster snapshot of the legend panel keeps its backgrounds and text but
//! loses line and arrow glyphs, so polyline symbols are redrawn on top of
//! the pasted panel.

use crate::painter::{Painter, polyline_path};
use crate::renderer::RenderContext;
use kurbo::{Point, Rect, Size};
use mapdraft_core::GeometryId;
use mapdraft_core::shapes::{GeometryKind, legend_arrowhead};
use std::f64::consts::PI;
use tiny_skia::Pixmap;

/// Inset of the redrawn line from each side of its symbol box.
const SYMBOL_INSET: f64 = 5.0;

/// On-screen box of one legend symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendSymbolBox {
    pub geometry: GeometryId,
    /// Relative to the panel's top-left corner, in container pixels.
    pub rect: Rect,
}

/// A captured legend panel.
#[derive(Debug, Clone)]
pub struct LegendPanelCapture {
    /// Panel raster at any resolution.
    pub image: Pixmap,
    /// Top-left corner of the panel in container pixels.
    pub origin: Point,
    /// Panel size in container pixels.
    pub size: Size,
    pub symbols: Vec<LegendSymbolBox>,
}

impl LegendPanelCapture {
    pub fn new(image: Pixmap, origin: Point, size: Size) -> Self {
        Self {
            image,
            origin,
            size,
            symbols: Vec::new(),
        }
    }

    pub fn with_symbol(mut self, geometry: GeometryId, rect: Rect) -> Self {
        self.symbols.push(LegendSymbolBox { geometry, rect });
        self
    }

    /// Where the panel lands in the output raster.
    pub fn output_rect(&self, ctx: &RenderContext) -> Rect {
        Rect::from_origin_size(
            ctx.container_to_output(self.origin),
            self.size * ctx.scale_factor,
        )
    }
}

/// Paste the panel and redraw its polyline symbols.
///
/// Returns the number of symbols redrawn.
pub fn composite_legend(
    painter: &mut Painter,
    ctx: &RenderContext,
    panel: &LegendPanelCapture,
) -> usize {
    let dest = panel.output_rect(ctx);
    painter.draw_image_scaled(&panel.image, dest);

    let mut redrawn = 0;
    for symbol in &panel.symbols {
        if redraw_symbol(painter, ctx, dest.origin(), symbol) {
            redrawn += 1;
        }
    }
    log::debug!(
        "Legend panel composited at {:?}, {} symbols redrawn",
        dest,
        redrawn
    );
    redrawn
}

fn redraw_symbol(
    painter: &mut Painter,
    ctx: &RenderContext,
    panel_origin: Point,
    symbol: &LegendSymbolBox,
) -> bool {
    let Some(geometry) = ctx.composition.geometry(symbol.geometry) else {
        log::warn!("Legend symbol for unknown geometry {}", symbol.geometry);
        return false;
    };
    let GeometryKind::Polyline(line) = &geometry.kind else {
        return false;
    };

    let scale = ctx.scale_factor;
    let style = &geometry.style;
    let x = panel_origin.x + symbol.rect.x0 * scale;
    let y = panel_origin.y + symbol.rect.y0 * scale;
    let width = symbol.rect.width() * scale;
    let center_y = y + symbol.rect.height() * scale / 2.0;
    let start = Point::new(x + SYMBOL_INSET, center_y);
    let end = Point::new(x + width - SYMBOL_INSET, center_y);

    let dash = style
        .dash
        .dash_array()
        .map(|[on, off]| [on * scale * 0.5, off * scale * 0.5]);
    let alpha = style.opacity();
    painter.stroke(
        &polyline_path(&[start, end], false),
        style.stroke_color,
        alpha,
        (style.stroke_width * scale * 0.5).max(2.0),
        dash,
    );
    if line.arrow.has_end() {
        painter.draw_arrowhead(&legend_arrowhead(end, 0.0, width), style.stroke_color, alpha);
    }
    if line.arrow.has_start() {
        painter.draw_arrowhead(&legend_arrowhead(start, PI, width), style.stroke_color, alpha);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::painter::tests::rgba;
    use mapdraft_core::shapes::SerializableColor;
    use mapdraft_core::{
        ArrowType, Composition, DrawAction, HeadlessSurface, LatLng, MapView, MarkerShape,
        StylePatch,
    };

    fn panel_image() -> Pixmap {
        let mut pm = Pixmap::new(100, 60).unwrap();
        pm.fill(tiny_skia::Color::from_rgba8(255, 255, 200, 255));
        pm
    }

    fn setup() -> (Composition, GeometryId, GeometryId) {
        let mut surface = HeadlessSurface::new();
        let mut comp = Composition::new();
        let line = comp
            .draw(
                DrawAction::Polyline {
                    vertices: vec![LatLng::new(0.0, 0.0), LatLng::new(1.0, 1.0)],
                    arrow: ArrowType::End,
                },
                &mut surface,
            )
            .unwrap();
        let patch = StylePatch {
            stroke_color: Some(SerializableColor::rgb(255, 0, 0)),
            ..Default::default()
        };
        comp.mutate_style(line, &patch, &mut surface).unwrap();
        let marker = comp
            .draw(
                DrawAction::Marker {
                    position: LatLng::new(0.5, 0.5),
                    shape: MarkerShape::Circle,
                    size: None,
                },
                &mut surface,
            )
            .unwrap();
        (comp, line, marker)
    }

    #[test]
    fn test_panel_placed_below_title() {
        let (comp, _, _) = setup();
        let view = MapView::default();
        let ctx = RenderContext::new(&comp, &view)
            .with_scale_factor(2.0)
            .with_title_offset(80.0);
        let panel = LegendPanelCapture::new(panel_image(), Point::new(10.0, 20.0), Size::new(50.0, 30.0));
        assert_eq!(panel.output_rect(&ctx), Rect::new(20.0, 120.0, 120.0, 180.0));

        let mut painter = Painter::new(200, 200, SerializableColor::white()).unwrap();
        assert_eq!(composite_legend(&mut painter, &ctx, &panel), 0);
        let px = rgba(painter.pixmap(), 60, 150);
        assert_eq!((px.red(), px.blue()), (255, 200));
        assert_eq!(rgba(painter.pixmap(), 60, 110).blue(), 255);
    }

    #[test]
    fn test_polyline_symbols_are_redrawn() {
        let (comp, line, marker) = setup();
        let view = MapView::default();
        let ctx = RenderContext::new(&comp, &view).with_scale_factor(1.0);
        let panel = LegendPanelCapture::new(panel_image(), Point::ZERO, Size::new(100.0, 60.0))
            .with_symbol(line, Rect::new(10.0, 10.0, 60.0, 30.0))
            .with_symbol(marker, Rect::new(10.0, 35.0, 60.0, 55.0))
            .with_symbol(GeometryId(999), Rect::new(70.0, 10.0, 90.0, 30.0));

        let mut painter = Painter::new(100, 60, SerializableColor::white()).unwrap();
        assert_eq!(composite_legend(&mut painter, &ctx, &panel), 1);

        // Line from x = 15 to x = 55 at y = 20, width max(1.5, 2) = 2.
        let on = rgba(painter.pixmap(), 30, 20);
        assert_eq!((on.red(), on.green(), on.blue()), (255, 0, 0));
        // Arrowhead is 8 px long and 8 px wide at the right end.
        let head = rgba(painter.pixmap(), 50, 21);
        assert_eq!((head.red(), head.blue()), (255, 0));
        // Marker symbol box is left as captured.
        assert_eq!(rgba(painter.pixmap(), 30, 45).blue(), 200);
    }
}
