//! Manual renderer: geometries redrawn over a captured base raster.

use crate::painter::{Painter, polyline_path, scaled_dash};
use crate::renderer::{RenderContext, RenderResult};
use kurbo::{BezPath, Point};
use mapdraft_core::shapes::{Arrowhead, GeometryStyle, SerializableColor};
use mapdraft_core::{ArrowType, Geometry, RenderShape, RenderSpec};
use tiny_skia::{FillRule, Pixmap};

/// Draws every geometry of a composition with its own style.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualRenderer;

impl ManualRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Base raster plus geometries, offset below the title band.
    ///
    /// The output is `map_size + title_offset` tall; the band itself is left
    /// in the background color.
    pub fn render(&self, ctx: &RenderContext, base: &Pixmap) -> RenderResult<Pixmap> {
        let size = ctx.map_size();
        let width = size.width.round().max(1.0) as u32;
        let height = (size.height + ctx.title_offset).round().max(1.0) as u32;
        let mut painter = Painter::new(width, height, SerializableColor::from(ctx.background_color))?;
        painter.draw_image(base, 0.0, ctx.title_offset);
        self.draw_geometries(ctx, &mut painter);
        Ok(painter.into_pixmap())
    }

    /// Draw every geometry in model order.
    pub fn draw_geometries(&self, ctx: &RenderContext, painter: &mut Painter) {
        let mut drawn = 0;
        for geometry in ctx.composition.model().iter() {
            if self.draw_geometry(ctx, painter, geometry) {
                drawn += 1;
            }
        }
        log::debug!("Manual renderer drew {} geometries", drawn);
    }

    /// Draw one geometry. Returns false when it had nothing drawable.
    pub fn draw_geometry(&self, ctx: &RenderContext, painter: &mut Painter, geometry: &Geometry) -> bool {
        let spec = RenderSpec::from_geometry(geometry);
        let style = &spec.style;
        let scale = ctx.scale_factor;
        match &spec.shape {
            RenderShape::Marker {
                position,
                shape,
                size,
            } => {
                let center = ctx.to_output(*position);
                if !is_finite(center) {
                    return skip(geometry);
                }
                painter.draw_marker(center, *shape, size * scale, style, scale);
            }
            RenderShape::Polyline { vertices, arrow } => {
                let points: Vec<Point> = vertices.iter().map(|v| ctx.to_output(*v)).collect();
                if points.len() < 2 || !points.iter().copied().all(is_finite) {
                    return skip(geometry);
                }
                draw_polyline(painter, &points, *arrow, style, scale);
            }
            RenderShape::Polygon { rings } => {
                let mut path = BezPath::new();
                for ring in rings {
                    let points: Vec<Point> = ring.iter().map(|v| ctx.to_output(*v)).collect();
                    if points.len() >= 3 && points.iter().copied().all(is_finite) {
                        path.extend(polyline_path(&points, true).elements().iter().copied());
                    }
                }
                if path.elements().is_empty() {
                    return skip(geometry);
                }
                painter.fill(&path, style.fill_color, style.opacity(), FillRule::EvenOdd);
                painter.stroke(
                    &path,
                    style.stroke_color,
                    1.0,
                    style.stroke_width * scale,
                    scaled_dash(style, scale),
                );
            }
            RenderShape::GeodesicCircle { center, radius } => {
                let c = ctx.to_output(*center);
                let r = ctx.view.geodesic_radius_px(*center, *radius) * scale;
                if !is_finite(c) || !r.is_finite() {
                    return skip(geometry);
                }
                painter.draw_circle(c, r, style, scale);
            }
            RenderShape::PixelCircle { center, radius } => {
                let c = ctx.to_output(*center);
                if !is_finite(c) {
                    return skip(geometry);
                }
                painter.draw_circle(c, radius.0 * scale, style, scale);
            }
        }
        true
    }
}

/// Stroke at the style opacity, then arrowheads in the stroke color.
fn draw_polyline(
    painter: &mut Painter,
    points: &[Point],
    arrow: ArrowType,
    style: &GeometryStyle,
    scale: f64,
) {
    let alpha = style.opacity();
    painter.stroke(
        &polyline_path(points, false),
        style.stroke_color,
        alpha,
        style.stroke_width * scale,
        scaled_dash(style, scale),
    );
    let n = points.len();
    if arrow.has_end() {
        let head = Arrowhead::at_end(points[n - 2], points[n - 1], style.stroke_width, scale);
        painter.draw_arrowhead(&head, style.stroke_color, alpha);
    }
    if arrow.has_start() {
        let head = Arrowhead::at_start(points[0], points[1], style.stroke_width, scale);
        painter.draw_arrowhead(&head, style.stroke_color, alpha);
    }
}

fn is_finite(p: Point) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

fn skip(geometry: &Geometry) -> bool {
    log::warn!("Geometry {} has nothing drawable, skipping", geometry.id);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::painter::tests::rgba;
    use kurbo::Size;
    use mapdraft_core::shapes::LineDash;
    use mapdraft_core::{
        Composition, DrawAction, HeadlessSurface, LatLng, MapView, MarkerShape, Meters, Pixels,
        StylePatch,
    };

    const RED: SerializableColor = SerializableColor::rgb(255, 0, 0);
    const GREEN: SerializableColor = SerializableColor::rgb(0, 255, 0);

    fn view() -> MapView {
        MapView::new(LatLng::new(0.0, 0.0), 4.0, Size::new(200.0, 100.0))
    }

    fn base(view: &MapView, scale: f64) -> Pixmap {
        let mut pm = Pixmap::new(
            (view.size.width * scale) as u32,
            (view.size.height * scale) as u32,
        )
        .unwrap();
        pm.fill(tiny_skia::Color::from_rgba8(200, 200, 200, 255));
        pm
    }

    fn point_at(view: &MapView, x: f64, y: f64) -> LatLng {
        view.container_point_to_latlng(Point::new(x, y))
    }

    #[test]
    fn test_empty_composition_keeps_base_below_title() {
        let comp = Composition::new();
        let view = view();
        let ctx = RenderContext::new(&comp, &view)
            .with_scale_factor(1.0)
            .with_title_offset(30.0);
        let out = ManualRenderer::new().render(&ctx, &base(&view, 1.0)).unwrap();
        assert_eq!((out.width(), out.height()), (200, 130));
        assert_eq!(rgba(&out, 10, 10).red(), 255);
        assert_eq!(rgba(&out, 10, 50).red(), 200);
    }

    #[test]
    fn test_polyline_drawn_at_pixel_ratio() {
        let mut surface = HeadlessSurface::new();
        let mut comp = Composition::new();
        let view = view();
        let id = comp
            .draw(
                DrawAction::Polyline {
                    vertices: vec![point_at(&view, 20.0, 50.0), point_at(&view, 120.0, 50.0)],
                    arrow: ArrowType::None,
                },
                &mut surface,
            )
            .unwrap();
        let patch = StylePatch {
            stroke_color: Some(RED),
            ..Default::default()
        };
        comp.mutate_style(id, &patch, &mut surface).unwrap();

        let ctx = RenderContext::new(&comp, &view).with_scale_factor(2.0);
        let out = ManualRenderer::new().render(&ctx, &base(&view, 2.0)).unwrap();
        assert_eq!((out.width(), out.height()), (400, 200));
        let on = rgba(&out, 140, 100);
        assert_eq!((on.red(), on.green()), (255, 0));
        // Ends at x = 240 plus a round cap of half the stroke width.
        assert_eq!(rgba(&out, 260, 100).red(), 200);
    }

    #[test]
    fn test_end_arrow_drawn_past_last_vertex_direction() {
        let mut surface = HeadlessSurface::new();
        let mut comp = Composition::new();
        let view = view();
        comp.draw(
            DrawAction::Polyline {
                vertices: vec![point_at(&view, 20.0, 50.0), point_at(&view, 150.0, 50.0)],
                arrow: ArrowType::End,
            },
            &mut surface,
        )
        .unwrap();
        let ctx = RenderContext::new(&comp, &view).with_scale_factor(1.0);
        let out = ManualRenderer::new().render(&ctx, &base(&view, 1.0)).unwrap();
        // Head spans 20 px back from the tip and 12 px across.
        let wing = rgba(&out, 135, 46);
        assert_eq!(wing.blue(), 255);
        assert!(wing.red() < 100);
        // The start has no head.
        assert_eq!(rgba(&out, 25, 46).red(), 200);
    }

    #[test]
    fn test_polygon_hole_is_not_filled() {
        use mapdraft_core::shapes::Polygon;
        use mapdraft_core::{GeometryKind, GeometryStyle};

        let mut surface = HeadlessSurface::new();
        let mut comp = Composition::new();
        let view = view();
        let ring = |x0: f64, y0: f64, x1: f64, y1: f64| {
            vec![
                point_at(&view, x0, y0),
                point_at(&view, x1, y0),
                point_at(&view, x1, y1),
                point_at(&view, x0, y1),
            ]
        };
        let polygon = Polygon::with_holes(ring(10.0, 10.0, 90.0, 90.0), vec![ring(40.0, 40.0, 60.0, 60.0)]);
        let style = GeometryStyle::new(GREEN, RED, 1.0, 1.0, LineDash::Solid);
        comp.create(GeometryKind::Polygon(polygon), style, &mut surface)
            .unwrap();

        let ctx = RenderContext::new(&comp, &view).with_scale_factor(1.0);
        let out = ManualRenderer::new().render(&ctx, &base(&view, 1.0)).unwrap();
        let filled = rgba(&out, 25, 25);
        assert_eq!((filled.red(), filled.green()), (0, 255));
        assert_eq!(rgba(&out, 50, 50).red(), 200);
        assert_eq!(rgba(&out, 150, 50).red(), 200);
    }

    #[test]
    fn test_circle_units() {
        let mut surface = HeadlessSurface::new();
        let mut comp = Composition::new();
        let view = view();
        comp.draw(
            DrawAction::CircleMarker {
                center: point_at(&view, 50.0, 50.0),
                radius: Pixels(10.0),
            },
            &mut surface,
        )
        .unwrap();
        let meters = view.meters_per_pixel() * 20.0;
        comp.draw(
            DrawAction::Circle {
                center: point_at(&view, 150.0, 50.0),
                radius: Meters(meters),
            },
            &mut surface,
        )
        .unwrap();

        let ctx = RenderContext::new(&comp, &view).with_scale_factor(2.0);
        let out = ManualRenderer::new().render(&ctx, &base(&view, 2.0)).unwrap();
        // Pixel circle: radius 10 px × 2 → rim at x = 120.
        assert_eq!(rgba(&out, 120, 100).blue(), 255);
        assert_eq!(rgba(&out, 130, 100).red(), 200);
        // Geodesic circle: about 20 container px × 2 → rim near x = 340.
        let rim = rgba(&out, 340, 100);
        assert_eq!(rim.blue(), 255);
        assert!(rim.red() < 100);
        assert_eq!(rgba(&out, 352, 100).red(), 200);
    }

    #[test]
    fn test_marker_scaled() {
        let mut surface = HeadlessSurface::new();
        let mut comp = Composition::new();
        let view = view();
        comp.draw(
            DrawAction::Marker {
                position: point_at(&view, 100.0, 50.0),
                shape: MarkerShape::Square,
                size: Some(10.0),
            },
            &mut surface,
        )
        .unwrap();
        let ctx = RenderContext::new(&comp, &view).with_scale_factor(3.0);
        let out = ManualRenderer::new().render(&ctx, &base(&view, 3.0)).unwrap();
        // 30 px square centered at (300, 150).
        let inside = rgba(&out, 290, 150);
        assert_eq!((inside.red(), inside.green(), inside.blue()), (0, 0x7b, 0xff));
        assert_eq!(rgba(&out, 280, 150).red(), 200);
    }
}
