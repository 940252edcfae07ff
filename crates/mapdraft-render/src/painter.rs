//! tiny-skia drawing primitives.

use crate::renderer::{RenderResult, RendererError};
use kurbo::{BezPath, Circle, PathEl, Point, Rect, Shape};
use mapdraft_core::shapes::{Arrowhead, GeometryStyle, MarkerShape, SerializableColor};
use tiny_skia::{
    FillRule, FilterQuality, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, PixmapPaint,
    Stroke, StrokeDash, Transform,
};

/// Tolerance used when flattening kurbo circles.
const CIRCLE_TOLERANCE: f64 = 0.1;

/// Convert a kurbo path to a tiny-skia path.
///
/// Returns `None` for empty or degenerate paths.
pub fn to_skia_path(path: &BezPath) -> Option<Path> {
    let mut pb = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => pb.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => pb.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => pb.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => pb.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => pb.close(),
        }
    }
    pb.finish()
}

/// Path through `points`, closed when `close` is set.
pub fn polyline_path(points: &[Point], close: bool) -> BezPath {
    let mut path = BezPath::new();
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        path.move_to(*first);
        for p in iter {
            path.line_to(*p);
        }
        if close {
            path.close_path();
        }
    }
    path
}

fn skia_color(color: SerializableColor, alpha: f64) -> tiny_skia::Color {
    let a = (color.a as f64 * alpha.clamp(0.0, 1.0)).round() as u8;
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, a)
}

fn paint(color: SerializableColor, alpha: f64) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(skia_color(color, alpha));
    paint.anti_alias = true;
    paint
}

/// A raster being composited.
pub struct Painter {
    pixmap: Pixmap,
}

impl Painter {
    /// Create a painter filled with `background`.
    pub fn new(width: u32, height: u32, background: SerializableColor) -> RenderResult<Self> {
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            RendererError::InitFailed(format!("Cannot allocate a {}x{} pixmap", width, height))
        })?;
        pixmap.fill(skia_color(background, 1.0));
        Ok(Self { pixmap })
    }

    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        Self { pixmap }
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub(crate) fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    pub fn fill_rect(&mut self, rect: Rect, color: SerializableColor) {
        let Some(r) = tiny_skia::Rect::from_ltrb(
            rect.x0 as f32,
            rect.y0 as f32,
            rect.x1 as f32,
            rect.y1 as f32,
        ) else {
            log::debug!("Skipping degenerate rect {:?}", rect);
            return;
        };
        self.pixmap
            .fill_rect(r, &paint(color, 1.0), Transform::identity(), None);
    }

    /// Fill a path at `alpha` times the color's own alpha.
    pub fn fill(&mut self, path: &BezPath, color: SerializableColor, alpha: f64, rule: FillRule) {
        let Some(p) = to_skia_path(path) else {
            return;
        };
        self.pixmap
            .fill_path(&p, &paint(color, alpha), rule, Transform::identity(), None);
    }

    /// Stroke a path with round caps and joins.
    ///
    /// `dash` is in output pixels.
    pub fn stroke(
        &mut self,
        path: &BezPath,
        color: SerializableColor,
        alpha: f64,
        width: f64,
        dash: Option<[f64; 2]>,
    ) {
        if width <= 0.0 {
            return;
        }
        let Some(p) = to_skia_path(path) else {
            return;
        };
        let stroke = Stroke {
            width: width as f32,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            dash: dash.and_then(|[on, off]| StrokeDash::new(vec![on as f32, off as f32], 0.0)),
            ..Default::default()
        };
        self.pixmap
            .stroke_path(&p, &paint(color, alpha), &stroke, Transform::identity(), None);
    }

    /// Filled triangle with a one pixel outline in the same color.
    pub fn draw_arrowhead(&mut self, head: &Arrowhead, color: SerializableColor, alpha: f64) {
        let path = polyline_path(&head.vertices(), true);
        self.fill(&path, color, alpha, FillRule::Winding);
        self.stroke(&path, color, alpha, 1.0, None);
    }

    /// Point symbol `size` output pixels across.
    ///
    /// Fill and outline both take the style opacity.
    pub fn draw_marker(
        &mut self,
        center: Point,
        shape: MarkerShape,
        size: f64,
        style: &GeometryStyle,
        scale: f64,
    ) {
        let path = match shape.outline(center, size) {
            Some(points) => polyline_path(&points, true),
            None => Circle::new(center, size / 2.0).to_path(CIRCLE_TOLERANCE),
        };
        let alpha = style.opacity();
        self.fill(&path, style.fill_color, alpha, FillRule::Winding);
        self.stroke(
            &path,
            style.stroke_color,
            alpha,
            style.stroke_width * scale,
            scaled_dash(style, scale),
        );
    }

    /// Circle with a translucent fill and an opaque outline.
    pub fn draw_circle(&mut self, center: Point, radius: f64, style: &GeometryStyle, scale: f64) {
        if radius.is_nan() || radius <= 0.0 {
            return;
        }
        let path = Circle::new(center, radius).to_path(CIRCLE_TOLERANCE);
        self.fill(&path, style.fill_color, style.opacity(), FillRule::Winding);
        self.stroke(
            &path,
            style.stroke_color,
            1.0,
            style.stroke_width * scale,
            scaled_dash(style, scale),
        );
    }

    /// Blit `image` unscaled with its top-left corner at `(x, y)`.
    pub fn draw_image(&mut self, image: &Pixmap, x: f64, y: f64) {
        self.pixmap.draw_pixmap(
            x.round() as i32,
            y.round() as i32,
            image.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    /// Blit `image` stretched over `dest`.
    pub fn draw_image_scaled(&mut self, image: &Pixmap, dest: Rect) {
        if dest.width() <= 0.0 || dest.height() <= 0.0 {
            return;
        }
        let sx = dest.width() / image.width() as f64;
        let sy = dest.height() / image.height() as f64;
        let transform =
            Transform::from_row(sx as f32, 0.0, 0.0, sy as f32, dest.x0 as f32, dest.y0 as f32);
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..Default::default()
        };
        self.pixmap
            .draw_pixmap(0, 0, image.as_ref(), &paint, transform, None);
    }
}

/// Dash array of a style, scaled to output pixels.
pub fn scaled_dash(style: &GeometryStyle, scale: f64) -> Option<[f64; 2]> {
    style.dash.dash_array().map(|[on, off]| [on * scale, off * scale])
}
