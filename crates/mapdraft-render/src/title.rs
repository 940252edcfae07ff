//! Title band above the map.

use crate::painter::Painter;
use crate::renderer::ExportConfig;
use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use kurbo::Rect;
use mapdraft_core::shapes::SerializableColor;
use rusttype::{Font, PositionedGlyph, Scale, point};
use std::fs;
use std::sync::OnceLock;

fn db() -> &'static Database {
    static DB: OnceLock<Database> = OnceLock::new();
    DB.get_or_init(|| {
        let mut db = Database::new();
        db.load_system_fonts();
        log::debug!("Loaded {} system font faces", db.len());
        db
    })
}

/// Bold face for `family`, falling back to any sans-serif.
pub fn load_title_font(family: &str) -> Option<Font<'static>> {
    let families = [Family::Name(family), Family::SansSerif];
    let query = Query {
        families: &families,
        weight: Weight::BOLD,
        stretch: Stretch::Normal,
        style: Style::Normal,
    };

    let id = db().query(&query)?;
    let face = db().face(id)?;
    let bytes = match &face.source {
        fontdb::Source::File(path) | fontdb::Source::SharedFile(path, _) => fs::read(path).ok()?,
        fontdb::Source::Binary(bytes) => bytes.as_ref().as_ref().to_vec(),
    };
    Font::try_from_vec_and_index(bytes, face.index)
}

/// Draws the band and its centered caption.
pub struct TitleRenderer {
    font: Option<Font<'static>>,
    size: f32,
    color: SerializableColor,
    background: SerializableColor,
}

impl TitleRenderer {
    pub fn from_config(config: &ExportConfig) -> Self {
        let font = load_title_font(&config.title_font_family);
        if font.is_none() {
            log::warn!(
                "No font found for '{}' or sans-serif, titles will be blank",
                config.title_font_family
            );
        }
        Self {
            font,
            size: config.title_font_size,
            color: SerializableColor::black(),
            background: config.background_color,
        }
    }

    /// A renderer that only paints the band.
    pub fn without_font(config: &ExportConfig) -> Self {
        Self {
            font: None,
            size: config.title_font_size,
            color: SerializableColor::black(),
            background: config.background_color,
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Fill the top `height` pixels and center `title` in them.
    pub fn draw(&self, painter: &mut Painter, title: &str, height: f64) {
        if height <= 0.0 {
            return;
        }
        let width = painter.width() as f64;
        painter.fill_rect(Rect::new(0.0, 0.0, width, height), self.background);

        let Some(font) = &self.font else {
            return;
        };
        let scale = Scale::uniform(self.size);
        let text_width = measure(font, title, scale);
        let v = font.v_metrics(scale);
        let x = ((width as f32) - text_width) / 2.0;
        let baseline = (height as f32) / 2.0 + (v.ascent + v.descent) / 2.0;

        for glyph in font.layout(title, scale, point(x, baseline)) {
            self.blend_glyph(painter, &glyph);
        }
    }

    fn blend_glyph(&self, painter: &mut Painter, glyph: &PositionedGlyph<'_>) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            return;
        };
        let pixmap = painter.pixmap_mut();
        let (w, h) = (pixmap.width() as i32, pixmap.height() as i32);
        let src_a = self.color.a as f32 / 255.0;
        let src = [
            self.color.r as f32 * src_a,
            self.color.g as f32 * src_a,
            self.color.b as f32 * src_a,
            self.color.a as f32,
        ];
        let data = pixmap.data_mut();
        glyph.draw(|gx, gy, coverage| {
            let px = bb.min.x + gx as i32;
            let py = bb.min.y + gy as i32;
            if px < 0 || py < 0 || px >= w || py >= h {
                return;
            }
            let a = coverage.clamp(0.0, 1.0);
            let i = ((py * w + px) * 4) as usize;
            // Data is premultiplied, so every channel blends the same way.
            for c in 0..4 {
                let dst = data[i + c] as f32;
                data[i + c] = (src[c] * a + dst * (1.0 - a * src_a)).round().clamp(0.0, 255.0) as u8;
            }
        });
    }
}

/// Advance width of `text` at `scale`.
fn measure(font: &Font<'_>, text: &str, scale: Scale) -> f32 {
    font.layout(text, scale, point(0.0, 0.0))
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}
