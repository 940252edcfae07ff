//! Capture host for rendering without a live map.

use mapdraft_core::shapes::SerializableColor;
use mapdraft_render::{CaptureError, CaptureHost, CaptureResult, LegendPanelCapture, Painter};
use tiny_skia::Pixmap;

/// Serves a fixed background raster and has no controls to hide.
pub struct HeadlessHost {
    size: (u32, u32),
    background: SerializableColor,
    base: Option<Pixmap>,
}

impl HeadlessHost {
    /// Host for a capture `size` pixels large.
    pub fn new(size: (u32, u32), background: SerializableColor) -> Self {
        Self {
            size,
            background,
            base: None,
        }
    }

    /// Use `image` as the base map, stretched to the capture size.
    pub fn with_base(mut self, image: Pixmap) -> Self {
        self.base = Some(image);
        self
    }
}

impl CaptureHost for HeadlessHost {
    fn snapshot_direct(&mut self, _pixel_ratio: f64) -> CaptureResult<Pixmap> {
        Err(CaptureError::Capture("no live map to snapshot".to_string()))
    }

    fn capture_base(&mut self, _pixel_ratio: f64) -> CaptureResult<Pixmap> {
        let (width, height) = self.size;
        let mut painter = Painter::new(width, height, self.background)?;
        if let Some(image) = &self.base {
            if (image.width(), image.height()) != self.size {
                log::info!(
                    "Scaling base image from {}x{} to {}x{}",
                    image.width(),
                    image.height(),
                    width,
                    height
                );
            }
            painter.draw_image_scaled(image, kurbo::Rect::new(0.0, 0.0, width as f64, height as f64));
        }
        Ok(painter.into_pixmap())
    }

    fn capture_scale_bar(&mut self, _pixel_ratio: f64) -> CaptureResult<Option<Pixmap>> {
        Ok(None)
    }

    fn capture_orientation(&mut self, _pixel_ratio: f64) -> CaptureResult<Option<Pixmap>> {
        Ok(None)
    }

    fn capture_legend(&mut self, _pixel_ratio: f64) -> CaptureResult<Option<LegendPanelCapture>> {
        Ok(None)
    }

    fn set_controls_visible(&mut self, _visible: bool) {}

    fn detach_overlays(&mut self) {}

    fn reattach_overlays(&mut self) {}

    fn wait_for_layout(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_is_background_sized() {
        let mut host = HeadlessHost::new((12, 8), SerializableColor::rgb(240, 230, 210));
        let base = host.capture_base(2.0).unwrap();
        assert_eq!((base.width(), base.height()), (12, 8));
        let px = base.pixel(5, 5).unwrap().demultiply();
        assert_eq!((px.red(), px.green(), px.blue()), (240, 230, 210));
        assert!(host.snapshot_direct(2.0).is_err());
    }

    #[test]
    fn test_base_image_is_stretched() {
        let mut image = Pixmap::new(3, 2).unwrap();
        image.fill(tiny_skia::Color::from_rgba8(0, 0, 255, 255));
        let mut host = HeadlessHost::new((30, 20), SerializableColor::white()).with_base(image);
        let base = host.capture_base(1.0).unwrap();
        let px = base.pixel(15, 10).unwrap().demultiply();
        assert_eq!((px.red(), px.blue()), (0, 255));
    }
}
