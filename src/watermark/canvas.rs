//! Drawable surfaces for the watermark renderer.

use ab_glyph::FontArc;
use image::RgbaImage;

use super::compositor::{blend_layer, WatermarkLayer};
use super::font::FontHandle;
use super::position::{CanvasSize, PlacementPosition};
use super::text_renderer::{StampRegion, TextStamp, TextStyle};
use crate::error::Result;

/// A surface the renderer can draw watermark text on.
pub trait Canvas {
    fn size(&self) -> CanvasSize;

    /// Draw `style.text` centered at `center`, rotated around its own
    /// centroid by `style.angle` at `style.opacity`.
    fn draw_text(&mut self, style: &TextStyle, center: (f32, f32)) -> Result<()>;
}

/// A transparent RGBA layer that collects watermark stamps.
///
/// Every adapter draws onto one of these. Raster images composite the layer
/// over the decoded pixels; documents embed it as an image.
pub struct OverlayCanvas {
    font: FontArc,
    layer: RgbaImage,
    /// Glyphs of the last style drawn, reused while the style stays the same
    stamp: Option<CachedStamp>,
}

struct CachedStamp {
    style: TextStyle,
    text: TextStamp,
    /// The whole rotated stamp, kept once it has fit on the layer
    full: Option<RgbaImage>,
}

impl OverlayCanvas {
    pub fn new(font: &FontHandle, size: CanvasSize) -> Self {
        Self {
            font: font.font().clone(),
            layer: RgbaImage::new(size.width.max(1), size.height.max(1)),
            stamp: None,
        }
    }

    pub fn layer(&self) -> &RgbaImage {
        &self.layer
    }

    pub fn into_layer(self) -> RgbaImage {
        self.layer
    }
}

impl Canvas for OverlayCanvas {
    fn size(&self) -> CanvasSize {
        CanvasSize::new(self.layer.width(), self.layer.height())
    }

    fn draw_text(&mut self, style: &TextStyle, center: (f32, f32)) -> Result<()> {
        let stale = !matches!(&self.stamp, Some(cached) if cached.style == *style);
        if stale {
            self.stamp = Some(CachedStamp {
                style: style.clone(),
                text: TextStamp::new(&self.font, style)?,
                full: None,
            });
        }
        let Some(CachedStamp { text, full, .. }) = self.stamp.as_mut() else {
            return Ok(());
        };

        let (width, height) = text.size();
        let origin_x = (center.0 - width as f32 / 2.0).round() as i64;
        let origin_y = (center.1 - height as f32 / 2.0).round() as i64;

        // Only the part of the stamp that lands on the layer is rasterized
        let x0 = (-origin_x).clamp(0, width as i64);
        let y0 = (-origin_y).clamp(0, height as i64);
        let x1 = (self.layer.width() as i64 - origin_x).clamp(0, width as i64);
        let y1 = (self.layer.height() as i64 - origin_y).clamp(0, height as i64);
        let region = StampRegion::new(
            x0 as u32,
            y0 as u32,
            (x1 - x0).max(0) as u32,
            (y1 - y0).max(0) as u32,
        );
        if region.is_empty() {
            return Ok(());
        }

        let position = PlacementPosition::new((origin_x + x0) as i32, (origin_y + y0) as i32);
        let partial;
        let image = if region == text.full_region() {
            &*full.get_or_insert_with(|| text.render())
        } else {
            partial = text.render_region(region);
            &partial
        };

        blend_layer(
            &mut self.layer,
            &WatermarkLayer {
                image,
                position,
                opacity: 1.0,
            },
        );
        Ok(())
    }
}
