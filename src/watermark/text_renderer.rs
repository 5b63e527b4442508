//! Text watermark rendering.
//!
//! Rasterizes a single line of text into a transparent RGBA stamp that the
//! compositor can place on any canvas.
//!
//! # Features
//!
//! - Hex color parsing (#RGB and #RRGGBB formats)
//! - Kerning-aware text measurement
//! - Counter-clockwise rotation around the block's centroid
//!
//! Stamps carry the text color in every pixel and encode glyph coverage
//! times opacity in the alpha channel, so interpolation during rotation only
//! ever touches alpha.

use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};

use crate::error::{Result, WatermarkError};

/// Padding added around measured text, in pixels.
const TEXT_PADDING: u32 = 2;

/// Tolerance that keeps exact right angles from growing the extent by a pixel.
const EXTENT_EPSILON: f32 = 1e-3;

/// Parsed RGB color from hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Everything needed to rasterize one stamp.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub text: String,
    /// Font size in pixels of the target canvas
    pub font_size: f32,
    pub color: Color,
    /// 0.0 to 1.0
    pub opacity: f32,
    /// Counter-clockwise rotation in degrees
    pub angle: f32,
}

/// Parse a hex color string into RGB components.
///
/// Supports both #RGB and #RRGGBB formats.
///
/// ```ignore
/// assert_eq!(parse_hex_color("#FFF"), Some(Color::new(255, 255, 255)));
/// assert_eq!(parse_hex_color("#FF0000"), Some(Color::new(255, 0, 0)));
/// ```
pub fn parse_hex_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    match hex.len() {
        3 => {
            let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
            // Double each component: 0xF -> 0xFF, 0xA -> 0xAA
            Some(Color::new(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17))
        }
        6 => {
            let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            Some(Color::new(pair(0)?, pair(2)?, pair(4)?))
        }
        _ => None,
    }
}

/// Calculate the dimensions of unrotated text.
///
/// Returns (width, height) in pixels, including padding.
pub fn measure_text(font: &FontArc, text: &str, font_size: f32) -> (u32, u32) {
    let scaled_font = font.as_scaled(PxScale::from(font_size));

    let mut width = 0.0f32;
    let mut prev_glyph: Option<GlyphId> = None;

    for c in text.chars() {
        let glyph_id = scaled_font.glyph_id(c);
        if let Some(prev) = prev_glyph {
            width += scaled_font.kern(prev, glyph_id);
        }
        width += scaled_font.h_advance(glyph_id);
        prev_glyph = Some(glyph_id);
    }

    (
        width.max(0.0).ceil() as u32 + TEXT_PADDING,
        scaled_font.height().ceil() as u32 + TEXT_PADDING,
    )
}

/// Axis-aligned bounding box of a `width` x `height` block rotated by
/// `angle` degrees.
pub fn rotated_extent(width: u32, height: u32, angle: f32) -> (u32, u32) {
    let radians = angle.to_radians();
    let (sin, cos) = (radians.sin().abs(), radians.cos().abs());
    let (w, h) = (width as f32, height as f32);

    let rotated_width = (w * cos + h * sin - EXTENT_EPSILON).ceil().max(1.0) as u32;
    let rotated_height = (w * sin + h * cos - EXTENT_EPSILON).ceil().max(1.0) as u32;
    (rotated_width, rotated_height)
}

/// Size of the stamp a [`TextStamp`] produces for `style`.
pub fn stamp_size(font: &FontArc, style: &TextStyle) -> (u32, u32) {
    let (width, height) = measure_text(font, &style.text, style.font_size);
    rotated_extent(width, height, style.angle)
}

/// A rectangle of stamp pixels, in stamp coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl StampRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Coverage of one glyph, positioned in unrotated text coordinates.
struct GlyphMask {
    x: i64,
    y: i64,
    width: u32,
    height: u32,
    alpha: Vec<u8>,
}

impl GlyphMask {
    fn alpha_at(&self, x: i64, y: i64) -> f32 {
        let (lx, ly) = (x - self.x, y - self.y);
        if lx < 0 || ly < 0 || lx >= self.width as i64 || ly >= self.height as i64 {
            return 0.0;
        }
        self.alpha[ly as usize * self.width as usize + lx as usize] as f32
    }
}

/// A line of text rasterized glyph by glyph and rotated on demand.
///
/// Only per-glyph coverage masks are held, so memory follows the glyph count
/// rather than the area of the rotated block. [`TextStamp::render_region`]
/// produces pixels for the requested rectangle alone, which keeps a stamp far
/// larger than its canvas as cheap as the visible part of it.
pub struct TextStamp {
    glyphs: Vec<GlyphMask>,
    color: Color,
    /// Unrotated text block, padding included
    block: (u32, u32),
    size: (u32, u32),
    sin: f32,
    cos: f32,
}

impl TextStamp {
    pub fn new(font: &FontArc, style: &TextStyle) -> Result<Self> {
        if style.text.is_empty() {
            return Err(WatermarkError::RenderFailed(
                "cannot render empty text".to_string(),
            ));
        }

        let scale = PxScale::from(style.font_size);
        let scaled_font = font.as_scaled(scale);
        let block = measure_text(font, &style.text, style.font_size);

        let alpha = style.opacity.clamp(0.0, 1.0) * 255.0;
        let offset = TEXT_PADDING as f32 / 2.0;
        let baseline_y = offset + scaled_font.ascent();

        let mut glyphs = Vec::new();
        let mut cursor_x = offset;
        let mut prev_glyph: Option<GlyphId> = None;

        for c in style.text.chars() {
            let glyph_id = scaled_font.glyph_id(c);
            if let Some(prev) = prev_glyph {
                cursor_x += scaled_font.kern(prev, glyph_id);
            }

            let glyph = glyph_id.with_scale_and_position(scale, point(cursor_x, baseline_y));
            if let Some(outlined) = font.outline_glyph(glyph) {
                let bounds = outlined.px_bounds();
                let width = bounds.width().max(0.0).ceil() as u32;
                let height = bounds.height().max(0.0).ceil() as u32;
                let mut mask = vec![0u8; width as usize * height as usize];
                outlined.draw(|px, py, coverage| {
                    if px < width && py < height {
                        let a = (coverage.clamp(0.0, 1.0) * alpha).round() as u8;
                        let slot = &mut mask[py as usize * width as usize + px as usize];
                        *slot = (*slot).max(a);
                    }
                });
                glyphs.push(GlyphMask {
                    x: bounds.min.x as i64,
                    y: bounds.min.y as i64,
                    width,
                    height,
                    alpha: mask,
                });
            }

            cursor_x += scaled_font.h_advance(glyph_id);
            prev_glyph = Some(glyph_id);
        }

        let radians = style.angle.to_radians();
        Ok(Self {
            glyphs,
            color: style.color,
            block,
            size: rotated_extent(block.0, block.1, style.angle),
            sin: radians.sin(),
            cos: radians.cos(),
        })
    }

    /// Dimensions of the full rotated stamp; equal to [`stamp_size`].
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn full_region(&self) -> StampRegion {
        StampRegion::new(0, 0, self.size.0, self.size.1)
    }

    /// Render the whole stamp.
    pub fn render(&self) -> RgbaImage {
        self.render_region(self.full_region())
    }

    /// Render the part of the stamp inside `region`.
    ///
    /// The region is clipped to the stamp first. The returned image has the
    /// clipped region's dimensions, its top-left pixel being the region's
    /// origin in the full stamp.
    pub fn render_region(&self, region: StampRegion) -> RgbaImage {
        let x0 = region.x.min(self.size.0);
        let y0 = region.y.min(self.size.1);
        let x1 = region.x.saturating_add(region.width).min(self.size.0);
        let y1 = region.y.saturating_add(region.height).min(self.size.1);

        let clear = Rgba([self.color.r, self.color.g, self.color.b, 0]);
        let mut out = RgbaImage::from_pixel(x1 - x0, y1 - y0, clear);
        if out.width() == 0 || out.height() == 0 {
            return out;
        }

        let (block_w, block_h) = (self.block.0 as i64, self.block.1 as i64);
        for glyph in &self.glyphs {
            let (gx0, gy0, gx1, gy1) = self.glyph_extent(glyph);
            let (gx0, gy0) = (gx0.max(x0 as i64), gy0.max(y0 as i64));
            let (gx1, gy1) = (gx1.min(x1 as i64), gy1.min(y1 as i64));

            // Pixels outside the text block never carry coverage
            let alpha_at = |x: i64, y: i64| -> f32 {
                if x < 0 || y < 0 || x >= block_w || y >= block_h {
                    0.0
                } else {
                    glyph.alpha_at(x, y)
                }
            };

            for dy in gy0..gy1 {
                for dx in gx0..gx1 {
                    let (sx, sy) = self.to_block(dx, dy);
                    if sx <= -1.0 || sy <= -1.0 || sx >= block_w as f32 || sy >= block_h as f32 {
                        continue;
                    }

                    // Bilinear interpolation
                    let bx = sx.floor() as i64;
                    let by = sy.floor() as i64;
                    let fx = sx - bx as f32;
                    let fy = sy - by as f32;

                    let a = alpha_at(bx, by) * (1.0 - fx) * (1.0 - fy)
                        + alpha_at(bx + 1, by) * fx * (1.0 - fy)
                        + alpha_at(bx, by + 1) * (1.0 - fx) * fy
                        + alpha_at(bx + 1, by + 1) * fx * fy;
                    let a = a.round().clamp(0.0, 255.0) as u8;
                    if a == 0 {
                        continue;
                    }

                    // Overlapping glyph edges keep the stronger coverage
                    let pixel = out.get_pixel_mut((dx - x0 as i64) as u32, (dy - y0 as i64) as u32);
                    pixel[3] = pixel[3].max(a);
                }
            }
        }

        out
    }

    /// Inverse mapping from a stamp pixel center to unrotated block space.
    fn to_block(&self, dx: i64, dy: i64) -> (f32, f32) {
        let rx = dx as f32 + 0.5 - self.size.0 as f32 / 2.0;
        let ry = dy as f32 + 0.5 - self.size.1 as f32 / 2.0;
        (
            rx * self.cos - ry * self.sin + self.block.0 as f32 / 2.0 - 0.5,
            rx * self.sin + ry * self.cos + self.block.1 as f32 / 2.0 - 0.5,
        )
    }

    /// Forward mapping from block space to stamp space.
    fn to_stamp(&self, sx: f32, sy: f32) -> (f32, f32) {
        let u = sx + 0.5 - self.block.0 as f32 / 2.0;
        let v = sy + 0.5 - self.block.1 as f32 / 2.0;
        (
            u * self.cos + v * self.sin + self.size.0 as f32 / 2.0 - 0.5,
            -u * self.sin + v * self.cos + self.size.1 as f32 / 2.0 - 0.5,
        )
    }

    /// Stamp pixels a glyph can reach, as `(x0, y0, x1, y1)` with exclusive
    /// ends. Interpolation spreads coverage one pixel past the mask.
    fn glyph_extent(&self, glyph: &GlyphMask) -> (i64, i64, i64, i64) {
        let left = glyph.x as f32 - 1.0;
        let top = glyph.y as f32 - 1.0;
        let right = glyph.x as f32 + glyph.width as f32;
        let bottom = glyph.y as f32 + glyph.height as f32;

        let corners = [
            self.to_stamp(left, top),
            self.to_stamp(right, top),
            self.to_stamp(left, bottom),
            self.to_stamp(right, bottom),
        ];
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);

        (
            (min_x.floor() as i64 - 1).max(0),
            (min_y.floor() as i64 - 1).max(0),
            (max_x.ceil() as i64 + 2).min(self.size.0 as i64),
            (max_y.ceil() as i64 + 2).min(self.size.1 as i64),
        )
    }
}
