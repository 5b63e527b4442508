//! Alpha compositing of watermark layers.
//!
//! Uses the Porter-Duff "over" operator on straight (non-premultiplied)
//! RGBA. Foreground pixels with zero alpha leave the background untouched
//! bit for bit.

use image::{Rgba, RgbaImage};

use super::position::PlacementPosition;

/// A watermark image to be composited at a position.
#[derive(Clone, Copy)]
pub struct WatermarkLayer<'a> {
    pub image: &'a RgbaImage,
    pub position: PlacementPosition,
    /// Applied on top of the image's own alpha channel (0.0 to 1.0)
    pub opacity: f32,
}

impl std::fmt::Debug for WatermarkLayer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkLayer")
            .field("dimensions", &(self.image.width(), self.image.height()))
            .field("position", &self.position)
            .field("opacity", &self.opacity)
            .finish()
    }
}

/// Blend a layer onto the target, clipping to the target bounds.
pub fn blend_layer(target: &mut RgbaImage, layer: &WatermarkLayer<'_>) {
    let target_width = target.width() as i64;
    let target_height = target.height() as i64;
    let (px, py) = (layer.position.x as i64, layer.position.y as i64);

    let x_start = px.max(0);
    let y_start = py.max(0);
    let x_end = (px + layer.image.width() as i64).min(target_width);
    let y_end = (py + layer.image.height() as i64).min(target_height);

    for ty in y_start..y_end {
        for tx in x_start..x_end {
            let wm_pixel = layer.image.get_pixel((tx - px) as u32, (ty - py) as u32);
            if wm_pixel[3] == 0 {
                continue;
            }
            let target_pixel = target.get_pixel_mut(tx as u32, ty as u32);
            *target_pixel = blend_pixels(*target_pixel, *wm_pixel, layer.opacity);
        }
    }
}

/// Composite a full-size overlay onto a target of the same dimensions.
pub fn composite(target: &mut RgbaImage, overlay: &RgbaImage) {
    blend_layer(
        target,
        &WatermarkLayer {
            image: overlay,
            position: PlacementPosition::new(0, 0),
            opacity: 1.0,
        },
    );
}

/// Blend two pixels using alpha compositing with additional opacity.
///
/// result = foreground + background * (1 - foreground.alpha)
pub fn blend_pixels(background: Rgba<u8>, foreground: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let fg_alpha = (foreground[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
    if fg_alpha <= 0.0 {
        return background;
    }
    let bg_alpha = background[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);
    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend_channel = |fg: u8, bg: u8| -> u8 {
        let fg_f = fg as f32 / 255.0;
        let bg_f = bg as f32 / 255.0;
        let result = (fg_f * fg_alpha + bg_f * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend_channel(foreground[0], background[0]),
        blend_channel(foreground[1], background[1]),
        blend_channel(foreground[2], background[2]),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, pixel: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(pixel))
    }

    #[test]
    fn test_opaque_foreground_replaces_background() {
        let result = blend_pixels(Rgba([10, 20, 30, 255]), Rgba([200, 100, 50, 255]), 1.0);
        assert_eq!(result, Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn test_half_opacity_mixes() {
        let result = blend_pixels(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 255]), 0.5);
        assert_eq!(result[3], 255);
        assert!((127..=128).contains(&result[0]));
    }

    #[test]
    fn test_transparent_foreground_keeps_background_exactly() {
        for bg in [[0, 0, 0, 255], [255, 255, 255, 255], [13, 77, 201, 90], [1, 2, 3, 0]] {
            let result = blend_pixels(Rgba(bg), Rgba([255, 0, 0, 0]), 1.0);
            assert_eq!(result, Rgba(bg));
        }
    }

    #[test]
    fn test_zero_opacity_keeps_background() {
        let result = blend_pixels(Rgba([9, 8, 7, 255]), Rgba([255, 0, 0, 255]), 0.0);
        assert_eq!(result, Rgba([9, 8, 7, 255]));
    }

    #[test]
    fn test_over_transparent_background() {
        let result = blend_pixels(Rgba([0, 0, 0, 0]), Rgba([255, 0, 0, 128]), 1.0);
        assert_eq!(result, Rgba([255, 0, 0, 128]));
    }

    #[test]
    fn test_blend_layer_clips_to_target() {
        let mut target = solid(10, 10, [0, 0, 0, 255]);
        let stamp = solid(4, 4, [255, 255, 255, 255]);
        blend_layer(
            &mut target,
            &WatermarkLayer {
                image: &stamp,
                position: PlacementPosition::new(8, -2),
                opacity: 1.0,
            },
        );
        assert_eq!(*target.get_pixel(9, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(*target.get_pixel(8, 1), Rgba([255, 255, 255, 255]));
        assert_eq!(*target.get_pixel(8, 2), Rgba([0, 0, 0, 255]));
        assert_eq!(*target.get_pixel(7, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_blend_layer_entirely_outside() {
        let mut target = solid(10, 10, [5, 5, 5, 255]);
        let stamp = solid(4, 4, [255, 255, 255, 255]);
        blend_layer(
            &mut target,
            &WatermarkLayer {
                image: &stamp,
                position: PlacementPosition::new(-50, 30),
                opacity: 1.0,
            },
        );
        assert!(target.pixels().all(|p| *p == Rgba([5, 5, 5, 255])));
    }

    #[test]
    fn test_composite_only_touches_covered_pixels() {
        let mut target = solid(6, 6, [40, 50, 60, 255]);
        let mut overlay = solid(6, 6, [255, 0, 0, 0]);
        overlay.put_pixel(2, 3, Rgba([255, 0, 0, 255]));

        composite(&mut target, &overlay);

        for (x, y, pixel) in target.enumerate_pixels() {
            if (x, y) == (2, 3) {
                assert_eq!(*pixel, Rgba([255, 0, 0, 255]));
            } else {
                assert_eq!(*pixel, Rgba([40, 50, 60, 255]));
            }
        }
    }
}
