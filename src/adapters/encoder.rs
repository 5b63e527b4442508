//! Raster output encoders
//!
//! Provides a trait-based encoder system so the raster adapter can re-encode
//! into whichever format the caller asked for:
//! - JPEG and PNG through the image crate
//! - Lossy WebP through libwebp
//! - GIF, BMP and TIFF through the image crate's generic writer

use image::{ImageFormat, ImageOutputFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::str::FromStr;

use crate::constants::{JPEG_QUALITY, WEBP_QUALITY};
use crate::error::{Result, WatermarkError};

/// Output raster format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    #[serde(rename = "webp")]
    WebP,
    Tiff,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::WebP => "webp",
            Self::Tiff => "tiff",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::WebP => "image/webp",
            Self::Tiff => "image/tiff",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::WebP => "webp",
            Self::Tiff => "tiff",
        }
    }

    /// Output format matching a decoded source format, if it can be written.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Bmp => Some(Self::Bmp),
            ImageFormat::WebP => Some(Self::WebP),
            ImageFormat::Tiff => Some(Self::Tiff),
            _ => None,
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Gif => ImageFormat::Gif,
            Self::Bmp => ImageFormat::Bmp,
            Self::WebP => ImageFormat::WebP,
            Self::Tiff => ImageFormat::Tiff,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().trim_start_matches('.') {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "gif" => Ok(Self::Gif),
            "bmp" => Ok(Self::Bmp),
            "webp" => Ok(Self::WebP),
            "tiff" | "tif" => Ok(Self::Tiff),
            other => Err(WatermarkError::InvalidConfig(format!(
                "unknown output format: {}",
                other
            ))),
        }
    }
}

/// Result of encoding an image
#[derive(Debug)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: OutputFormat,
}

/// Trait for image encoders
///
/// The trait is object-safe to allow dynamic dispatch through
/// [`EncoderFactory`].
pub trait ImageEncoder: Send + Sync {
    fn format(&self) -> OutputFormat;

    fn encode(&self, image: &RgbaImage) -> Result<EncodedImage>;
}

/// JPEG encoder using the image crate. Alpha is discarded.
pub struct JpegEncoder {
    pub quality: u8,
}

impl ImageEncoder for JpegEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode(&self, image: &RgbaImage) -> Result<EncodedImage> {
        use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
        use image::ImageEncoder as _;

        let rgb_data = rgba_to_rgb(image.as_raw());

        let mut output = Cursor::new(Vec::new());
        ImageJpegEncoder::new_with_quality(&mut output, self.quality.clamp(1, 100))
            .write_image(
                &rgb_data,
                image.width(),
                image.height(),
                image::ColorType::Rgb8,
            )
            .map_err(|e| WatermarkError::render("jpeg encode", e))?;

        Ok(EncodedImage {
            data: output.into_inner(),
            format: OutputFormat::Jpeg,
        })
    }
}

/// PNG encoder using the image crate
pub struct PngEncoder;

impl ImageEncoder for PngEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Png
    }

    fn encode(&self, image: &RgbaImage) -> Result<EncodedImage> {
        use image::codecs::png::PngEncoder as ImagePngEncoder;
        use image::ImageEncoder as _;

        let mut output = Cursor::new(Vec::new());
        ImagePngEncoder::new(&mut output)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )
            .map_err(|e| WatermarkError::render("png encode", e))?;

        Ok(EncodedImage {
            data: output.into_inner(),
            format: OutputFormat::Png,
        })
    }
}

/// Lossy WebP encoder using libwebp
pub struct WebPEncoder {
    pub quality: f32,
}

impl ImageEncoder for WebPEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::WebP
    }

    fn encode(&self, image: &RgbaImage) -> Result<EncodedImage> {
        let encoder = webp::Encoder::from_rgba(image.as_raw(), image.width(), image.height());
        let memory = encoder.encode(self.quality.clamp(0.0, 100.0));

        Ok(EncodedImage {
            data: memory.to_vec(),
            format: OutputFormat::WebP,
        })
    }
}

/// GIF, BMP and TIFF through the image crate's format-generic writer
pub struct GenericEncoder {
    format: OutputFormat,
}

impl ImageEncoder for GenericEncoder {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn encode(&self, image: &RgbaImage) -> Result<EncodedImage> {
        let output_format = match self.format {
            OutputFormat::Gif => ImageOutputFormat::Gif,
            OutputFormat::Bmp => ImageOutputFormat::Bmp,
            OutputFormat::Tiff => ImageOutputFormat::Tiff,
            other => {
                return Err(WatermarkError::RenderFailed(format!(
                    "{} is not handled by the generic encoder",
                    other.as_str()
                )))
            }
        };

        let mut output = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(image.clone())
            .write_to(&mut output, output_format)
            .map_err(|e| WatermarkError::render(self.format.as_str(), e))?;

        Ok(EncodedImage {
            data: output.into_inner(),
            format: self.format,
        })
    }
}

/// Factory for creating encoders based on output format
pub struct EncoderFactory;

impl EncoderFactory {
    pub fn create(format: OutputFormat) -> Box<dyn ImageEncoder> {
        match format {
            OutputFormat::Jpeg => Box::new(JpegEncoder {
                quality: JPEG_QUALITY,
            }),
            OutputFormat::Png => Box::new(PngEncoder),
            OutputFormat::WebP => Box::new(WebPEncoder {
                quality: WEBP_QUALITY,
            }),
            OutputFormat::Gif | OutputFormat::Bmp | OutputFormat::Tiff => {
                Box::new(GenericEncoder { format })
            }
        }
    }
}

/// Convert RGBA to RGB by discarding alpha channel
fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for chunk in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&chunk[..3]);
    }
    rgb
}
