//! Raster image adapter.

use image::io::Reader as ImageReader;
use std::io::Cursor;

use super::encoder::{EncoderFactory, OutputFormat};
use super::{DocumentKind, FormatAdapter, RenderRequest, RenderedDocument};
use crate::constants::IMAGE_CORNER_MARGIN;
use crate::error::{Result, WatermarkError};
use crate::watermark::compositor::composite;
use crate::watermark::{CanvasSize, OverlayCanvas, RenderSettings};

/// Decodes one frame, watermarks it, and re-encodes it in the requested
/// format (the source format by default).
pub struct RasterAdapter;

impl FormatAdapter for RasterAdapter {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Image
    }

    fn render(&self, input: &[u8], request: &RenderRequest<'_>) -> Result<RenderedDocument> {
        let reader = ImageReader::new(Cursor::new(input))
            .with_guessed_format()
            .map_err(|e| WatermarkError::render("image decode", e))?;
        let source_format = reader.format().and_then(OutputFormat::from_image_format);
        let decoded = reader.decode()?;

        let mut target = decoded.to_rgba8();
        let size = CanvasSize::new(target.width(), target.height());

        let settings = RenderSettings::from_config(request.config, 1.0, IMAGE_CORNER_MARGIN);
        let mut canvas = OverlayCanvas::new(request.renderer.font(), size);
        let blocks = request.renderer.render(&mut canvas, &settings)?;
        composite(&mut target, canvas.layer());

        let format = request
            .output_format
            .or(source_format)
            .unwrap_or(OutputFormat::Png);
        let encoded = EncoderFactory::create(format).encode(&target)?;

        tracing::debug!(
            width = size.width,
            height = size.height,
            blocks,
            format = format.as_str(),
            "Watermarked raster image"
        );

        Ok(RenderedDocument {
            bytes: encoded.data,
            content_type: format.content_type(),
            extension: format.extension(),
            canvases: 1,
        })
    }
}
