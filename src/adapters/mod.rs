//! Format adapters.
//!
//! Each supported document type is one [`DocumentKind`] variant backed by
//! one [`FormatAdapter`]. An adapter turns input bytes into drawable
//! canvases, lets the shared [`WatermarkRenderer`] draw on them, and
//! re-encodes the result.

use serde::{Deserialize, Serialize};

pub mod detect;
pub mod docx;
pub mod encoder;
pub mod pdf;
pub mod raster;

pub use detect::{detect_kind, sniff_kind, FileTypeHint};
pub use docx::DocxAdapter;
pub use encoder::{EncoderFactory, ImageEncoder, OutputFormat};
pub use pdf::PdfAdapter;
pub use raster::RasterAdapter;

use crate::error::Result;
use crate::watermark::{WatermarkConfig, WatermarkRenderer};

/// Supported document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Raster image (one canvas)
    Image,
    /// Paginated document (one canvas per page)
    Pdf,
    /// Flowed word-processing document (one overlay per section)
    Docx,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }

    /// The adapter that renders this kind.
    pub fn adapter(&self) -> &'static dyn FormatAdapter {
        match self {
            Self::Image => &RasterAdapter,
            Self::Pdf => &PdfAdapter,
            Self::Docx => &DocxAdapter,
        }
    }
}

/// What an adapter needs besides the input bytes.
pub struct RenderRequest<'a> {
    pub config: &'a WatermarkConfig,
    pub renderer: &'a WatermarkRenderer,
    /// Raster output override; documents ignore it
    pub output_format: Option<OutputFormat>,
}

/// A watermarked document ready to store.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    /// Extension without the dot
    pub extension: &'static str,
    /// Canvases drawn (pages, frames or sections)
    pub canvases: usize,
}

/// Renders a watermark onto one document type.
pub trait FormatAdapter: Send + Sync {
    fn kind(&self) -> DocumentKind;

    fn render(&self, input: &[u8], request: &RenderRequest<'_>) -> Result<RenderedDocument>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_matches_kind() {
        for kind in [DocumentKind::Image, DocumentKind::Pdf, DocumentKind::Docx] {
            assert_eq!(kind.adapter().kind(), kind);
        }
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(DocumentKind::Docx.as_str(), "docx");
        assert_eq!(
            serde_json::to_string(&DocumentKind::Pdf).unwrap(),
            "\"pdf\""
        );
    }
}
