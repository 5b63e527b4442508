//! Document type detection.
//!
//! The type tag is always confirmed against the content. Extensions and
//! caller hints only decide whether a mismatch is an error.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::DocumentKind;
use crate::error::{Result, WatermarkError};

/// Raster extensions accepted on input.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif"];

/// Document extensions accepted on input.
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx"];

/// How far into the buffer a PDF header may start.
const PDF_HEADER_WINDOW: usize = 1024;

/// Caller-declared type of an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileTypeHint {
    /// Decide from the content
    #[default]
    Auto,
    Image,
    Pdf,
    Word,
}

impl FileTypeHint {
    fn expected(&self) -> Option<DocumentKind> {
        match self {
            Self::Auto => None,
            Self::Image => Some(DocumentKind::Image),
            Self::Pdf => Some(DocumentKind::Pdf),
            Self::Word => Some(DocumentKind::Docx),
        }
    }
}

impl std::str::FromStr for FileTypeHint {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "image" => Ok(Self::Image),
            "pdf" => Ok(Self::Pdf),
            "word" | "docx" => Ok(Self::Word),
            other => Err(WatermarkError::InvalidConfig(format!(
                "unknown file type '{}'",
                other
            ))),
        }
    }
}

/// Lowercased extension of a file name, without the dot.
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Document kind implied by a file extension.
pub fn kind_from_extension(extension: &str) -> Option<DocumentKind> {
    let extension = extension.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Some(DocumentKind::Image)
    } else if extension == "pdf" {
        Some(DocumentKind::Pdf)
    } else if extension == "docx" {
        Some(DocumentKind::Docx)
    } else {
        None
    }
}

/// Document kind recognized from the leading bytes.
pub fn sniff_kind(bytes: &[u8]) -> Option<DocumentKind> {
    let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    if find(window, b"%PDF-").is_some() {
        return Some(DocumentKind::Pdf);
    }

    if bytes.starts_with(b"PK\x03\x04") {
        // Entry names are stored uncompressed in local and central headers
        return find(bytes, b"word/document.xml").map(|_| DocumentKind::Docx);
    }

    image::guess_format(bytes)
        .ok()
        .filter(|format| super::encoder::OutputFormat::from_image_format(*format).is_some())
        .map(|_| DocumentKind::Image)
}

/// Resolve the document kind for an acquired input.
pub fn detect_kind(hint: FileTypeHint, file_name: &str, bytes: &[u8]) -> Result<DocumentKind> {
    let extension = extension_of(file_name);
    let Some(sniffed) = sniff_kind(bytes) else {
        let reason = match extension.as_deref() {
            Some("doc") => "legacy .doc documents are not supported, convert to .docx".to_string(),
            Some(ext) => format!("content of '{}' is not a supported .{} file", file_name, ext),
            None => format!("content of '{}' is not a supported document", file_name),
        };
        return Err(WatermarkError::UnsupportedFileType(reason));
    };

    if let Some(expected) = hint.expected() {
        if expected != sniffed {
            return Err(WatermarkError::UnsupportedFileType(format!(
                "declared type {} but content is {}",
                expected.as_str(),
                sniffed.as_str()
            )));
        }
    } else if let Some(declared) = extension.as_deref().and_then(kind_from_extension) {
        if declared != sniffed {
            tracing::debug!(
                file_name,
                declared = declared.as_str(),
                detected = sniffed.as_str(),
                "Extension disagrees with content, using content"
            );
        }
    }

    Ok(sniffed)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
