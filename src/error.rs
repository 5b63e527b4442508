//! Error taxonomy shared by every watermark component.
//!
//! Each failure maps to exactly one [`ErrorKind`], which is what callers see
//! on a failed job snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatermarkError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("File too large: {size} bytes exceeds maximum {max_size} bytes")]
    FileTooLarge { size: u64, max_size: u64 },

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Font resolution failed: {0}")]
    FontResolutionFailed(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Artifact expired or missing: {0}")]
    ArtifactExpiredOrMissing(String),

    #[error("Service busy: job queue is full")]
    Busy,

    #[error("Storage failed: {0}")]
    StorageFailed(#[from] std::io::Error),
}

impl WatermarkError {
    pub fn render(context: &str, err: impl fmt::Display) -> Self {
        Self::RenderFailed(format!("{}: {}", context, err))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::UnsupportedFileType(_) => ErrorKind::UnsupportedFileType,
            Self::DownloadFailed(_) => ErrorKind::DownloadFailed,
            Self::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            Self::RenderFailed(_) => ErrorKind::RenderFailed,
            Self::FontResolutionFailed(_) => ErrorKind::FontResolutionFailed,
            Self::JobNotFound(_) => ErrorKind::JobNotFound,
            Self::ArtifactExpiredOrMissing(_) => ErrorKind::ArtifactExpiredOrMissing,
            Self::Busy => ErrorKind::Busy,
            Self::StorageFailed(_) => ErrorKind::StorageFailed,
        }
    }
}

impl From<image::ImageError> for WatermarkError {
    fn from(err: image::ImageError) -> Self {
        Self::render("image codec", err)
    }
}

impl From<lopdf::Error> for WatermarkError {
    fn from(err: lopdf::Error) -> Self {
        Self::render("pdf", err)
    }
}

impl From<zip::result::ZipError> for WatermarkError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::render("docx container", err)
    }
}

impl From<quick_xml::Error> for WatermarkError {
    fn from(err: quick_xml::Error) -> Self {
        Self::render("docx xml", err)
    }
}

impl From<reqwest::Error> for WatermarkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::DownloadFailed(format!("timed out: {}", err))
        } else {
            Self::DownloadFailed(err.to_string())
        }
    }
}

/// Caller-visible classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidConfig,
    UnsupportedFileType,
    DownloadFailed,
    FileTooLarge,
    RenderFailed,
    FontResolutionFailed,
    JobNotFound,
    ArtifactExpiredOrMissing,
    Busy,
    StorageFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidConfig => "invalid_config",
            Self::UnsupportedFileType => "unsupported_file_type",
            Self::DownloadFailed => "download_failed",
            Self::FileTooLarge => "file_too_large",
            Self::RenderFailed => "render_failed",
            Self::FontResolutionFailed => "font_resolution_failed",
            Self::JobNotFound => "job_not_found",
            Self::ArtifactExpiredOrMissing => "artifact_expired_or_missing",
            Self::Busy => "busy",
            Self::StorageFailed => "storage_failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, WatermarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_maps_to_one_kind() {
        let cases = vec![
            (WatermarkError::InvalidConfig("x".into()), ErrorKind::InvalidConfig),
            (
                WatermarkError::UnsupportedFileType("doc".into()),
                ErrorKind::UnsupportedFileType,
            ),
            (
                WatermarkError::DownloadFailed("dns".into()),
                ErrorKind::DownloadFailed,
            ),
            (
                WatermarkError::FileTooLarge {
                    size: 2,
                    max_size: 1,
                },
                ErrorKind::FileTooLarge,
            ),
            (WatermarkError::RenderFailed("x".into()), ErrorKind::RenderFailed),
            (
                WatermarkError::FontResolutionFailed("x".into()),
                ErrorKind::FontResolutionFailed,
            ),
            (WatermarkError::JobNotFound("x".into()), ErrorKind::JobNotFound),
            (
                WatermarkError::ArtifactExpiredOrMissing("x".into()),
                ErrorKind::ArtifactExpiredOrMissing,
            ),
            (WatermarkError::Busy, ErrorKind::Busy),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "wrong kind for {}", err);
        }
    }

    #[test]
    fn test_io_error_converts_to_storage_failed() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: WatermarkError = io.into();
        assert_eq!(err.kind(), ErrorKind::StorageFailed);
    }

    #[test]
    fn test_file_too_large_message() {
        let err = WatermarkError::FileTooLarge {
            size: 2048,
            max_size: 1024,
        };
        assert_eq!(
            err.to_string(),
            "File too large: 2048 bytes exceeds maximum 1024 bytes"
        );
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ArtifactExpiredOrMissing).unwrap();
        assert_eq!(json, "\"artifact_expired_or_missing\"");
        assert_eq!(ErrorKind::Busy.to_string(), "busy");
    }
}
