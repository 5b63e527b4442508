//! Watermark pipeline: acquire → detect → render → store.
//!
//! The same pipeline serves the synchronous path (run inline by the caller)
//! and the asynchronous path (run by a job worker).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::acquire::{AcquiredInput, InputAcquirer, InputDescriptor};
use crate::adapters::{DocumentKind, FileTypeHint, OutputFormat, RenderRequest, RenderedDocument};
use crate::error::{Result, WatermarkError};
use crate::storage::{Artifact, ArtifactStore};
use crate::watermark::{WatermarkConfig, WatermarkRenderer};

/// Everything a caller specifies besides the input itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkRequest {
    pub config: WatermarkConfig,
    #[serde(default)]
    pub file_type: FileTypeHint,
    /// Raster output format; the source format when absent
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
}

impl WatermarkRequest {
    pub fn new(config: WatermarkConfig) -> Self {
        Self {
            config,
            file_type: FileTypeHint::Auto,
            output_format: None,
        }
    }

    pub fn with_file_type(mut self, file_type: FileTypeHint) -> Self {
        self.file_type = file_type;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.config.validate()
    }
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatermarkOutcome {
    /// Generated artifact name
    pub artifact: String,
    pub download_url: String,
    pub content_type: String,
    pub size: u64,
    pub kind: DocumentKind,
    /// Pages, frames or sections drawn
    pub canvases: usize,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl WatermarkOutcome {
    fn new(artifact: Artifact, download_url: String, kind: DocumentKind, canvases: usize) -> Self {
        Self {
            artifact: artifact.name,
            download_url,
            content_type: artifact.content_type,
            size: artifact.size,
            kind,
            canvases,
            created_at: artifact.created_at,
            expires_at: artifact.expires_at,
        }
    }
}

/// Shared, stateless pipeline. Cheap to clone behind an `Arc`.
pub struct Pipeline {
    acquirer: InputAcquirer,
    renderer: Arc<WatermarkRenderer>,
    store: Arc<ArtifactStore>,
}

impl Pipeline {
    pub fn new(
        acquirer: InputAcquirer,
        renderer: Arc<WatermarkRenderer>,
        store: Arc<ArtifactStore>,
    ) -> Self {
        Self {
            acquirer,
            renderer,
            store,
        }
    }

    pub fn acquirer(&self) -> &InputAcquirer {
        &self.acquirer
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    /// Checks that can reject a request before any work is queued.
    pub fn precheck(&self, input: &InputDescriptor, request: &WatermarkRequest) -> Result<()> {
        request.validate()?;
        self.acquirer.precheck(input)
    }

    pub async fn run(
        &self,
        input: InputDescriptor,
        request: &WatermarkRequest,
    ) -> Result<WatermarkOutcome> {
        request.validate()?;

        let input = self.acquirer.acquire(input, request.file_type).await?;
        let rendered = self.render(&input, request).await?;

        let artifact = self
            .store
            .put(
                &input.file_name,
                rendered.extension,
                rendered.content_type,
                &rendered.bytes,
            )
            .await?;
        let download_url = self.store.download_ref(&artifact.name);

        Ok(WatermarkOutcome::new(
            artifact,
            download_url,
            input.kind,
            rendered.canvases,
        ))
    }

    /// Render on the blocking pool so async workers stay responsive.
    async fn render(
        &self,
        input: &AcquiredInput,
        request: &WatermarkRequest,
    ) -> Result<RenderedDocument> {
        let renderer = Arc::clone(&self.renderer);
        let bytes = input.bytes.clone();
        let kind = input.kind;
        let config = request.config.clone();
        let output_format = request.output_format;

        tokio::task::spawn_blocking(move || {
            kind.adapter().render(
                &bytes,
                &RenderRequest {
                    config: &config,
                    renderer: &renderer,
                    output_format,
                },
            )
        })
        .await
        .map_err(|e| WatermarkError::RenderFailed(format!("render task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::Upload;
    use crate::error::ErrorKind;
    use crate::watermark::font::{FontProfile, FontResolver};
    use std::time::Duration;
    use tempfile::TempDir;

    async fn pipeline(dir: &TempDir) -> Pipeline {
        let renderer = WatermarkRenderer::new(
            FontResolver::for_profile(FontProfile::BundledOnly)
                .resolve(None)
                .unwrap(),
        );
        let store = ArtifactStore::open(dir.path(), "/download/", Duration::from_secs(60))
            .await
            .unwrap();
        Pipeline::new(
            InputAcquirer::new(1024 * 1024, Duration::from_secs(5)).unwrap(),
            Arc::new(renderer),
            Arc::new(store),
        )
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = std::io::Cursor::new(Vec::new());
        image::RgbImage::from_pixel(width, height, image::Rgb([250, 250, 250]))
            .write_to(&mut out, image::ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_upload_is_rendered_and_stored() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir).await;
        let request = WatermarkRequest::new(WatermarkConfig::new("CONFIDENTIAL"));

        let outcome = pipeline
            .run(
                InputDescriptor::Upload(Upload::from_bytes("scan.png", png(200, 100))),
                &request,
            )
            .await
            .unwrap();

        assert_eq!(outcome.kind, DocumentKind::Image);
        assert_eq!(outcome.content_type, "image/png");
        assert!(outcome.artifact.starts_with("scan_watermarked_"));
        assert_eq!(outcome.download_url, format!("/download/{}", outcome.artifact));

        let downloaded = pipeline.store().download(&outcome.artifact).await.unwrap();
        let image = image::load_from_memory(&downloaded.bytes).unwrap();
        assert_eq!((image.width(), image.height()), (200, 100));
    }

    #[tokio::test]
    async fn test_output_format_override() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir).await;
        let request = WatermarkRequest::new(WatermarkConfig::new("x"))
            .with_output_format(OutputFormat::Jpeg);

        let outcome = pipeline
            .run(
                InputDescriptor::Upload(Upload::from_bytes("scan.png", png(40, 40))),
                &request,
            )
            .await
            .unwrap();
        assert_eq!(outcome.content_type, "image/jpeg");
        assert!(outcome.artifact.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn test_invalid_config_stops_before_acquisition() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir).await;
        let mut config = WatermarkConfig::new("x");
        config.font_size = 500;

        let err = pipeline
            .run(
                InputDescriptor::Upload(Upload::from_bytes("a.png", png(10, 10))),
                &WatermarkRequest::new(config),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert!(pipeline.store().is_empty());
    }

    #[tokio::test]
    async fn test_mismatched_hint_stores_nothing() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline(&dir).await;
        let request =
            WatermarkRequest::new(WatermarkConfig::new("x")).with_file_type(FileTypeHint::Pdf);

        let err = pipeline
            .run(
                InputDescriptor::Upload(Upload::from_bytes("a.png", png(10, 10))),
                &request,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFileType);
        assert!(pipeline.store().is_empty());
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: WatermarkRequest =
            serde_json::from_str(r#"{"config": {"text": "DRAFT"}}"#).unwrap();
        assert_eq!(request.file_type, FileTypeHint::Auto);
        assert_eq!(request.output_format, None);
        assert_eq!(request.config.font_size, 40);
    }
}
