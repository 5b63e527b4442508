//! Service facade.
//!
//! Wires the font resolver, input acquirer, artifact store, pipeline and job
//! coordinator together from a [`ServiceConfig`] and exposes the operations
//! a transport layer (HTTP handlers, the CLI) needs.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::acquire::{InputAcquirer, InputDescriptor, Upload};
use crate::adapters::detect::{DOCUMENT_EXTENSIONS, IMAGE_EXTENSIONS};
use crate::adapters::OutputFormat;
use crate::config::ServiceConfig;
use crate::error::{Result, WatermarkError};
use crate::jobs::{CoordinatorStats, JobCoordinator, JobSnapshot};
use crate::pipeline::{Pipeline, WatermarkOutcome, WatermarkRequest};
use crate::storage::{ArtifactStore, Downloaded};
use crate::watermark::{FontResolver, WatermarkRenderer};

/// Limits advertised to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceLimits {
    pub max_file_size: u64,
    pub retention_seconds: u64,
    pub max_workers: usize,
    pub queue_capacity: usize,
    pub supported_extensions: Vec<&'static str>,
    pub output_formats: Vec<&'static str>,
    pub download_url_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    /// Where the watermark font was loaded from
    pub font: String,
    pub sweeper_running: bool,
    pub stored_artifacts: usize,
    #[serde(flatten)]
    pub jobs: CoordinatorStats,
}

pub struct WatermarkService {
    config: ServiceConfig,
    pipeline: Arc<Pipeline>,
    coordinator: JobCoordinator,
    font: String,
}

impl WatermarkService {
    /// Build the service. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the configuration does not validate
    /// - `FontResolutionFailed` if `custom_font_path` cannot be loaded; the
    ///   override never falls back to another font
    /// - `StorageFailed` if the output directory cannot be prepared
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        config.validate().map_err(WatermarkError::InvalidConfig)?;

        let font = FontResolver::for_profile(config.font_profile)
            .resolve(config.custom_font_path.as_deref())?;
        let font_origin = font.origin().to_string();
        let renderer = Arc::new(WatermarkRenderer::new(font));

        let acquirer = InputAcquirer::new(
            config.max_file_size,
            Duration::from_secs(config.fetch_timeout_seconds),
        )?;
        let store = ArtifactStore::open(
            &config.output_dir,
            config.download_url_prefix.clone(),
            Duration::from_secs(config.retention_seconds),
        )
        .await?;

        let pipeline = Arc::new(Pipeline::new(acquirer, renderer, Arc::new(store)));
        let coordinator =
            JobCoordinator::new(Arc::clone(&pipeline), config.max_workers, config.queue_capacity);

        tracing::info!(
            output_dir = %config.output_dir.display(),
            max_workers = config.max_workers,
            queue_capacity = config.queue_capacity,
            retention_secs = config.retention_seconds,
            font = %font_origin,
            "Watermark service initialized"
        );

        Ok(Self {
            config,
            pipeline,
            coordinator,
            font: font_origin,
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Start background maintenance (the retention sweeper).
    pub fn start(&self) {
        self.pipeline
            .store()
            .start_sweeper(Duration::from_secs(self.config.sweep_interval_seconds));
    }

    /// Stop accepting jobs, drain the workers and stop the sweeper.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
        self.pipeline.store().stop_sweeper();
    }

    /// Watermark a remote document inline.
    pub async fn create_by_url(
        &self,
        url: impl Into<String>,
        request: &WatermarkRequest,
    ) -> Result<WatermarkOutcome> {
        self.pipeline
            .run(InputDescriptor::Url(url.into()), request)
            .await
    }

    /// Watermark an uploaded document inline.
    pub async fn create_by_file(
        &self,
        upload: Upload,
        request: &WatermarkRequest,
    ) -> Result<WatermarkOutcome> {
        self.pipeline
            .run(InputDescriptor::Upload(upload), request)
            .await
    }

    /// Queue a request and return its job id.
    ///
    /// Invalid configs, bad URLs and oversized declared uploads are rejected
    /// here and never become jobs.
    pub fn create_async(&self, input: InputDescriptor, request: WatermarkRequest) -> Result<Uuid> {
        self.coordinator.submit(input, request)
    }

    pub fn get_job(&self, job_id: &str) -> Result<JobSnapshot> {
        let id = Uuid::parse_str(job_id)
            .map_err(|_| WatermarkError::JobNotFound(job_id.to_string()))?;
        self.coordinator.get(id)
    }

    /// Bytes of a stored artifact by name.
    pub async fn download(&self, name: &str) -> Result<Downloaded> {
        self.pipeline.store().download(name).await
    }

    pub fn limits(&self) -> ServiceLimits {
        ServiceLimits {
            max_file_size: self.config.max_file_size,
            retention_seconds: self.config.retention_seconds,
            max_workers: self.config.max_workers,
            queue_capacity: self.config.queue_capacity,
            supported_extensions: IMAGE_EXTENSIONS
                .iter()
                .chain(DOCUMENT_EXTENSIONS)
                .copied()
                .collect(),
            output_formats: [
                OutputFormat::Jpeg,
                OutputFormat::Png,
                OutputFormat::Gif,
                OutputFormat::Bmp,
                OutputFormat::WebP,
                OutputFormat::Tiff,
            ]
            .iter()
            .map(OutputFormat::as_str)
            .collect(),
            download_url_prefix: self.config.download_url_prefix.clone(),
        }
    }

    pub fn health(&self) -> HealthStatus {
        let jobs = self.coordinator.stats();
        let store = self.pipeline.store();
        HealthStatus {
            healthy: jobs.accepting,
            font: self.font.clone(),
            sweeper_running: store.is_sweeper_running(),
            stored_artifacts: store.len(),
            jobs,
        }
    }
}
