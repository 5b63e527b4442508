// Artifact retention integration tests
//
// Artifacts outlive neither their TTL nor a sweep, and job snapshots report
// when their artifact is gone.

use std::time::Duration;
use tempfile::TempDir;
use watermarkd::acquire::{InputDescriptor, Upload};
use watermarkd::jobs::JobState;
use watermarkd::watermark::WatermarkConfig;
use watermarkd::{ErrorKind, WatermarkRequest};

use super::test_harness::{poll_until_terminal, start_service, test_config, white_png};

fn short_lived(dir: &TempDir) -> watermarkd::config::ServiceConfig {
    let mut config = test_config(dir);
    config.retention_seconds = 1;
    config.sweep_interval_seconds = 1;
    config
}

#[tokio::test]
async fn test_expired_artifact_is_swept() {
    let dir = TempDir::new().unwrap();
    let service = start_service(short_lived(&dir)).await;
    service.start();

    let outcome = service
        .create_by_file(
            Upload::from_bytes("a.png", white_png(64, 64)),
            &WatermarkRequest::new(WatermarkConfig::new("TTL")),
        )
        .await
        .unwrap();
    let path = dir.path().join(&outcome.artifact);
    assert!(path.exists());
    assert!(service.download(&outcome.artifact).await.is_ok());

    tokio::time::sleep(Duration::from_millis(3000)).await;

    let err = service.download(&outcome.artifact).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArtifactExpiredOrMissing);
    assert!(!path.exists());
    assert_eq!(service.health().stored_artifacts, 0);

    service.shutdown().await;
}

#[tokio::test]
async fn test_job_snapshot_reports_expired_artifact() {
    let dir = TempDir::new().unwrap();
    let service = start_service(short_lived(&dir)).await;

    let job_id = service
        .create_async(
            InputDescriptor::Upload(Upload::from_bytes("b.png", white_png(64, 64))),
            WatermarkRequest::new(WatermarkConfig::new("TTL")),
        )
        .unwrap();
    let observed = poll_until_terminal(&service, job_id).await;
    let done = observed.last().unwrap();
    assert_eq!(done.state, JobState::Completed);
    assert!(done.download_url.is_some());
    assert!(!done.artifact_expired);

    // No sweeper running: expiry alone hides the artifact
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let later = service.get_job(&job_id.to_string()).unwrap();
    assert_eq!(later.state, JobState::Completed);
    assert!(later.artifact_expired);
    assert!(later.download_url.is_none());
    assert_eq!(later.artifact, done.artifact);

    let err = service
        .download(done.artifact.as_deref().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArtifactExpiredOrMissing);

    service.shutdown().await;
}

#[tokio::test]
async fn test_download_rejects_unknown_and_unsafe_names() {
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    for name in ["nothing_watermarked_00000000.png", "../etc/passwd", ""] {
        let err = service.download(name).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactExpiredOrMissing);
    }
    service.shutdown().await;
}
