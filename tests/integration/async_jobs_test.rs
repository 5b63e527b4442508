// Asynchronous job integration tests
//
// Covers the job lifecycle through the service facade:
// - URL inputs are fetched, watermarked and stored
// - Invalid requests never become jobs
// - Concurrent jobs finish independently
// - A full queue rejects new work with Busy

use bytes::Bytes;
use std::time::Duration;
use tempfile::TempDir;
use watermarkd::acquire::{InputDescriptor, Upload};
use watermarkd::jobs::JobState;
use watermarkd::watermark::{WatermarkConfig, WatermarkPosition};
use watermarkd::{ErrorKind, WatermarkRequest};

use super::test_harness::{
    marked_pixels, poll_until_terminal, start_service, test_config, white_png, Route,
    StaticServer,
};

fn request(text: &str) -> WatermarkRequest {
    WatermarkRequest::new(WatermarkConfig::new(text))
}

fn is_lifecycle_prefix(states: &[JobState]) -> bool {
    let completed = [JobState::Pending, JobState::Processing, JobState::Completed];
    let failed = [JobState::Pending, JobState::Processing, JobState::Failed];
    states.len() <= 3 && (completed.starts_with(states) || failed.starts_with(states))
}

#[tokio::test]
async fn test_url_job_completes_and_covers_image() {
    let server = StaticServer::start(vec![Route::new(
        "/photo.png",
        "image/png",
        white_png(1200, 900),
    )])
    .await;
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    let job_id = service
        .create_async(
            InputDescriptor::Url(server.url("/photo.png")),
            request("CONFIDENTIAL"),
        )
        .unwrap();

    let observed = poll_until_terminal(&service, job_id).await;
    let snapshot = observed.last().unwrap();
    assert_eq!(snapshot.state, JobState::Completed, "{:?}", snapshot.error);
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.content_type.as_deref(), Some("image/png"));

    let artifact = snapshot.artifact.clone().unwrap();
    assert!(artifact.starts_with("photo_watermarked_"));
    assert_eq!(
        snapshot.download_url.as_deref(),
        Some(format!("/download/{}", artifact).as_str())
    );

    let downloaded = service.download(&artifact).await.unwrap();
    let image = image::load_from_memory(&downloaded.bytes).unwrap().to_rgb8();
    assert_eq!((image.width(), image.height()), (1200, 900));

    // Tiled text reaches every quadrant
    for (x, y) in [(0, 0), (600, 0), (0, 450), (600, 450)] {
        assert!(
            marked_pixels(&image, x, y, x + 600, y + 450) > 0,
            "quadrant at ({}, {}) has no watermark",
            x,
            y
        );
    }

    service.shutdown().await;
}

#[tokio::test]
async fn test_invalid_config_is_rejected_without_job() {
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    let mut config = WatermarkConfig::new("DRAFT");
    config.font_size = 500;
    let err = service
        .create_async(
            InputDescriptor::Url("https://example.com/a.png".to_string()),
            WatermarkRequest::new(config),
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    assert_eq!(service.health().jobs.jobs_total, 0);
    service.shutdown().await;
}

#[tokio::test]
async fn test_unsupported_url_scheme_is_rejected_without_job() {
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    let err = service
        .create_async(
            InputDescriptor::Url("ftp://example.com/a.png".to_string()),
            request("DRAFT"),
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    assert_eq!(service.health().jobs.jobs_total, 0);
    service.shutdown().await;
}

#[tokio::test]
async fn test_failed_fetch_marks_job_failed() {
    let server = StaticServer::start(Vec::new()).await;
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    let job_id = service
        .create_async(
            InputDescriptor::Url(server.url("/missing.png")),
            request("DRAFT"),
        )
        .unwrap();

    let observed = poll_until_terminal(&service, job_id).await;
    let snapshot = observed.last().unwrap();
    assert_eq!(snapshot.state, JobState::Failed);
    assert!(snapshot.artifact.is_none());
    assert!(snapshot.download_url.is_none());
    let error = snapshot.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::DownloadFailed);
    assert!(error.message.contains("404"));

    service.shutdown().await;
}

#[tokio::test]
async fn test_observed_histories_follow_lifecycle() {
    let server = StaticServer::start(vec![Route::new(
        "/doc.png",
        "image/png",
        white_png(300, 200),
    )])
    .await;
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    let ok = service
        .create_async(InputDescriptor::Url(server.url("/doc.png")), request("A"))
        .unwrap();
    let failing = service
        .create_async(InputDescriptor::Url(server.url("/nope.png")), request("B"))
        .unwrap();

    for job_id in [ok, failing] {
        let observed = poll_until_terminal(&service, job_id).await;
        let final_history: Vec<JobState> = observed
            .last()
            .unwrap()
            .history
            .iter()
            .map(|t| t.state)
            .collect();
        assert_eq!(final_history.len(), 3);

        for snapshot in &observed {
            let states: Vec<JobState> = snapshot.history.iter().map(|t| t.state).collect();
            assert!(is_lifecycle_prefix(&states), "bad history {:?}", states);
            assert!(final_history.starts_with(&states));
            assert_eq!(states.last(), Some(&snapshot.state));
        }

        let final_snapshot = observed.last().unwrap();
        assert!(final_snapshot
            .history
            .windows(2)
            .all(|w| w[0].at <= w[1].at));
    }

    service.shutdown().await;
}

/// Style of one job in the concurrency test and where its ink must land.
struct JobStyle {
    path: &'static str,
    color: &'static str,
    /// Channel that must dominate every marked pixel
    channel: usize,
    position: WatermarkPosition,
}

impl JobStyle {
    /// Region (x0, y0, x1, y1) the watermark is confined to.
    fn region(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        match self.position {
            WatermarkPosition::TopLeft => (0, 0, width / 2, height / 2),
            WatermarkPosition::BottomRight => (width / 2, height / 2, width, height),
            _ => (width / 4, height / 4, width * 3 / 4, height * 3 / 4),
        }
    }
}

#[tokio::test]
async fn test_concurrent_jobs_are_independent() {
    let server = StaticServer::start(vec![
        Route::new("/a.png", "image/png", white_png(320, 240)),
        Route::new("/b.png", "image/png", white_png(640, 480)),
    ])
    .await;
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    let styles = [
        JobStyle {
            path: "/a.png",
            color: "#FF0000",
            channel: 0,
            position: WatermarkPosition::TopLeft,
        },
        JobStyle {
            path: "/a.png",
            color: "#0000FF",
            channel: 2,
            position: WatermarkPosition::BottomRight,
        },
        JobStyle {
            path: "/b.png",
            color: "#00A000",
            channel: 1,
            position: WatermarkPosition::Center,
        },
        JobStyle {
            path: "/b.png",
            color: "#0000FF",
            channel: 2,
            position: WatermarkPosition::TopLeft,
        },
    ];

    let mut jobs = Vec::new();
    for (i, style) in styles.iter().enumerate() {
        let mut config = WatermarkConfig::new(format!("JOB {}", i));
        config.font_color = style.color.to_string();
        config.opacity = 1.0;
        config.angle = 0.0;
        config.font_size = 24;
        config.position = style.position;
        let job_id = service
            .create_async(
                InputDescriptor::Url(server.url(style.path)),
                WatermarkRequest::new(config),
            )
            .unwrap();
        jobs.push((job_id, style));
    }
    let broken = service
        .create_async(InputDescriptor::Url(server.url("/gone.png")), request("X"))
        .unwrap();

    let mut artifacts = Vec::new();
    for (job_id, style) in &jobs {
        let observed = poll_until_terminal(&service, *job_id).await;
        let snapshot = observed.last().unwrap();
        assert_eq!(snapshot.state, JobState::Completed, "{:?}", snapshot.error);

        let artifact = snapshot.artifact.clone().unwrap();
        let image = image::load_from_memory(&service.download(&artifact).await.unwrap().bytes)
            .unwrap()
            .to_rgb8();
        let expected = if style.path == "/a.png" { (320, 240) } else { (640, 480) };
        assert_eq!(image.dimensions(), expected);

        // Ink only in this job's region and only in this job's color
        let (w, h) = image.dimensions();
        let (x0, y0, x1, y1) = style.region(w, h);
        let total = marked_pixels(&image, 0, 0, w, h);
        assert!(total > 0, "{} drew nothing", style.color);
        assert_eq!(
            marked_pixels(&image, x0, y0, x1, y1),
            total,
            "{} drew outside {:?}",
            style.color,
            style.position
        );
        for pixel in image.pixels().filter(|p| p.0.iter().any(|&c| c < 240)) {
            let dominant = pixel.0[style.channel];
            assert!(
                pixel
                    .0
                    .iter()
                    .enumerate()
                    .all(|(c, &value)| c == style.channel || value < dominant),
                "{} job has foreign pixel {:?}",
                style.color,
                pixel
            );
        }
        artifacts.push(artifact);
    }

    let failed = poll_until_terminal(&service, broken).await;
    assert_eq!(failed.last().unwrap().state, JobState::Failed);

    artifacts.sort();
    artifacts.dedup();
    assert_eq!(artifacts.len(), jobs.len());

    let stats = service.health().jobs;
    assert_eq!(stats.jobs_total, 5);
    assert_eq!(stats.jobs_completed, 4);
    assert_eq!(stats.jobs_failed, 1);

    service.shutdown().await;
}

#[tokio::test]
async fn test_full_queue_rejects_with_busy() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.max_workers = 1;
    config.queue_capacity = 1;
    let service = start_service(config).await;

    // Never yields a byte, so the only worker stays occupied
    let stalled = || {
        InputDescriptor::Upload(Upload::from_stream(
            "stalled.png",
            Some(16),
            futures::stream::pending::<std::io::Result<Bytes>>(),
        ))
    };

    let running = service.create_async(stalled(), request("A")).unwrap();
    tokio::time::timeout(Duration::from_secs(10), async {
        while service.get_job(&running.to_string()).unwrap().state != JobState::Processing {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first job never started");

    let queued = service.create_async(stalled(), request("B")).unwrap();
    assert_eq!(
        service.get_job(&queued.to_string()).unwrap().state,
        JobState::Pending
    );

    let err = service.create_async(stalled(), request("C")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);

    let stats = service.health().jobs;
    assert_eq!(stats.jobs_total, 2);
    assert_eq!(stats.queued, 1);
    assert_eq!(stats.active_workers, 1);
}

#[tokio::test]
async fn test_unknown_job_id() {
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    for id in ["not-a-uuid", "6f1c1f2e-8d59-4d1b-9a57-3f1f7a3c2b10"] {
        let err = service.get_job(id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JobNotFound);
    }
    service.shutdown().await;
}
