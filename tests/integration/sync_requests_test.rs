// Synchronous request integration tests
//
// Inline create_by_file / create_by_url calls for every document type,
// plus the failures that must surface before any work is done.

use bytes::Bytes;
use std::io::{Cursor, Read, Write};
use std::path::PathBuf;
use std::task::Poll;
use tempfile::TempDir;
use watermarkd::acquire::Upload;
use watermarkd::adapters::{DocumentKind, FileTypeHint, OutputFormat};
use watermarkd::watermark::WatermarkConfig;
use watermarkd::{ErrorKind, WatermarkRequest, WatermarkService};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use super::test_harness::{
    sample_pdf, start_service, test_config, white_png, Route, StaticServer,
};

fn request(text: &str) -> WatermarkRequest {
    WatermarkRequest::new(WatermarkConfig::new(text))
}

fn sample_docx() -> Vec<u8> {
    let parts = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
        ),
        (
            "word/document.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Minutes</w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#,
        ),
    ];

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        for (name, data) in parts {
            zip.start_file(name, FileOptions::default()).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer
}

#[tokio::test]
async fn test_image_upload_round_trip() {
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    let outcome = service
        .create_by_file(
            Upload::from_bytes("scan.png", white_png(400, 300)),
            &request("TOP SECRET"),
        )
        .await
        .unwrap();

    assert_eq!(outcome.kind, DocumentKind::Image);
    assert_eq!(outcome.canvases, 1);
    assert!(outcome.expires_at > outcome.created_at);
    assert!(dir.path().join(&outcome.artifact).exists());

    let downloaded = service.download(&outcome.artifact).await.unwrap();
    assert_eq!(downloaded.content_type, "image/png");
    assert_eq!(downloaded.bytes.len() as u64, outcome.size);
}

#[tokio::test]
async fn test_output_format_override_by_url() {
    let server = StaticServer::start(vec![Route::new(
        "/files/badge.png",
        "image/png",
        white_png(200, 200),
    )])
    .await;
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    let outcome = service
        .create_by_url(
            server.url("/files/badge.png"),
            &request("SAMPLE").with_output_format(OutputFormat::WebP),
        )
        .await
        .unwrap();

    assert_eq!(outcome.content_type, "image/webp");
    assert!(outcome.artifact.starts_with("badge_watermarked_"));
    assert!(outcome.artifact.ends_with(".webp"));
}

#[tokio::test]
async fn test_pdf_upload_is_stamped() {
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    let outcome = service
        .create_by_file(
            Upload::from_bytes("contract.pdf", sample_pdf()),
            &request("COPY").with_file_type(FileTypeHint::Pdf),
        )
        .await
        .unwrap();
    assert_eq!(outcome.kind, DocumentKind::Pdf);
    assert_eq!(outcome.content_type, "application/pdf");
    assert_eq!(outcome.canvases, 1);

    let downloaded = service.download(&outcome.artifact).await.unwrap();
    let doc = lopdf::Document::load_mem(&downloaded.bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

#[tokio::test]
async fn test_docx_upload_gets_watermark_header() {
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    let outcome = service
        .create_by_file(
            Upload::from_bytes("minutes.docx", sample_docx()),
            &request("INTERNAL"),
        )
        .await
        .unwrap();
    assert_eq!(outcome.kind, DocumentKind::Docx);
    assert!(outcome.artifact.ends_with(".docx"));

    let downloaded = service.download(&outcome.artifact).await.unwrap();
    let mut archive = ZipArchive::new(Cursor::new(downloaded.bytes)).unwrap();
    let mut document = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut document)
        .unwrap();
    assert!(document.contains("headerReference"));
    assert!(document.contains("<w:t>Minutes</w:t>"));
    assert!(archive.by_name("word/media/watermark.png").is_ok());
}

#[tokio::test]
async fn test_unsupported_upload_is_rejected() {
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    let err = service
        .create_by_file(
            Upload::from_bytes("notes.txt", "just text".as_bytes().to_vec()),
            &request("X"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFileType);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_oversized_upload_rejected_before_body_is_read() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.max_file_size = 1024;
    let service = start_service(config).await;

    let untouchable = || {
        Upload::from_stream(
            "huge.png",
            Some(4096),
            futures::stream::poll_fn(|_| -> Poll<Option<std::io::Result<Bytes>>> {
                panic!("body must not be read")
            }),
        )
    };

    let err = service
        .create_by_file(untouchable(), &request("X"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileTooLarge);

    let err = service
        .create_async(
            watermarkd::acquire::InputDescriptor::Upload(untouchable()),
            request("X"),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileTooLarge);
    assert_eq!(service.health().jobs.jobs_total, 0);
}

#[tokio::test]
async fn test_oversized_remote_file_is_rejected() {
    let server = StaticServer::start(vec![Route::new(
        "/big.png",
        "image/png",
        white_png(800, 800),
    )])
    .await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.max_file_size = 64;
    let service = start_service(config).await;

    let err = service
        .create_by_url(server.url("/big.png"), &request("X"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileTooLarge);
}

#[tokio::test]
async fn test_missing_custom_font_fails_startup() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.custom_font_path = Some(PathBuf::from("/nonexistent/fonts/Missing.ttf"));

    let err = WatermarkService::new(config)
        .await
        .err()
        .expect("startup must fail without the configured font");
    assert_eq!(err.kind(), ErrorKind::FontResolutionFailed);
}

#[tokio::test]
async fn test_invalid_service_config_fails_startup() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.max_workers = 0;

    let err = WatermarkService::new(config)
        .await
        .err()
        .expect("zero workers must be rejected");
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
}

#[tokio::test]
async fn test_limits_and_health() {
    let dir = TempDir::new().unwrap();
    let service = start_service(test_config(&dir)).await;

    let limits = service.limits();
    assert_eq!(limits.max_file_size, 50 * 1024 * 1024);
    assert!(limits.supported_extensions.contains(&"pdf"));
    assert!(limits.supported_extensions.contains(&"docx"));
    assert!(limits.output_formats.contains(&"webp"));

    let health = service.health();
    assert!(health.healthy);
    assert!(!health.sweeper_running);
    service.start();
    assert!(service.health().sweeper_running);

    service.shutdown().await;
    let health = service.health();
    assert!(!health.healthy);
    assert!(!health.sweeper_running);

    let err = service
        .create_async(
            watermarkd::acquire::InputDescriptor::Upload(Upload::from_bytes(
                "a.png",
                white_png(10, 10),
            )),
            request("late"),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);
}
