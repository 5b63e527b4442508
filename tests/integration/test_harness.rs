// Test harness for integration tests
// Provides a throwaway HTTP server, fixture documents and service helpers

use image::{ImageOutputFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use uuid::Uuid;
use watermarkd::config::ServiceConfig;
use watermarkd::jobs::JobSnapshot;
use watermarkd::watermark::FontProfile;
use watermarkd::WatermarkService;

/// Upper bound for any single job in these tests.
pub const JOB_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Route {
    pub path: &'static str,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Route {
    pub fn new(path: &'static str, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            path,
            content_type,
            body,
        }
    }
}

/// Minimal HTTP/1.1 server answering GETs from a fixed route table.
/// Unknown paths get a 404.
pub struct StaticServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl StaticServer {
    pub async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Failed to read local address");
        let routes = Arc::new(routes);

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = Arc::clone(&routes);
                tokio::spawn(async move {
                    let _ = respond(stream, &routes).await;
                });
            }
        });

        Self { addr, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn respond(mut stream: TcpStream, routes: &[Route]) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&chunk[..n]);
    }

    let request = String::from_utf8_lossy(&request);
    let path = request.split_whitespace().nth(1).unwrap_or("/");

    match routes.iter().find(|r| r.path == path) {
        Some(route) => {
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                route.content_type,
                route.body.len()
            );
            stream.write_all(head.as_bytes()).await?;
            stream.write_all(&route.body).await?;
        }
        None => {
            stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await?;
        }
    }
    stream.shutdown().await
}

/// Service config writing into `dir` with the bundled font only.
pub fn test_config(dir: &TempDir) -> ServiceConfig {
    ServiceConfig {
        output_dir: dir.path().to_path_buf(),
        max_workers: 4,
        queue_capacity: 16,
        fetch_timeout_seconds: 10,
        font_profile: FontProfile::BundledOnly,
        ..ServiceConfig::default()
    }
}

pub async fn start_service(config: ServiceConfig) -> WatermarkService {
    match WatermarkService::new(config).await {
        Ok(service) => service,
        Err(e) => panic!("Failed to start service: {}", e),
    }
}

/// Poll a job until it reaches a terminal state. Returns every snapshot
/// observed, the terminal one last.
pub async fn poll_until_terminal(service: &WatermarkService, job_id: Uuid) -> Vec<JobSnapshot> {
    let poll = async {
        let mut observed = Vec::new();
        loop {
            let snapshot = service
                .get_job(&job_id.to_string())
                .expect("Submitted job must be known");
            let terminal = snapshot.state.is_terminal();
            observed.push(snapshot);
            if terminal {
                return observed;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(JOB_TIMEOUT, poll)
        .await
        .expect("Job did not finish in time")
}

pub fn white_png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]))
        .write_to(&mut out, ImageOutputFormat::Png)
        .expect("Failed to encode fixture image");
    out.into_inner()
}

/// Count pixels visibly darker than white inside a rectangle.
pub fn marked_pixels(image: &RgbImage, x0: u32, y0: u32, x1: u32, y1: u32) -> usize {
    let mut count = 0;
    for y in y0..y1.min(image.height()) {
        for x in x0..x1.min(image.width()) {
            if image.get_pixel(x, y).0.iter().any(|&c| c < 240) {
                count += 1;
            }
        }
    }
    count
}

/// Single-page A4 PDF with one line of text.
pub fn sample_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        b"BT 72 720 Td (Hello) Tj ET".to_vec(),
    ));
    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(pages_id));
    page.set("Contents", Object::Reference(content_id));
    let page_id = doc.add_object(page);

    let mut pages = Dictionary::new();
    pages.set("Type", Object::Name(b"Pages".to_vec()));
    pages.set("Count", Object::Integer(1));
    pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
    pages.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(595),
            Object::Integer(842),
        ]),
    );
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("Failed to write fixture PDF");
    bytes
}
