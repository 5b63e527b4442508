//! Input acquisition.
//!
//! Turns a remote URL or an uploaded body into an in-memory buffer, enforcing
//! the size limit while bytes are still arriving, then confirms the document
//! type from the content.

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::Url;
use std::fmt;
use std::time::Duration;

use crate::adapters::detect::kind_from_extension;
use crate::adapters::{detect_kind, DocumentKind, FileTypeHint};
use crate::error::{Result, WatermarkError};

/// File name used when nothing better can be derived from a response.
const FALLBACK_FILE_NAME: &str = "download";

/// Body of an uploaded file.
pub enum UploadBody {
    /// Fully buffered body
    Bytes(Bytes),
    /// Body still arriving from the caller
    Stream(BoxStream<'static, std::io::Result<Bytes>>),
}

/// An uploaded file as handed over by the transport layer.
pub struct Upload {
    pub file_name: String,
    /// Size announced by the caller, checked before the body is read
    pub declared_size: Option<u64>,
    pub body: UploadBody,
}

impl Upload {
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self {
            file_name: file_name.into(),
            declared_size: Some(bytes.len() as u64),
            body: UploadBody::Bytes(bytes),
        }
    }

    pub fn from_stream<S>(file_name: impl Into<String>, declared_size: Option<u64>, stream: S) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        Self {
            file_name: file_name.into(),
            declared_size,
            body: UploadBody::Stream(stream.boxed()),
        }
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("declared_size", &self.declared_size)
            .finish_non_exhaustive()
    }
}

/// Where the input of a request comes from.
#[derive(Debug)]
pub enum InputDescriptor {
    Url(String),
    Upload(Upload),
}

impl InputDescriptor {
    /// Short description kept on the job record.
    pub fn summary(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Upload(upload) => upload.file_name.clone(),
        }
    }
}

/// Input bytes ready for rendering.
#[derive(Debug, Clone)]
pub struct AcquiredInput {
    pub bytes: Bytes,
    pub file_name: String,
    pub kind: DocumentKind,
}

/// Fetches remote inputs and receives uploads under a size limit.
#[derive(Clone)]
pub struct InputAcquirer {
    client: reqwest::Client,
    max_file_size: u64,
}

impl InputAcquirer {
    /// Create an acquirer whose remote fetches time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the HTTP client cannot be built.
    pub fn new(max_file_size: u64, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                WatermarkError::InvalidConfig(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            max_file_size,
        })
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Checks that need no I/O: URL scheme and declared upload size.
    pub fn precheck(&self, input: &InputDescriptor) -> Result<()> {
        match input {
            InputDescriptor::Url(url) => parse_remote_url(url).map(|_| ()),
            InputDescriptor::Upload(upload) => self.check_size(upload.declared_size.unwrap_or(0)),
        }
    }

    /// Obtain the input bytes and the confirmed document kind.
    pub async fn acquire(&self, input: InputDescriptor, hint: FileTypeHint) -> Result<AcquiredInput> {
        let (bytes, file_name) = match input {
            InputDescriptor::Url(url) => self.fetch(&url).await?,
            InputDescriptor::Upload(upload) => self.receive(upload).await?,
        };

        let kind = detect_kind(hint, &file_name, &bytes)?;
        tracing::debug!(
            file_name = %file_name,
            size = bytes.len(),
            kind = kind.as_str(),
            "Input acquired"
        );

        Ok(AcquiredInput {
            bytes,
            file_name,
            kind,
        })
    }

    /// Download a remote input, aborting as soon as it is known to be too large.
    pub async fn fetch(&self, url: &str) -> Result<(Bytes, String)> {
        let parsed = parse_remote_url(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| WatermarkError::DownloadFailed(format!("HTTP fetch failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(WatermarkError::DownloadFailed(format!(
                "HTTP request failed with status: {}",
                response.status()
            )));
        }

        if let Some(length) = response.content_length() {
            self.check_size(length)?;
        }

        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let final_url = response.url().clone();
        let capacity = response.content_length().unwrap_or(0);
        let bytes = read_bounded(
            response.bytes_stream(),
            self.max_file_size,
            capacity,
            WatermarkError::from,
        )
        .await?;

        let file_name = name_from_url(&final_url)
            .or_else(|| disposition.as_deref().and_then(name_from_disposition))
            .or_else(|| content_type.as_deref().and_then(name_from_content_type))
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());

        Ok((bytes, file_name))
    }

    /// Receive an uploaded body. The declared size is checked before the
    /// body is touched.
    pub async fn receive(&self, upload: Upload) -> Result<(Bytes, String)> {
        if let Some(declared) = upload.declared_size {
            self.check_size(declared)?;
        }

        let bytes = match upload.body {
            UploadBody::Bytes(bytes) => {
                self.check_size(bytes.len() as u64)?;
                bytes
            }
            UploadBody::Stream(stream) => {
                read_bounded(
                    stream,
                    self.max_file_size,
                    upload.declared_size.unwrap_or(0),
                    |e| WatermarkError::DownloadFailed(format!("upload interrupted: {}", e)),
                )
                .await?
            }
        };

        Ok((bytes, upload.file_name))
    }

    fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_file_size {
            return Err(WatermarkError::FileTooLarge {
                size,
                max_size: self.max_file_size,
            });
        }
        Ok(())
    }
}

/// Accept only absolute http(s) URLs.
fn parse_remote_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|e| WatermarkError::InvalidConfig(format!("invalid input URL '{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(WatermarkError::InvalidConfig(format!(
            "unsupported URL scheme '{}', use http or https",
            other
        ))),
    }
}

/// Collect a byte stream, failing once more than `max` bytes have arrived.
async fn read_bounded<S, E, F>(stream: S, max: u64, size_hint: u64, on_error: F) -> Result<Bytes>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    F: Fn(E) -> WatermarkError,
{
    let mut stream = std::pin::pin!(stream);
    let mut body = BytesMut::with_capacity(size_hint.min(max) as usize);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(&on_error)?;
        let observed = body.len() as u64 + chunk.len() as u64;
        if observed > max {
            return Err(WatermarkError::FileTooLarge {
                size: observed,
                max_size: max,
            });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// Last path segment, if it looks like a file name.
fn name_from_url(url: &Url) -> Option<String> {
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .filter(|segment| segment.contains('.'))
        .map(str::to_string)
}

/// `filename` parameter of a Content-Disposition header.
fn name_from_disposition(header: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        let value = value.rsplit(['/', '\\']).next().unwrap_or(value);
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// `download.{ext}` with an extension guessed from the media type.
fn name_from_content_type(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim();
    let extensions = mime_guess::get_mime_extensions_str(essence)?;
    let extension = extensions
        .iter()
        .find(|ext| kind_from_extension(ext).is_some())
        .or_else(|| extensions.first())?;
    Some(format!("{}.{}", FALLBACK_FILE_NAME, extension))
}
