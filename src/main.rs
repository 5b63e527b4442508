use anyhow::{anyhow, bail, Context};
use bytes::Bytes;
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use watermarkd::acquire::{InputDescriptor, Upload};
use watermarkd::adapters::{FileTypeHint, OutputFormat};
use watermarkd::config::ServiceConfig;
use watermarkd::jobs::JobState;
use watermarkd::watermark::{WatermarkConfig, WatermarkPosition};
use watermarkd::{WatermarkRequest, WatermarkService};

/// Interval between job status polls in --async-job mode
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// watermarkd - Text watermarks for images, PDF and Word documents
#[derive(Parser, Debug)]
#[command(name = "watermarkd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Watermark text
    #[arg(short, long, required_unless_present = "limits")]
    text: Option<String>,

    /// Input file path or http(s) URL
    #[arg(short, long, required_unless_present = "limits")]
    input: Option<String>,

    #[arg(long)]
    font_size: Option<u32>,

    /// Text color as #RGB or #RRGGBB
    #[arg(long)]
    font_color: Option<String>,

    /// Opacity from 0.0 to 1.0
    #[arg(long)]
    opacity: Option<f32>,

    /// Counter-clockwise rotation in degrees
    #[arg(long, allow_hyphen_values = true)]
    angle: Option<f32>,

    /// Gap between tiles
    #[arg(long)]
    spacing: Option<u32>,

    /// tile, center, top_left, top_right, bottom_left or bottom_right
    #[arg(long)]
    position: Option<WatermarkPosition>,

    /// auto, image, pdf or word
    #[arg(long, default_value = "auto")]
    file_type: FileTypeHint,

    /// Raster output format (defaults to the input format)
    #[arg(long)]
    output_format: Option<OutputFormat>,

    /// Override the configured output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Submit as a background job and poll until it finishes
    #[arg(long)]
    async_job: bool,

    /// Print service limits and exit
    #[arg(long)]
    limits: bool,
}

impl Args {
    fn request(&self, text: &str) -> WatermarkRequest {
        let mut config = WatermarkConfig::new(text);
        if let Some(font_size) = self.font_size {
            config.font_size = font_size;
        }
        if let Some(font_color) = &self.font_color {
            config.font_color = font_color.clone();
        }
        if let Some(opacity) = self.opacity {
            config.opacity = opacity;
        }
        if let Some(angle) = self.angle {
            config.angle = angle;
        }
        if let Some(spacing) = self.spacing {
            config.spacing = spacing;
        }
        if let Some(position) = self.position {
            config.position = position;
        }

        let mut request = WatermarkRequest::new(config).with_file_type(self.file_type);
        request.output_format = self.output_format;
        request
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServiceConfig::from_file(path)
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?,
        None => ServiceConfig::default(),
    };
    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }

    watermarkd::logging::init_subscriber(&config.logging)
        .map_err(|e| anyhow!("Failed to initialize logging subsystem: {}", e))?;

    tracing::info!(
        config_file = ?args.config,
        output_dir = %config.output_dir.display(),
        "Configuration loaded successfully"
    );

    let service = WatermarkService::new(config).await?;

    if args.limits {
        return print_json(&service.limits());
    }

    let (Some(text), Some(input)) = (args.text.as_deref(), args.input.as_deref()) else {
        bail!("--text and --input are required");
    };
    let request = args.request(text);
    let input = input_descriptor(input).await?;

    if args.async_job {
        service.start();
        let job_id = service.create_async(input, request)?;
        let snapshot = loop {
            let snapshot = service.get_job(&job_id.to_string())?;
            if snapshot.state.is_terminal() {
                break snapshot;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        };
        service.shutdown().await;

        print_json(&snapshot)?;
        if snapshot.state == JobState::Failed {
            bail!("job {} failed", job_id);
        }
        return Ok(());
    }

    let outcome = match input {
        InputDescriptor::Url(url) => service.create_by_url(url, &request).await?,
        InputDescriptor::Upload(upload) => service.create_by_file(upload, &request).await?,
    };
    service.shutdown().await;
    print_json(&outcome)
}

/// URLs are fetched by the service; local files become lazy uploads so the
/// size limit is checked before the file is read.
async fn input_descriptor(input: &str) -> anyhow::Result<InputDescriptor> {
    if input.starts_with("http://") || input.starts_with("https://") {
        return Ok(InputDescriptor::Url(input.to_string()));
    }

    let path = PathBuf::from(input);
    let size = tokio::fs::metadata(&path)
        .await
        .with_context(|| format!("cannot read input file {}", path.display()))?
        .len();
    let file_name = file_name_of(&path);
    let body = futures::stream::once(async move { tokio::fs::read(path).await.map(Bytes::from) });

    Ok(InputDescriptor::Upload(Upload::from_stream(
        file_name,
        Some(size),
        body,
    )))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
