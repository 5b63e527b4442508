// Constants module - centralized default values for configuration
//
// This module defines the default values used throughout the service.
// Config structs reference these from their serde default functions so the
// YAML loader and `Default` impls never drift apart.

// =============================================================================
// Service defaults
// =============================================================================

/// Default directory for stored artifacts
pub const DEFAULT_OUTPUT_DIR: &str = "./outputs";

/// Default prefix used to build download references
pub const DEFAULT_DOWNLOAD_URL_PREFIX: &str = "/download";

/// Default number of concurrent watermark workers
pub const DEFAULT_MAX_WORKERS: usize = 10;

/// Default capacity of the pending job queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default maximum input size (50 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Default artifact retention in seconds (1 hour)
pub const DEFAULT_RETENTION_SECS: u64 = 3600;

/// Default interval between retention sweeps in seconds (5 minutes)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Default timeout for remote input downloads in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Watermark defaults
// =============================================================================

pub const DEFAULT_FONT_SIZE: u32 = 40;
pub const DEFAULT_FONT_COLOR: &str = "#808080";
pub const DEFAULT_OPACITY: f32 = 0.3;
pub const DEFAULT_ANGLE: f32 = -45.0;
pub const DEFAULT_SPACING: u32 = 100;

/// Accepted font size range (inclusive)
pub const MIN_FONT_SIZE: u32 = 10;
pub const MAX_FONT_SIZE: u32 = 200;

/// Accepted tile spacing range (inclusive)
pub const MIN_SPACING: u32 = 20;
pub const MAX_SPACING: u32 = 500;

/// Accepted rotation range in degrees (inclusive)
pub const MIN_ANGLE: f32 = -180.0;
pub const MAX_ANGLE: f32 = 180.0;

/// Maximum watermark text length in characters
pub const MAX_TEXT_CHARS: usize = 200;

// =============================================================================
// Rendering defaults
// =============================================================================

/// Margin between a corner-anchored block and the image edges (pixels)
pub const IMAGE_CORNER_MARGIN: u32 = 20;

/// Margin between a corner-anchored block and the page edges (points)
pub const PAGE_CORNER_MARGIN: f32 = 50.0;

/// Overlay pixels per PDF point
pub const OVERLAY_PIXELS_PER_POINT: f32 = 2.0;

/// Largest overlay side in pixels; larger pages get a lower density
pub const MAX_OVERLAY_SIDE: u32 = 4096;

/// Page size used when a PDF page has no usable MediaBox (US Letter)
pub const FALLBACK_PAGE_SIZE_PT: (f32, f32) = (612.0, 792.0);

/// Fixed overlay page for flowed documents (A4 in points)
pub const FLOWED_OVERLAY_PAGE_PT: (f32, f32) = (595.0, 842.0);

/// JPEG output quality
pub const JPEG_QUALITY: u8 = 95;

/// WebP output quality
pub const WEBP_QUALITY: f32 = 90.0;
