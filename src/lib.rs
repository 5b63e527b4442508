// watermarkd - watermark composition service for images, PDF and Word documents

pub mod acquire;
pub mod adapters;
pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod pipeline;
pub mod service;
pub mod storage;
pub mod watermark;

pub use error::{ErrorKind, Result, WatermarkError};
pub use pipeline::{WatermarkOutcome, WatermarkRequest};
pub use service::WatermarkService;
