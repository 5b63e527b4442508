// Configuration module
//
// Service-level settings consumed by the watermark core. Loaded from YAML
// with ${VAR} environment substitution.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod logging;

pub use logging::{LogFormat, LoggingConfig};

use crate::constants::{
    DEFAULT_DOWNLOAD_URL_PREFIX, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_FILE_SIZE,
    DEFAULT_MAX_WORKERS, DEFAULT_OUTPUT_DIR, DEFAULT_QUEUE_CAPACITY, DEFAULT_RETENTION_SECS,
    DEFAULT_SWEEP_INTERVAL_SECS,
};
use crate::watermark::font::FontProfile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_download_url_prefix")]
    pub download_url_prefix: String,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_retention_seconds")]
    pub retention_seconds: u64,
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_fetch_timeout_seconds")]
    pub fetch_timeout_seconds: u64,
    #[serde(default)]
    pub custom_font_path: Option<PathBuf>,
    #[serde(default)]
    pub font_profile: FontProfile,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_download_url_prefix() -> String {
    DEFAULT_DOWNLOAD_URL_PREFIX.to_string()
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_retention_seconds() -> u64 {
    DEFAULT_RETENTION_SECS
}

fn default_sweep_interval_seconds() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

fn default_fetch_timeout_seconds() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            download_url_prefix: default_download_url_prefix(),
            max_workers: default_max_workers(),
            queue_capacity: default_queue_capacity(),
            max_file_size: default_max_file_size(),
            retention_seconds: default_retention_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            fetch_timeout_seconds: default_fetch_timeout_seconds(),
            custom_font_path: None,
            font_profile: FontProfile::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_workers == 0 {
            return Err("max_workers must be at least 1".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be at least 1".to_string());
        }
        if self.max_file_size == 0 {
            return Err("max_file_size must be greater than 0".to_string());
        }
        // expires_at must always be strictly after created_at
        if self.retention_seconds == 0 {
            return Err("retention_seconds must be at least 1".to_string());
        }
        if self.sweep_interval_seconds == 0 {
            return Err("sweep_interval_seconds must be at least 1".to_string());
        }
        if self.fetch_timeout_seconds == 0 {
            return Err("fetch_timeout_seconds must be at least 1".to_string());
        }
        if self.download_url_prefix.trim().is_empty() {
            return Err("download_url_prefix cannot be empty".to_string());
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err("output_dir cannot be empty".to_string());
        }
        Ok(())
    }
}
