use super::traits::ConfigSection;
use crate::error::AestheticError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// External renderer executable
    pub renderer_path: PathBuf,
    /// Directory artifacts are written to, keyed by fractal identity
    pub image_dir: PathBuf,
    pub extension: String,
    pub width: u32,
    pub height: u32,
    /// Points plotted per image
    pub points: u64,
    /// Artifacts smaller than this are sparse
    pub sparse_threshold_kb: u64,
    /// In-place mutations tried before regenerating from lineage
    pub max_sparse_retries: u32,
    /// Regenerations from lineage before a sparse image is accepted anyway
    pub max_regenerations: u32,
    /// Retries after a failed renderer invocation; 0 means a single attempt
    pub io_retries: u32,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            renderer_path: PathBuf::from("C-Genetics/aesthetics"),
            image_dir: PathBuf::from("images"),
            extension: "png".to_string(),
            width: 400,
            height: 300,
            points: 100_000,
            sparse_threshold_kb: 30,
            max_sparse_retries: 15,
            max_regenerations: 4,
            io_retries: 3,
            timeout_secs: 60,
            poll_interval_ms: 20,
        }
    }
}

impl RenderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sparse_threshold_bytes(&self) -> u64 {
        self.sparse_threshold_kb * 1024
    }
}

impl ConfigSection for RenderConfig {
    fn section_name() -> &'static str {
        "render"
    }

    fn validate(&self) -> Result<(), AestheticError> {
        if self.width == 0 || self.height == 0 {
            return Err(AestheticError::Configuration(
                "Render size must be positive".to_string(),
            ));
        }
        if self.extension.is_empty() || self.extension.contains(['.', '/', '\\']) {
            return Err(AestheticError::Configuration(
                "Extension must be a bare file extension such as 'png'".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(AestheticError::Configuration(
                "Renderer timeout must be positive".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(AestheticError::Configuration(
                "Poll interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
