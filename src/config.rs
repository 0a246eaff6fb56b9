// Service configuration for the analysis client
// Defaults, optional JSON config file, then environment overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5001";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub const ENV_BASE_URL: &str = "CRICKET_BIOMECH_URL";
pub const ENV_TIMEOUT_SECS: &str = "CRICKET_BIOMECH_TIMEOUT_SECS";
pub const ENV_DOWNLOAD_DIR: &str = "CRICKET_BIOMECH_DOWNLOAD_DIR";

/// Connection and export settings for the analysis service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the analysis service (no trailing slash needed)
    pub base_url: String,
    /// Per-request timeout; pose estimation over a whole clip is slow
    pub timeout_secs: u64,
    /// Where downloaded annotated videos are written
    pub download_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            download_dir: dirs::download_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl ServiceConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cricket-biomech").join("config.json"))
    }

    /// Load config: file (if present) then environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a JSON config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ServiceConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        log::info!("Loaded service config from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))?;
        }
        if let Some(dir) = lookup(ENV_DOWNLOAD_DIR).filter(|v| !v.trim().is_empty()) {
            self.download_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn upload_url(&self) -> String {
        format!("{}/upload", self.base())
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.base())
    }

    /// Resolve a processed-video path to the service's playback URL
    pub fn video_url(&self, path: &str) -> String {
        format!("{}/video/{}", self.base(), path.trim_start_matches('/'))
    }
}
