//! Request and response types shared by transport implementations

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

use crate::analysis::bytes_to_mb;
use crate::error::{ClientError, ClientResult};

/// Opaque handle to a video stored by the analysis service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoRef(String);

impl VideoRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A locally selected video, ready to upload
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl VideoFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Read a video from disk, inferring its MIME type from the extension
    pub async fn from_path(path: &Path) -> ClientResult<Self> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            ClientError::validation(format!("Could not read {}: {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());
        let content_type = mime_for_path(path).unwrap_or("application/octet-stream");

        Ok(Self::new(file_name, content_type, data))
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn size_mb(&self) -> f64 {
        bytes_to_mb(self.size_bytes())
    }

    /// Uploads must be non-empty and video-typed
    pub fn validate(&self) -> ClientResult<()> {
        if self.data.is_empty() {
            return Err(ClientError::validation(format!("{} is empty", self.file_name)));
        }
        if !self.content_type.to_ascii_lowercase().starts_with("video/") {
            return Err(ClientError::validation(format!(
                "{} is not a video file ({})",
                self.file_name, self.content_type
            )));
        }
        Ok(())
    }
}

/// MIME type for common video container extensions
pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mpeg" | "mpg" => "video/mpeg",
        _ => return None,
    };
    Some(mime)
}

/// Chat request body
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub video_path: &'a str,
}

/// Undecoded chat reply body, handed to the normalizer as-is
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawReply(pub Value);

impl RawReply {
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    pub fn body(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for RawReply {
    fn from(body: Value) -> Self {
        Self(body)
    }
}
