//! HTTP transport
//!
//! Talks to the analysis service (default: localhost:5001) over its
//! upload / chat / video endpoints.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{multipart, Client, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::error::{ClientError, ClientResult};
use super::adapter::{AnalysisTransport, VideoStream};
use super::types::{ChatRequest, RawReply, VideoFile, VideoRef};

const UPLOAD_FAILED: &str = "Upload failed";
const PROCESSING_FAILED: &str = "Processing failed";

/// Upload endpoint response
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    video_path: Option<String>,
}

/// HTTP implementation of `AnalysisTransport`
pub struct HttpTransport {
    config: ServiceConfig,
    client: Client,
}

impl HttpTransport {
    pub fn new(config: ServiceConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

/// Pull the service's error message out of a failed response body.
/// `keys` are tried in order; the first non-empty string wins.
fn service_error_message(body: &str, keys: &[&str], fallback: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            keys.iter().find_map(|key| {
                json.get(*key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| fallback.to_string())
}

async fn service_error(response: Response, keys: &[&str], fallback: &str) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    debug_payload!(format!("Service error body (HTTP {})", status), body);
    ClientError::Service {
        status,
        message: service_error_message(&body, keys, fallback),
    }
}

#[async_trait]
impl AnalysisTransport for HttpTransport {
    fn transport_name(&self) -> &'static str {
        "http"
    }

    async fn upload_video(&self, file: &VideoFile) -> ClientResult<VideoRef> {
        file.validate()?;

        let part = multipart::Part::stream_with_length(file.data.clone(), file.size_bytes())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| ClientError::validation(format!("Invalid content type: {}", e)))?;
        let form = multipart::Form::new().part("video", part);

        log::info!(
            "Uploading {} ({} bytes) to {}",
            file.file_name,
            file.size_bytes(),
            self.config.upload_url()
        );

        let response = self
            .client
            .post(self.config.upload_url())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(service_error(response, &["error"], UPLOAD_FAILED).await);
        }

        let body = response.text().await?;
        debug_payload!("Upload response", body);
        let upload: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| ClientError::MalformedResponse(format!("Invalid upload response: {}", e)))?;

        upload
            .video_path
            .filter(|p| !p.trim().is_empty())
            .map(VideoRef::new)
            .ok_or_else(|| {
                ClientError::MalformedResponse("Upload response did not include a video path".to_string())
            })
    }

    async fn send_message(&self, text: &str, video: &VideoRef) -> ClientResult<RawReply> {
        let request = ChatRequest {
            message: text,
            video_path: video.as_str(),
        };

        log::info!("Sending chat message for video {}", video);

        let response = self
            .client
            .post(self.config.chat_url())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(service_error(response, &["error", "details"], PROCESSING_FAILED).await);
        }

        let body = response.text().await?;
        debug_payload!("Chat response", body);
        let json: Value = serde_json::from_str(&body)
            .map_err(|e| ClientError::MalformedResponse(format!("Invalid chat response: {}", e)))?;

        Ok(RawReply::new(json))
    }

    fn resolve_video_url(&self, path: &str) -> String {
        self.config.video_url(path)
    }

    async fn fetch_video(&self, url: &str) -> ClientResult<VideoStream> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::playback(format!("Failed to fetch video: {}", e)))?;

        if !response.status().is_success() {
            return Err(ClientError::playback(format!(
                "Video fetch failed with status: {}",
                response.status()
            )));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| ClientError::playback(format!("Download error: {}", e))));

        Ok(stream.boxed())
    }
}
