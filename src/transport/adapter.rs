//! Transport trait
//!
//! Defines the interface to the remote analysis service. The HTTP
//! implementation lives in http.rs; tests substitute scripted doubles.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::error::ClientResult;
use super::types::{RawReply, VideoFile, VideoRef};

/// Chunks of a processed video being fetched
pub type VideoStream = BoxStream<'static, ClientResult<Bytes>>;

/// Requests the session controller can make of the analysis service.
///
/// Every call is single-shot: failures are returned to the caller and never
/// retried here.
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    /// Name used in logs (e.g. "http")
    fn transport_name(&self) -> &'static str;

    /// Upload a video and return the service's handle for it
    async fn upload_video(&self, file: &VideoFile) -> ClientResult<VideoRef>;

    /// Send one user utterance about the given video
    async fn send_message(&self, text: &str, video: &VideoRef) -> ClientResult<RawReply>;

    /// Resolve a processed-video path to a fetchable URL
    fn resolve_video_url(&self, path: &str) -> String;

    /// Stream the bytes behind a processed-video URL
    async fn fetch_video(&self, url: &str) -> ClientResult<VideoStream>;
}
