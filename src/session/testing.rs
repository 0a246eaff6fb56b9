//! Scripted transport double for session tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::Notify;

use crate::error::{ClientError, ClientResult};
use crate::transport::{AnalysisTransport, RawReply, VideoFile, VideoRef, VideoStream};

/// Replays queued upload and chat results in order.
/// With a gate set, every call waits for `notify_one` before answering.
#[derive(Default)]
pub struct ScriptedTransport {
    uploads: Mutex<VecDeque<ClientResult<VideoRef>>>,
    replies: Mutex<VecDeque<ClientResult<RawReply>>>,
    videos: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    gate: Option<Arc<Notify>>,
    pub uploaded: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upload(self, result: ClientResult<VideoRef>) -> Self {
        self.uploads.lock().unwrap().push_back(result);
        self
    }

    pub fn with_reply(self, result: ClientResult<RawReply>) -> Self {
        self.replies.lock().unwrap().push_back(result);
        self
    }

    pub fn with_video(self, url: &str, chunks: Vec<Vec<u8>>) -> Self {
        self.videos.lock().unwrap().insert(url.to_string(), chunks);
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl AnalysisTransport for ScriptedTransport {
    fn transport_name(&self) -> &'static str {
        "scripted"
    }

    async fn upload_video(&self, file: &VideoFile) -> ClientResult<VideoRef> {
        self.uploaded.lock().unwrap().push(file.file_name.clone());
        self.wait_for_gate().await;
        self.uploads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Transport("no scripted upload".to_string())))
    }

    async fn send_message(&self, text: &str, video: &VideoRef) -> ClientResult<RawReply> {
        self.sent
            .lock()
            .unwrap()
            .push((text.to_string(), video.as_str().to_string()));
        self.wait_for_gate().await;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Transport("no scripted reply".to_string())))
    }

    fn resolve_video_url(&self, path: &str) -> String {
        format!("http://svc/video/{}", path.trim_start_matches('/'))
    }

    async fn fetch_video(&self, url: &str) -> ClientResult<VideoStream> {
        let chunks = self
            .videos
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| ClientError::playback("Video fetch failed with status: 404 Not Found"))?;

        let stream = futures_util::stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<Bytes, ClientError>(Bytes::from(chunk))),
        );
        Ok(stream.boxed())
    }
}
