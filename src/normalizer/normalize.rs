//! Reply normalization
//!
//! Flattens every reply shape into transcript messages, in the order the
//! source fields are discovered:
//! 1. top-level intermediate outputs
//! 2. top-level output video
//! 3. top-level analysis results
//! 4. nested assistant messages, recursing into encoded `[result, state]`
//!
//! Within one reply the processed-video URL and the analysis results are each
//! assigned at most once (first wins), and at most one caption message is
//! added for a processed video.

use crate::analysis::{AnalysisResults, IntermediateOutput, OutputVideo};
use crate::error::ClientError;
use crate::message::{Message, MessageRole};
use crate::transport::RawReply;
use super::reply::{NestedContent, NestedMessage, ParsedReply, ReplyState};

pub const THOUGHT_PREFIX: &str = "🧠 **Analysis Process**: ";
pub const VIDEO_READY_PREFIX: &str = "🎥 **Processed Video Ready**: ";
pub const ANALYSIS_VIDEO_CAPTION: &str =
    "🎥 **Analysis Complete**: Annotated video with pose estimation and injury risk assessment";

/// Everything one reply contributes to the session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedReply {
    /// New transcript entries, in discovery order
    pub messages: Vec<Message>,
    /// Analysis results, if the reply finished the analysis
    pub results: Option<AnalysisResults>,
    /// Top-level output video descriptor, if sent
    pub output_video: Option<OutputVideo>,
    /// Playable URL of the processed video, if the reply named one
    pub processed_video_url: Option<String>,
    /// Malformed payloads that were recovered by keeping the raw text
    pub recovered: Vec<ClientError>,
}

impl NormalizedReply {
    /// Whether this reply carried analysis results
    pub fn completes_analysis(&self) -> bool {
        self.results.is_some()
    }
}

/// Normalize one chat reply.
///
/// `resolve_video_url` maps a service-side video path to its playback URL.
pub fn normalize_reply(reply: &RawReply, resolve_video_url: &dyn Fn(&str) -> String) -> NormalizedReply {
    let parsed = ParsedReply::parse(reply);
    let mut normalizer = Normalizer {
        resolve_video_url,
        out: NormalizedReply::default(),
    };

    normalizer.apply_state(&parsed.state);
    for message in &parsed.messages {
        normalizer.apply_nested_message(message);
    }

    let out = normalizer.out;
    log::debug!(
        "Normalized reply: {} messages, results={}, video={}",
        out.messages.len(),
        out.results.is_some(),
        out.processed_video_url.is_some()
    );
    out
}

struct Normalizer<'a> {
    resolve_video_url: &'a dyn Fn(&str) -> String,
    out: NormalizedReply,
}

impl Normalizer<'_> {
    /// Rules 1-3, shared by the top level and embedded states
    fn apply_state(&mut self, state: &ReplyState) {
        for step in &state.intermediate_outputs {
            self.push_intermediate(step);
        }

        if let Some(video) = &state.output_video {
            self.apply_output_video(video);
        }

        if let Some(path) = &state.output_video_path {
            self.apply_video_path(path);
        }

        if let Some(results) = &state.analysis_results {
            let results = AnalysisResults::from_value_lossy(&serde_json::Value::Object(results.clone()));
            self.apply_results(results);
        }
    }

    fn push_intermediate(&mut self, step: &IntermediateOutput) {
        if let Some(thought) = non_blank(step.thought.as_deref()) {
            self.out
                .messages
                .push(Message::assistant(format!("{}{}", THOUGHT_PREFIX, thought)));
        }
        if let Some(output) = non_blank(step.output.as_deref()) {
            self.out.messages.push(Message::assistant(output));
        }
    }

    fn apply_output_video(&mut self, video: &OutputVideo) {
        if !self.set_processed_video(&video.url) {
            return;
        }
        if self.out.output_video.is_none() {
            self.out.output_video = Some(video.clone());
        }
        self.push_video_caption(format!("{}{}", VIDEO_READY_PREFIX, video.message), video.url.clone());
    }

    fn apply_video_path(&mut self, path: &str) {
        let url = (self.resolve_video_url)(path);
        if self.set_processed_video(&url) {
            self.push_video_caption(ANALYSIS_VIDEO_CAPTION.to_string(), url);
        }
    }

    fn apply_results(&mut self, results: AnalysisResults) {
        if self.out.results.is_some() {
            log::debug!("Reply carried more than one analysis result, keeping the first");
            return;
        }
        let video_path = results.output_video_path().map(str::to_string);
        self.out.results = Some(results);

        if let Some(path) = video_path {
            self.apply_video_path(&path);
        }
    }

    /// Rule 4: one entry of the nested `messages` array
    fn apply_nested_message(&mut self, message: &NestedMessage) {
        if message.role != "assistant" {
            return;
        }

        match NestedContent::classify(&message.content) {
            None => {}
            Some(NestedContent::Plain(text)) => {
                self.out
                    .messages
                    .push(Message::assistant_with_video(text, message.video.clone()));
            }
            Some(NestedContent::Encoded { state, .. }) => self.apply_state(&state),
            Some(NestedContent::Malformed { raw, reason }) => {
                log::warn!("Nested reply content could not be decoded ({}), keeping it verbatim", reason);
                self.out.recovered.push(ClientError::MalformedResponse(reason));
                self.out
                    .messages
                    .push(Message::assistant_with_video(raw, message.video.clone()));
            }
        }
    }

    /// First assignment wins; returns whether this call set it
    fn set_processed_video(&mut self, url: &str) -> bool {
        if url.trim().is_empty() || self.out.processed_video_url.is_some() {
            return false;
        }
        self.out.processed_video_url = Some(url.to_string());
        true
    }

    fn push_video_caption(&mut self, caption: String, url: String) {
        if self.out.messages.iter().any(Message::has_video) {
            return;
        }
        self.out
            .messages
            .push(Message::assistant_with_video(caption, Some(url)));
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.is_empty())
}

/// Role/content/video triple, for comparing transcripts without timestamps
pub fn message_view(message: &Message) -> (MessageRole, &str, Option<&str>) {
    (message.role, message.content.as_str(), message.video.as_deref())
}
