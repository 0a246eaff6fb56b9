//! Session state and its phase transitions
//!
//! `Session` is a plain value: every transition is a synchronous method, so
//! lifecycle rules can be tested without a service. The async controller
//! wraps it and performs the network calls between transitions.

use serde::Serialize;
use uuid::Uuid;

use crate::analysis::{AnalysisResults, OutputVideo};
use crate::error::{ClientError, ClientResult};
use crate::message::Message;
use crate::normalizer::NormalizedReply;
use crate::transport::{VideoFile, VideoRef};
use super::playback::PreviewHandle;

pub const EMPTY_MESSAGE_ERROR: &str = "Please enter a message";
pub const NO_VIDEO_ERROR: &str = "Please upload a video first";
pub const ANALYSIS_COMPLETE_ERROR: &str = "Analysis complete. Please upload a new video to continue.";
pub const BUSY_ERROR: &str = "Please wait for the current request to finish";

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Empty,
    Uploading,
    Ready,
    Analyzing,
    Complete,
}

/// Identifies an upload in flight
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTicket {
    pub session_id: Uuid,
    pub file_name: String,
    pub size_mb: f64,
}

/// Identifies a chat turn in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnTicket {
    pub session_id: Uuid,
    pub turn: u64,
    pub text: String,
    pub video: VideoRef,
}

/// What one applied chat turn changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnReport {
    pub appended: usize,
    pub analysis_complete: bool,
    pub processed_video_url: Option<String>,
    pub recovered_payloads: usize,
}

/// The single live analysis context
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub phase: Phase,
    pub video: Option<VideoRef>,
    pub transcript: Vec<Message>,
    pub results: Option<AnalysisResults>,
    pub processed_video_url: Option<String>,
    /// Descriptor of the processed video, when the service sent one
    pub output_video: Option<OutputVideo>,
    pub last_error: Option<String>,
    pub local_preview: Option<PreviewHandle>,
    turn: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// System message shown once an upload is accepted
pub fn upload_ready_message(file_name: &str, size_mb: f64) -> String {
    format!(
        "✅ Video uploaded successfully! File: {} ({:.2} MB)\nReady for biomechanical analysis. Try: \"analyze batting posture\" or \"assess injury risk\"",
        file_name, size_mb
    )
}

/// Assistant message appended when a chat turn fails
pub fn turn_error_message(error: &ClientError) -> String {
    format!("❌ **Error**: {}", error)
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: Phase::Empty,
            video: None,
            transcript: Vec::new(),
            results: None,
            processed_video_url: None,
            output_video: None,
            last_error: None,
            local_preview: None,
            turn: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub fn record_error(&mut self, error: &ClientError) {
        self.last_error = Some(error.to_string());
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Empty -> Uploading. Called on a fresh session.
    pub fn begin_upload(&mut self, file: &VideoFile, preview: Option<PreviewHandle>) -> UploadTicket {
        self.phase = Phase::Uploading;
        self.local_preview = preview;
        self.last_error = None;
        UploadTicket {
            session_id: self.id,
            file_name: file.file_name.clone(),
            size_mb: file.size_mb(),
        }
    }

    pub fn is_current_upload(&self, ticket: &UploadTicket) -> bool {
        self.id == ticket.session_id && self.phase == Phase::Uploading
    }

    /// Uploading -> Ready
    pub fn finish_upload(&mut self, video: VideoRef, ticket: &UploadTicket) {
        self.video = Some(video);
        self.results = None;
        self.processed_video_url = None;
        self.output_video = None;
        self.last_error = None;
        self.transcript
            .push(Message::system(upload_ready_message(&ticket.file_name, ticket.size_mb)));
        self.phase = Phase::Ready;
    }

    /// Uploading -> Empty, dropping the pending selection
    pub fn fail_upload(&mut self, error: &ClientError) {
        self.video = None;
        self.local_preview = None;
        self.record_error(error);
        self.phase = Phase::Empty;
    }

    /// Check whether a chat turn may start, without changing anything
    pub fn check_send(&self, text: &str) -> ClientResult<()> {
        if text.trim().is_empty() {
            return Err(ClientError::validation(EMPTY_MESSAGE_ERROR));
        }
        if self.video.is_none() {
            return Err(ClientError::validation(NO_VIDEO_ERROR));
        }
        if self.phase == Phase::Complete {
            return Err(ClientError::validation(ANALYSIS_COMPLETE_ERROR));
        }
        if self.phase != Phase::Ready {
            return Err(ClientError::validation(BUSY_ERROR));
        }
        Ok(())
    }

    /// Ready -> Analyzing. Appends the user message.
    /// A rejected send only records the error.
    pub fn begin_turn(&mut self, text: &str) -> ClientResult<TurnTicket> {
        if let Err(e) = self.check_send(text) {
            self.record_error(&e);
            return Err(e);
        }
        let video = self.video.clone().ok_or_else(|| ClientError::validation(NO_VIDEO_ERROR))?;

        self.turn += 1;
        self.last_error = None;
        self.transcript.push(Message::user(text));
        self.phase = Phase::Analyzing;

        Ok(TurnTicket {
            session_id: self.id,
            turn: self.turn,
            text: text.to_string(),
            video,
        })
    }

    pub fn is_current_turn(&self, ticket: &TurnTicket) -> bool {
        self.id == ticket.session_id && self.turn == ticket.turn && self.phase == Phase::Analyzing
    }

    /// Analyzing -> Ready or Complete
    pub fn complete_turn(&mut self, reply: NormalizedReply) -> TurnReport {
        let appended = reply.messages.len();
        self.transcript.extend(reply.messages);

        if let Some(url) = &reply.processed_video_url {
            self.processed_video_url = Some(url.clone());
        }
        if let Some(video) = reply.output_video {
            self.output_video = Some(video);
        }

        let analysis_complete = match reply.results {
            Some(results) if self.results.is_none() => {
                self.results = Some(results);
                true
            }
            Some(_) => {
                log::warn!("Session {} already has analysis results, ignoring new ones", self.id);
                true
            }
            None => false,
        };
        self.phase = if analysis_complete {
            Phase::Complete
        } else {
            Phase::Ready
        };

        TurnReport {
            appended,
            analysis_complete,
            processed_video_url: reply.processed_video_url,
            recovered_payloads: reply.recovered.len(),
        }
    }

    /// Analyzing -> Ready, keeping the user's message
    pub fn fail_turn(&mut self, error: &ClientError) {
        self.transcript.push(Message::assistant(turn_error_message(error)));
        self.record_error(error);
        self.phase = Phase::Ready;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisResults;
    use crate::message::MessageRole;

    fn ready_session() -> Session {
        let mut session = Session::new();
        let file = VideoFile::new("pull_shot.mp4", "video/mp4", vec![0u8; 2 * 1024 * 1024]);
        let ticket = session.begin_upload(&file, None);
        session.finish_upload(VideoRef::new("uploads/pull_shot.mp4"), &ticket);
        session
    }

    #[test]
    fn test_upload_seeds_readiness_message() {
        let session = ready_session();
        assert_eq!(session.phase, Phase::Ready);
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.transcript[0].role, MessageRole::System);
        assert!(session.transcript[0]
            .content
            .starts_with("✅ Video uploaded successfully! File: pull_shot.mp4 (2.00 MB)"));
    }

    #[test]
    fn test_failed_upload_returns_to_empty() {
        let mut session = Session::new();
        let file = VideoFile::new("a.mp4", "video/mp4", vec![1u8; 4]);
        session.begin_upload(&file, None);
        session.fail_upload(&ClientError::Service {
            status: 400,
            message: "Unsupported codec".to_string(),
        });

        assert_eq!(session.phase, Phase::Empty);
        assert!(session.video.is_none());
        assert_eq!(session.last_error.as_deref(), Some("Unsupported codec"));
    }

    #[test]
    fn test_send_validation_order() {
        let mut session = Session::new();
        assert_eq!(session.begin_turn("  ").unwrap_err().to_string(), EMPTY_MESSAGE_ERROR);
        assert_eq!(session.begin_turn("hi").unwrap_err().to_string(), NO_VIDEO_ERROR);
        assert!(session.transcript.is_empty());
        assert_eq!(session.last_error.as_deref(), Some(NO_VIDEO_ERROR));
    }

    #[test]
    fn test_turn_without_results_returns_to_ready() {
        let mut session = ready_session();
        let ticket = session.begin_turn("assess injury risk").unwrap();
        assert_eq!(session.phase, Phase::Analyzing);
        assert!(session.is_current_turn(&ticket));
        assert_eq!(session.begin_turn("again").unwrap_err().to_string(), BUSY_ERROR);

        let report = session.complete_turn(NormalizedReply {
            messages: vec![Message::assistant("Back risk elevated in downswing")],
            ..NormalizedReply::default()
        });

        assert_eq!(report.appended, 1);
        assert!(!report.analysis_complete);
        assert_eq!(session.phase, Phase::Ready);
        assert_eq!(session.transcript.len(), 3);
        assert!(!session.is_current_turn(&ticket));
    }

    #[test]
    fn test_results_make_session_terminal() {
        let mut session = ready_session();
        session.begin_turn("analyze batting posture").unwrap();
        session.complete_turn(NormalizedReply {
            results: Some(AnalysisResults::default()),
            processed_video_url: Some("http://localhost:5001/video/out/1.mp4".to_string()),
            ..NormalizedReply::default()
        });

        assert_eq!(session.phase, Phase::Complete);
        assert!(session.results.is_some());
        assert_eq!(
            session.processed_video_url.as_deref(),
            Some("http://localhost:5001/video/out/1.mp4")
        );

        let before = session.transcript.len();
        assert_eq!(
            session.begin_turn("more?").unwrap_err().to_string(),
            ANALYSIS_COMPLETE_ERROR
        );
        assert_eq!(session.transcript.len(), before);
    }

    #[test]
    fn test_output_video_descriptor_is_kept() {
        let mut session = ready_session();
        session.begin_turn("show me the overlay").unwrap();
        let video = OutputVideo {
            path: "static/outputs/annotated_1.mp4".to_string(),
            url: "http://localhost:5001/video/static/outputs/annotated_1.mp4".to_string(),
            message: "Pose overlay rendered".to_string(),
            size: 3 * 1024 * 1024,
        };
        session.complete_turn(NormalizedReply {
            output_video: Some(video.clone()),
            processed_video_url: Some(video.url.clone()),
            ..NormalizedReply::default()
        });

        assert_eq!(session.output_video, Some(video));
        assert_eq!(session.phase, Phase::Ready);
    }

    #[test]
    fn test_failed_turn_keeps_user_message() {
        let mut session = ready_session();
        session.begin_turn("assess injury risk").unwrap();
        session.fail_turn(&ClientError::Service {
            status: 500,
            message: "oom".to_string(),
        });

        assert_eq!(session.phase, Phase::Ready);
        assert_eq!(session.transcript[1].content, "assess injury risk");
        assert_eq!(session.transcript[2].role, MessageRole::Assistant);
        assert!(session.transcript[2].content.contains("oom"));
        assert_eq!(session.last_error.as_deref(), Some("oom"));
    }
}
