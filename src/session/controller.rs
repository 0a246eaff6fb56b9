//! Session controller - drives the live session against the analysis service
//!
//! Network calls run with no lock held. Each call takes a ticket before it
//! starts and re-checks it afterwards; a reply whose session was reset or
//! replaced in the meantime is dropped without touching state.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, ClientResult};
use crate::normalizer::normalize_reply;
use crate::transport::{AnalysisTransport, VideoFile, VideoRef};
use super::download::export_video;
use super::playback::PlaybackRegistry;
use super::types::{Phase, Session, TurnReport};

/// Result of `select_file`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Uploaded { video: VideoRef },
    /// Another upload is already running; nothing changed
    AlreadyUploading,
    /// The session was reset before the upload finished
    Discarded,
}

/// Result of `send_text`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Applied(TurnReport),
    /// The session was reset before the reply arrived
    Discarded,
}

struct LiveSession {
    session: Session,
    cancel: CancellationToken,
}

impl LiveSession {
    fn fresh() -> Self {
        Self {
            session: Session::new(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Owns the single live session
#[derive(Clone)]
pub struct SessionController {
    transport: Arc<dyn AnalysisTransport>,
    live: Arc<RwLock<LiveSession>>,
    playback: Arc<PlaybackRegistry>,
    download_dir: PathBuf,
}

impl SessionController {
    pub fn new(transport: Arc<dyn AnalysisTransport>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            live: Arc::new(RwLock::new(LiveSession::fresh())),
            playback: Arc::new(PlaybackRegistry::new()),
            download_dir: download_dir.into(),
        }
    }

    pub fn playback(&self) -> &PlaybackRegistry {
        &self.playback
    }

    /// Copy of the current session state
    pub async fn snapshot(&self) -> Session {
        self.live.read().await.session.clone()
    }

    pub async fn phase(&self) -> Phase {
        self.live.read().await.session.phase
    }

    /// Start a new session around `file` and upload it.
    ///
    /// Ignored while another upload is running. On failure the new session
    /// is left Empty with the error recorded.
    pub async fn select_file(&self, file: VideoFile) -> ClientResult<UploadOutcome> {
        let (ticket, cancel) = {
            let mut live = self.live.write().await;
            if live.session.phase == Phase::Uploading {
                log::info!("Upload already in progress, ignoring {}", file.file_name);
                return Ok(UploadOutcome::AlreadyUploading);
            }
            self.replace_session(&mut live);
            let preview = self.playback.register(live.session.id, &file);
            let ticket = live.session.begin_upload(&file, Some(preview));
            (ticket, live.cancel.clone())
        };

        log::info!(
            "Uploading {} ({:.2} MB) via {} for session {}",
            ticket.file_name,
            ticket.size_mb,
            self.transport.transport_name(),
            ticket.session_id
        );

        let result = match file.validate() {
            Ok(()) => tokio::select! {
                result = self.transport.upload_video(&file) => result,
                _ = cancel.cancelled() => {
                    log::info!("Upload of {} cancelled by reset", ticket.file_name);
                    return Ok(UploadOutcome::Discarded);
                }
            },
            Err(e) => Err(e),
        };

        let mut live = self.live.write().await;
        if !live.session.is_current_upload(&ticket) {
            log::info!("Discarding upload result for replaced session {}", ticket.session_id);
            return Ok(UploadOutcome::Discarded);
        }

        match result {
            Ok(video) => {
                log::info!("Upload accepted as {}", video);
                live.session.finish_upload(video.clone(), &ticket);
                Ok(UploadOutcome::Uploaded { video })
            }
            Err(e) => {
                log::error!("Upload of {} failed: {}", ticket.file_name, e);
                self.playback.release_session(ticket.session_id);
                live.session.fail_upload(&e);
                Err(e)
            }
        }
    }

    /// Send one user utterance and fold the reply into the transcript
    pub async fn send_text(&self, text: &str) -> ClientResult<TurnOutcome> {
        let (ticket, cancel) = {
            let mut live = self.live.write().await;
            let ticket = live.session.begin_turn(text)?;
            (ticket, live.cancel.clone())
        };

        log::info!("Sending turn {} for session {}", ticket.turn, ticket.session_id);

        let result = tokio::select! {
            result = self.transport.send_message(&ticket.text, &ticket.video) => result,
            _ = cancel.cancelled() => {
                log::info!("Turn {} cancelled by reset", ticket.turn);
                return Ok(TurnOutcome::Discarded);
            }
        };

        let result = result.map(|reply| {
            debug_payload!("chat reply", reply.body().to_string());
            let resolve = |path: &str| self.transport.resolve_video_url(path);
            normalize_reply(&reply, &resolve)
        });

        let mut live = self.live.write().await;
        if !live.session.is_current_turn(&ticket) {
            log::info!("Discarding stale reply for turn {} of session {}", ticket.turn, ticket.session_id);
            return Ok(TurnOutcome::Discarded);
        }

        match result {
            Ok(normalized) => {
                for recovered in &normalized.recovered {
                    log::warn!("Recovered from reply payload: {}", recovered);
                }
                let report = live.session.complete_turn(normalized);
                log::info!(
                    "Turn {} appended {} messages (analysis complete: {})",
                    ticket.turn,
                    report.appended,
                    report.analysis_complete
                );
                Ok(TurnOutcome::Applied(report))
            }
            Err(e) => {
                log::error!("Turn {} failed: {}", ticket.turn, e);
                live.session.fail_turn(&e);
                Err(e)
            }
        }
    }

    /// Discard the live session and start an Empty one
    pub async fn reset(&self) {
        let mut live = self.live.write().await;
        let old = live.session.id;
        self.replace_session(&mut live);
        log::info!("Session {} reset, new session {}", old, live.session.id);
    }

    /// Save the processed video into the download directory
    pub async fn download_processed_video(&self) -> ClientResult<PathBuf> {
        let (session_id, url) = {
            let live = self.live.read().await;
            (live.session.id, live.session.processed_video_url.clone())
        };

        let result = match url {
            Some(url) => export_video(self.transport.as_ref(), &url, &self.download_dir, Utc::now()).await,
            None => Err(ClientError::playback("No processed video to download")),
        };

        let mut live = self.live.write().await;
        if live.session.id == session_id {
            match &result {
                Ok(_) => live.session.clear_error(),
                Err(e) => live.session.record_error(e),
            }
        }
        if let Err(e) = &result {
            log::error!("Download failed: {}", e);
        }
        result
    }

    fn replace_session(&self, live: &mut LiveSession) {
        live.cancel.cancel();
        let released = self.playback.release_all();
        if released > 0 {
            log::debug!("Released {} preview handles", released);
        }
        *live = LiveSession::fresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageRole;
    use crate::normalizer::ANALYSIS_VIDEO_CAPTION;
    use crate::session::testing::ScriptedTransport;
    use crate::session::types::{ANALYSIS_COMPLETE_ERROR, EMPTY_MESSAGE_ERROR};
    use crate::transport::RawReply;
    use serde_json::json;
    use tokio::sync::Notify;

    fn clip() -> VideoFile {
        VideoFile::new("cover_drive.mp4", "video/mp4", vec![3u8; 1024])
    }

    fn controller(transport: ScriptedTransport) -> SessionController {
        SessionController::new(Arc::new(transport), std::env::temp_dir())
    }

    async fn wait_for_phase(controller: &SessionController, phase: Phase) {
        for _ in 0..1000 {
            if controller.phase().await == phase {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("session never reached {:?}", phase);
    }

    #[tokio::test]
    async fn test_upload_moves_to_ready() {
        let ctrl = controller(
            ScriptedTransport::new().with_upload(Ok(VideoRef::new("uploads/cover_drive.mp4"))),
        );

        let outcome = ctrl.select_file(clip()).await.unwrap();
        assert_eq!(
            outcome,
            UploadOutcome::Uploaded {
                video: VideoRef::new("uploads/cover_drive.mp4")
            }
        );

        let session = ctrl.snapshot().await;
        assert_eq!(session.phase, Phase::Ready);
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.transcript[0].role, MessageRole::System);
        assert!(session.local_preview.is_some());
        assert_eq!(ctrl.playback().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_empty_session() {
        let ctrl = controller(ScriptedTransport::new().with_upload(Err(ClientError::Service {
            status: 400,
            message: "No video file provided".to_string(),
        })));

        let err = ctrl.select_file(clip()).await.unwrap_err();
        assert_eq!(err.to_string(), "No video file provided");

        let session = ctrl.snapshot().await;
        assert_eq!(session.phase, Phase::Empty);
        assert!(session.video.is_none());
        assert!(session.local_preview.is_none());
        assert_eq!(session.last_error.as_deref(), Some("No video file provided"));
        assert!(ctrl.playback().is_empty());
    }

    #[tokio::test]
    async fn test_non_video_file_rejected_before_upload() {
        let transport = Arc::new(ScriptedTransport::new());
        let ctrl = SessionController::new(transport.clone(), std::env::temp_dir());

        let err = ctrl
            .select_file(VideoFile::new("notes.txt", "text/plain", b"hello".to_vec()))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "validation");
        assert!(transport.uploaded.lock().unwrap().is_empty());
        assert_eq!(ctrl.phase().await, Phase::Empty);
    }

    #[tokio::test]
    async fn test_intermediate_outputs_keep_session_ready() {
        let ctrl = controller(
            ScriptedTransport::new()
                .with_upload(Ok(VideoRef::new("uploads/cover_drive.mp4")))
                .with_reply(Ok(RawReply::new(json!({
                    "intermediate_outputs": [
                        {"thought": "checking joint angles", "output": "Back risk elevated in downswing"}
                    ]
                })))),
        );
        ctrl.select_file(clip()).await.unwrap();

        let outcome = ctrl.send_text("assess injury risk").await.unwrap();
        match outcome {
            TurnOutcome::Applied(report) => {
                assert_eq!(report.appended, 2);
                assert!(!report.analysis_complete);
            }
            other => panic!("Expected Applied, got {:?}", other),
        }

        let session = ctrl.snapshot().await;
        assert_eq!(session.phase, Phase::Ready);
        let contents: Vec<&str> = session.transcript.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            &contents[1..],
            &[
                "assess injury risk",
                "🧠 **Analysis Process**: checking joint angles",
                "Back risk elevated in downswing"
            ]
        );
    }

    #[tokio::test]
    async fn test_results_complete_the_session() {
        let ctrl = controller(
            ScriptedTransport::new()
                .with_upload(Ok(VideoRef::new("uploads/cover_drive.mp4")))
                .with_reply(Ok(RawReply::new(json!({
                    "analysis_results": {
                        "output_video_path": "out/123.mp4",
                        "max_injury_risk": {"back": "high", "knees": "low", "shoulders": "moderate"}
                    }
                })))),
        );
        ctrl.select_file(clip()).await.unwrap();
        ctrl.send_text("analyze batting posture").await.unwrap();

        let session = ctrl.snapshot().await;
        assert_eq!(session.phase, Phase::Complete);
        assert_eq!(
            session.processed_video_url.as_deref(),
            Some("http://svc/video/out/123.mp4")
        );
        let captions = session
            .transcript
            .iter()
            .filter(|m| m.content == ANALYSIS_VIDEO_CAPTION)
            .count();
        assert_eq!(captions, 1);

        let before = session.transcript.len();
        let err = ctrl.send_text("anything else?").await.unwrap_err();
        assert_eq!(err.to_string(), ANALYSIS_COMPLETE_ERROR);
        assert_eq!(ctrl.snapshot().await.transcript.len(), before);
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected_without_network() {
        let transport = Arc::new(
            ScriptedTransport::new().with_upload(Ok(VideoRef::new("uploads/cover_drive.mp4"))),
        );
        let ctrl = SessionController::new(transport.clone(), std::env::temp_dir());
        ctrl.select_file(clip()).await.unwrap();

        let err = ctrl.send_text("").await.unwrap_err();
        assert_eq!(err, ClientError::validation(EMPTY_MESSAGE_ERROR));

        let session = ctrl.snapshot().await;
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.phase, Phase::Ready);
        assert_eq!(session.last_error.as_deref(), Some(EMPTY_MESSAGE_ERROR));
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_service_error_appends_error_message() {
        let ctrl = controller(
            ScriptedTransport::new()
                .with_upload(Ok(VideoRef::new("uploads/cover_drive.mp4")))
                .with_reply(Err(ClientError::Service {
                    status: 500,
                    message: "oom".to_string(),
                })),
        );
        ctrl.select_file(clip()).await.unwrap();

        let err = ctrl.send_text("assess injury risk").await.unwrap_err();
        assert_eq!(err.kind(), "service");

        let session = ctrl.snapshot().await;
        assert_eq!(session.phase, Phase::Ready);
        assert_eq!(session.transcript.len(), 3);
        let last = session.transcript.last().unwrap();
        assert_eq!(last.role, MessageRole::Assistant);
        assert!(last.content.contains("oom"));
        assert_eq!(session.last_error.as_deref(), Some("oom"));
    }

    #[tokio::test]
    async fn test_reply_after_reset_is_discarded() {
        let gate = Arc::new(Notify::new());
        let ctrl = controller(
            ScriptedTransport::new()
                .with_upload(Ok(VideoRef::new("uploads/cover_drive.mp4")))
                .with_reply(Ok(RawReply::new(json!({
                    "intermediate_outputs": [{"output": "late answer"}]
                }))))
                .gated(gate.clone()),
        );

        let uploading = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.select_file(clip()).await }
        });
        wait_for_phase(&ctrl, Phase::Uploading).await;
        gate.notify_one();
        uploading.await.unwrap().unwrap();

        let turn = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.send_text("assess injury risk").await }
        });
        wait_for_phase(&ctrl, Phase::Analyzing).await;

        ctrl.reset().await;
        gate.notify_one();

        assert_eq!(turn.await.unwrap().unwrap(), TurnOutcome::Discarded);
        let session = ctrl.snapshot().await;
        assert_eq!(session.phase, Phase::Empty);
        assert!(session.transcript.is_empty());
        assert!(session.video.is_none());
        assert!(ctrl.playback().is_empty());
    }

    #[tokio::test]
    async fn test_upload_after_reset_is_discarded() {
        let gate = Arc::new(Notify::new());
        let ctrl = controller(
            ScriptedTransport::new()
                .with_upload(Ok(VideoRef::new("uploads/cover_drive.mp4")))
                .gated(gate.clone()),
        );

        let uploading = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.select_file(clip()).await }
        });
        wait_for_phase(&ctrl, Phase::Uploading).await;

        ctrl.reset().await;
        gate.notify_one();

        assert_eq!(uploading.await.unwrap().unwrap(), UploadOutcome::Discarded);
        let session = ctrl.snapshot().await;
        assert_eq!(session.phase, Phase::Empty);
        assert!(session.video.is_none());
        assert!(session.local_preview.is_none());
        assert!(session.transcript.is_empty());
        assert!(ctrl.playback().is_empty());
    }

    #[tokio::test]
    async fn test_upload_result_for_replaced_session_is_discarded() {
        let gate = Arc::new(Notify::new());
        let ctrl = controller(
            ScriptedTransport::new()
                .with_upload(Ok(VideoRef::new("uploads/cover_drive.mp4")))
                .gated(gate.clone()),
        );

        let uploading = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.select_file(clip()).await }
        });
        wait_for_phase(&ctrl, Phase::Uploading).await;

        // Swap the session without cancelling, so the upload completes normally
        let replacement = {
            let mut live = ctrl.live.write().await;
            live.session = Session::new();
            gate.notify_one();
            live.session.id
        };

        assert_eq!(uploading.await.unwrap().unwrap(), UploadOutcome::Discarded);
        let session = ctrl.snapshot().await;
        assert_eq!(session.id, replacement);
        assert_eq!(session.phase, Phase::Empty);
        assert!(session.video.is_none());
        assert!(session.transcript.is_empty());
    }

    #[tokio::test]
    async fn test_reply_for_replaced_session_is_discarded() {
        let gate = Arc::new(Notify::new());
        let ctrl = controller(
            ScriptedTransport::new()
                .with_upload(Ok(VideoRef::new("uploads/cover_drive.mp4")))
                .with_reply(Ok(RawReply::new(json!({
                    "analysis_results": {"output_video_path": "out/late.mp4"}
                }))))
                .gated(gate.clone()),
        );

        let uploading = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.select_file(clip()).await }
        });
        wait_for_phase(&ctrl, Phase::Uploading).await;
        gate.notify_one();
        uploading.await.unwrap().unwrap();

        let turn = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.send_text("analyze batting posture").await }
        });
        wait_for_phase(&ctrl, Phase::Analyzing).await;

        // Swap the session without cancelling, so the reply arrives normally
        {
            let mut live = ctrl.live.write().await;
            live.session = Session::new();
            gate.notify_one();
        }

        assert_eq!(turn.await.unwrap().unwrap(), TurnOutcome::Discarded);
        let session = ctrl.snapshot().await;
        assert_eq!(session.phase, Phase::Empty);
        assert!(session.results.is_none());
        assert!(session.processed_video_url.is_none());
        assert!(session.transcript.is_empty());
    }

    #[tokio::test]
    async fn test_select_while_uploading_is_ignored() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_upload(Ok(VideoRef::new("uploads/cover_drive.mp4")))
                .gated(gate.clone()),
        );
        let ctrl = SessionController::new(transport.clone(), std::env::temp_dir());

        let first = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.select_file(clip()).await }
        });
        wait_for_phase(&ctrl, Phase::Uploading).await;

        let second = ctrl
            .select_file(VideoFile::new("pull_shot.mp4", "video/mp4", vec![1u8; 8]))
            .await
            .unwrap();
        assert_eq!(second, UploadOutcome::AlreadyUploading);

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(transport.uploaded.lock().unwrap().as_slice(), ["cover_drive.mp4"]);
        assert_eq!(ctrl.phase().await, Phase::Ready);
    }

    #[tokio::test]
    async fn test_new_upload_replaces_session() {
        let ctrl = controller(
            ScriptedTransport::new()
                .with_upload(Ok(VideoRef::new("uploads/a.mp4")))
                .with_upload(Ok(VideoRef::new("uploads/b.mp4"))),
        );
        ctrl.select_file(clip()).await.unwrap();
        let first = ctrl.snapshot().await;

        ctrl.select_file(VideoFile::new("b.mp4", "video/mp4", vec![1u8; 8]))
            .await
            .unwrap();
        let second = ctrl.snapshot().await;

        assert_ne!(first.id, second.id);
        assert_eq!(second.video, Some(VideoRef::new("uploads/b.mp4")));
        assert_eq!(second.transcript.len(), 1);
        assert_eq!(ctrl.playback().len(), 1);
    }

    #[tokio::test]
    async fn test_download_without_video_records_error() {
        let ctrl = controller(ScriptedTransport::new());

        let err = ctrl.download_processed_video().await.unwrap_err();
        assert_eq!(err.kind(), "playback");

        let session = ctrl.snapshot().await;
        assert_eq!(session.phase, Phase::Empty);
        assert!(session.last_error.is_some());
    }

    #[tokio::test]
    async fn test_download_saves_processed_video() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new()
            .with_upload(Ok(VideoRef::new("uploads/cover_drive.mp4")))
            .with_reply(Ok(RawReply::new(json!({
                "analysis_results": {"output_video_path": "out/123.mp4"}
            }))))
            .with_video("http://svc/video/out/123.mp4", vec![b"mp4".to_vec()]);
        let ctrl = SessionController::new(Arc::new(transport), dir.path());
        ctrl.select_file(clip()).await.unwrap();
        ctrl.send_text("analyze batting posture").await.unwrap();

        let path = ctrl.download_processed_video().await.unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::read(&path).unwrap(), b"mp4");

        let session = ctrl.snapshot().await;
        assert_eq!(session.phase, Phase::Complete);
        assert!(session.last_error.is_none());
    }
}
