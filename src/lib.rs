// Cricket biomechanics session client
//
// Uploads a batting video to the remote analysis service, relays chat turns
// about it, and folds the service's replies into a session transcript:
// - transport: HTTP adapter for upload, chat and video fetch
// - normalizer: reply shapes flattened into messages and results
// - session: lifecycle, stale-reply guard, playback and download

// Payload logging macros - exported for use by other modules
#[macro_use]
pub mod macros;

pub mod analysis;
pub mod config;
pub mod error;
pub mod message;
pub mod normalizer;
pub mod session;
pub mod transport;

pub use analysis::{AnalysisResults, AnalysisSummary, RiskLevel};
pub use config::ServiceConfig;
pub use error::{ClientError, ClientResult};
pub use message::{Message, MessageRole, Segment};
pub use normalizer::{normalize_reply, NormalizedReply};
pub use session::{Phase, Session, SessionController, TurnOutcome, UploadOutcome};
pub use transport::{AnalysisTransport, HttpTransport, RawReply, VideoFile, VideoRef};

/// Initialize env_logger on stderr (reads RUST_LOG, defaults to info)
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}
