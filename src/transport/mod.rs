//! Transport to the remote analysis service
//!
//! - adapter.rs: `AnalysisTransport` trait
//! - http.rs: reqwest implementation
//! - types.rs: video handles, upload payloads, raw replies

pub mod adapter;
pub mod http;
pub mod types;

pub use adapter::{AnalysisTransport, VideoStream};
pub use http::HttpTransport;
pub use types::{mime_for_path, ChatRequest, RawReply, VideoFile, VideoRef};
