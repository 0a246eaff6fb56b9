//! Session lifecycle
//!
//! - types.rs: `Session` value and its phase transitions
//! - controller.rs: async driver over an `AnalysisTransport`
//! - playback.rs: preview handles for selected files
//! - download.rs: export of the processed video

pub mod controller;
pub mod download;
pub mod playback;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{SessionController, TurnOutcome, UploadOutcome};
pub use download::{export_file_name, export_video};
pub use playback::{PlaybackRegistry, PreviewHandle};
pub use types::{Phase, Session, TurnReport, TurnTicket, UploadTicket};
