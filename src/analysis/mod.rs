//! Biomechanics analysis model
//!
//! - types.rs: results, frames, risk levels, output video, reasoning steps
//! - summary.rs: display projection of a finished analysis
//! - lenient.rs: forgiving decoders for Python-shaped payloads

pub mod lenient;
pub mod summary;
pub mod types;

pub use summary::{bytes_to_mb, AnalysisSummary, FrameSummary};
pub use types::{
    AnalysisResults, Exercise, FrameAnalysis, FrameRecord, InjuryRisk, IntermediateOutput,
    OutputVideo, RiskLevel,
};
