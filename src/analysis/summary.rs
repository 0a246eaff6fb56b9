//! Read-only projection of analysis results for display

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::types::{AnalysisResults, Exercise, FrameRecord, InjuryRisk, RiskLevel};

/// Number of trailing frames shown in the frame breakdown
pub const RECENT_FRAME_COUNT: usize = 5;

static SWING_SPEED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)").expect("Invalid regex"));

/// Bytes to megabytes, as shown next to uploaded and processed videos
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Pull the numeric value out of text like "Swing speed: 52.31 units/second"
pub fn parse_swing_speed(text: &str) -> Option<f64> {
    SWING_SPEED_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Per-frame line in the breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSummary {
    pub frame: u64,
    pub injury_risk: InjuryRisk,
    pub swing_speed: Option<f64>,
    pub swing_speed_text: Option<String>,
}

impl From<&FrameRecord> for FrameSummary {
    fn from(record: &FrameRecord) -> Self {
        let swing_speed_text = record.analysis.swing_speed.clone();
        Self {
            frame: record.frame,
            injury_risk: record.injury_risk,
            swing_speed: swing_speed_text.as_deref().and_then(parse_swing_speed),
            swing_speed_text,
        }
    }
}

/// Everything the results panel shows, derived from one `AnalysisResults`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub peak_risk: InjuryRisk,
    pub overall_risk: RiskLevel,
    pub total_frames: u64,
    pub video_exists: bool,
    pub video_size_mb: f64,
    pub exercises: Vec<Exercise>,
    pub recent_frames: Vec<FrameSummary>,
    pub top_swing_speed: Option<f64>,
}

impl AnalysisSummary {
    pub fn from_results(results: &AnalysisResults) -> Self {
        let peak_risk = results.peak_risk();
        let skip = results.frame_data.len().saturating_sub(RECENT_FRAME_COUNT);
        let recent_frames: Vec<FrameSummary> =
            results.frame_data.iter().skip(skip).map(FrameSummary::from).collect();

        let top_swing_speed = results
            .frame_data
            .iter()
            .filter_map(|f| f.analysis.swing_speed.as_deref().and_then(parse_swing_speed))
            .fold(None, |acc: Option<f64>, speed| {
                Some(acc.map_or(speed, |best| best.max(speed)))
            });

        Self {
            peak_risk,
            overall_risk: peak_risk.overall(),
            total_frames: results.total_frames,
            video_exists: results.video_exists,
            video_size_mb: bytes_to_mb(results.video_size),
            exercises: results.exercises.clone(),
            recent_frames,
            top_swing_speed,
        }
    }

    /// Plain-text rendering used by the CLI driver
    pub fn to_text(&self) -> String {
        let mut out = String::from("Peak injury risk:\n");
        for (joint, risk) in self.peak_risk.joints() {
            out.push_str(&format!("  {}: {}\n", joint, risk));
        }
        out.push_str(&format!(
            "Frames processed: {} | Video: {:.2} MB | Exists: {}\n",
            self.total_frames,
            self.video_size_mb,
            if self.video_exists { "yes" } else { "no" }
        ));
        if let Some(speed) = self.top_swing_speed {
            out.push_str(&format!("Top swing speed: {:.2} units/second\n", speed));
        }
        if !self.exercises.is_empty() {
            out.push_str("Recommended exercises:\n");
            for exercise in &self.exercises {
                out.push_str(&format!("  • {}: {}\n", exercise.name, exercise.description));
            }
        }
        out
    }
}
