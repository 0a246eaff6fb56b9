//! Analysis result types returned by the biomechanics service

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::lenient;

/// Injury risk classification for one joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Moderate,
    Low,
    #[default]
    Unknown,
}

impl RiskLevel {
    /// Case-insensitive match; unrecognised labels are `Unknown`
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => RiskLevel::High,
            "moderate" => RiskLevel::Moderate,
            "low" => RiskLevel::Low,
            _ => RiskLevel::Unknown,
        }
    }

    fn rank(self) -> u8 {
        match self {
            RiskLevel::Unknown => 0,
            RiskLevel::Low => 1,
            RiskLevel::Moderate => 2,
            RiskLevel::High => 3,
        }
    }

    /// The more severe of two classifications
    pub fn max(self, other: RiskLevel) -> RiskLevel {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::High => "High",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::Low => "Low",
            RiskLevel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(label)) => RiskLevel::parse(&label),
            _ => RiskLevel::Unknown,
        })
    }
}

/// Risk classification per tracked joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InjuryRisk {
    pub back: RiskLevel,
    pub knees: RiskLevel,
    pub shoulders: RiskLevel,
}

impl InjuryRisk {
    pub fn new(back: RiskLevel, knees: RiskLevel, shoulders: RiskLevel) -> Self {
        Self {
            back,
            knees,
            shoulders,
        }
    }

    /// Joints in display order
    pub fn joints(&self) -> [(&'static str, RiskLevel); 3] {
        [
            ("back", self.back),
            ("knees", self.knees),
            ("shoulders", self.shoulders),
        ]
    }

    /// Joint-wise maximum of two assessments
    pub fn peak_with(&self, other: &InjuryRisk) -> InjuryRisk {
        InjuryRisk {
            back: self.back.max(other.back),
            knees: self.knees.max(other.knees),
            shoulders: self.shoulders.max(other.shoulders),
        }
    }

    pub fn is_all_unknown(&self) -> bool {
        self.joints().iter().all(|(_, r)| *r == RiskLevel::Unknown)
    }

    /// The single most severe joint classification
    pub fn overall(&self) -> RiskLevel {
        self.back.max(self.knees).max(self.shoulders)
    }
}

/// Free-form per-frame analysis text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameAnalysis {
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub knees: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub shoulders: Option<String>,
    #[serde(default, deserialize_with = "lenient::text", skip_serializing_if = "Option::is_none")]
    pub swing_speed: Option<String>,
    /// Any other analysis fields the service adds
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One analysed video frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    #[serde(default, deserialize_with = "lenient::count")]
    pub frame: u64,
    #[serde(default)]
    pub injury_risk: InjuryRisk,
    #[serde(default)]
    pub analysis: FrameAnalysis,
}

/// A recommended corrective exercise
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(rename = "exercise", alias = "name", default, deserialize_with = "lenient::text_or_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub description: String,
}

/// Terminal biomechanical report for a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub output_video_path: String,
    #[serde(default)]
    pub frame_data: Vec<FrameRecord>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub max_injury_risk: InjuryRisk,
    #[serde(default, deserialize_with = "lenient::count")]
    pub total_frames: u64,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub video_exists: bool,
    #[serde(default, deserialize_with = "lenient::count")]
    pub video_size: u64,
}

impl AnalysisResults {
    /// Decode a results object, salvaging individual fields when the whole
    /// record does not fit the expected shape.
    pub fn from_value_lossy(value: &Value) -> AnalysisResults {
        match serde_json::from_value::<AnalysisResults>(value.clone()) {
            Ok(results) => results,
            Err(e) => {
                log::warn!("Analysis results did not match expected shape ({}), salvaging fields", e);
                let field = |name: &str| value.get(name).cloned().unwrap_or(Value::Null);
                AnalysisResults {
                    output_video_path: lenient::value_to_text(field("output_video_path"))
                        .unwrap_or_default(),
                    frame_data: salvage_list(field("frame_data")),
                    exercises: salvage_list(field("exercises")),
                    max_injury_risk: serde_json::from_value(field("max_injury_risk"))
                        .unwrap_or_default(),
                    total_frames: lenient::value_to_u64(&field("total_frames")).unwrap_or(0),
                    video_exists: field("video_exists").as_bool().unwrap_or(false),
                    video_size: lenient::value_to_u64(&field("video_size")).unwrap_or(0),
                }
            }
        }
    }

    pub fn output_video_path(&self) -> Option<&str> {
        let path = self.output_video_path.trim();
        (!path.is_empty()).then_some(path)
    }

    /// Session-wide peak risk; falls back to the per-frame maximum when the
    /// service did not report one.
    pub fn peak_risk(&self) -> InjuryRisk {
        if !self.max_injury_risk.is_all_unknown() {
            return self.max_injury_risk;
        }
        self.frame_data
            .iter()
            .fold(InjuryRisk::default(), |acc, f| acc.peak_with(&f.injury_risk))
    }
}

/// Keep the list entries that decode, drop the rest
fn salvage_list<T: for<'de> Deserialize<'de>>(value: Value) -> Vec<T> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Processed-video descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputVideo {
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub path: String,
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub message: String,
    #[serde(default, deserialize_with = "lenient::count")]
    pub size: u64,
}

/// A reasoning step emitted by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntermediateOutput {
    #[serde(default, deserialize_with = "lenient::text")]
    pub thought: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub output: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub operation_type: Option<String>,
    /// Code the service ran for this step; kept but never displayed
    #[serde(default, deserialize_with = "lenient::text")]
    pub code: Option<String>,
}
