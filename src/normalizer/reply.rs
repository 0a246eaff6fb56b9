//! Structural parse of chat replies
//!
//! The service overloads its reply: flat fields at the top level, plus a
//! `messages` array whose assistant `content` is either plain text or a
//! JSON-encoded `[result, state]` tuple carrying the same flat fields again.
//! This module classifies each shape without interpreting it.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::analysis::{lenient, IntermediateOutput, OutputVideo};
use crate::transport::RawReply;

/// Fields that may appear both at the top level and inside an embedded state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplyState {
    pub intermediate_outputs: Vec<IntermediateOutput>,
    pub output_video: Option<OutputVideo>,
    pub output_video_path: Option<String>,
    /// Non-empty results object, decoded later
    pub analysis_results: Option<Map<String, Value>>,
}

/// One entry of the nested `messages` array
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NestedMessage {
    #[serde(default, deserialize_with = "lenient::text_or_empty")]
    pub role: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default, deserialize_with = "lenient::text")]
    pub video: Option<String>,
}

/// Classified assistant content
#[derive(Debug, Clone, PartialEq)]
pub enum NestedContent {
    /// Displayable text, appended verbatim
    Plain(String),
    /// JSON-array-encoded `[result, state]`
    Encoded { result: Value, state: ReplyState },
    /// Looked encoded but did not parse; `raw` is kept verbatim
    Malformed { raw: String, reason: String },
}

/// Top-level view of a raw reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReply {
    pub state: ReplyState,
    pub messages: Vec<NestedMessage>,
}

impl ParsedReply {
    pub fn parse(reply: &RawReply) -> ParsedReply {
        let body = match reply.body() {
            Value::Object(map) => map,
            other => {
                log::warn!("Chat reply is not an object (got {}), nothing to normalize", type_name(other));
                return ParsedReply::default();
            }
        };

        ParsedReply {
            state: ReplyState::from_object(body),
            messages: parse_messages(body.get("messages")),
        }
    }
}

impl ReplyState {
    pub fn from_object(map: &Map<String, Value>) -> ReplyState {
        ReplyState {
            intermediate_outputs: parse_intermediate_outputs(map.get("intermediate_outputs")),
            output_video: parse_output_video(map.get("output_video")),
            output_video_path: map
                .get("output_video_path")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            analysis_results: match map.get("analysis_results") {
                Some(Value::Object(results)) if !results.is_empty() => Some(results.clone()),
                _ => None,
            },
        }
    }
}

impl NestedContent {
    /// Classify one assistant `content` value.
    /// Returns `None` for content with nothing to show.
    pub fn classify(content: &Value) -> Option<NestedContent> {
        match content {
            Value::Null => None,
            Value::String(text) if text.is_empty() => None,
            Value::String(text) if text.trim_start().starts_with('[') => Some(Self::decode(text)),
            Value::String(text) => Some(NestedContent::Plain(text.clone())),
            other => Some(NestedContent::Plain(other.to_string())),
        }
    }

    fn decode(text: &str) -> NestedContent {
        let malformed = |reason: String| NestedContent::Malformed {
            raw: text.to_string(),
            reason,
        };

        let items = match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(items)) => items,
            Ok(other) => return malformed(format!("expected an array, got {}", type_name(&other))),
            Err(e) => return malformed(format!("invalid JSON: {}", e)),
        };

        let mut items = items.into_iter();
        match (items.next(), items.next()) {
            (Some(result), Some(Value::Object(state))) => NestedContent::Encoded {
                result,
                state: ReplyState::from_object(&state),
            },
            (Some(_), Some(other)) => malformed(format!("state is {}, expected an object", type_name(&other))),
            _ => malformed("expected a [result, state] pair".to_string()),
        }
    }
}

fn parse_intermediate_outputs(value: Option<&Value>) -> Vec<IntermediateOutput> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match serde_json::from_value::<IntermediateOutput>(item.clone()) {
                Ok(step) => Some(step),
                Err(e) => {
                    log::warn!("Skipping intermediate output that is not an object: {}", e);
                    None
                }
            })
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            log::warn!("intermediate_outputs is {}, expected a list", type_name(other));
            Vec::new()
        }
    }
}

fn parse_output_video(value: Option<&Value>) -> Option<OutputVideo> {
    let value = value.filter(|v| v.is_object())?;
    match serde_json::from_value::<OutputVideo>(value.clone()) {
        Ok(video) if !video.url.trim().is_empty() => Some(video),
        Ok(_) => {
            log::debug!("output_video has no url, ignoring");
            None
        }
        Err(e) => {
            log::warn!("Could not read output_video: {}", e);
            None
        }
    }
}

fn parse_messages(value: Option<&Value>) -> Vec<NestedMessage> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| serde_json::from_value::<NestedMessage>(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
