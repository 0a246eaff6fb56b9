//! Transcript message type

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a transcript entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One transcript entry. Never modified after it is appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    /// Display text; may contain `**strong**` markers
    pub content: String,
    /// Playable video attached to this entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A run of message text with or without emphasis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Plain(&'a str),
    Strong(&'a str),
}

impl Message {
    fn with_role(role: MessageRole, content: impl Into<String>, video: Option<String>) -> Self {
        Self {
            role,
            content: content.into(),
            video,
            created_at: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content, None)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content, None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content, None)
    }

    pub fn assistant_with_video(content: impl Into<String>, video: Option<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content, video)
    }

    pub fn has_video(&self) -> bool {
        self.video.as_deref().is_some_and(|v| !v.is_empty())
    }

    /// Split content on `**`; odd-numbered runs are emphasised
    pub fn segments(&self) -> Vec<Segment<'_>> {
        if !self.content.contains("**") {
            return vec![Segment::Plain(&self.content)];
        }
        self.content
            .split("**")
            .enumerate()
            .filter(|(_, part)| !part.is_empty())
            .map(|(i, part)| {
                if i % 2 == 1 {
                    Segment::Strong(part)
                } else {
                    Segment::Plain(part)
                }
            })
            .collect()
    }

    /// Content with emphasis markers removed
    pub fn plain_text(&self) -> String {
        self.segments()
            .iter()
            .map(|s| match s {
                Segment::Plain(t) | Segment::Strong(t) => *t,
            })
            .collect()
    }
}
