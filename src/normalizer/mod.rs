//! Response normalization
//!
//! - reply.rs: structural classification of reply shapes
//! - normalize.rs: flattening into transcript messages and results

pub mod normalize;
pub mod reply;

pub use normalize::{
    message_view, normalize_reply, NormalizedReply, ANALYSIS_VIDEO_CAPTION, THOUGHT_PREFIX,
    VIDEO_READY_PREFIX,
};
pub use reply::{NestedContent, NestedMessage, ParsedReply, ReplyState};
