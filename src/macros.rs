//! Payload logging macros
//!
//! Raw service payloads can be large, so they are only previewed in debug
//! builds. In release builds the macro compiles to nothing.

/// Maximum number of characters shown in a payload preview
pub const PAYLOAD_PREVIEW_CHARS: usize = 200;

/// Truncate a payload for logging on a char boundary
pub fn payload_preview(payload: &str) -> String {
    if payload.chars().count() <= PAYLOAD_PREVIEW_CHARS {
        return payload.to_string();
    }
    let head: String = payload.chars().take(PAYLOAD_PREVIEW_CHARS).collect();
    format!("{}… ({} bytes)", head, payload.len())
}

/// Log a truncated payload preview - only active in debug builds
#[cfg(debug_assertions)]
#[macro_export]
macro_rules! debug_payload {
    ($label:expr, $payload:expr) => {
        log::debug!("{}: {}", $label, $crate::macros::payload_preview(&$payload))
    };
}

/// Log a truncated payload preview - no-op in release builds
#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! debug_payload {
    ($label:expr, $payload:expr) => {{
        let _ = &$label;
        let _ = &$payload;
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_preview_short_passthrough() {
        assert_eq!(payload_preview("{\"ok\":true}"), "{\"ok\":true}");
    }

    #[test]
    fn test_payload_preview_truncates_multibyte() {
        let long = "🧠".repeat(PAYLOAD_PREVIEW_CHARS + 10);
        let preview = payload_preview(&long);
        assert!(preview.starts_with(&"🧠".repeat(PAYLOAD_PREVIEW_CHARS)));
        assert!(preview.ends_with(&format!("({} bytes)", long.len())));
    }
}
