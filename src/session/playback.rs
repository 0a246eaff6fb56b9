//! Playback registry - local preview handles for selected videos
//!
//! A selected file gets a `blob:` handle so it can be played back before
//! the upload finishes. Handles belong to one session and are released when
//! that session is replaced.

use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::transport::VideoFile;

/// Handle to a locally playable copy of a selected video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewHandle {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

struct PlaybackEntry {
    session_id: Uuid,
    content_type: String,
    data: Bytes,
}

/// Issued preview handles (keyed by handle id)
#[derive(Default)]
pub struct PlaybackRegistry {
    handles: DashMap<String, PlaybackEntry>,
}

impl PlaybackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a handle for a selected file
    pub fn register(&self, session_id: Uuid, file: &VideoFile) -> PreviewHandle {
        let id = format!("blob:{}", Uuid::new_v4());
        self.handles.insert(
            id.clone(),
            PlaybackEntry {
                session_id,
                content_type: file.content_type.clone(),
                data: file.data.clone(),
            },
        );
        log::debug!("Issued preview handle {} for {}", id, file.file_name);

        PreviewHandle {
            id,
            file_name: file.file_name.clone(),
            content_type: file.content_type.clone(),
            size_bytes: file.size_bytes(),
        }
    }

    /// Bytes and MIME type behind a live handle
    pub fn resolve(&self, handle_id: &str) -> Option<(String, Bytes)> {
        self.handles
            .get(handle_id)
            .map(|entry| (entry.content_type.clone(), entry.data.clone()))
    }

    pub fn release(&self, handle_id: &str) -> bool {
        self.handles.remove(handle_id).is_some()
    }

    /// Release every handle issued for a session
    pub fn release_session(&self, session_id: Uuid) -> usize {
        let to_release: Vec<String> = self
            .handles
            .iter()
            .filter(|entry| entry.session_id == session_id)
            .map(|entry| entry.key().clone())
            .collect();

        to_release
            .iter()
            .filter(|id| self.handles.remove(id.as_str()).is_some())
            .count()
    }

    pub fn release_all(&self) -> usize {
        let count = self.handles.len();
        self.handles.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(name: &str) -> VideoFile {
        VideoFile::new(name, "video/mp4", vec![7u8; 16])
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = PlaybackRegistry::new();
        let handle = registry.register(Uuid::new_v4(), &clip("drive.mp4"));

        assert!(handle.id.starts_with("blob:"));
        assert_eq!(handle.size_bytes, 16);
        let (mime, data) = registry.resolve(&handle.id).unwrap();
        assert_eq!(mime, "video/mp4");
        assert_eq!(data.len(), 16);
    }

    #[test]
    fn test_release_session_only_touches_that_session() {
        let registry = PlaybackRegistry::new();
        let old = Uuid::new_v4();
        let current = Uuid::new_v4();
        registry.register(old, &clip("a.mp4"));
        registry.register(old, &clip("b.mp4"));
        let kept = registry.register(current, &clip("c.mp4"));

        assert_eq!(registry.release_session(old), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.resolve(&kept.id).is_some());
    }

    #[test]
    fn test_release_all() {
        let registry = PlaybackRegistry::new();
        let handle = registry.register(Uuid::new_v4(), &clip("a.mp4"));
        registry.register(Uuid::new_v4(), &clip("b.mp4"));

        assert!(registry.release(&handle.id));
        assert!(!registry.release(&handle.id));
        assert_eq!(registry.release_all(), 1);
        assert!(registry.is_empty());
    }
}
