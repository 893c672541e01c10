use std::sync::Arc;

use super::file::{SelectedFile, SelectionError};
use super::preview::{PreviewHandle, PreviewId, PreviewRegistry};

/// The current file and its preview, as handed to the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub file: SelectedFile,
    pub preview: PreviewHandle,
}

/// Owns the single live preview of a session.
///
/// A preview is acquired on every successful selection and released
/// exactly once: when the next selection replaces it, on [`release`], or
/// when the session is dropped.
///
/// [`release`]: UploadSession::release
#[derive(Debug)]
pub struct UploadSession {
    registry: PreviewRegistry,
    current: Option<Selection>,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadSession {
    pub fn new() -> Self {
        Self::with_registry(PreviewRegistry::new())
    }

    pub fn with_registry(registry: PreviewRegistry) -> Self {
        Self {
            registry,
            current: None,
        }
    }

    pub fn registry(&self) -> &PreviewRegistry {
        &self.registry
    }

    /// Validates and stores a new selection. On error nothing changes and
    /// no preview is created.
    pub fn select_file(
        &mut self,
        bytes: impl Into<Arc<[u8]>>,
        mime_type: &str,
        name: Option<String>,
    ) -> Result<Selection, SelectionError> {
        let file = SelectedFile::new(bytes, mime_type, name)?;
        self.release();
        let preview = self.registry.acquire(&file);
        let selection = Selection { file, preview };
        self.current = Some(selection.clone());
        Ok(selection)
    }

    pub fn current_file(&self) -> Option<&SelectedFile> {
        self.current.as_ref().map(|selection| &selection.file)
    }

    pub fn current_preview(&self) -> Option<&PreviewHandle> {
        self.current.as_ref().map(|selection| &selection.preview)
    }

    /// Idempotent. Returns the id that was released, if any.
    pub fn release(&mut self) -> Option<PreviewId> {
        let selection = self.current.take()?;
        let id = selection.preview.id();
        self.registry.release(id).then_some(id)
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::UploadSession;
    use crate::uploads::{PreviewRegistry, SelectionError};

    #[test]
    fn every_selection_releases_the_previous_preview() -> anyhow::Result<()> {
        let registry = PreviewRegistry::new();
        let mut session = UploadSession::with_registry(registry.clone());
        let mut issued = Vec::new();

        for idx in 0..5u8 {
            let selection = session.select_file(vec![idx], "image/png", None)?;
            assert_eq!(registry.live_count(), 1);
            for earlier in &issued {
                assert!(!registry.is_live(*earlier));
            }
            assert!(registry.is_live(selection.preview.id()));
            issued.push(selection.preview.id());
        }

        assert_eq!(registry.created_count(), 5);
        assert_eq!(registry.released_count(), 4);
        Ok(())
    }

    #[test]
    fn rejected_selection_creates_no_preview_and_keeps_current() -> anyhow::Result<()> {
        let registry = PreviewRegistry::new();
        let mut session = UploadSession::with_registry(registry.clone());

        let err = session
            .select_file(b"hello".to_vec(), "text/plain", None)
            .err();
        assert!(matches!(err, Some(SelectionError::InvalidFileType { .. })));
        assert_eq!(registry.created_count(), 0);
        assert!(session.current_preview().is_none());

        let kept = session.select_file(vec![1u8], "image/png", None)?;
        assert!(session.select_file(vec![2u8], "text/plain", None).is_err());
        assert_eq!(session.current_preview(), Some(&kept.preview));
        assert_eq!(registry.created_count(), 1);
        Ok(())
    }

    #[test]
    fn release_is_idempotent() -> anyhow::Result<()> {
        let registry = PreviewRegistry::new();
        let mut session = UploadSession::with_registry(registry.clone());
        let selection = session.select_file(vec![1u8], "image/jpeg", None)?;

        assert_eq!(session.release(), Some(selection.preview.id()));
        assert_eq!(session.release(), None);
        assert!(session.current_file().is_none());
        assert_eq!(registry.released_count(), 1);
        Ok(())
    }

    #[test]
    fn dropping_the_session_releases_the_live_preview() -> anyhow::Result<()> {
        let registry = PreviewRegistry::new();
        {
            let mut session = UploadSession::with_registry(registry.clone());
            session.select_file(vec![1u8], "image/png", None)?;
            session.select_file(vec![2u8], "image/png", None)?;
            assert_eq!(registry.live_count(), 1);
        }
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.created_count(), registry.released_count());
        Ok(())
    }
}
