use std::collections::BTreeSet;
use std::fmt;
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::ImageReader;

use super::file::SelectedFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreviewId(u64);

impl fmt::Display for PreviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "preview-{}", self.0)
    }
}

/// Handle table for local previews.
///
/// Cloning shares the table. Only [`super::UploadSession`] acquires and
/// releases entries; everything else may only observe counts.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    live: BTreeSet<PreviewId>,
    created: u64,
    released: u64,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.state().live.len()
    }

    pub fn created_count(&self) -> u64 {
        self.state().created
    }

    pub fn released_count(&self) -> u64 {
        self.state().released
    }

    pub fn is_live(&self, id: PreviewId) -> bool {
        self.state().live.contains(&id)
    }

    pub(crate) fn acquire(&self, file: &SelectedFile) -> PreviewHandle {
        let id = {
            let mut state = self.state();
            state.next_id += 1;
            let id = PreviewId(state.next_id);
            state.live.insert(id);
            state.created += 1;
            id
        };
        PreviewHandle {
            id,
            mime_type: file.mime_type().to_string(),
            dimensions: probe_dimensions(file.bytes()),
            bytes: file.shared_bytes(),
        }
    }

    /// Returns `false` if the handle was already released.
    pub(crate) fn release(&self, id: PreviewId) -> bool {
        let mut state = self.state();
        if !state.live.remove(&id) {
            return false;
        }
        state.released += 1;
        true
    }

    // Entries are plain counters, so a panic mid-update cannot leave them torn.
    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Locally renderable reference to the selected bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewHandle {
    id: PreviewId,
    mime_type: String,
    dimensions: Option<(u32, u32)>,
    bytes: Arc<[u8]>,
}

impl PreviewHandle {
    pub fn id(&self) -> PreviewId {
        self.id
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Pixel size, when the bytes carry a decodable image header.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.bytes))
    }
}

fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
