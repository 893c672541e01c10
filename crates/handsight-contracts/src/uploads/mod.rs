mod file;
mod preview;
mod session;

pub use file::{detect_mime, mime_for_path, SelectedFile, SelectionError, FALLBACK_MIME};
pub use preview::{PreviewHandle, PreviewId, PreviewRegistry};
pub use session::{Selection, UploadSession};
