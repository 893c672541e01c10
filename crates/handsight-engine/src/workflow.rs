use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use handsight_contracts::events::{payload, EventPayload, EventWriter, SessionEvent};
use handsight_contracts::results::AnalysisResult;
use handsight_contracts::uploads::{
    PreviewHandle, PreviewRegistry, SelectedFile, Selection, SelectionError, UploadSession,
};
use serde_json::json;

use crate::controller::{AnalysisController, Completion, RequestId};
use crate::errors::{RequestError, WorkflowError};
use crate::transport::AnalysisTransport;

/// Exactly one of these is active. A result and an error can never be
/// held at the same time.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    Ready {
        selection: Selection,
    },
    InFlight {
        selection: Selection,
        request_id: RequestId,
    },
    Succeeded {
        selection: Selection,
        result: AnalysisResult,
    },
    Failed {
        selection: Selection,
        error: RequestError,
    },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ready { .. } => "ready",
            Self::InFlight { .. } => "in_flight",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn selection(&self) -> Option<&Selection> {
        match self {
            Self::Idle => None,
            Self::Ready { selection }
            | Self::InFlight { selection, .. }
            | Self::Succeeded { selection, .. }
            | Self::Failed { selection, .. } => Some(selection),
        }
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.selection().map(|selection| &selection.file)
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.selection().map(|selection| &selection.preview)
    }

    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::InFlight { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Succeeded { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&RequestError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::InFlight { .. })
    }

    pub fn can_analyze(&self) -> bool {
        matches!(
            self,
            Self::Ready { .. } | Self::Succeeded { .. } | Self::Failed { .. }
        )
    }
}

/// Top-level controller for one single-user session.
///
/// All methods take `&mut self` and run on the caller's thread; only the
/// transport call itself runs elsewhere. Resolutions are applied by
/// [`poll`](Workflow::poll) or [`wait`](Workflow::wait), in arrival order,
/// and only when their request id is the one currently in flight.
pub struct Workflow {
    uploads: UploadSession,
    controller: AnalysisController,
    state: WorkflowState,
    events: Option<EventWriter>,
}

impl Workflow {
    pub fn new(transport: Arc<dyn AnalysisTransport>) -> Self {
        Self::with_registry(transport, PreviewRegistry::new())
    }

    pub fn with_registry(transport: Arc<dyn AnalysisTransport>, registry: PreviewRegistry) -> Self {
        Self {
            uploads: UploadSession::with_registry(registry),
            controller: AnalysisController::new(transport),
            state: WorkflowState::Idle,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn registry(&self) -> &PreviewRegistry {
        self.uploads.registry()
    }

    pub fn pending_requests(&self) -> usize {
        self.controller.pending_count()
    }

    /// Selecting always lands in `Ready` and drops any prior result or
    /// error. An in-flight request is superseded. A rejected file leaves
    /// the state untouched.
    pub fn select_file(
        &mut self,
        bytes: impl Into<Arc<[u8]>>,
        mime_type: &str,
        name: Option<String>,
    ) -> Result<&WorkflowState, SelectionError> {
        let previous_preview = self.uploads.current_preview().map(PreviewHandle::id);
        let selection = match self.uploads.select_file(bytes, mime_type, name) {
            Ok(selection) => selection,
            Err(err) => {
                self.emit(
                    SessionEvent::SelectionRejected,
                    payload(json!({
                        "mime_type": mime_type,
                        "state": self.state.name(),
                        "error": err.to_string(),
                    })),
                );
                return Err(err);
            }
        };
        if let Some(released) = previous_preview {
            self.emit(
                SessionEvent::PreviewReleased,
                payload(json!({"preview_id": released.to_string()})),
            );
        }

        let previous = mem::replace(
            &mut self.state,
            WorkflowState::Ready {
                selection: selection.clone(),
            },
        );
        if let WorkflowState::InFlight { request_id, .. } = previous {
            self.controller.abandon(request_id);
            self.emit(
                SessionEvent::AnalysisSuperseded,
                payload(json!({"request_id": request_id.to_string()})),
            );
        }

        self.emit(
            SessionEvent::FileSelected,
            payload(json!({
                "previous_state": previous.name(),
                "file_name": selection.file.name(),
                "mime_type": selection.file.mime_type(),
                "byte_len": selection.file.byte_len(),
                "digest": selection.file.digest(),
                "preview_id": selection.preview.id().to_string(),
                "dimensions": selection.preview.dimensions().map(|(w, h)| json!([w, h])),
            })),
        );
        Ok(&self.state)
    }

    /// Starts an analysis of the current file. Rejected (without sending
    /// anything) when no file is selected or one request is already in
    /// flight.
    pub fn analyze(&mut self) -> Result<RequestId, WorkflowError> {
        let guard = match &self.state {
            WorkflowState::Idle => Err(WorkflowError::NoFileSelected),
            WorkflowState::InFlight { request_id, .. } => Err(WorkflowError::AlreadyInFlight {
                request_id: *request_id,
            }),
            WorkflowState::Ready { .. }
            | WorkflowState::Succeeded { .. }
            | WorkflowState::Failed { .. } => Ok(()),
        };
        if let Err(err) = guard {
            self.emit(
                SessionEvent::AnalysisRejected,
                payload(json!({
                    "state": self.state.name(),
                    "error": err.to_string(),
                })),
            );
            return Err(err);
        }

        let previous = mem::replace(&mut self.state, WorkflowState::Idle);
        let Some(selection) = previous.selection().cloned() else {
            self.state = previous;
            return Err(WorkflowError::NoFileSelected);
        };
        let request_id = self.controller.submit(selection.file.clone());
        self.emit(
            SessionEvent::AnalysisStarted,
            payload(json!({
                "request_id": request_id.to_string(),
                "previous_state": previous.name(),
                "transport": self.controller.transport_name(),
                "digest": selection.file.digest(),
                "byte_len": selection.file.byte_len(),
            })),
        );
        self.state = WorkflowState::InFlight {
            selection,
            request_id,
        };
        Ok(request_id)
    }

    /// Applies every completion that has already arrived. Returns how many
    /// changed the state.
    pub fn poll(&mut self) -> usize {
        let mut applied = 0;
        while let Some(completion) = self.controller.try_next() {
            if self.apply(completion) {
                applied += 1;
            }
        }
        applied
    }

    /// Blocks until the in-flight request resolves (stale completions
    /// are consumed on the way). Returns `true` once it has been applied,
    /// including when it was already waiting in the channel, and `false`
    /// on timeout or when nothing is in flight.
    pub fn wait(&mut self, timeout: Option<Duration>) -> bool {
        if !self.state.is_busy() {
            self.poll();
            return false;
        }
        self.poll();
        // Only the tracked request can move the state out of `InFlight`.
        if !self.state.is_busy() {
            return true;
        }
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        while self.state.is_busy() {
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    Some(deadline - now)
                }
                None => None,
            };
            let Some(completion) = self.controller.next_timeout(remaining) else {
                return false;
            };
            if self.apply(completion) {
                return true;
            }
        }
        false
    }

    /// Releases the preview and returns to `Idle`. Idempotent; also run on
    /// drop.
    pub fn close(&mut self) {
        let previous = mem::replace(&mut self.state, WorkflowState::Idle);
        if let WorkflowState::InFlight { request_id, .. } = &previous {
            self.controller.abandon(*request_id);
        }
        let released = self.uploads.release();
        if matches!(previous, WorkflowState::Idle) && released.is_none() {
            return;
        }
        self.emit(
            SessionEvent::SessionClosed,
            payload(json!({
                "previous_state": previous.name(),
                "preview_id": released.map(|id| id.to_string()),
            })),
        );
    }

    fn apply(&mut self, completion: Completion) -> bool {
        let Completion {
            request_id,
            outcome,
            stale,
        } = completion;
        if stale || self.state.request_id() != Some(request_id) {
            self.emit(
                SessionEvent::AnalysisStaleIgnored,
                payload(json!({
                    "request_id": request_id.to_string(),
                    "state": self.state.name(),
                    "ok": outcome.is_ok(),
                })),
            );
            return false;
        }

        let WorkflowState::InFlight { selection, .. } =
            mem::replace(&mut self.state, WorkflowState::Idle)
        else {
            return false;
        };
        self.state = match outcome {
            Ok(result) => {
                if result.was_clamped() {
                    self.emit(
                        SessionEvent::ScoresClamped,
                        payload(json!({
                            "request_id": request_id.to_string(),
                            "adjustments": result.adjustments(),
                        })),
                    );
                }
                self.emit(
                    SessionEvent::AnalysisSucceeded,
                    payload(json!({
                        "request_id": request_id.to_string(),
                        "traits": result.traits().len(),
                    })),
                );
                WorkflowState::Succeeded { selection, result }
            }
            Err(error) => {
                self.emit(
                    SessionEvent::AnalysisFailed,
                    payload(json!({
                        "request_id": request_id.to_string(),
                        "kind": error.kind().as_str(),
                        "status": error.status(),
                        "message": error.message(),
                    })),
                );
                WorkflowState::Failed { selection, error }
            }
        };
        true
    }

    // Event-log failures must never change workflow state.
    fn emit(&self, event: SessionEvent, body: EventPayload) {
        if let Some(events) = self.events.as_ref() {
            let _ = events.emit(event, body);
        }
    }
}

impl Drop for Workflow {
    fn drop(&mut self) {
        self.close();
    }
}
