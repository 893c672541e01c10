pub mod controller;
pub mod errors;
pub mod transport;
pub mod view;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use controller::{AnalysisController, AnalysisOutcome, Completion, RequestId};
pub use errors::{RequestError, RequestErrorKind, WorkflowError, RETRY_MESSAGE};
pub use transport::{AnalysisTransport, HttpTransport, FILE_FIELD};
pub use view::{ResultView, WorkflowView};
pub use workflow::{Workflow, WorkflowState};
