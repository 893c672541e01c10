use std::fmt;

use handsight_contracts::results::ValidationError;
use serde::Serialize;
use thiserror::Error;

use crate::controller::RequestId;

/// Shown for every request failure; the user can only retry.
pub const RETRY_MESSAGE: &str =
    "Failed to reach the analysis service. It may still be waking up; please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestErrorKind {
    /// No response at all: refused connection, DNS, timeout, cut-off body.
    NetworkFailure,
    ServerError,
    ClientError,
    DecodeFailure,
}

impl RequestErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NetworkFailure => "network_failure",
            Self::ServerError => "server_error",
            Self::ClientError => "client_error",
            Self::DecodeFailure => "decode_failure",
        }
    }
}

impl fmt::Display for RequestErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RequestError {
    kind: RequestErrorKind,
    status: Option<u16>,
    message: String,
}

impl RequestError {
    pub fn new(kind: RequestErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RequestErrorKind::NetworkFailure, None, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(RequestErrorKind::DecodeFailure, None, message)
    }

    /// Classifies a non-2xx response. Anything that is not a 4xx is
    /// treated as the server's fault.
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = if (400..=499).contains(&status) {
            RequestErrorKind::ClientError
        } else {
            RequestErrorKind::ServerError
        };
        let detail = truncate_text(body.trim(), 512);
        let message = if detail.is_empty() {
            format!("analysis request failed ({status})")
        } else {
            format!("analysis request failed ({status}): {detail}")
        };
        Self::new(kind, Some(status), message)
    }

    pub fn kind(&self) -> RequestErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn user_message(&self) -> &'static str {
        RETRY_MESSAGE
    }
}

impl From<ValidationError> for RequestError {
    fn from(err: ValidationError) -> Self {
        Self::decode(format!("invalid analysis payload: {err}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("no file selected; choose an image before analyzing")]
    NoFileSelected,

    #[error("analysis {request_id} is already in flight")]
    AlreadyInFlight { request_id: RequestId },
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
