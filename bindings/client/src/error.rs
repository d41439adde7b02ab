use harness_core::prelude::SuiteAbortError;
use serde_json::Value;

/// Failure of a request to the server.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RemoteError {
    /// The server answered the request with an error response.
    #[error("{error}: {message}")]
    Remote { error: String, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("connection closed")]
    Closed,
    #[error("request timed out")]
    Timeout,
    /// The response did not have the expected shape.
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn remote(error: impl Into<String>, message: impl Into<String>) -> Self {
        RemoteError::Remote {
            error: error.into(),
            message: message.into(),
        }
    }

    /// Broad class of the failure: `remoteError` when the server rejected the request, otherwise
    /// the kind of local failure.
    pub fn category(&self) -> &str {
        match self {
            RemoteError::Remote { .. } => "remoteError",
            RemoteError::Transport(_) => "transportError",
            RemoteError::Closed => "connectionClosed",
            RemoteError::Timeout => "timeout",
            RemoteError::Decode(_) => "decodeError",
        }
    }

    /// The server's error code, such as `entryNotFound`.
    pub fn subcategory(&self) -> Option<&str> {
        match self {
            RemoteError::Remote { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            RemoteError::Remote { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.subcategory(), Some("entryNotFound" | "actNotFound"))
    }

    /// Build the error described by a response envelope with `"status": "error"`.
    pub(crate) fn from_envelope(envelope: &Value) -> Self {
        let error = envelope
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let message = envelope
            .get("error_message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        RemoteError::Remote { error, message }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Convert a [RemoteError] into an `anyhow::Error` for use in scenario steps.
///
/// A closed connection cannot be recovered from, so it becomes a [SuiteAbortError] which stops the
/// suite instead of letting every remaining scenario fail on its own.
pub fn handle_remote_err(err: RemoteError) -> anyhow::Error {
    match err {
        RemoteError::Closed => SuiteAbortError::default().into(),
        _ => anyhow::anyhow!("Remote error: {err}"),
    }
}
