use thiserror::Error;

/// Errors surfaced by the conversation sync and offer engine.
///
/// Every variant is distinct so the UI can choose different copy and a
/// different presentation (see [`SyncError::presentation`]). Nothing in the
/// engine retries automatically; all retries are user-initiated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("server rejected request ({status}): {message}")]
    ServerRejected { status: u16, message: String },

    #[error("server fault ({status}): {message}")]
    ServerFault { status: u16, message: String },

    #[error("authentication expired or missing")]
    AuthExpired,

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("local storage error: {0}")]
    Storage(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// How an error should be presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// Modal alert that blocks until acknowledged.
    BlockingAlert,
    /// Warning shown next to the offending control.
    Inline,
    /// Non-blocking notice the user can dismiss.
    DismissibleNotice,
    /// Nothing to show (e.g. the screen is gone).
    Silent,
}

impl SyncError {
    /// Presentation policy for this error category.
    pub fn presentation(&self) -> Presentation {
        match self {
            SyncError::NetworkUnavailable(_)
            | SyncError::ServerRejected { .. }
            | SyncError::ServerFault { .. }
            | SyncError::AuthExpired => Presentation::BlockingAlert,
            SyncError::ValidationFailed(_) => Presentation::Inline,
            SyncError::DecodeFailed(_) | SyncError::Storage(_) => Presentation::DismissibleNotice,
            SyncError::Cancelled => Presentation::Silent,
        }
    }

    /// User-facing copy for this error.
    ///
    /// Server and validation messages are passed through verbatim; every
    /// other category falls back to fixed copy.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::NetworkUnavailable(_) => {
                "No network connection. Check your connection and try again.".to_string()
            }
            SyncError::ServerRejected { message, .. } | SyncError::ValidationFailed(message) => {
                message.clone()
            }
            SyncError::AuthExpired => "Your session has expired. Please sign in again.".to_string(),
            SyncError::DecodeFailed(_) => "Some content could not be displayed.".to_string(),
            SyncError::ServerFault { .. } | SyncError::Storage(_) | SyncError::Cancelled => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }

    /// Whether this error came from the transport rather than the server.
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::NetworkUnavailable(_))
    }
}

/// Errors from local persistence (used by trait definitions in farmlink-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("query error: {0}")]
    Query(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<RepositoryError> for SyncError {
    fn from(err: RepositoryError) -> Self {
        SyncError::Storage(err.to_string())
    }
}
