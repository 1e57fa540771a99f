use std::error::Error as StdError;

/// Crate-wide result type for host-side operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced through the host abstraction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or parameter is invalid.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// No session is registered under the requested host ID.
    #[error("unknown session: {self_id}")]
    UnknownSession { self_id: String },

    /// Wrapped source error from an adapter.
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_session(self_id: impl std::fmt::Display) -> Self {
        Self::UnknownSession {
            self_id: self_id.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
