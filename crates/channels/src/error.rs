use std::error::Error as StdError;

/// Crate-wide result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by a [`Session`](crate::Session) implementation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An id or argument the platform cannot accept (e.g. a non-numeric snowflake).
    #[error("invalid session input: {message}")]
    InvalidInput { message: String },

    /// The session is not connected or not ready yet.
    #[error("session unavailable: {message}")]
    Unavailable { message: String },

    /// The upstream platform rejected or failed the request.
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn transport(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
