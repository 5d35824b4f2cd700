//! Error types for the rollup domain.

/// The result type used throughout coursepulse-rollup.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can abort a rollup pass.
///
/// Per-row problems (malformed keys, missing courses, denied grades) never
/// surface here; they are logged and skipped inside the pass. Only failures
/// of a collaborator call or of the final commit abort a pass, and an
/// aborted pass leaves the store untouched.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A core storage or collaborator call failed.
    #[error(transparent)]
    Core(#[from] coursepulse_core::Error),

    /// The pass produced writes but the commit was rejected.
    #[error("rollup commit failed: {message}")]
    CommitFailed {
        /// Description of the failure.
        message: String,
        /// The underlying cause.
        #[source]
        source: coursepulse_core::Error,
    },
}

impl Error {
    /// Wraps a commit failure with pass context.
    #[must_use]
    pub fn commit_failed(message: impl Into<String>, source: coursepulse_core::Error) -> Self {
        Self::CommitFailed {
            message: message.into(),
            source,
        }
    }
}
