/// Result alias used across the crate.
pub type MemoraResult<T> = Result<T, MemoraError>;

/// Errors surfaced by the library.
///
/// Remote restoration failures are not represented here: they are normalized into
/// [`crate::restore::RestoreFailure`] and turned into a user-visible notice.
#[derive(thiserror::Error, Debug)]
pub enum MemoraError {
    /// Input rejected before any work was done.
    #[error("validation error: {0}")]
    Validation(String),

    /// Trigger is not valid for the current screen.
    #[error("invalid transition: '{trigger}' is not allowed from {from}")]
    InvalidTransition {
        /// Screen name at the time of the trigger.
        from: &'static str,
        /// Trigger name.
        trigger: &'static str,
    },

    /// A restoration is already in flight.
    #[error("a restoration is already in progress")]
    Busy,

    /// Image decode/encode failure.
    #[error("image error: {0}")]
    Image(String),

    /// Drawing surface could not be acquired.
    #[error("drawing surface unavailable: {0}")]
    Surface(String),

    /// A stored session entry exists but could not be parsed.
    #[error("corrupt session entry '{entry}': {reason}")]
    CorruptStore {
        /// Storage entry name.
        entry: String,
        /// Parser message.
        reason: String,
    },

    /// Reading or writing durable storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization failure outside of storage reads.
    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MemoraError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn image(msg: impl Into<String>) -> Self {
        Self::Image(msg.into())
    }

    pub fn surface(msg: impl Into<String>) -> Self {
        Self::Surface(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    pub fn corrupt_store(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptStore {
            entry: entry.into(),
            reason: reason.into(),
        }
    }
}

impl From<image::ImageError> for MemoraError {
    fn from(value: image::ImageError) -> Self {
        Self::Image(value.to_string())
    }
}
