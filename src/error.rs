use thiserror::Error;

/// Errors reported by the policy engine
#[derive(Error, Debug)]
pub enum PolicyError {
    /// Minute-of-day outside 0..=1439, unparseable clock string, or negative duration
    #[error("invalid time value: {0}")]
    InvalidTimeValue(String),

    /// Attempt to create a group whose name is already taken
    #[error("a group named '{0}' already exists")]
    DuplicateGroupName(String),

    /// Update/delete/enable addressed to an unknown group
    #[error("no group named '{0}'")]
    GroupNotFound(String),

    /// The storage adapter failed; restriction state must not be guessed at
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),
}

impl PolicyError {
    pub(crate) fn invalid_time(msg: impl Into<String>) -> Self {
        Self::InvalidTimeValue(msg.into())
    }

    pub(crate) fn persistence(err: &anyhow::Error) -> Self {
        Self::PersistenceUnavailable(format!("{err:#}"))
    }
}
