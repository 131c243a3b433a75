use thiserror::Error;

/// Failure taxonomy for store operations.
///
/// `NotFound`, `Forbidden` and `Invalid` are recoverable domain conditions:
/// the gateway reports them as a local `error` event and the REST layer maps
/// them to 404/403/422. The remaining variants are infrastructure failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Invalid(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("database lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// True for conditions a client caused and can correct, as opposed to
    /// infrastructure failures worth operator attention.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Forbidden(_) | Self::Invalid(_)
        )
    }
}
