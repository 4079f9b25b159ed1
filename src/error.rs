use thiserror::Error;

/// Failure of one fan-out orchestration call.
///
/// At most one error is surfaced per call. When several fetches fail, the one
/// with the lowest input index is reported and `failed` carries the total.
#[derive(Debug, Error)]
pub enum FanoutError {
    /// The item source failed before any task was launched.
    #[error("error fetching ids")]
    Listing(#[source] anyhow::Error),

    #[error("error fetching item {id}")]
    Fetch {
        index: usize,
        id: String,
        failed: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("{panicked} fetch task(s) panicked")]
    TaskPanicked { panicked: usize },

    #[error("max_parallel must be >= 1")]
    InvalidParallelism,
}

impl FanoutError {
    /// Identifier of the reported failed fetch, if this is a fetch error.
    pub fn failed_id(&self) -> Option<&str> {
        match self {
            FanoutError::Fetch { id, .. } => Some(id.as_str()),
            _ => None,
        }
    }
}
