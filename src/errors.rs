use std::io;

pub type SearchResult<T> = Result<T, SearchError>;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("classifier error: {0}")]
    Classifier(String),
    #[error("worker pool error: {0}")]
    WorkerPool(String),
    #[error("source enumeration failed during the parallel pass: {source}")]
    ParallelWalk {
        #[source]
        source: io::Error,
    },
    #[error("parallel pass failed, retrying sequentially")]
    Fallback {
        #[source]
        cause: Box<SearchError>,
    },
}

impl SearchError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        SearchError::InvalidArgument(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        SearchError::InvalidState(msg.into())
    }

    pub fn classifier(msg: impl Into<String>) -> Self {
        SearchError::Classifier(msg.into())
    }

    pub fn source_not_found(identifier: &str) -> Self {
        SearchError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("source not found: {}", identifier),
        ))
    }

    pub fn access_denied(identifier: &str) -> Self {
        SearchError::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("access denied: {}", identifier),
        ))
    }

    /// True for the failure class that arms the sequential retry.
    pub(crate) fn is_parallel_walk(&self) -> bool {
        matches!(self, SearchError::ParallelWalk { .. })
    }
}
