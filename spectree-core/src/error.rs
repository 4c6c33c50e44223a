use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Catalog fetch failed: {0}")]
    FatalFetch(#[from] FetchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Process exit status for a run that could not complete.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::FatalFetch(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of the macro-expansion service for a single spec file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// The service could not be started or did not answer in time.
    #[error("transient extraction failure: {0}")]
    Transient(String),

    #[error("malformed spec metadata: {0}")]
    Malformed(String),
}

impl ExtractionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractionError::Transient(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse {field} {value:?}: {reason}")]
pub struct VersionParseError {
    pub field: &'static str,
    pub value: String,
    pub reason: &'static str,
}

/// Failure to obtain the remote catalog snapshot.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("no usable listing at {url}")]
    EmptyListing { url: String },

    #[error("remote catalog is empty")]
    EmptyCatalog,

    #[error("unsupported catalog location {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A worker task ended without producing a result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("task failed: {0}")]
pub struct TaskFailure(pub String);

impl From<tokio::task::JoinError> for TaskFailure {
    fn from(err: tokio::task::JoinError) -> Self {
        if !err.is_panic() {
            return TaskFailure(err.to_string());
        }
        let payload = err.into_panic();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic with non-string payload".to_string());
        TaskFailure(format!("panicked: {}", message))
    }
}
