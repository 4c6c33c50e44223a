use spectree_core::FetchError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("FTP error: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{url} returned {status}")]
    Status { url: String, status: reqwest::StatusCode },

    #[error("Unsupported location: {0}")]
    Unsupported(String),
}

impl Error {
    /// Describe a failed fetch of `url` for the catalog boundary.
    pub fn into_fetch_error(self, url: &str) -> FetchError {
        match self {
            Error::Unsupported(location) => FetchError::Unsupported(location),
            Error::Io(e) => FetchError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            },
            other => FetchError::Request {
                url: url.to_string(),
                reason: error_chain(&other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Join an error and its sources into one line.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
