//! Unified error types for bbs-tally.
//!
//! Every variant carries an upper-case code prefix so log lines and API
//! messages can be grepped by failure class.

use tokio_rusqlite::rusqlite;

/// Unified error types for the scraping engine and the history store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a non-positive history window).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid or unsupported page URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Page fetch exceeded its timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Transport failure or non-2xx response.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// The page was fetched but the expected nodes or digits were missing.
    #[error("EXTRACT_FAILED: {0}")]
    ExtractFailed(String),

    /// A configured CSS selector does not parse.
    #[error("INVALID_SELECTOR: {0}")]
    InvalidSelector(String),

    /// A configured strftime pattern does not parse.
    #[error("INVALID_DATE_FORMAT: {0}")]
    InvalidDateFormat(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Network, timeout and status failures.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Error::FetchTimeout(_) | Error::HttpError(_) | Error::InvalidUrl(_))
    }

    /// Selector, digit and date failures on an otherwise fetched page.
    pub fn is_extraction(&self) -> bool {
        matches!(
            self,
            Error::ExtractFailed(_) | Error::InvalidSelector(_) | Error::InvalidDateFormat(_)
        )
    }

    /// Persistence layer failures.
    pub fn is_store(&self) -> bool {
        matches!(self, Error::Database(_) | Error::MigrationFailed(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
