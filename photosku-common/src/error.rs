//! Common error types for photosku

use thiserror::Error;

/// Common result type for photosku operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across photosku crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested user, photo, article number or object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input (empty token list, malformed payload)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Binary object storage failure
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Chat transport failure (fetching media, delivering replies)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Get-or-create failed for one article token; aborts the whole resolve call
    #[error("Failed to resolve article number '{token}': {source}")]
    ArticleResolution {
        token: String,
        #[source]
        source: Box<Error>,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for Entity Store / Object Store I/O failures.
    ///
    /// These are surfaced to users as a generic retry prompt.
    pub fn is_storage_failure(&self) -> bool {
        match self {
            Error::Database(_) | Error::Io(_) | Error::ObjectStore(_) => true,
            Error::ArticleResolution { source, .. } => source.is_storage_failure(),
            _ => false,
        }
    }

    /// True when the error means "absent", not "broken".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
