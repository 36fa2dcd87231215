//! Error types for the dealer-portal library.

use thiserror::Error;

use crate::worker::WorkerState;

/// Errors that can occur while serving the portal and running the offline worker.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error (transport level, no response received).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The network could not be reached for a reason other than an HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// I/O error during cache store or state file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A manifest entry could not be cached during install.
    #[error("Install failed for {url}: {reason}")]
    Install {
        /// The manifest entry that failed.
        url: String,
        /// Why the entry could not be cached.
        reason: String,
    },

    /// A cache store could not be opened, read or written.
    #[error("Cache store error: {0}")]
    CacheStore(String),

    /// A cache name that cannot be used as a store identifier.
    #[error("Invalid cache name: {0:?}")]
    InvalidCacheName(String),

    /// A URL could not be parsed or resolved against the origin.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A worker operation was attempted from the wrong lifecycle state.
    #[error("Worker is {actual}, expected {expected}")]
    InvalidState {
        /// State the operation requires.
        expected: WorkerState,
        /// State the worker was in.
        actual: WorkerState,
    },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration or state could not be serialized.
    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Configuration values are inconsistent.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A portal request was missing data or arrived out of order.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Returns true when the error means the network could not be reached.
    ///
    /// Fetch failures of this kind trigger the offline fallbacks; every other
    /// error is surfaced to the caller.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Network(_))
    }
}

/// A specialized `Result` type for dealer-portal operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_errors_are_classified() {
        assert!(Error::Network("connection refused".into()).is_network());
        assert!(!Error::CacheStore("disk full".into()).is_network());
        assert!(
            !Error::Install {
                url: "/".into(),
                reason: "404".into()
            }
            .is_network()
        );
    }

    #[test]
    fn invalid_state_message_names_both_states() {
        let err = Error::InvalidState {
            expected: WorkerState::Installed,
            actual: WorkerState::Parsed,
        };
        assert_eq!(err.to_string(), "Worker is parsed, expected installed");
    }
}
