//! Consul client error types.

use thiserror::Error;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, ConsulError>;

/// Errors raised while talking to a Consul agent.
///
/// Every variant is a transport-level failure from the watcher's point of
/// view: none of them means "the catalog is empty".
#[derive(Debug, Error)]
pub enum ConsulError {
    /// Underlying HTTP error (unreachable agent, timeout, undecodable body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The agent answered with a non-success status.
    #[error("Consul agent returned status {0}")]
    UnexpectedStatus(u16),

    /// The agent address did not form a valid URL.
    #[error("Invalid agent URL: {0}")]
    Url(#[from] url::ParseError),

    /// Rejected configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
