//! TUI error types.
//!
//! All TUI subsystems surface errors through [`TuiError`].

use thiserror::Error;

/// Unified error type for the terminal UI.
#[derive(Error, Debug)]
pub enum TuiError {
    /// An I/O operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The client library failed while setting up the session.
    #[error("client error: {0}")]
    Client(#[from] xhs_client::ClientError),

    /// The terminal cannot host the UI (e.g. output is not a TTY).
    #[error("terminal error: {0}")]
    Terminal(String),
}

/// Convenience alias used throughout the TUI crate.
pub type Result<T> = std::result::Result<T, TuiError>;
