//! Unified error types for the `chainreg` binary.

use thiserror::Error;

use crate::chain::{FetchError, RpcError};

/// Top-level error type for CLI commands and the HTTP server.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file could not be resolved, read, or parsed.
    #[error("config: {0}")]
    Config(String),

    /// Chain lookup failed.
    #[error("chain: {0}")]
    Chain(String),

    /// Chain list retrieval failed.
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),

    /// RPC URL resolution failed.
    #[error("rpc: {0}")]
    Rpc(#[from] RpcError),

    /// Server bind or runtime error.
    #[error("server: {0}")]
    Server(String),
}

impl Error {
    /// Configuration error with a plain message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Configuration error wrapping an underlying cause.
    pub fn config_with(context: impl AsRef<str>, cause: impl std::fmt::Display) -> Self {
        Self::Config(format!("{}: {cause}", context.as_ref()))
    }

    /// Chain lookup error with a plain message.
    pub fn chain(message: impl Into<String>) -> Self {
        Self::Chain(message.into())
    }

    /// Server error wrapping an underlying cause.
    pub fn server_with(context: impl AsRef<str>, cause: impl std::fmt::Display) -> Self {
        Self::Server(format!("{}: {cause}", context.as_ref()))
    }
}
