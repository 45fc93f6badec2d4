//! Server error types.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors raised while building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not bind to the configured address.
    #[error("failed to bind {addr}")]
    Bind {
        /// Address the server tried to bind.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// I/O failure while serving.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration is incomplete or invalid.
    #[error(transparent)]
    Config(#[from] spire_config::ConfigError),

    /// Token validator construction failed.
    #[error(transparent)]
    Auth(#[from] spire_auth::AuthError),
}

impl ServerError {
    /// Creates a bind error for the given address.
    pub const fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }
}
