//! Chat error types.

use thiserror::Error;

/// Errors that can occur while setting up or running a chat session.
#[derive(Error, Debug)]
pub enum ChatError {
    /// A required input is missing (local identity, peer address).
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Role and peer address do not form a valid combination.
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// The SOCKS5 proxy is unreachable or refused the handshake.
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// The listener could not bind its local port.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address we tried to bind.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// The listener was bound but accepting a connection failed.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    /// The proxy was reached but the peer could not be.
    #[error("Failed to dial {addr}: {reason}")]
    Dial {
        /// Rendezvous address we tried to reach.
        addr: String,
        /// Reason reported by the proxy.
        reason: String,
    },

    /// Reading from the connection failed.
    #[error("Read failed: {0}")]
    Read(#[source] std::io::Error),

    /// Writing to the connection failed.
    #[error("Write failed: {0}")]
    Write(#[source] std::io::Error),

    /// The connection has already been closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The session has not reached the connected state yet.
    #[error("Not connected yet")]
    NotConnected,

    /// The session is closed and accepts no more messages.
    #[error("Session closed")]
    SessionClosed,

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChatError::Dial {
            addr: "abc.onion:9999".to_string(),
            reason: "host unreachable".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to dial abc.onion:9999: host unreachable");

        assert_eq!(ChatError::ConnectionClosed.to_string(), "Connection closed");
    }
}
