//! Local TCP listener.
//!
//! Listening never goes through the proxy: the overlay daemon forwards the
//! published rendezvous port to this local socket.

use std::net::SocketAddr;

use tokio::net::{TcpListener, ToSocketAddrs};

use crate::chat::error::ChatError;
use crate::chat::transport::Connection;

/// A bound listener waiting for its single peer.
#[derive(Debug)]
pub struct ListenerHandle {
    listener: TcpListener,
}

impl ListenerHandle {
    /// Bind to an address and start listening.
    pub async fn bind<A: ToSocketAddrs + std::fmt::Display>(addr: A) -> Result<Self, ChatError> {
        let display = addr.to_string();
        let listener = TcpListener::bind(addr).await.map_err(|e| ChatError::Bind {
            addr: display,
            source: e,
        })?;
        Ok(Self { listener })
    }

    /// Get the bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr, ChatError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept exactly one connection.
    ///
    /// Consumes the handle, so the listening socket is closed as soon as the
    /// peer has been accepted.
    pub async fn accept_one(self) -> Result<Connection, ChatError> {
        let (stream, peer) = self.listener.accept().await.map_err(ChatError::Accept)?;
        tracing::info!(%peer, "accepted inbound connection");
        Ok(Connection::new(stream, peer.to_string()))
    }
}
