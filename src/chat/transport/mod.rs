//! Transport layer for chat connections.
//!
//! A [`Connection`] wraps any bidirectional byte stream (plain TCP for the
//! listener, a SOCKS5 stream for the dialer). It is split into a reader and a
//! writer half that share one [`CloseHandle`], so each direction can be owned
//! by a different task without locking while close stays a single,
//! idempotent operation.

mod socks;
mod tcp;

pub use socks::ProxyDialer;
pub use tcp::ListenerHandle;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;

use crate::chat::error::ChatError;

/// Any byte stream a connection can run over.
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ByteStream for T {}

/// Trait for reaching a peer's rendezvous address.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Open a connection to the given address.
    async fn dial(&self, target: &RendezvousAddress) -> Result<Connection, ChatError>;

    /// Bind the local chat port the overlay forwards inbound peers to.
    ///
    /// Binds directly; only outbound traffic goes through the overlay.
    async fn listen(&self, addr: &str) -> Result<ListenerHandle, ChatError> {
        ListenerHandle::bind(addr).await
    }
}

/// A peer's overlay endpoint: host plus port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendezvousAddress {
    host: String,
    port: u16,
}

impl RendezvousAddress {
    /// Parse a peer address, using `default_port` unless it ends in `:port`.
    pub fn parse(input: &str, default_port: u16) -> Result<Self, ChatError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ChatError::InvalidRole(
                "Dialer role requires a peer address".to_string(),
            ));
        }

        // Only treat the suffix as a port when it actually is one.
        if let Some((host, port)) = input.rsplit_once(':') {
            if let Ok(port) = port.parse::<u16>() {
                if host.is_empty() {
                    return Err(ChatError::InvalidRole(format!(
                        "Peer address '{}' has no host",
                        input
                    )));
                }
                return Ok(Self {
                    host: host.to_string(),
                    port,
                });
            }
        }

        Ok(Self {
            host: input.to_string(),
            port: default_port,
        })
    }

    /// Host part (e.g. an .onion name).
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for RendezvousAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Shared close signal for both halves of a connection.
///
/// Closing is idempotent: only the first call has an effect, later calls
/// return `false`. Every pending read or write wakes up when it fires.
#[derive(Debug, Clone, Default)]
pub struct CloseHandle {
    token: CancellationToken,
    closed: Arc<AtomicBool>,
}

impl CloseHandle {
    /// Create an open handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the connection. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::SeqCst);
        self.token.cancel();
        if first {
            tracing::debug!("connection closed");
        }
        first
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.token.cancelled().await
    }
}

/// An established, bidirectional connection to the peer.
pub struct Connection {
    stream: Box<dyn ByteStream>,
    peer_addr: String,
    closer: CloseHandle,
}

impl Connection {
    /// Wrap a byte stream.
    pub fn new<S: ByteStream + 'static>(stream: S, peer_addr: impl Into<String>) -> Self {
        Self {
            stream: Box::new(stream),
            peer_addr: peer_addr.into(),
            closer: CloseHandle::new(),
        }
    }

    /// Peer address as a display string.
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    /// A handle that can close this connection from anywhere.
    pub fn close_handle(&self) -> CloseHandle {
        self.closer.clone()
    }

    /// Close the connection (idempotent).
    pub fn close(&self) -> bool {
        self.closer.close()
    }

    /// Split into independently owned read and write halves.
    pub fn split(self) -> (ConnectionReader, ConnectionWriter) {
        let (read_half, write_half) = tokio::io::split(self.stream);
        (
            ConnectionReader {
                half: read_half,
                closer: self.closer.clone(),
            },
            ConnectionWriter {
                half: write_half,
                closer: self.closer,
            },
        )
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer_addr", &self.peer_addr)
            .field("closed", &self.closer.is_closed())
            .finish()
    }
}

/// Read half of a [`Connection`].
pub struct ConnectionReader {
    half: ReadHalf<Box<dyn ByteStream>>,
    closer: CloseHandle,
}

impl ConnectionReader {
    /// Read the next chunk. `Ok(0)` means the peer closed cleanly.
    ///
    /// Fails with [`ChatError::ConnectionClosed`] once the connection has
    /// been closed locally, including while a read is pending.
    pub async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, ChatError> {
        if self.closer.is_closed() {
            return Err(ChatError::ConnectionClosed);
        }
        tokio::select! {
            biased;
            _ = self.closer.closed() => Err(ChatError::ConnectionClosed),
            result = self.half.read(buf) => result.map_err(ChatError::Read),
        }
    }

    /// Close handle shared with the writer.
    pub fn close_handle(&self) -> &CloseHandle {
        &self.closer
    }
}

/// Write half of a [`Connection`].
pub struct ConnectionWriter {
    half: WriteHalf<Box<dyn ByteStream>>,
    closer: CloseHandle,
}

impl ConnectionWriter {
    /// Write all bytes and flush.
    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<(), ChatError> {
        if self.closer.is_closed() {
            return Err(ChatError::ConnectionClosed);
        }
        let half = &mut self.half;
        tokio::select! {
            biased;
            _ = self.closer.closed() => Err(ChatError::ConnectionClosed),
            result = async {
                half.write_all(data).await?;
                half.flush().await
            } => result.map_err(ChatError::Write),
        }
    }

    /// Close handle shared with the reader.
    pub fn close_handle(&self) -> &CloseHandle {
        &self.closer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rendezvous_address() {
        let addr = RendezvousAddress::parse("abcdef.onion", 9999).unwrap();
        assert_eq!(addr.host(), "abcdef.onion");
        assert_eq!(addr.port(), 9999);

        let addr = RendezvousAddress::parse("  localhost:4242 ", 9999).unwrap();
        assert_eq!(addr.host(), "localhost");
        assert_eq!(addr.port(), 4242);
        assert_eq!(addr.to_string(), "localhost:4242");
    }

    #[test]
    fn test_parse_empty_address_is_invalid_role() {
        assert!(matches!(
            RendezvousAddress::parse("", 9999),
            Err(ChatError::InvalidRole(_))
        ));
        assert!(matches!(
            RendezvousAddress::parse("   ", 9999),
            Err(ChatError::InvalidRole(_))
        ));
        assert!(matches!(
            RendezvousAddress::parse(":9999", 9999),
            Err(ChatError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let handle = CloseHandle::new();
        assert!(!handle.is_closed());
        assert!(handle.close());
        assert!(!handle.close());
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_io_after_close_fails() {
        let (local, _remote) = tokio::io::duplex(64);
        let conn = Connection::new(local, "test");
        let closer = conn.close_handle();
        let (mut reader, mut writer) = conn.split();

        closer.close();

        let mut buf = [0u8; 8];
        assert!(matches!(
            reader.read_chunk(&mut buf).await,
            Err(ChatError::ConnectionClosed)
        ));
        assert!(matches!(
            writer.write_chunk(b"late").await,
            Err(ChatError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_wakes_pending_read() {
        let (local, _remote) = tokio::io::duplex(64);
        let conn = Connection::new(local, "test");
        let closer = conn.close_handle();
        let (mut reader, _writer) = conn.split();

        let pending = tokio::spawn(async move {
            let mut buf = [0u8; 8];
            reader.read_chunk(&mut buf).await
        });

        tokio::task::yield_now().await;
        closer.close();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), pending)
            .await
            .expect("read should unblock after close")
            .unwrap();
        assert!(matches!(result, Err(ChatError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_chunks_pass_through() {
        let (local, mut remote) = tokio::io::duplex(64);
        let (mut reader, mut writer) = Connection::new(local, "test").split();

        writer.write_chunk(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        remote.write_all(b"pong").await.unwrap();
        let mut buf = [0u8; 16];
        let n = reader.read_chunk(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"pong");
    }
}
