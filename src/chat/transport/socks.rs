//! SOCKS5 dialing through the local overlay proxy.

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;

use crate::chat::config::ProxyEndpoint;
use crate::chat::error::ChatError;
use crate::chat::transport::{Connection, Dialer, RendezvousAddress};

/// Dials peers through a fixed SOCKS5 proxy.
#[derive(Debug, Clone)]
pub struct ProxyDialer {
    proxy: ProxyEndpoint,
}

impl ProxyDialer {
    /// Create a dialer for the given proxy.
    pub fn new(proxy: ProxyEndpoint) -> Self {
        Self { proxy }
    }

    /// The proxy this dialer routes through.
    pub fn proxy(&self) -> &ProxyEndpoint {
        &self.proxy
    }
}

#[async_trait]
impl Dialer for ProxyDialer {
    async fn dial(&self, target: &RendezvousAddress) -> Result<Connection, ChatError> {
        tracing::info!(proxy = %self.proxy, %target, "dialing through SOCKS5 proxy");

        let socket = TcpStream::connect((self.proxy.host.as_str(), self.proxy.port))
            .await
            .map_err(|e| {
                ChatError::Proxy(format!("Proxy {} unreachable: {}", self.proxy, e))
            })?;

        let stream = Socks5Stream::connect_with_socket(socket, (target.host(), target.port()))
            .await
            .map_err(|e| classify_socks_error(target, e))?;

        tracing::info!(%target, "connected to peer");
        Ok(Connection::new(stream, target.to_string()))
    }
}

/// Split SOCKS failures into "the peer is unreachable" and "the proxy is broken".
fn classify_socks_error(target: &RendezvousAddress, err: tokio_socks::Error) -> ChatError {
    use tokio_socks::Error as SocksError;

    match err {
        SocksError::GeneralSocksServerFailure
        | SocksError::NetworkUnreachable
        | SocksError::HostUnreachable
        | SocksError::ConnectionRefused
        | SocksError::TtlExpired => ChatError::Dial {
            addr: target.to_string(),
            reason: err.to_string(),
        },
        other => ChatError::Proxy(format!("SOCKS5 handshake failed: {}", other)),
    }
}
