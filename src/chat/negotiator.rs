//! Role negotiation: listen for the peer or dial it.

use std::fmt;
use std::sync::Arc;

use crate::chat::config::ChatConfig;
use crate::chat::error::ChatError;
use crate::chat::transport::{Connection, Dialer, ListenerHandle, RendezvousAddress};

/// Which side of the session this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Bind the chat port and wait for the peer.
    Listener,
    /// Reach the peer's rendezvous address through the proxy.
    Dialer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Listener => write!(f, "listener"),
            Role::Dialer => write!(f, "dialer"),
        }
    }
}

/// Validated negotiation plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Bind `listen_addr` and accept one peer.
    Listen,
    /// Dial the given peer.
    Dial(RendezvousAddress),
}

/// Produces the single connection of a session.
#[derive(Clone)]
pub struct SessionNegotiator {
    listen_addr: String,
    chat_port: u16,
    dialer: Arc<dyn Dialer>,
}

impl SessionNegotiator {
    /// Create a negotiator listening on `listen_addr` and dialing with `dialer`.
    pub fn new(listen_addr: impl Into<String>, chat_port: u16, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            chat_port,
            dialer,
        }
    }

    /// Create a negotiator from configuration.
    pub fn from_config(config: &ChatConfig, dialer: Arc<dyn Dialer>) -> Self {
        Self::new(config.listen_addr(), config.chat_port, dialer)
    }

    /// Check the role/address combination without touching the network.
    pub fn plan(&self, role: Role, peer_address: Option<&str>) -> Result<Plan, ChatError> {
        match role {
            Role::Listener => {
                if let Some(peer) = peer_address {
                    tracing::debug!(%peer, "peer address ignored in listener role");
                }
                Ok(Plan::Listen)
            }
            Role::Dialer => {
                let peer = peer_address.ok_or_else(|| {
                    ChatError::InvalidRole("Dialer role requires a peer address".to_string())
                })?;
                Ok(Plan::Dial(RendezvousAddress::parse(peer, self.chat_port)?))
            }
        }
    }

    /// Establish the session's connection.
    pub async fn establish(
        &self,
        role: Role,
        peer_address: Option<&str>,
    ) -> Result<Connection, ChatError> {
        let plan = self.plan(role, peer_address)?;
        match plan {
            Plan::Listen => self.bind().await?.accept_one().await,
            Plan::Dial(target) => self.dial(&target).await,
        }
    }

    /// Bind the local chat port.
    pub async fn bind(&self) -> Result<ListenerHandle, ChatError> {
        let listener = self.dialer.listen(&self.listen_addr).await?;
        tracing::info!(addr = %self.listen_addr, "listening for peer");
        Ok(listener)
    }

    /// Dial a validated peer address.
    pub async fn dial(&self, target: &RendezvousAddress) -> Result<Connection, ChatError> {
        self.dialer.dial(target).await
    }
}

impl fmt::Debug for SessionNegotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionNegotiator")
            .field("listen_addr", &self.listen_addr)
            .field("chat_port", &self.chat_port)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;

    /// Dialer that only counts how often it is asked to dial or listen.
    #[derive(Default)]
    struct CountingDialer {
        attempts: AtomicUsize,
        listens: AtomicUsize,
    }

    #[async_trait]
    impl Dialer for CountingDialer {
        async fn dial(&self, target: &RendezvousAddress) -> Result<Connection, ChatError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(ChatError::Dial {
                addr: target.to_string(),
                reason: "test double".to_string(),
            })
        }

        async fn listen(&self, addr: &str) -> Result<ListenerHandle, ChatError> {
            self.listens.fetch_add(1, Ordering::SeqCst);
            ListenerHandle::bind(addr).await
        }
    }

    fn negotiator(dialer: Arc<CountingDialer>) -> SessionNegotiator {
        SessionNegotiator::new("127.0.0.1:0", 9999, dialer)
    }

    #[tokio::test]
    async fn test_dialer_without_address_is_invalid_role() {
        let dialer = Arc::new(CountingDialer::default());
        let negotiator = negotiator(Arc::clone(&dialer));

        for peer in [None, Some(""), Some("   ")] {
            let err = negotiator.establish(Role::Dialer, peer).await.unwrap_err();
            assert!(matches!(err, ChatError::InvalidRole(_)), "got {:?}", err);
        }
        assert_eq!(dialer.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dialer_uses_fixed_port() {
        let dialer = Arc::new(CountingDialer::default());
        let negotiator = negotiator(Arc::clone(&dialer));

        let plan = negotiator.plan(Role::Dialer, Some("peer.onion")).unwrap();
        assert_eq!(
            plan,
            Plan::Dial(RendezvousAddress::parse("peer.onion:9999", 0).unwrap())
        );

        let err = negotiator
            .establish(Role::Dialer, Some("peer.onion"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Dial { .. }));
        assert_eq!(dialer.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listener_ignores_peer_address() {
        let negotiator = negotiator(Arc::new(CountingDialer::default()));
        assert_eq!(
            negotiator.plan(Role::Listener, Some("ignored.onion")).unwrap(),
            Plan::Listen
        );
    }

    #[tokio::test]
    async fn test_listener_accepts_one_connection() {
        let dialer = Arc::new(CountingDialer::default());
        let negotiator = negotiator(Arc::clone(&dialer));

        let listener = negotiator.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"knock").await.unwrap();
            stream
        });

        let (mut reader, _writer) = listener.accept_one().await.unwrap().split();
        let _peer = peer.await.unwrap();

        let mut buf = [0u8; 5];
        let n = reader.read_chunk(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"knock");
        assert_eq!(dialer.attempts.load(Ordering::SeqCst), 0);
        assert_eq!(dialer.listens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bind_failure_is_bind_error() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let negotiator = SessionNegotiator::new(
            addr.to_string(),
            addr.port(),
            Arc::new(CountingDialer::default()),
        );
        let err = negotiator.establish(Role::Listener, None).await.unwrap_err();
        assert!(matches!(err, ChatError::Bind { .. }));
    }
}
