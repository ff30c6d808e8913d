//! Session state machine.
//!
//! A [`SessionController`] runs negotiation and then the relay on a background
//! task. The UI talks to it through two channels: [`SessionController::send`]
//! for outbound lines and a stream of [`SessionEvent`]s for everything else.
//!
//! ```text
//! Idle -> Negotiating -> Connected -> Closed
//!              |                        ^
//!              +------------------------+
//! ```

use std::fmt;
use std::net::SocketAddr;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chat::error::ChatError;
use crate::chat::message::Message;
use crate::chat::negotiator::{Plan, Role, SessionNegotiator};
use crate::chat::relay::{DuplexRelay, TerminationReason};
use crate::chat::transport::Connection;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, negotiation not started.
    Idle,
    /// Binding/accepting or dialing.
    Negotiating,
    /// Relay running, outbound input accepted.
    Connected,
    /// Terminal.
    Closed,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Negotiating)
                | (Negotiating, Connected)
                | (Negotiating, Closed)
                | (Connected, Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Negotiating => write!(f, "negotiating"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Why a session closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Negotiation failed; the message names the setup error.
    SetupFailed(String),
    /// The relay stopped on its own.
    Relay(TerminationReason),
    /// The operator asked to close the session.
    OperatorShutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::SetupFailed(e) => write!(f, "setup failed: {}", e),
            CloseReason::Relay(reason) => write!(f, "{}", reason),
            CloseReason::OperatorShutdown => write!(f, "session closed by operator"),
        }
    }
}

/// Notifications published to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Negotiation started in the given role.
    Negotiating { role: Role },
    /// Listener bound and waiting for the peer.
    Listening { local_addr: SocketAddr },
    /// Connection established; outbound input is accepted from now on.
    Connected { peer: String },
    /// A message from the peer.
    Inbound(Message),
    /// An outbound message that never reached the peer.
    DeliveryFailed { message: Message, reason: String },
    /// The session is over. Always the last event.
    Closed { reason: CloseReason },
}

/// Handle to a running session.
#[derive(Debug)]
pub struct SessionController {
    role: Role,
    state: watch::Receiver<SessionState>,
    outbound: mpsc::UnboundedSender<Message>,
    shutdown: CancellationToken,
    driver: JoinHandle<CloseReason>,
}

impl SessionController {
    /// Validate the role and start negotiating in the background.
    ///
    /// Fails synchronously with [`ChatError::InvalidRole`] when the role and
    /// peer address do not fit together; in that case nothing is spawned.
    pub fn start(
        negotiator: SessionNegotiator,
        relay: DuplexRelay,
        role: Role,
        peer_address: Option<&str>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), ChatError> {
        let plan = negotiator.plan(role, peer_address)?;

        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let driver = Driver {
            role,
            plan,
            negotiator,
            relay,
            state: state_tx,
            events: events_tx,
            outbound: outbound_rx,
            shutdown: shutdown.clone(),
        };
        let driver = tokio::spawn(driver.run());

        let controller = Self {
            role,
            state: state_rx,
            outbound: outbound_tx,
            shutdown,
            driver,
        };
        Ok((controller, events_rx))
    }

    /// The role this session was started with.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Queue a line for the peer.
    pub fn send(&self, text: impl Into<String>) -> Result<(), ChatError> {
        match self.state() {
            SessionState::Idle | SessionState::Negotiating => Err(ChatError::NotConnected),
            SessionState::Closed => Err(ChatError::SessionClosed),
            SessionState::Connected => self
                .outbound
                .send(Message::outbound(text.into()))
                .map_err(|_| ChatError::SessionClosed),
        }
    }

    /// Ask the session to close. Safe to call any number of times, in any state.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!(state = %self.state(), "operator shutdown requested");
        }
        self.shutdown.cancel();
    }

    /// Wait for the session to finish and return why it closed.
    pub async fn join(self) -> CloseReason {
        match self.driver.await {
            Ok(reason) => reason,
            Err(e) => CloseReason::SetupFailed(format!("session task aborted: {}", e)),
        }
    }
}

/// Everything the background task owns.
struct Driver {
    role: Role,
    plan: Plan,
    negotiator: SessionNegotiator,
    relay: DuplexRelay,
    state: watch::Sender<SessionState>,
    events: mpsc::UnboundedSender<SessionEvent>,
    outbound: mpsc::UnboundedReceiver<Message>,
    shutdown: CancellationToken,
}

impl Driver {
    async fn run(self) -> CloseReason {
        let Driver {
            role,
            plan,
            negotiator,
            relay,
            state,
            events,
            outbound,
            shutdown,
        } = self;

        transition(&state, SessionState::Negotiating);
        let _ = events.send(SessionEvent::Negotiating { role });

        let negotiated = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            result = negotiate(&negotiator, plan, &events) => Some(result),
        };

        let connection = match negotiated {
            None => return finish(&state, &events, CloseReason::OperatorShutdown),
            Some(Err(e)) => {
                tracing::warn!(%role, error = %e, "negotiation failed");
                return finish(&state, &events, CloseReason::SetupFailed(e.to_string()));
            }
            Some(Ok(connection)) => connection,
        };

        let peer = connection.peer_addr().to_string();
        let closer = connection.close_handle();
        transition(&state, SessionState::Connected);
        let _ = events.send(SessionEvent::Connected { peer });

        let relay_run = relay.run(connection, outbound, events.clone());
        tokio::pin!(relay_run);

        let reason = tokio::select! {
            biased;
            reason = &mut relay_run => CloseReason::Relay(reason),
            _ = shutdown.cancelled() => {
                closer.close();
                relay_run.await;
                CloseReason::OperatorShutdown
            }
        };

        finish(&state, &events, reason)
    }
}

async fn negotiate(
    negotiator: &SessionNegotiator,
    plan: Plan,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> Result<Connection, ChatError> {
    match plan {
        Plan::Listen => {
            let listener = negotiator.bind().await?;
            let local_addr = listener.local_addr()?;
            let _ = events.send(SessionEvent::Listening { local_addr });
            listener.accept_one().await
        }
        Plan::Dial(target) => negotiator.dial(&target).await,
    }
}

fn finish(
    state: &watch::Sender<SessionState>,
    events: &mpsc::UnboundedSender<SessionEvent>,
    reason: CloseReason,
) -> CloseReason {
    transition(state, SessionState::Closed);
    tracing::info!(%reason, "session closed");
    let _ = events.send(SessionEvent::Closed {
        reason: reason.clone(),
    });
    reason
}

/// Apply a transition if it is legal. Returns whether the state changed.
fn transition(state: &watch::Sender<SessionState>, next: SessionState) -> bool {
    state.send_if_modified(|current| {
        if current.can_transition_to(next) {
            tracing::debug!(from = %current, to = %next, "session state");
            *current = next;
            true
        } else {
            tracing::warn!(from = %current, to = %next, "rejected session transition");
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::sync::Mutex;

    use crate::chat::transport::{Dialer, RendezvousAddress};

    const TIMEOUT: Duration = Duration::from_secs(2);

    /// Dialer that hands out one end of an in-memory pipe.
    struct PipeDialer {
        local: Mutex<Option<DuplexStream>>,
        attempts: AtomicUsize,
    }

    impl PipeDialer {
        fn new() -> (Arc<Self>, DuplexStream) {
            let (local, remote) = tokio::io::duplex(4096);
            let dialer = Arc::new(Self {
                local: Mutex::new(Some(local)),
                attempts: AtomicUsize::new(0),
            });
            (dialer, remote)
        }
    }

    #[async_trait]
    impl Dialer for PipeDialer {
        async fn dial(&self, target: &RendezvousAddress) -> Result<Connection, ChatError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.local.lock().await.take() {
                Some(stream) => Ok(Connection::new(stream, target.to_string())),
                None => Err(ChatError::Dial {
                    addr: target.to_string(),
                    reason: "already dialed".to_string(),
                }),
            }
        }
    }

    /// Dialer that never completes.
    struct HangingDialer;

    #[async_trait]
    impl Dialer for HangingDialer {
        async fn dial(&self, _target: &RendezvousAddress) -> Result<Connection, ChatError> {
            std::future::pending().await
        }
    }

    fn start_dialer(
        dialer: Arc<dyn Dialer>,
    ) -> (SessionController, mpsc::UnboundedReceiver<SessionEvent>) {
        let negotiator = SessionNegotiator::new("127.0.0.1:0", 9999, dialer);
        SessionController::start(negotiator, DuplexRelay::default(), Role::Dialer, Some("peer.onion"))
            .unwrap()
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(TIMEOUT, events.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("event channel closed")
    }

    async fn wait_for_state(controller: &SessionController, wanted: SessionState) {
        let mut rx = controller.subscribe_state();
        tokio::time::timeout(TIMEOUT, rx.wait_for(|s| *s == wanted))
            .await
            .expect("timed out waiting for state")
            .expect("state channel closed");
    }

    #[test]
    fn test_state_transitions() {
        use SessionState::*;
        assert!(Idle.can_transition_to(Negotiating));
        assert!(Negotiating.can_transition_to(Connected));
        assert!(Negotiating.can_transition_to(Closed));
        assert!(Connected.can_transition_to(Closed));

        assert!(!Connected.can_transition_to(Negotiating));
        assert!(!Negotiating.can_transition_to(Idle));
        assert!(!Idle.can_transition_to(Closed));
        assert!(!Idle.can_transition_to(Connected));
        for next in [Idle, Negotiating, Connected, Closed] {
            assert!(!Closed.can_transition_to(next));
        }
    }

    #[tokio::test]
    async fn test_invalid_role_spawns_nothing() {
        let (dialer, _remote) = PipeDialer::new();
        let negotiator = SessionNegotiator::new("127.0.0.1:0", 9999, dialer.clone());

        let err = SessionController::start(negotiator, DuplexRelay::default(), Role::Dialer, Some(" "))
            .unwrap_err();
        assert!(matches!(err, ChatError::InvalidRole(_)));
        assert_eq!(dialer.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connected_session_relays_both_ways() {
        let (dialer, mut remote) = PipeDialer::new();
        let (controller, mut events) = start_dialer(dialer);

        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::Negotiating { role: Role::Dialer }
        );
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::Connected {
                peer: "peer.onion:9999".to_string()
            }
        );
        wait_for_state(&controller, SessionState::Connected).await;

        controller.send("hello").unwrap();
        let mut buf = [0u8; 5];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        remote.write_all(b"hi back").await.unwrap();
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::Inbound(Message::inbound("hi back"))
        );

        drop(remote);
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::Closed {
                reason: CloseReason::Relay(TerminationReason::PeerClosed)
            }
        );
        assert_eq!(controller.state(), SessionState::Closed);
        assert!(matches!(controller.send("late"), Err(ChatError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_send_before_connected_fails() {
        let (controller, mut events) = start_dialer(Arc::new(HangingDialer));

        next_event(&mut events).await;
        assert_eq!(controller.state(), SessionState::Negotiating);
        assert!(matches!(controller.send("too early"), Err(ChatError::NotConnected)));

        controller.shutdown();
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::Closed {
                reason: CloseReason::OperatorShutdown
            }
        );
    }

    #[tokio::test]
    async fn test_setup_failure_closes_session() {
        let (dialer, _remote) = PipeDialer::new();
        // Use up the only stream so the session's dial fails.
        let target = RendezvousAddress::parse("other.onion", 9999).unwrap();
        let _first = dialer.dial(&target).await.unwrap();

        let (controller, mut events) = start_dialer(dialer);
        next_event(&mut events).await;

        match next_event(&mut events).await {
            SessionEvent::Closed {
                reason: CloseReason::SetupFailed(msg),
            } => assert!(msg.contains("already dialed")),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            controller.join().await,
            CloseReason::SetupFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent_and_closes_connection() {
        let (dialer, mut remote) = PipeDialer::new();
        let (controller, mut events) = start_dialer(dialer);
        wait_for_state(&controller, SessionState::Connected).await;

        controller.shutdown();
        controller.shutdown();

        // The peer sees end of stream once our side is gone.
        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(TIMEOUT, remote.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(n, 0);

        let mut last = None;
        while let Ok(Some(event)) = tokio::time::timeout(TIMEOUT, events.recv()).await {
            last = Some(event);
        }
        assert_eq!(
            last,
            Some(SessionEvent::Closed {
                reason: CloseReason::OperatorShutdown
            })
        );

        controller.shutdown();
        assert_eq!(controller.join().await, CloseReason::OperatorShutdown);
    }

    #[tokio::test]
    async fn test_listener_reports_bound_address() {
        let negotiator = SessionNegotiator::new("127.0.0.1:0", 9999, Arc::new(HangingDialer));
        let (controller, mut events) =
            SessionController::start(negotiator, DuplexRelay::default(), Role::Listener, None)
                .unwrap();

        next_event(&mut events).await;
        let local_addr = match next_event(&mut events).await {
            SessionEvent::Listening { local_addr } => local_addr,
            other => panic!("unexpected event {:?}", other),
        };

        let _peer = tokio::net::TcpStream::connect(local_addr).await.unwrap();
        match next_event(&mut events).await {
            SessionEvent::Connected { peer } => assert!(peer.starts_with("127.0.0.1:")),
            other => panic!("unexpected event {:?}", other),
        }

        controller.shutdown();
        assert_eq!(controller.join().await, CloseReason::OperatorShutdown);
    }
}
