//! Duplex relay between the connection and the UI channels.
//!
//! Two pumps run as separate tasks: the read pump owns the read half and
//! publishes inbound messages, the write pump owns the write half and drains
//! the outbound queue. Whichever stops first closes the connection; the other
//! observes the close on its pending operation and stops too.

use std::fmt;

use tokio::sync::mpsc;
use tokio::task::JoinError;

use crate::chat::config::DEFAULT_READ_CHUNK_SIZE;
use crate::chat::error::ChatError;
use crate::chat::message::Message;
use crate::chat::session::SessionEvent;
use crate::chat::transport::{Connection, ConnectionReader, ConnectionWriter};

/// Why a relay run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The peer closed the connection cleanly (zero-length read).
    PeerClosed,
    /// Reading from the connection failed.
    ReadError(String),
    /// Writing to the connection failed.
    WriteError(String),
    /// Closed from our side: operator shutdown or the UI went away.
    LocalShutdown,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::PeerClosed => write!(f, "peer disconnected"),
            TerminationReason::ReadError(e) => write!(f, "connection lost: {}", e),
            TerminationReason::WriteError(e) => write!(f, "connection lost: {}", e),
            TerminationReason::LocalShutdown => write!(f, "closed locally"),
        }
    }
}

/// Runs the two pumps over one connection.
#[derive(Debug, Clone)]
pub struct DuplexRelay {
    read_chunk_size: usize,
}

impl DuplexRelay {
    /// Create a relay reading at most `read_chunk_size` bytes per chunk.
    pub fn new(read_chunk_size: usize) -> Self {
        Self {
            read_chunk_size: read_chunk_size.max(1),
        }
    }

    /// Relay until either direction stops, then close the connection.
    ///
    /// Inbound messages and delivery failures are published on `inbound`.
    pub async fn run(
        &self,
        connection: Connection,
        outbound: mpsc::UnboundedReceiver<Message>,
        inbound: mpsc::UnboundedSender<SessionEvent>,
    ) -> TerminationReason {
        let closer = connection.close_handle();
        let peer = connection.peer_addr().to_string();
        let (reader, writer) = connection.split();

        let mut read_task = tokio::spawn(read_pump(reader, inbound.clone(), self.read_chunk_size));
        let mut write_task = tokio::spawn(write_pump(writer, outbound, inbound));

        let (reason, other) = tokio::select! {
            result = &mut read_task => (pump_result(result, TerminationReason::ReadError), write_task),
            result = &mut write_task => (pump_result(result, TerminationReason::WriteError), read_task),
        };

        closer.close();
        let _ = other.await;

        tracing::info!(%peer, %reason, "relay stopped");
        reason
    }
}

impl Default for DuplexRelay {
    fn default() -> Self {
        Self::new(DEFAULT_READ_CHUNK_SIZE)
    }
}

/// A pump that panicked counts as a failure in its own direction.
fn pump_result(
    result: Result<TerminationReason, JoinError>,
    aborted: fn(String) -> TerminationReason,
) -> TerminationReason {
    result.unwrap_or_else(|e| aborted(format!("pump aborted: {}", e)))
}

/// Read chunks and publish them until the peer closes or something fails.
async fn read_pump(
    mut reader: ConnectionReader,
    inbound: mpsc::UnboundedSender<SessionEvent>,
    chunk_size: usize,
) -> TerminationReason {
    let mut buf = vec![0u8; chunk_size];
    loop {
        match reader.read_chunk(&mut buf).await {
            Ok(0) => return TerminationReason::PeerClosed,
            Ok(n) => {
                let message = Message::inbound(&buf[..n]);
                if inbound.send(SessionEvent::Inbound(message)).is_err() {
                    return TerminationReason::LocalShutdown;
                }
            }
            Err(ChatError::ConnectionClosed) => return TerminationReason::LocalShutdown,
            Err(e) => {
                tracing::warn!(error = %e, "read pump failed");
                return TerminationReason::ReadError(e.to_string());
            }
        }
    }
}

/// Write queued messages until the queue closes or a write fails.
async fn write_pump(
    mut writer: ConnectionWriter,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    inbound: mpsc::UnboundedSender<SessionEvent>,
) -> TerminationReason {
    let closer = writer.close_handle().clone();

    let reason = loop {
        let message = tokio::select! {
            biased;
            _ = closer.closed() => break TerminationReason::LocalShutdown,
            next = outbound.recv() => match next {
                Some(message) => message,
                None => break TerminationReason::LocalShutdown,
            },
        };

        if let Err(e) = writer.write_chunk(message.bytes()).await {
            let _ = inbound.send(SessionEvent::DeliveryFailed {
                message,
                reason: e.to_string(),
            });
            match e {
                ChatError::ConnectionClosed => break TerminationReason::LocalShutdown,
                other => {
                    tracing::warn!(error = %other, "write pump failed");
                    break TerminationReason::WriteError(other.to_string());
                }
            }
        }
    };

    // Anything still queued will never be written.
    outbound.close();
    while let Ok(message) = outbound.try_recv() {
        let _ = inbound.send(SessionEvent::DeliveryFailed {
            message,
            reason: "session closed before the message was sent".to_string(),
        });
    }

    reason
}
