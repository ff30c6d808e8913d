//! Chat messages.

use std::borrow::Cow;

/// Which way a message travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From the local operator to the peer.
    Outbound,
    /// From the peer to the local operator.
    Inbound,
}

/// One chat line.
///
/// The payload is whatever a single write produced or a single read
/// returned; there is no framing on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    direction: Direction,
    payload: Vec<u8>,
}

impl Message {
    /// Create a message to send to the peer.
    pub fn outbound(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            direction: Direction::Outbound,
            payload: payload.into(),
        }
    }

    /// Create a message received from the peer.
    pub fn inbound(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            direction: Direction::Inbound,
            payload: payload.into(),
        }
    }

    /// Direction of travel.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Raw payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Payload decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
