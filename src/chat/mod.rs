//! # Chat session
//!
//! One anonymized, point-to-point chat between two peers that are only
//! reachable through an overlay network's local SOCKS5 proxy.
//!
//! ## Flow
//!
//! - [`SessionNegotiator`] either binds the chat port and accepts a single
//!   peer, or dials the peer's rendezvous address through a [`ProxyDialer`].
//! - [`DuplexRelay`] pumps bytes in both directions until one side stops.
//! - [`SessionController`] sequences the two and publishes [`SessionEvent`]s
//!   for the UI.
//!
//! There is no framing on the wire: each read or write carries the raw bytes
//! of one message.

mod config;
mod error;
mod identity;
mod message;
mod negotiator;
mod relay;
mod session;
pub mod transport;
pub mod tui;

pub use config::{
    ChatConfig, ProxyEndpoint, DEFAULT_CHAT_PORT, DEFAULT_LISTEN_HOST, DEFAULT_PROXY_HOST,
    DEFAULT_PROXY_PORT, DEFAULT_READ_CHUNK_SIZE,
};
pub use error::ChatError;
pub use identity::LocalIdentity;
pub use message::{Direction, Message};
pub use negotiator::{Plan, Role, SessionNegotiator};
pub use relay::{DuplexRelay, TerminationReason};
pub use session::{CloseReason, SessionController, SessionEvent, SessionState};
pub use transport::{Connection, Dialer, ListenerHandle, ProxyDialer, RendezvousAddress};
