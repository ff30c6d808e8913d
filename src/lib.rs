//! # hiddenchat - one-to-one chat over an anonymizing overlay
//!
//! Two peers, each publishing a rendezvous address on an overlay network
//! (typically a Tor onion service), exchange text lines over a single
//! connection routed through the local SOCKS5 proxy.
//!
//! ## Overview
//!
//! - One side **listens** on a fixed local port that the overlay daemon
//!   forwards its published address to
//! - The other side **dials** that address through the SOCKS5 proxy
//! - Once connected, two pumps relay lines in both directions until either
//!   side disconnects
//! - No reconnect: a closed session stays closed
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hiddenchat::chat::{
//!     ChatConfig, DuplexRelay, ProxyDialer, Role, SessionController, SessionEvent,
//!     SessionNegotiator,
//! };
//!
//! # async fn demo() -> Result<(), hiddenchat::chat::ChatError> {
//! let config = ChatConfig::default();
//! let dialer = Arc::new(ProxyDialer::new(config.proxy.clone()));
//! let negotiator = SessionNegotiator::from_config(&config, dialer);
//!
//! let (session, mut events) = SessionController::start(
//!     negotiator,
//!     DuplexRelay::new(config.read_chunk_size),
//!     Role::Dialer,
//!     Some("peeraddress.onion"),
//! )?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SessionEvent::Connected { .. } => session.send("hello")?,
//!         SessionEvent::Inbound(message) => println!("peer: {}", message.text()),
//!         SessionEvent::Closed { reason } => {
//!             println!("closed: {}", reason);
//!             break;
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`chat`]: negotiation, relay, session state machine and terminal UI

pub mod chat;
