//! Application state for the TUI.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::chat::negotiator::Role;
use crate::chat::session::SessionEvent;

/// Who wrote a history line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageAuthor {
    /// The local operator.
    You,
    /// The remote peer.
    Peer,
    /// Status and error notices.
    System,
}

/// A line in the chat history.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Who wrote it.
    pub author: MessageAuthor,
    /// The text.
    pub content: String,
    /// Unix timestamp when added.
    pub timestamp: u64,
}

impl ChatMessage {
    /// Create a history line stamped with the current time.
    pub fn new(author: MessageAuthor, content: String) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self {
            author,
            content,
            timestamp,
        }
    }

    /// Create a system line.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageAuthor::System, content.into())
    }

    /// Format the timestamp as HH:MM (UTC).
    pub fn formatted_time(&self) -> String {
        let secs = self.timestamp % 86400;
        let hours = (secs / 3600) % 24;
        let minutes = (secs % 3600) / 60;
        format!("{:02}:{:02}", hours, minutes)
    }
}

/// What the header shows about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Session not started.
    Idle,
    /// Listener bound, no peer yet.
    WaitingForPeer,
    /// Dialing through the proxy.
    Dialing,
    /// Relay running.
    Connected,
    /// Session over, with the close reason.
    Closed(String),
}

impl ConnectionStatus {
    /// Short label for the header.
    pub fn display(&self) -> &str {
        match self {
            ConnectionStatus::Idle => "Idle",
            ConnectionStatus::WaitingForPeer => "Waiting for peer...",
            ConnectionStatus::Dialing => "Dialing...",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Closed(_) => "Closed",
        }
    }
}

/// Application state for the chat TUI.
pub struct App {
    /// Role of this side.
    pub role: Role,
    /// Current input text.
    pub input: String,
    /// Cursor position in the input, in characters.
    pub cursor_position: usize,
    /// Chat history.
    pub messages: Vec<ChatMessage>,
    /// Current session status.
    pub status: ConnectionStatus,
    /// Whether the app should quit.
    pub should_quit: bool,
    /// Scroll offset for the history (0 = bottom).
    pub scroll_offset: usize,
    /// Our rendezvous address.
    pub my_address: Option<String>,
    /// Peer address once connected.
    pub peer_address: Option<String>,
    /// Messages sent.
    pub messages_sent: u32,
    /// Messages received.
    pub messages_received: u32,
    /// Maximum input length in characters.
    pub max_message_len: usize,
}

/// Default maximum input length.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 512;

impl App {
    /// Create the UI state for a session in `role`.
    pub fn new(role: Role) -> Self {
        Self::with_max_len(role, DEFAULT_MAX_MESSAGE_LEN)
    }

    /// Create the UI state with a custom input limit.
    pub fn with_max_len(role: Role, max_message_len: usize) -> Self {
        Self {
            role,
            input: String::new(),
            cursor_position: 0,
            messages: Vec::new(),
            status: ConnectionStatus::Idle,
            should_quit: false,
            scroll_offset: 0,
            my_address: None,
            peer_address: None,
            messages_sent: 0,
            messages_received: 0,
            max_message_len,
        }
    }

    /// Characters left before the input limit.
    pub fn remaining_chars(&self) -> usize {
        self.max_message_len.saturating_sub(self.input.chars().count())
    }

    /// Whether the input is full.
    pub fn is_input_at_max(&self) -> bool {
        self.input.chars().count() >= self.max_message_len
    }

    /// Add a system line.
    pub fn add_system_message(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::system(content));
    }

    /// Add one of our own lines.
    pub fn add_my_message(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::new(MessageAuthor::You, content.into()));
        self.messages_sent += 1;
    }

    /// Add a line from the peer.
    pub fn add_peer_message(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::new(MessageAuthor::Peer, content.into()));
        self.messages_received += 1;
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.scroll_to_bottom();
    }

    /// Set the header status.
    pub fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
    }

    /// Set our rendezvous address.
    pub fn set_my_address(&mut self, address: impl Into<String>) {
        self.my_address = Some(address.into());
    }

    /// Fold a session event into the UI state.
    pub fn apply_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Negotiating { role } => match role {
                Role::Listener => self.set_status(ConnectionStatus::WaitingForPeer),
                Role::Dialer => {
                    self.set_status(ConnectionStatus::Dialing);
                    self.add_system_message("Connecting through the proxy...");
                }
            },
            SessionEvent::Listening { local_addr } => {
                self.set_status(ConnectionStatus::WaitingForPeer);
                let address = self
                    .my_address
                    .clone()
                    .unwrap_or_else(|| local_addr.to_string());
                self.add_system_message(format!("Waiting for a connection at {}...", address));
            }
            SessionEvent::Connected { peer } => {
                self.set_status(ConnectionStatus::Connected);
                self.add_system_message(match self.role {
                    Role::Listener => "Connected.".to_string(),
                    Role::Dialer => format!("Connected to {}.", peer),
                });
                self.peer_address = Some(peer);
            }
            SessionEvent::Inbound(message) => {
                self.add_peer_message(message.text());
            }
            SessionEvent::DeliveryFailed { message, reason } => {
                self.add_system_message(format!(
                    "Failed to send \"{}\": {}",
                    message.text(),
                    reason
                ));
            }
            SessionEvent::Closed { reason } => {
                let reason = reason.to_string();
                self.add_system_message(format!("Session closed: {}.", reason));
                self.set_status(ConnectionStatus::Closed(reason));
            }
        }
    }

    /// Move cursor left.
    pub fn move_cursor_left(&mut self) {
        let cursor_moved_left = self.cursor_position.saturating_sub(1);
        self.cursor_position = self.clamp_cursor(cursor_moved_left);
    }

    /// Move cursor right.
    pub fn move_cursor_right(&mut self) {
        let cursor_moved_right = self.cursor_position.saturating_add(1);
        self.cursor_position = self.clamp_cursor(cursor_moved_right);
    }

    /// Insert a character at the cursor, unless the input is full.
    pub fn enter_char(&mut self, c: char) {
        if self.is_input_at_max() {
            return;
        }
        let index = self.byte_index();
        self.input.insert(index, c);
        self.move_cursor_right();
    }

    /// Delete the character before the cursor.
    pub fn delete_char(&mut self) {
        if self.cursor_position == 0 {
            return;
        }
        let current = self.cursor_position;
        let before = self.input.chars().take(current - 1);
        let after = self.input.chars().skip(current);
        self.input = before.chain(after).collect();
        self.move_cursor_left();
    }

    /// Delete the character under the cursor.
    pub fn delete_char_forward(&mut self) {
        if self.cursor_position >= self.input.chars().count() {
            return;
        }
        let current = self.cursor_position;
        let before = self.input.chars().take(current);
        let after = self.input.chars().skip(current + 1);
        self.input = before.chain(after).collect();
    }

    fn clamp_cursor(&self, new_cursor_pos: usize) -> usize {
        new_cursor_pos.clamp(0, self.input.chars().count())
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .map(|(i, _)| i)
            .nth(self.cursor_position)
            .unwrap_or(self.input.len())
    }

    /// Take the current input and clear it.
    pub fn take_input(&mut self) -> String {
        self.cursor_position = 0;
        std::mem::take(&mut self.input)
    }

    /// Scroll to the newest line.
    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    /// Scroll up by n lines.
    pub fn scroll_up(&mut self, n: usize) {
        let max_scroll = self.messages.len().saturating_sub(1);
        self.scroll_offset = self.scroll_offset.saturating_add(n).min(max_scroll);
    }

    /// Scroll down by n lines.
    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }

    /// Move cursor to start of input.
    pub fn move_cursor_home(&mut self) {
        self.cursor_position = 0;
    }

    /// Move cursor to end of input.
    pub fn move_cursor_end(&mut self) {
        self.cursor_position = self.input.chars().count();
    }

    /// Whether outbound input is accepted.
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}
