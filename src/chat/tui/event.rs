//! Event handling for the TUI.

use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc;

use super::app::App;
use crate::chat::error::ChatError;

/// Terminal events.
#[derive(Debug)]
pub enum Event {
    /// Poll timeout, used to redraw.
    Tick,
    /// Keyboard event.
    Key(KeyEvent),
    /// Terminal resize.
    Resize(u16, u16),
}

/// Reads terminal events on a blocking thread and forwards them.
pub struct EventHandler {
    tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Create a new event handler.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Start forwarding terminal events, polling every `tick_rate`.
    ///
    /// The reader stops once the handler is dropped.
    pub fn spawn_reader(&self, tick_rate: Duration) {
        let tx = self.tx.clone();
        tokio::task::spawn_blocking(move || loop {
            let event = match event::poll(tick_rate) {
                Ok(true) => match event::read() {
                    Ok(CrosstermEvent::Key(key)) => Event::Key(key),
                    Ok(CrosstermEvent::Resize(w, h)) => Event::Resize(w, h),
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "terminal read failed");
                        break;
                    }
                },
                Ok(false) => Event::Tick,
                Err(e) => {
                    tracing::warn!(error = %e, "terminal poll failed");
                    break;
                }
            };
            if tx.send(event).is_err() {
                break;
            }
        });
    }

    /// Receive the next event.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of handling a key event.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// Nothing for the caller to do.
    None,
    /// Shut the session down and leave.
    Quit,
    /// Submit the current input.
    Submit,
}

/// Handle a key event and update app state.
pub fn handle_key_event(app: &mut App, key: KeyEvent) -> KeyAction {
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('q')
            if key.modifiers.contains(KeyModifiers::CONTROL) =>
        {
            app.should_quit = true;
            KeyAction::Quit
        }

        KeyCode::Esc => {
            app.should_quit = true;
            KeyAction::Quit
        }

        KeyCode::Enter => {
            if app.input.trim().is_empty() {
                KeyAction::None
            } else {
                KeyAction::Submit
            }
        }

        KeyCode::Backspace => {
            app.delete_char();
            KeyAction::None
        }
        KeyCode::Delete => {
            app.delete_char_forward();
            KeyAction::None
        }

        KeyCode::Left => {
            app.move_cursor_left();
            KeyAction::None
        }
        KeyCode::Right => {
            app.move_cursor_right();
            KeyAction::None
        }
        KeyCode::Home => {
            app.move_cursor_home();
            KeyAction::None
        }
        KeyCode::End => {
            app.move_cursor_end();
            KeyAction::None
        }

        KeyCode::PageUp => {
            app.scroll_up(5);
            KeyAction::None
        }
        KeyCode::PageDown => {
            app.scroll_down(5);
            KeyAction::None
        }
        KeyCode::Up if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(1);
            KeyAction::None
        }
        KeyCode::Down if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(1);
            KeyAction::None
        }

        KeyCode::Char(c) => {
            app.enter_char(c);
            KeyAction::None
        }

        _ => KeyAction::None,
    }
}

/// Handle the submitted input: run a `/command` or hand the line to `send`.
///
/// Our own line is echoed into the history only once `send` accepted it.
pub fn handle_submit<F>(app: &mut App, send: F) -> KeyAction
where
    F: FnOnce(&str) -> Result<(), ChatError>,
{
    let input = app.take_input();
    if input.starts_with('/') {
        return handle_command(app, &input);
    }

    match send(&input) {
        Ok(()) => app.add_my_message(input),
        Err(ChatError::NotConnected) => app.add_system_message("Not connected yet."),
        Err(ChatError::SessionClosed) => {
            app.add_system_message("Session is closed. Press Esc to quit.")
        }
        Err(e) => app.add_system_message(format!("Send failed: {}", e)),
    }
    KeyAction::None
}

/// Handle special commands starting with /.
pub fn handle_command(app: &mut App, command: &str) -> KeyAction {
    let parts: Vec<&str> = command.split_whitespace().collect();
    let Some(name) = parts.first() else {
        return KeyAction::None;
    };

    match *name {
        "/quit" | "/q" | "/exit" => {
            app.should_quit = true;
            KeyAction::Quit
        }
        "/help" | "/h" | "/?" => {
            app.add_system_message("Commands:");
            app.add_system_message("  /quit, /q    - Close the session and exit");
            app.add_system_message("  /status, /s  - Show session status");
            app.add_system_message("  /clear, /c   - Clear message history");
            app.add_system_message("  /help, /h    - Show this help");
            KeyAction::None
        }
        "/status" | "/s" => {
            app.add_system_message(format!("Status: {} ({})", app.status.display(), app.role));
            if let Some(address) = app.my_address.clone() {
                app.add_system_message(format!("Your address: {}", address));
            }
            if let Some(peer) = app.peer_address.clone() {
                app.add_system_message(format!("Peer: {}", peer));
            }
            app.add_system_message(format!(
                "Messages: {} sent, {} received",
                app.messages_sent, app.messages_received
            ));
            KeyAction::None
        }
        "/clear" | "/c" => {
            app.messages.clear();
            app.add_system_message("Chat history cleared");
            KeyAction::None
        }
        other => {
            app.add_system_message(format!("Unknown command: {}", other));
            app.add_system_message("Type /help for available commands");
            KeyAction::None
        }
    }
}
