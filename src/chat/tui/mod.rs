//! Terminal user interface for a chat session.
//!
//! The UI loop owns [`App`]; background tasks only publish events that the
//! loop folds in with [`App::apply_session_event`].

mod app;
pub mod event;
mod ui;

pub use app::{App, ChatMessage, ConnectionStatus, MessageAuthor, DEFAULT_MAX_MESSAGE_LEN};
pub use event::{handle_command, handle_key_event, handle_submit, Event, EventHandler, KeyAction};
pub use ui::render;

use std::io;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::chat::error::ChatError;

/// Terminal type used by the chat UI.
pub type ChatTerminal = Terminal<CrosstermBackend<io::Stdout>>;

/// Switch the terminal to raw mode on the alternate screen.
pub fn init_terminal() -> Result<ChatTerminal, ChatError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

/// Restore the terminal to normal mode.
pub fn restore_terminal(terminal: &mut ChatTerminal) -> Result<(), ChatError> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
