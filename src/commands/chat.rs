//! Chat command: run one session in the terminal UI.
//!
//! ## Usage
//!
//! - `hiddenchat chat --listen` - host: wait for the peer on the chat port
//! - `hiddenchat chat --connect <ADDR>` - join: dial the peer's address
//! - `hiddenchat chat` - ask which of the two to do

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::mpsc;

use hiddenchat::chat::tui::{
    handle_key_event, handle_submit, init_terminal, render, restore_terminal, App, ChatTerminal,
    Event, EventHandler, KeyAction,
};
use hiddenchat::chat::{
    CloseReason, DuplexRelay, ProxyDialer, Role, SessionController, SessionEvent,
    SessionNegotiator,
};

use super::{load_identity, CommandExecutor, ConfigArgs};

/// How often the terminal reader wakes up when idle.
const TICK_RATE: Duration = Duration::from_millis(100);

/// Start a chat session.
///
/// With neither --listen nor --connect, you are asked whether to host.
#[derive(Args, Debug, Default)]
pub struct ChatCommand {
    /// Host the session: wait for the peer on the chat port
    #[arg(short, long, conflicts_with = "connect")]
    pub listen: bool,

    /// Join the session hosted at this rendezvous address (e.g. xyz.onion)
    #[arg(short, long, value_name = "ADDR")]
    pub connect: Option<String>,

    /// Log file (default: <data dir>/hiddenchat/hiddenchat.log, else the temp dir)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(flatten)]
    pub settings: ConfigArgs,
}

impl CommandExecutor for ChatCommand {
    fn execute(&self) -> Result<()> {
        let config = self.settings.resolve()?;
        let identity = load_identity(&config)?;

        let (role, peer) = match (self.listen, &self.connect) {
            (true, _) => (Role::Listener, None),
            (false, Some(addr)) => (Role::Dialer, Some(addr.clone())),
            (false, None) => prompt_role()?,
        };

        tracing::info!(%role, proxy = %config.proxy, port = config.chat_port, "starting chat");

        let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
        let reason = rt.block_on(async {
            let dialer = Arc::new(ProxyDialer::new(config.proxy.clone()));
            let negotiator = SessionNegotiator::from_config(&config, dialer);
            let relay = DuplexRelay::new(config.read_chunk_size);

            let (session, session_events) =
                SessionController::start(negotiator, relay, role, peer.as_deref())?;

            let mut app = App::new(role);
            app.set_my_address(identity.address());
            app.add_system_message(format!("Your address: {}", identity.address()));
            app.add_system_message("Type /help for commands. Esc to quit.");

            run_chat_loop(&mut app, session, session_events).await
        })?;

        println!("Session closed: {}", reason);
        Ok(())
    }
}

impl ChatCommand {
    /// Log file for this command. Always a file: the TUI owns the terminal.
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| default_log_path(dirs::data_dir()))
    }
}

fn default_log_path(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir
        .unwrap_or_else(std::env::temp_dir)
        .join("hiddenchat")
        .join("hiddenchat.log")
}

/// Ask for the role on the terminal, the way the operator would answer a dialog.
fn prompt_role() -> Result<(Role, Option<String>)> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();
    choose_role(&mut input, &mut stdout)
}

fn choose_role<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<(Role, Option<String>)> {
    write!(output, "Host a chat room? [y/N]: ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer).context("Failed to read answer")?;

    if matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
        return Ok((Role::Listener, None));
    }

    write!(output, "Peer address to connect to: ")?;
    output.flush()?;
    let mut address = String::new();
    input.read_line(&mut address).context("Failed to read address")?;
    Ok((Role::Dialer, Some(address.trim().to_string())))
}

/// Run the TUI until the operator quits, then shut the session down.
async fn run_chat_loop(
    app: &mut App,
    session: SessionController,
    session_events: mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<CloseReason> {
    let mut terminal = init_terminal().context("Failed to initialize terminal")?;

    let events = EventHandler::new();
    events.spawn_reader(TICK_RATE);

    let result = run_tui_loop(&mut terminal, app, events, &session, session_events).await;

    session.shutdown();
    restore_terminal(&mut terminal).context("Failed to restore terminal")?;
    result?;

    Ok(session.join().await)
}

async fn run_tui_loop(
    terminal: &mut ChatTerminal,
    app: &mut App,
    mut events: EventHandler,
    session: &SessionController,
    mut session_events: mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<()> {
    loop {
        terminal.draw(|frame| render(frame, app))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Event::Key(key)) => {
                    let action = match handle_key_event(app, key) {
                        KeyAction::Submit => handle_submit(app, |line| session.send(line)),
                        other => other,
                    };
                    if action == KeyAction::Quit {
                        return Ok(());
                    }
                }
                Some(Event::Tick) | Some(Event::Resize(_, _)) => {}
                None => return Ok(()),
            },

            Some(event) = session_events.recv() => {
                if let SessionEvent::Closed { reason } = &event {
                    tracing::info!(%reason, "session ended");
                }
                app.apply_session_event(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    #[test]
    fn test_choose_host() {
        let mut input = Cursor::new(b"y\n".to_vec());
        let mut output = Vec::new();
        let (role, peer) = choose_role(&mut input, &mut output).unwrap();
        assert_eq!(role, Role::Listener);
        assert!(peer.is_none());
    }

    #[test]
    fn test_choose_join_reads_address() {
        let mut input = Cursor::new(b"n\n  abc.onion \n".to_vec());
        let mut output = Vec::new();
        let (role, peer) = choose_role(&mut input, &mut output).unwrap();
        assert_eq!(role, Role::Dialer);
        assert_eq!(peer.as_deref(), Some("abc.onion"));
        assert!(String::from_utf8(output).unwrap().contains("Peer address"));
    }

    #[test]
    fn test_log_path_prefers_flag() {
        let cmd = ChatCommand {
            log_file: Some(PathBuf::from("/var/log/chat.log")),
            ..Default::default()
        };
        assert_eq!(cmd.log_path(), PathBuf::from("/var/log/chat.log"));
    }

    #[test]
    fn test_log_path_without_data_dir_uses_temp_dir() {
        let path = default_log_path(None);
        assert!(path.starts_with(std::env::temp_dir()));
        assert!(path.ends_with("hiddenchat/hiddenchat.log"));

        let path = default_log_path(Some(PathBuf::from("/data")));
        assert_eq!(path, PathBuf::from("/data/hiddenchat/hiddenchat.log"));
    }
}
