//! UI rendering for the TUI.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use super::app::{App, ConnectionStatus, MessageAuthor};
use crate::chat::negotiator::Role;

/// Main render function.
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // status bar
            Constraint::Min(5),    // history
            Constraint::Length(3), // input
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_messages(frame, app, chunks[1]);
    render_input(frame, app, chunks[2]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let status_color = match app.status {
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Closed(_) => Color::Red,
        ConnectionStatus::Idle => Color::DarkGray,
        _ => Color::Yellow,
    };

    let title = match app.role {
        Role::Listener => " hiddenchat - hosting ",
        Role::Dialer => " hiddenchat - joining ",
    };

    let mut spans = vec![Span::styled(
        format!(" {} ", app.status.display()),
        Style::default()
            .fg(status_color)
            .add_modifier(Modifier::BOLD),
    )];

    if let Some(ref address) = app.my_address {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            truncate_address(address),
            Style::default().fg(Color::Cyan),
        ));
    }

    spans.push(Span::raw(" | "));
    spans.push(Span::styled(
        format!("{}↑ {}↓", app.messages_sent, app.messages_received),
        Style::default().fg(Color::DarkGray),
    ));

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(header, area);
}

/// Word-aware wrapping; words longer than a line are broken.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_width = 0;

    for word in text.split_inclusive(char::is_whitespace) {
        let word_len = word.chars().count();

        if current_width + word_len <= max_width {
            current_line.push_str(word);
            current_width += word_len;
        } else if word_len > max_width {
            if !current_line.is_empty() {
                lines.push(std::mem::take(&mut current_line));
                current_width = 0;
            }
            for ch in word.chars() {
                if current_width >= max_width {
                    lines.push(std::mem::take(&mut current_line));
                    current_width = 0;
                }
                current_line.push(ch);
                current_width += 1;
            }
        } else {
            if !current_line.is_empty() {
                lines.push(current_line);
            }
            current_line = word.to_string();
            current_width = word_len;
        }
    }

    if !current_line.is_empty() || lines.is_empty() {
        lines.push(current_line);
    }

    lines
}

fn render_messages(frame: &mut Frame, app: &App, area: Rect) {
    let inner_height = area.height.saturating_sub(2) as usize;
    let inner_width = area.width.saturating_sub(2) as usize;

    let mut all_lines: Vec<Line> = Vec::new();

    for msg in &app.messages {
        let (prefix, style) = match msg.author {
            MessageAuthor::You => (
                format!("[{}] you: ", msg.formatted_time()),
                Style::default().fg(Color::Green),
            ),
            MessageAuthor::Peer => (
                format!("[{}] peer: ", msg.formatted_time()),
                Style::default().fg(Color::Blue),
            ),
            MessageAuthor::System => (
                format!("[{}] ", msg.formatted_time()),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::ITALIC),
            ),
        };

        let prefix_len = prefix.chars().count();
        let content_width = inner_width.saturating_sub(prefix_len);

        for (i, part) in wrap_text(&msg.content, content_width).into_iter().enumerate() {
            let lead = if i == 0 {
                Span::styled(prefix.clone(), style)
            } else {
                Span::raw(" ".repeat(prefix_len))
            };
            all_lines.push(Line::from(vec![lead, Span::raw(part)]));
        }
    }

    let total_lines = all_lines.len();
    let start_index = total_lines
        .saturating_sub(inner_height)
        .saturating_sub(app.scroll_offset);
    let end_index = start_index.saturating_add(inner_height).min(total_lines);

    let items: Vec<ListItem> = all_lines
        .drain(start_index..end_index)
        .map(ListItem::new)
        .collect();

    let scroll_indicator = if app.scroll_offset > 0 {
        format!(" [↑{}] ", app.scroll_offset)
    } else {
        String::new()
    };

    let messages = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Messages{}", scroll_indicator))
            .border_style(Style::default().fg(Color::White)),
    );

    frame.render_widget(messages, area);
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    let connected = app.is_connected();
    let placeholder = match &app.status {
        ConnectionStatus::Connected => "Type a message... (Esc to quit)",
        ConnectionStatus::Closed(_) => "Session closed. Esc to quit.",
        _ => "Waiting for connection...",
    };

    // Keep the cursor inside the visible window.
    let inner_width = area.width.saturating_sub(2) as usize;
    let input_chars: Vec<char> = app.input.chars().collect();
    let end_limit = input_chars.len();
    let start = if inner_width > 0
        && end_limit > inner_width
        && app.cursor_position >= inner_width
    {
        (app.cursor_position + 1 - inner_width).min(end_limit)
    } else {
        0
    };
    let end = (start + inner_width).min(end_limit);

    let (display_text, text_style) = if app.input.is_empty() {
        (placeholder.to_string(), Style::default().fg(Color::DarkGray))
    } else if connected {
        (
            input_chars[start..end].iter().collect(),
            Style::default().fg(Color::White),
        )
    } else {
        (
            input_chars[start..end].iter().collect(),
            Style::default().fg(Color::DarkGray),
        )
    };

    let remaining = app.remaining_chars();
    let counter_style = if remaining == 0 {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else if remaining <= 20 {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let counter_text = format!(" {}/{} ", input_chars.len(), app.max_message_len);

    let border_color = if connected { Color::Green } else { Color::DarkGray };

    let input = Paragraph::new(display_text)
        .style(text_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Input ")
                .title_bottom(Line::from(Span::styled(counter_text, counter_style)).right_aligned())
                .border_style(Style::default().fg(border_color)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(input, area);

    if connected && area.width > 2 {
        let cursor_x = area.x + 1 + (app.cursor_position - start) as u16;
        let cursor_y = area.y + 1;
        frame.set_cursor_position((cursor_x.min(area.x + area.width - 2), cursor_y));
    }
}

/// Shorten long onion addresses for the status bar.
fn truncate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() > 24 {
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 12..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        address.to_string()
    }
}
