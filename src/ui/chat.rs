use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use fleetview::app::{App, ChatLine, Role};

use super::colors;

fn role_color(role: Role) -> Color {
    match role {
        Role::User => colors::ROLE_USER,
        Role::Bot => colors::ROLE_BOT,
        Role::System => colors::ROLE_SYSTEM,
    }
}

const LABEL_WIDTH: usize = 5;

/// Hard-wraps one message into rows of at most `width` cells. Continuation
/// rows are indented under the text.
fn chat_rows(line: &ChatLine, width: usize) -> Vec<Line<'static>> {
    let body_width = width.saturating_sub(LABEL_WIDTH).max(1);
    let chars: Vec<char> = line.text.chars().collect();
    let mut chunks: Vec<String> = chars.chunks(body_width).map(|c| c.iter().collect()).collect();
    if chunks.is_empty() {
        chunks.push(String::new());
    }

    let label = Span::styled(
        format!("{:>4} ", line.role.label()),
        Style::default().fg(role_color(line.role)).add_modifier(Modifier::BOLD),
    );
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let lead = if i == 0 { label.clone() } else { Span::raw(" ".repeat(LABEL_WIDTH)) };
            Line::from(vec![lead, Span::raw(chunk)])
        })
        .collect()
}

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(format!(" Chat [{}] ", app.session_id))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    // Newest rows that fit, counted after wrapping.
    let max_lines = area.height.saturating_sub(2) as usize;
    let width = area.width.saturating_sub(2) as usize;
    let mut lines: Vec<Line> = Vec::new();
    for entry in app.transcript.iter().rev() {
        if lines.len() >= max_lines {
            break;
        }
        let mut rows = chat_rows(entry, width);
        rows.reverse();
        lines.extend(rows);
    }
    lines.truncate(max_lines);
    lines.reverse();

    let paragraph = if lines.is_empty() {
        Paragraph::new(Line::from(Span::styled(
            "  Type a message, or /help",
            Style::default().fg(Color::DarkGray),
        )))
        .block(block)
    } else {
        Paragraph::new(lines).block(block)
    };

    f.render_widget(paragraph, area);
}
