pub mod chat;
pub mod colors;
pub mod panels;
pub mod topology_view;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use fleetview::app::App;

pub fn render(f: &mut Frame, app: &App) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(50), // top: topology + chat
            Constraint::Min(8),         // tabbed panels
            Constraint::Length(3),      // input line
            Constraint::Length(1),      // status bar
        ])
        .split(f.area());

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(45), // topology
            Constraint::Percentage(55), // chat
        ])
        .split(outer[0]);

    topology_view::render(f, app, top[0]);
    chat::render(f, app, top[1]);
    panels::render(f, app, outer[1]);
    render_input(f, app, outer[2]);
    render_status_bar(f, app, outer[3]);
}

fn render_input(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let line = Line::from(vec![
        Span::styled(" > ", Style::default().fg(Color::Cyan)),
        Span::raw(app.input.as_str()),
        Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let status = match app.notice {
        Some(ref notice) => Line::from(vec![
            Span::styled(" ! ", Style::default().fg(colors::ERROR)),
            Span::raw(notice.as_str()),
        ]),
        None => Line::from(vec![
            Span::styled(" [enter]", Style::default().fg(Color::DarkGray)),
            Span::raw("send "),
            Span::styled("[tab]", Style::default().fg(Color::DarkGray)),
            Span::raw("panel "),
            Span::styled("[↑/↓]", Style::default().fg(Color::DarkGray)),
            Span::raw("topology "),
            Span::styled("[pgup/pgdn]", Style::default().fg(Color::DarkGray)),
            Span::raw("scroll "),
            Span::styled("/help", Style::default().fg(Color::DarkGray)),
            Span::raw(" "),
            Span::styled("[ctrl-c]", Style::default().fg(Color::DarkGray)),
            Span::raw("quit "),
            Span::styled(
                format!(" session: {} ", app.session_id),
                Style::default().fg(colors::HIGHLIGHT_FG),
            ),
        ]),
    };

    f.render_widget(
        Paragraph::new(status).style(Style::default().bg(Color::DarkGray).fg(Color::White)),
        area,
    );
}
