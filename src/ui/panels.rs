use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Tabs};

use fleetview::app::{App, Tab, View};
use fleetview::setup::FormField;

use super::colors;

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // tab bar
            Constraint::Min(1),    // content
        ])
        .split(inner);

    let selected = Tab::ALL.iter().position(|t| *t == app.tab).unwrap_or(0);
    let tabs = Tabs::new(Tab::ALL.iter().map(|t| t.title()))
        .select(selected)
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(
            Style::default()
                .fg(colors::HIGHLIGHT_FG)
                .bg(colors::HIGHLIGHT_BG)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, rows[0]);

    let lines = match app.tab.view() {
        Some(View::Sessions) => session_lines(app),
        Some(view) => json_lines(app, view),
        None if app.tab == Tab::Setup => setup_lines(app),
        None => config_lines(app),
    };
    f.render_widget(Paragraph::new(lines).scroll((app.panel_scroll, 0)), rows[1]);
}

fn status_line(text: &str, color: Color) -> Line<'_> {
    Line::from(Span::styled(format!(" {text}"), Style::default().fg(color)))
}

fn json_lines(app: &App, view: View) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    match app.panel(view) {
        None => lines.push(status_line("Loading...", Color::DarkGray)),
        Some(panel) => {
            if let Some(ref err) = panel.error {
                lines.push(status_line(err, colors::ERROR));
            }
            lines.extend(panel.body.lines().map(|l| Line::from(format!(" {l}"))));
        }
    }
    lines
}

fn session_lines(app: &App) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    for entry in &app.sessions {
        let current = entry.session_id == app.session_id;
        let (marker, style) = if current {
            ("> ", Style::default().fg(colors::HIGHLIGHT_FG).add_modifier(Modifier::BOLD))
        } else {
            ("  ", Style::default().fg(Color::White))
        };
        lines.push(Line::from(Span::styled(format!(" {marker}{}", entry.label()), style)));
    }
    if !app.sessions.is_empty() {
        lines.push(status_line("/session <id> to switch", Color::DarkGray));
        lines.push(Line::from(""));
    }
    lines.extend(json_lines(app, View::Sessions));
    lines
}

fn setup_lines(app: &App) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    if !app.setup_status.is_empty() {
        let color = if app.setup_status.starts_with("Error") || app.setup_status.contains("error:") {
            colors::ERROR
        } else {
            colors::ACCENT_MUTED
        };
        lines.push(status_line(&app.setup_status, color));
    }
    for field in FormField::ALL {
        let mut value = app.form.display(field);
        if field.is_secret() && value.is_empty() {
            value = "(not set)".to_string();
        }
        lines.push(Line::from(vec![
            Span::styled(format!(" {:<24}", field.name()), Style::default().fg(Color::DarkGray)),
            Span::styled(value, Style::default().fg(Color::White)),
        ]));
    }
    lines.push(status_line(
        "/set <field> <value>   /setup apply | load | test",
        Color::DarkGray,
    ));
    if !app.setup_raw.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            " Server state",
            Style::default().fg(colors::ACCENT_MUTED).add_modifier(Modifier::BOLD),
        )));
        lines.extend(app.setup_raw.lines().map(|l| Line::from(format!(" {l}"))));
    }
    lines
}

fn config_lines(app: &App) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    if !app.config_status.is_empty() {
        let color = if app.config_status == "Config saved" || app.config_status == "Config loaded" {
            colors::ACCENT_MUTED
        } else {
            colors::ERROR
        };
        lines.push(status_line(&app.config_status, color));
    }
    lines.extend(app.config_editor.lines().map(|l| Line::from(format!(" {l}"))));
    lines
}
