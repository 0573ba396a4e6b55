use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use fleetview::app::App;
use fleetview::topology::{AgentNode, TopologyLayout};

use super::colors;

pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let title = if app.topology_nodes > 0 {
        format!(" Agent Topology ({}) ", app.topology_nodes)
    } else {
        " Agent Topology ".to_string()
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let mut lines = Vec::new();
    if let Some(ref err) = app.topology_error {
        lines.push(Line::from(Span::styled(
            format!(" refresh failed: {err}"),
            Style::default().fg(colors::ERROR),
        )));
    }

    match &app.topology {
        Some(layout) if app.topology_nodes > 0 => {
            layout_lines(layout, app.topology_hidden, &mut lines);
        }
        _ => lines.push(Line::from(Span::styled(
            "  No agents active yet.",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((app.topology_scroll, 0));
    f.render_widget(paragraph, area);
}

fn layout_lines(layout: &TopologyLayout, hidden: usize, lines: &mut Vec<Line<'static>>) {
    if !layout.edges.is_empty() {
        lines.push(Line::from(Span::styled(
            " Edges",
            Style::default().fg(colors::ACCENT_MUTED).add_modifier(Modifier::BOLD),
        )));
        for edge in &layout.edges {
            lines.push(Line::from(Span::styled(
                format!("   {edge}"),
                Style::default().fg(Color::Gray),
            )));
        }
        lines.push(Line::from(""));
    }

    for (depth, level) in layout.levels.iter().enumerate() {
        lines.push(Line::from(Span::styled(
            format!(" L{depth}"),
            Style::default().fg(colors::ACCENT_MUTED).add_modifier(Modifier::BOLD),
        )));
        for node in level {
            lines.push(node_line(node));
        }
    }

    if hidden > 0 {
        lines.push(Line::from(Span::styled(
            format!("  {hidden} unreachable (orphan or cyclic)"),
            Style::default().fg(Color::DarkGray),
        )));
    }
}

fn node_line(node: &AgentNode) -> Line<'static> {
    Line::from(vec![
        Span::raw("   "),
        Span::styled(
            node.agent_id.clone(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" [{}] ", node.role), Style::default().fg(Color::DarkGray)),
        Span::styled(
            node.status.clone(),
            Style::default().fg(colors::status_color(&node.status)),
        ),
        Span::styled(
            format!("  task={} tok={}", node.task_label(), node.token_usage),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}
