//! Shared color palette for the TUI.

use ratatui::style::Color;

// ── Agent status ────────────────────────────────────────────────────
pub const STATUS_RUNNING: Color = Color::Rgb(80, 220, 120);
pub const STATUS_IDLE: Color = Color::Rgb(160, 160, 160);
pub const STATUS_DONE: Color = Color::Rgb(80, 140, 255);
pub const STATUS_FAILED: Color = Color::Rgb(230, 90, 80);
pub const STATUS_OTHER: Color = Color::White;

// ── Transcript roles ────────────────────────────────────────────────
pub const ROLE_USER: Color = Color::Rgb(255, 220, 150);
pub const ROLE_BOT: Color = Color::Rgb(120, 160, 220);
pub const ROLE_SYSTEM: Color = Color::Rgb(120, 120, 120);

// ── Accent / chrome ─────────────────────────────────────────────────
pub const ACCENT_MUTED: Color = Color::Rgb(120, 120, 180);
pub const ERROR: Color = Color::Rgb(230, 160, 60);
pub const HIGHLIGHT_BG: Color = Color::Rgb(60, 55, 50);
pub const HIGHLIGHT_FG: Color = Color::Rgb(255, 220, 150);

pub fn status_color(status: &str) -> Color {
    match status {
        "running" | "active" | "busy" => STATUS_RUNNING,
        "idle" | "waiting" => STATUS_IDLE,
        "done" | "completed" | "finished" => STATUS_DONE,
        "failed" | "error" | "crashed" => STATUS_FAILED,
        _ => STATUS_OTHER,
    }
}
