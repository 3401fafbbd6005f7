// TUI widget modules, one per screen plus the shared chrome.

pub mod dashboard;
pub mod help_bar;
pub mod path_setup;
pub mod performance;
pub mod practice;
pub mod quit_confirm;
pub mod settings;
pub mod sign_in;
pub mod status_bar;
pub mod toast;

use ratatui::style::{Color, Modifier, Style};

use codeprep_core::model::{Difficulty, QuestionStatus};

/// Badge color for a difficulty.
pub fn difficulty_color(difficulty: Difficulty) -> Color {
    match difficulty {
        Difficulty::Beginner | Difficulty::Basic => Color::Green,
        Difficulty::Intermediate => Color::Yellow,
        Difficulty::Advanced => Color::Red,
    }
}

/// Marker and color for a question's status.
pub fn status_marker(status: Option<QuestionStatus>) -> (&'static str, Color) {
    match status {
        Some(QuestionStatus::Completed) => ("✓", Color::Green),
        Some(QuestionStatus::InProgress) => ("▶", Color::Yellow),
        Some(QuestionStatus::NotStarted) | None => ("○", Color::DarkGray),
    }
}

/// Border style for a panel, bold cyan when it has focus.
pub fn focused_border_style(focused: bool, base: Style) -> Style {
    if focused {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        base
    }
}

/// A text progress bar `width` cells wide, filled to `percent`.
pub fn progress_bar(percent: u32, width: usize) -> String {
    let filled = (percent.min(100) as usize * width + 50) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Clamp a scroll offset so the last page stays full.
pub fn clamp_scroll(offset: usize, total_lines: usize, visible_rows: usize) -> u16 {
    let max_offset = total_lines.saturating_sub(visible_rows);
    offset.min(max_offset) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0, 4), "░░░░");
        assert_eq!(progress_bar(50, 4), "██░░");
        assert_eq!(progress_bar(100, 4), "████");
        assert_eq!(progress_bar(250, 4), "████");
    }

    #[test]
    fn basic_shares_beginner_color() {
        assert_eq!(difficulty_color(Difficulty::Basic), difficulty_color(Difficulty::Beginner));
    }

    #[test]
    fn clamp_scroll_keeps_last_page() {
        assert_eq!(clamp_scroll(50, 30, 10), 20);
        assert_eq!(clamp_scroll(3, 5, 10), 0);
    }

    #[test]
    fn focus_overrides_base_style() {
        let base = Style::default().fg(Color::Red);
        assert_eq!(focused_border_style(false, base), base);
        assert_eq!(focused_border_style(true, base).fg, Some(Color::Cyan));
    }
}
