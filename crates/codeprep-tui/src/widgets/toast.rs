// Toast line: the latest notification, colored by kind.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use codeprep_core::protocol::{Toast, ToastKind};

pub fn render(frame: &mut Frame, area: Rect, toast: Option<&Toast>) {
    let line = match toast {
        Some(toast) => toast_line(toast),
        None => Line::default(),
    };
    frame.render_widget(Paragraph::new(line), area);
}

pub fn kind_style(kind: ToastKind) -> (&'static str, Color) {
    match kind {
        ToastKind::Info => ("i", Color::Cyan),
        ToastKind::Success => ("✓", Color::Green),
        ToastKind::Warning => ("!", Color::Yellow),
        ToastKind::Error => ("✗", Color::Red),
    }
}

/// " ✓ Title  description" with the description omitted when empty.
pub fn toast_line(toast: &Toast) -> Line<'static> {
    let (icon, color) = kind_style(toast.kind);
    let mut spans = vec![
        Span::styled(format!(" {icon} "), Style::default().fg(color)),
        Span::styled(
            toast.title.clone(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
    ];
    if !toast.description.is_empty() {
        spans.push(Span::styled(
            format!("  {}", toast.description),
            Style::default().fg(Color::Gray),
        ));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_description_is_omitted() {
        let line = toast_line(&Toast::success("Learning path deleted", ""));
        assert_eq!(line.spans.len(), 2);
        assert_eq!(line.spans[1].content, "Learning path deleted");
    }

    #[test]
    fn error_toast_is_red() {
        let line = toast_line(&Toast::error("Sign in failed", "invalid email or password"));
        assert_eq!(line.spans[0].style.fg, Some(Color::Red));
        assert_eq!(line.spans[2].content, "  invalid email or password");
    }

    #[test]
    fn render_does_not_panic_without_toast() {
        let backend = ratatui::backend::TestBackend::new(40, 1);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| render(frame, frame.area(), None))
            .unwrap();
    }
}
