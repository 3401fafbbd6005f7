// Status bar widget: signed-in user, screen tabs, LLM availability.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use codeprep_core::protocol::ScreenId;

use crate::ViewState;

/// Layout: [app name] [user] | [tab bar] | [LLM indicator]
pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let mut spans = vec![Span::styled(
        " CodePrep ",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )];

    match &state.snapshot.user {
        Some(user) => {
            spans.push(Span::styled(
                user_label(&user.name, &user.email),
                Style::default().fg(Color::White),
            ));
            spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
            spans.extend(tab_spans(state.screen));
        }
        None => spans.push(Span::styled(
            "not signed in",
            Style::default().fg(Color::DarkGray),
        )),
    }

    let (dot, color) = llm_indicator(state.snapshot.llm_available);
    spans.push(Span::styled(" | ", Style::default().fg(Color::Gray)));
    spans.push(Span::styled(format!("{dot} AI"), Style::default().fg(color)));

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

/// The user's name, or their email when the name is blank.
pub fn user_label<'a>(name: &'a str, email: &'a str) -> &'a str {
    if name.trim().is_empty() {
        email
    } else {
        name
    }
}

pub fn llm_indicator(available: bool) -> (&'static str, Color) {
    if available {
        ("●", Color::Green)
    } else {
        ("●", Color::Red)
    }
}

/// "[1:Dashboard] [2:Practice] ..." with the active screen highlighted.
pub fn tab_spans(active: ScreenId) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    for (i, screen) in ScreenId::NAV.iter().enumerate() {
        let style = if *screen == active {
            Style::default()
                .fg(Color::Black)
                .bg(Color::White)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        spans.push(Span::styled(format!("[{}:{}]", i + 1, screen.title()), style));
        spans.push(Span::raw(" "));
    }
    spans
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::signed_in_state;

    #[test]
    fn tab_spans_highlight_active() {
        let spans = tab_spans(ScreenId::PathSetup);
        // 0=[1:Dashboard], 1=" ", 2=[2:Practice], 3=" ", 4=[3:Path Setup]
        assert!(spans[4].style.add_modifier.contains(Modifier::BOLD));
        assert!(!spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn tab_spans_are_numbered() {
        let spans = tab_spans(ScreenId::Dashboard);
        let labels: Vec<&str> = spans
            .iter()
            .step_by(2)
            .map(|s| s.content.as_ref())
            .collect();
        assert_eq!(
            labels,
            vec![
                "[1:Dashboard]",
                "[2:Practice]",
                "[3:Path Setup]",
                "[4:Performance]",
                "[5:Settings]"
            ]
        );
    }

    #[test]
    fn blank_name_falls_back_to_email() {
        assert_eq!(user_label(" ", "ada@example.com"), "ada@example.com");
        assert_eq!(user_label("Ada", "ada@example.com"), "Ada");
    }

    #[test]
    fn llm_indicator_colors() {
        assert_eq!(llm_indicator(true).1, Color::Green);
        assert_eq!(llm_indicator(false).1, Color::Red);
    }

    #[test]
    fn render_does_not_panic_signed_out_or_in() {
        for state in [crate::ViewState::default(), signed_in_state(ScreenId::Practice)] {
            let backend = ratatui::backend::TestBackend::new(80, 1);
            let mut terminal = ratatui::Terminal::new(backend).unwrap();
            terminal
                .draw(|frame| render(frame, frame.area(), &state))
                .unwrap();
        }
    }
}
