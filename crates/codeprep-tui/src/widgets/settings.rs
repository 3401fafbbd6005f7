// Settings screen: profile, AI status and account actions.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::ViewState;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    frame.render_widget(
        Paragraph::new(settings_lines(state))
            .block(Block::default().borders(Borders::ALL).title("Settings")),
        area,
    );
}

pub fn settings_lines(state: &ViewState) -> Vec<Line<'static>> {
    let label = |t: &str| Span::styled(format!(" {t:<10}"), Style::default().fg(Color::Gray));
    let heading = |t: &str| {
        Line::from(Span::styled(
            format!(" {t}"),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
    };
    let user = state.snapshot.user.as_ref();

    let name_value = if state.editing_name {
        Span::styled(
            format!("{}▏", state.profile_name),
            Style::default().fg(Color::Black).bg(Color::Cyan),
        )
    } else {
        Span::styled(state.profile_name.clone(), Style::default().fg(Color::White))
    };

    let (ai_text, ai_color) = if state.snapshot.llm_available {
        ("enabled", Color::Green)
    } else {
        ("disabled (no API key)", Color::Red)
    };

    vec![
        heading("Profile"),
        Line::from(vec![label("Name"), name_value]),
        Line::from(vec![
            label("Email"),
            Span::raw(user.map(|u| u.email.clone()).unwrap_or_default()),
        ]),
        Line::from(vec![
            label("Role"),
            Span::raw(user.map(|u| u.role.clone()).unwrap_or_default()),
        ]),
        Line::default(),
        heading("AI"),
        Line::from(vec![label("Claude"), Span::styled(ai_text, Style::default().fg(ai_color))]),
        Line::default(),
        heading("Actions"),
        Line::from(" e  Edit display name"),
        Line::from(" s  Seed sample data (replaces the sample path)"),
        Line::from(" o  Sign out"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::signed_in_state;
    use codeprep_core::protocol::ScreenId;

    #[test]
    fn shows_profile_fields() {
        let state = signed_in_state(ScreenId::Settings);
        let lines = settings_lines(&state);
        assert_eq!(lines[1].spans[1].content, "Ada");
        assert_eq!(lines[2].spans[1].content, "ada@example.com");
        assert_eq!(lines[3].spans[1].content, "Dev Student");
        assert_eq!(lines[6].spans[1].content, "enabled");
    }

    #[test]
    fn editing_name_shows_cursor() {
        let mut state = signed_in_state(ScreenId::Settings);
        state.editing_name = true;
        assert_eq!(settings_lines(&state)[1].spans[1].content, "Ada▏");
    }

    #[test]
    fn render_does_not_panic() {
        let backend = ratatui::backend::TestBackend::new(60, 16);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        let state = signed_in_state(ScreenId::Settings);
        terminal
            .draw(|frame| render(frame, frame.area(), &state))
            .unwrap();
    }
}
