// Sign-in screen: email/password form, with a name field in sign-up mode.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::{AuthMode, SignInField, SignInForm, ViewState};

use super::quit_confirm::centered_rect;

const FORM_WIDTH: u16 = 54;
const FORM_HEIGHT: u16 = 12;

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let form = &state.sign_in;
    let title = match form.mode {
        AuthMode::SignIn => " Sign in to CodePrep ",
        AuthMode::SignUp => " Create your account ",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        ));
    let paragraph = Paragraph::new(form_lines(form)).block(block);
    frame.render_widget(paragraph, centered_rect(FORM_WIDTH, FORM_HEIGHT, area));
}

fn form_lines(form: &SignInForm) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            " Practice coding interviews with AI-built learning paths.",
            Style::default().fg(Color::Gray),
        )),
        Line::default(),
        field_line("Email", &form.email, form.field == SignInField::Email),
        field_line(
            "Password",
            &mask(&form.password),
            form.field == SignInField::Password,
        ),
    ];
    if form.mode == AuthMode::SignUp {
        lines.push(field_line("Name", &form.name, form.field == SignInField::Name));
    }
    lines.push(Line::default());
    let switch_hint = match form.mode {
        AuthMode::SignIn => " No account yet? Press F2 to sign up.",
        AuthMode::SignUp => " Already registered? Press F2 to sign in.",
    };
    lines.push(Line::from(Span::styled(
        switch_hint,
        Style::default().fg(Color::DarkGray),
    )));
    lines
}

fn field_line(label: &str, value: &str, active: bool) -> Line<'static> {
    let label_style = if active {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let cursor = if active { "▏" } else { "" };
    Line::from(vec![
        Span::styled(format!(" {label:<9}"), label_style),
        Span::styled(format!("{value}{cursor}"), Style::default().fg(Color::White)),
    ])
}

/// One bullet per password character.
pub fn mask(password: &str) -> String {
    "•".repeat(password.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_is_masked() {
        assert_eq!(mask("pw1"), "•••");
        assert_eq!(mask(""), "");
    }

    #[test]
    fn name_field_only_in_sign_up() {
        let mut form = SignInForm::default();
        let sign_in_lines = form_lines(&form).len();
        form.toggle_mode();
        assert_eq!(form_lines(&form).len(), sign_in_lines + 1);
    }

    #[test]
    fn password_never_rendered_in_clear() {
        let mut state = ViewState::default();
        state.sign_in.password = "hunter22".into();
        let backend = ratatui::backend::TestBackend::new(80, 20);
        let mut terminal = ratatui::Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| render(frame, frame.area(), &state))
            .unwrap();
        let rendered: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(!rendered.contains("hunter22"));
        assert!(rendered.contains("Password"));
    }
}
