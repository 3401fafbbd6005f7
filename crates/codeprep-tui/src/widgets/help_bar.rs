// Help bar: key hints for the active screen.

use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use codeprep_core::protocol::{LlmStatus, ScreenId};

use crate::{SetupFocus, ViewState};

pub fn render(frame: &mut Frame, area: Rect, state: &ViewState) {
    let paragraph = Paragraph::new(Line::from(vec![Span::styled(
        help_text(state),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::DIM),
    )]))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

pub fn help_text(state: &ViewState) -> &'static str {
    match state.screen {
        ScreenId::SignIn => " Tab:Next field | F2:Sign in/Sign up | Enter:Submit | Esc:Quit",
        ScreenId::Dashboard => {
            " q:Quit | 1-5:Screens | c:Category | d:Daily challenge | g:New path | r:Refresh"
        }
        ScreenId::Practice => {
            " q:Quit | j/k:Select | s:Start | t:Stop timer | c:Complete | h:Hints | x:Delete path"
        }
        ScreenId::PathSetup if state.generation_status == LlmStatus::Streaming => {
            " Esc:Cancel generation | PgUp/PgDn:Scroll preview"
        }
        ScreenId::PathSetup => match state.setup.focus {
            SetupFocus::Level => " Tab:Next | ←/→:Level | Enter:Generate | p:Suggestions",
            SetupFocus::Tech => " Tab:Next | j/k:Move | Space:Toggle | Enter:Generate | p:Suggestions",
            SetupFocus::Count => " Tab:Next | 0-9:Count | Backspace:Erase | Enter:Generate",
        },
        ScreenId::Performance => " q:Quit | 1-5:Screens | j/k:Scroll | r:Refresh",
        ScreenId::Settings if state.editing_name => " Enter:Save name | Esc:Discard",
        ScreenId::Settings => " q:Quit | 1-5:Screens | e:Edit name | s:Seed sample data | o:Sign out",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn help_follows_setup_focus() {
        let mut state = ViewState {
            screen: ScreenId::PathSetup,
            ..Default::default()
        };
        assert!(help_text(&state).contains("Level"));
        state.setup.focus = SetupFocus::Count;
        assert!(help_text(&state).contains("0-9"));
        state.generation_status = LlmStatus::Streaming;
        assert!(help_text(&state).contains("Cancel"));
    }

    #[test]
    fn sign_in_help_has_no_quit_key() {
        let state = ViewState::default();
        assert!(!help_text(&state).contains("q:Quit"));
    }
}
