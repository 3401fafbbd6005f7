// Keyboard input handling and command dispatch.
//
// Translates crossterm key events into UserCommand messages for the app
// loop, or into local ViewState mutations (form editing, selection,
// scrolling).

use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use codeprep_core::protocol::{LlmStatus, ScreenId, UserCommand};
use codeprep_practice::analytics;

use crate::{practice_items, PracticeTimer, SetupFocus, ViewState};

/// Rows moved by PageUp/PageDown.
const PAGE_SIZE: usize = 10;

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key press should be forwarded to
/// the app loop, `None` when it was handled locally.
pub fn handle_key(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    // crossterm on Windows reports Release as well as Press.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    if key_event.modifiers.contains(KeyModifiers::CONTROL) && key_event.code == KeyCode::Char('c')
    {
        return Some(UserCommand::Quit);
    }

    if view_state.confirm_quit {
        return handle_confirm_quit(key_event, view_state);
    }

    // Text-entry modes capture printable keys before the global bindings.
    match view_state.screen {
        ScreenId::SignIn => return handle_sign_in(key_event, view_state),
        ScreenId::Settings if view_state.editing_name => {
            return handle_name_edit(key_event, view_state)
        }
        ScreenId::PathSetup if view_state.setup.focus == SetupFocus::Count => {
            if handle_count_edit(key_event, view_state) {
                return None;
            }
        }
        _ => {}
    }

    match key_event.code {
        KeyCode::Char('q') => {
            view_state.confirm_quit = true;
            None
        }
        KeyCode::Char(c @ '1'..='5') => {
            let idx = (c as usize) - ('1' as usize);
            Some(UserCommand::SwitchScreen(ScreenId::NAV[idx]))
        }
        KeyCode::Char('r') => Some(UserCommand::Refresh),
        _ => match view_state.screen {
            ScreenId::Dashboard => handle_dashboard(key_event, view_state),
            ScreenId::Practice => handle_practice(key_event, view_state),
            ScreenId::PathSetup => handle_path_setup(key_event, view_state),
            ScreenId::Performance => handle_performance(key_event, view_state),
            ScreenId::Settings => handle_settings(key_event, view_state),
            ScreenId::SignIn => None,
        },
    }
}

fn handle_confirm_quit(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('q') => Some(UserCommand::Quit),
        KeyCode::Char('n') | KeyCode::Esc => {
            view_state.confirm_quit = false;
            None
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Sign in
// ---------------------------------------------------------------------------

fn handle_sign_in(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    let form = &mut view_state.sign_in;
    match key_event.code {
        KeyCode::Esc => {
            view_state.confirm_quit = true;
            None
        }
        KeyCode::Tab | KeyCode::Down => {
            form.next_field();
            None
        }
        KeyCode::BackTab | KeyCode::Up => {
            form.prev_field();
            None
        }
        KeyCode::F(2) => {
            form.toggle_mode();
            None
        }
        KeyCode::Enter => Some(form.submit()),
        KeyCode::Backspace => {
            form.active_mut().pop();
            None
        }
        KeyCode::Char(c) => {
            form.active_mut().push(c);
            None
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

fn handle_dashboard(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('c') => Some(UserCommand::SelectCategory(next_category(view_state))),
        KeyCode::Char('d') => {
            let challenge_id = view_state
                .snapshot
                .daily_challenge
                .as_ref()?
                .question
                .id
                .clone();
            if let Some(idx) = practice_items(&view_state.snapshot)
                .iter()
                .position(|(_, q)| q.id == challenge_id)
            {
                view_state.selected_question = idx;
            }
            Some(UserCommand::SwitchScreen(ScreenId::Practice))
        }
        KeyCode::Char('g') => Some(UserCommand::SwitchScreen(ScreenId::PathSetup)),
        KeyCode::Up | KeyCode::Char('k') => {
            scroll_up(view_state, "dashboard", 1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            scroll_down(view_state, "dashboard", 1);
            None
        }
        _ => None,
    }
}

/// Category after the current filter: "all", then each category in order.
fn next_category(view_state: &ViewState) -> String {
    let mut options = vec!["all".to_string()];
    options.extend(
        analytics::categories(&view_state.snapshot.paths)
            .into_iter()
            .filter(|c| c != "all"),
    );
    let current = options
        .iter()
        .position(|c| *c == view_state.snapshot.category_filter)
        .unwrap_or(0);
    options[(current + 1) % options.len()].clone()
}

// ---------------------------------------------------------------------------
// Practice
// ---------------------------------------------------------------------------

fn handle_practice(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    let count = practice_items(&view_state.snapshot).len();
    match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => {
            view_state.selected_question = view_state.selected_question.saturating_sub(1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if view_state.selected_question + 1 < count {
                view_state.selected_question += 1;
            }
            None
        }
        KeyCode::Char('h') => {
            view_state.show_hints = !view_state.show_hints;
            None
        }
        KeyCode::Enter | KeyCode::Char('s') => {
            let (path_id, question_id) = selected_ids(view_state)?;
            view_state.timer = Some(PracticeTimer {
                path_id: path_id.clone(),
                question_id: question_id.clone(),
                started: Instant::now(),
            });
            Some(UserCommand::MarkInProgress {
                path_id,
                question_id,
            })
        }
        KeyCode::Char('t') => {
            let timer = view_state.timer.take()?;
            Some(UserCommand::RecordTime {
                path_id: timer.path_id,
                question_id: timer.question_id,
                seconds: timer.started.elapsed().as_secs(),
            })
        }
        KeyCode::Char('c') => {
            let (path_id, question_id) = selected_ids(view_state)?;
            if view_state
                .timer
                .as_ref()
                .is_some_and(|t| t.question_id == question_id && t.path_id == path_id)
            {
                view_state.timer = None;
            }
            Some(UserCommand::MarkComplete {
                path_id,
                question_id,
            })
        }
        KeyCode::Char('x') => {
            let (path_id, _) = selected_ids(view_state)?;
            Some(UserCommand::DeletePath { path_id })
        }
        _ => None,
    }
}

fn selected_ids(view_state: &ViewState) -> Option<(String, String)> {
    view_state
        .selected_item()
        .map(|(p, q)| (p.id.clone(), q.id.clone()))
}

// ---------------------------------------------------------------------------
// Path setup
// ---------------------------------------------------------------------------

/// Digits and Backspace edit the count while it has focus. Returns true
/// when the key was consumed.
fn handle_count_edit(key_event: KeyEvent, view_state: &mut ViewState) -> bool {
    match key_event.code {
        KeyCode::Char(c) if c.is_ascii_digit() => {
            view_state.setup.count_text.push(c);
            true
        }
        KeyCode::Backspace => {
            view_state.setup.count_text.pop();
            true
        }
        _ => false,
    }
}

fn handle_path_setup(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    let setup = &mut view_state.setup;
    match key_event.code {
        KeyCode::Tab => {
            if setup.focus == SetupFocus::Count {
                commit_count(view_state);
            }
            view_state.setup.focus = view_state.setup.focus.next();
            None
        }
        KeyCode::Left | KeyCode::Right if setup.focus == SetupFocus::Level => {
            setup.shift_level(key_event.code == KeyCode::Right);
            None
        }
        KeyCode::Up | KeyCode::Char('k') if setup.focus == SetupFocus::Tech => {
            setup.move_cursor(false);
            None
        }
        KeyCode::Down | KeyCode::Char('j') if setup.focus == SetupFocus::Tech => {
            setup.move_cursor(true);
            None
        }
        KeyCode::Char(' ') if setup.focus == SetupFocus::Tech => {
            setup.toggle_tech();
            None
        }
        KeyCode::Enter | KeyCode::Char('g') => {
            if view_state.generation_status == LlmStatus::Streaming {
                return None;
            }
            let count = commit_count(view_state);
            Some(view_state.setup.generate_command(count))
        }
        KeyCode::Char('p') => {
            let skill_level = setup.skill_level();
            let tech_stack = setup.selected.clone();
            view_state.personalized_request += 1;
            Some(UserCommand::RequestPersonalized {
                skill_level,
                tech_stack,
                request: view_state.personalized_request,
            })
        }
        KeyCode::Esc if view_state.generation_status == LlmStatus::Streaming => {
            Some(UserCommand::CancelGeneration)
        }
        KeyCode::PageUp => {
            scroll_up(view_state, "preview", PAGE_SIZE);
            None
        }
        KeyCode::PageDown => {
            scroll_down(view_state, "preview", PAGE_SIZE);
            None
        }
        _ => None,
    }
}

/// Clamp the typed count, surfacing the cap warning as a local toast.
fn commit_count(view_state: &mut ViewState) -> u32 {
    let clamped = view_state.setup.commit_count();
    if let Some(warning) = clamped.warning {
        view_state.toast = Some(warning);
        view_state.toast_shown_at = Some(Instant::now());
    }
    clamped.value
}

// ---------------------------------------------------------------------------
// Performance
// ---------------------------------------------------------------------------

fn handle_performance(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => scroll_up(view_state, "performance", 1),
        KeyCode::Down | KeyCode::Char('j') => scroll_down(view_state, "performance", 1),
        KeyCode::PageUp => scroll_up(view_state, "performance", PAGE_SIZE),
        KeyCode::PageDown => scroll_down(view_state, "performance", PAGE_SIZE),
        _ => {}
    }
    None
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

fn handle_settings(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('e') => {
            view_state.editing_name = true;
            None
        }
        KeyCode::Char('s') => Some(UserCommand::SeedSampleData),
        KeyCode::Char('o') => Some(UserCommand::SignOut),
        _ => None,
    }
}

fn handle_name_edit(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Enter => {
            view_state.editing_name = false;
            Some(UserCommand::UpdateProfile {
                name: view_state.profile_name.trim().to_string(),
            })
        }
        KeyCode::Esc => {
            view_state.editing_name = false;
            view_state.profile_name = view_state
                .snapshot
                .user
                .as_ref()
                .map(|u| u.name.clone())
                .unwrap_or_default();
            None
        }
        KeyCode::Backspace => {
            view_state.profile_name.pop();
            None
        }
        KeyCode::Char(c) => {
            view_state.profile_name.push(c);
            None
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Scrolling helpers
// ---------------------------------------------------------------------------

fn scroll_up(view_state: &mut ViewState, key: &str, amount: usize) {
    let offset = view_state.scroll_offset.entry(key.to_string()).or_insert(0);
    *offset = offset.saturating_sub(amount);
}

/// Widgets clamp the offset to their content when rendering.
fn scroll_down(view_state: &mut ViewState, key: &str, amount: usize) {
    let offset = view_state.scroll_offset.entry(key.to_string()).or_insert(0);
    *offset = offset.saturating_add(amount);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::signed_in_state;
    use crate::{AuthMode, ViewState};
    use codeprep_core::model::{DailyChallenge, ExperienceLevel, SkillLevel};
    use crossterm::event::{KeyEventState, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn ctrl_key(c: char) -> KeyEvent {
        KeyEvent {
            code: KeyCode::Char(c),
            modifiers: KeyModifiers::CONTROL,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn type_text(state: &mut ViewState, text: &str) {
        for c in text.chars() {
            assert_eq!(handle_key(key(KeyCode::Char(c)), state), None);
        }
    }

    #[test]
    fn release_events_are_ignored() {
        let mut state = signed_in_state(ScreenId::Dashboard);
        let mut release = key(KeyCode::Char('q'));
        release.kind = KeyEventKind::Release;
        assert_eq!(handle_key(release, &mut state), None);
        assert!(!state.confirm_quit);
    }

    #[test]
    fn ctrl_c_quits_even_while_typing() {
        let mut state = ViewState::default();
        assert_eq!(handle_key(ctrl_key('c'), &mut state), Some(UserCommand::Quit));
    }

    #[test]
    fn q_asks_for_confirmation() {
        let mut state = signed_in_state(ScreenId::Practice);
        assert_eq!(handle_key(key(KeyCode::Char('q')), &mut state), None);
        assert!(state.confirm_quit);
        // Other keys are blocked while the dialog is up.
        assert_eq!(handle_key(key(KeyCode::Char('2')), &mut state), None);
        assert_eq!(handle_key(key(KeyCode::Char('n')), &mut state), None);
        assert!(!state.confirm_quit);

        handle_key(key(KeyCode::Char('q')), &mut state);
        assert_eq!(
            handle_key(key(KeyCode::Char('y')), &mut state),
            Some(UserCommand::Quit)
        );
    }

    #[test]
    fn number_keys_switch_screens() {
        let mut state = signed_in_state(ScreenId::Dashboard);
        assert_eq!(
            handle_key(key(KeyCode::Char('3')), &mut state),
            Some(UserCommand::SwitchScreen(ScreenId::PathSetup))
        );
        assert_eq!(
            handle_key(key(KeyCode::Char('5')), &mut state),
            Some(UserCommand::SwitchScreen(ScreenId::Settings))
        );
    }

    #[test]
    fn sign_in_form_types_and_submits() {
        let mut state = ViewState::default();
        type_text(&mut state, "ada@example.com");
        handle_key(key(KeyCode::Tab), &mut state);
        type_text(&mut state, "secret1q");
        handle_key(key(KeyCode::Backspace), &mut state);
        assert_eq!(
            handle_key(key(KeyCode::Enter), &mut state),
            Some(UserCommand::SignIn {
                email: "ada@example.com".into(),
                password: "secret1".into(),
            })
        );
        // Typing 'q' on the form never opens the quit dialog.
        assert!(!state.confirm_quit);
    }

    #[test]
    fn f2_switches_to_sign_up() {
        let mut state = ViewState::default();
        handle_key(key(KeyCode::F(2)), &mut state);
        assert_eq!(state.sign_in.mode, AuthMode::SignUp);
        type_text(&mut state, "lin@example.com");
        handle_key(key(KeyCode::Down), &mut state);
        type_text(&mut state, "pw12345");
        handle_key(key(KeyCode::Down), &mut state);
        type_text(&mut state, "Lin");
        assert_eq!(
            handle_key(key(KeyCode::Enter), &mut state),
            Some(UserCommand::SignUp {
                email: "lin@example.com".into(),
                password: "pw12345".into(),
                name: "Lin".into(),
            })
        );
    }

    #[test]
    fn practice_navigation_and_completion() {
        let mut state = signed_in_state(ScreenId::Practice);
        handle_key(key(KeyCode::Down), &mut state);
        handle_key(key(KeyCode::Char('j')), &mut state);
        handle_key(key(KeyCode::Char('j')), &mut state);
        assert_eq!(state.selected_question, 2);
        handle_key(key(KeyCode::Up), &mut state);
        assert_eq!(state.selected_question, 1);

        assert_eq!(
            handle_key(key(KeyCode::Char('s')), &mut state),
            Some(UserCommand::MarkInProgress {
                path_id: "p1".into(),
                question_id: "q2".into(),
            })
        );
        assert!(state.timer.is_some());

        assert_eq!(
            handle_key(key(KeyCode::Char('c')), &mut state),
            Some(UserCommand::MarkComplete {
                path_id: "p1".into(),
                question_id: "q2".into(),
            })
        );
        assert!(state.timer.is_none());
    }

    #[test]
    fn stopping_the_timer_records_time() {
        let mut state = signed_in_state(ScreenId::Practice);
        assert_eq!(handle_key(key(KeyCode::Char('t')), &mut state), None);
        handle_key(key(KeyCode::Enter), &mut state);
        match handle_key(key(KeyCode::Char('t')), &mut state) {
            Some(UserCommand::RecordTime {
                path_id,
                question_id,
                ..
            }) => {
                assert_eq!(path_id, "p1");
                assert_eq!(question_id, "q1");
            }
            other => panic!("expected RecordTime, got {other:?}"),
        }
    }

    #[test]
    fn practice_with_no_questions_sends_nothing() {
        let mut state = ViewState {
            screen: ScreenId::Practice,
            ..Default::default()
        };
        assert_eq!(handle_key(key(KeyCode::Char('c')), &mut state), None);
        assert_eq!(handle_key(key(KeyCode::Char('x')), &mut state), None);
    }

    #[test]
    fn dashboard_cycles_categories() {
        let mut state = signed_in_state(ScreenId::Dashboard);
        assert_eq!(
            handle_key(key(KeyCode::Char('c')), &mut state),
            Some(UserCommand::SelectCategory("javascript".into()))
        );
        state.snapshot.category_filter = "javascript".into();
        assert_eq!(
            handle_key(key(KeyCode::Char('c')), &mut state),
            Some(UserCommand::SelectCategory("all".into()))
        );
    }

    #[test]
    fn daily_challenge_key_selects_the_question() {
        let mut state = signed_in_state(ScreenId::Dashboard);
        let question = state.snapshot.paths[0].questions[2].clone();
        state.snapshot.daily_challenge = Some(DailyChallenge {
            question,
            points: 100,
            time_remaining: "3h 0m".into(),
        });
        assert_eq!(
            handle_key(key(KeyCode::Char('d')), &mut state),
            Some(UserCommand::SwitchScreen(ScreenId::Practice))
        );
        assert_eq!(state.selected_question, 2);
    }

    #[test]
    fn path_setup_builds_generate_command() {
        let mut state = signed_in_state(ScreenId::PathSetup);
        handle_key(key(KeyCode::Left), &mut state);
        assert_eq!(state.setup.level, ExperienceLevel::Junior);

        handle_key(key(KeyCode::Tab), &mut state);
        handle_key(key(KeyCode::Down), &mut state);
        handle_key(key(KeyCode::Char(' ')), &mut state);

        handle_key(key(KeyCode::Tab), &mut state);
        handle_key(key(KeyCode::Backspace), &mut state);
        // Digits go to the count field instead of switching screens.
        assert_eq!(handle_key(key(KeyCode::Char('1')), &mut state), None);
        assert_eq!(handle_key(key(KeyCode::Char('2')), &mut state), None);
        assert_eq!(state.setup.count_text, "12");

        assert_eq!(
            handle_key(key(KeyCode::Enter), &mut state),
            Some(UserCommand::GeneratePath {
                experience_level: ExperienceLevel::Junior,
                tech_stack: vec!["typescript".into()],
                number_of_questions: 12,
            })
        );
    }

    #[test]
    fn oversized_count_is_capped_with_a_toast() {
        let mut state = signed_in_state(ScreenId::PathSetup);
        state.setup.focus = SetupFocus::Count;
        state.setup.count_text = "45".into();
        handle_key(key(KeyCode::Tab), &mut state);
        assert_eq!(state.setup.count_text, "30");
        assert_eq!(state.setup.focus, SetupFocus::Level);
        assert_eq!(state.toast.as_ref().unwrap().title, "Maximum reached");
    }

    #[test]
    fn escape_cancels_only_a_running_generation() {
        let mut state = signed_in_state(ScreenId::PathSetup);
        assert_eq!(handle_key(key(KeyCode::Esc), &mut state), None);
        state.generation_status = LlmStatus::Streaming;
        assert_eq!(
            handle_key(key(KeyCode::Esc), &mut state),
            Some(UserCommand::CancelGeneration)
        );
        assert_eq!(handle_key(key(KeyCode::Enter), &mut state), None);
    }

    #[test]
    fn personalized_request_uses_mapped_skill_level() {
        let mut state = signed_in_state(ScreenId::PathSetup);
        state.setup.selected = vec!["react".into()];
        assert_eq!(
            handle_key(key(KeyCode::Char('p')), &mut state),
            Some(UserCommand::RequestPersonalized {
                skill_level: SkillLevel::Intermediate,
                tech_stack: vec!["react".into()],
                request: 1,
            })
        );
        match handle_key(key(KeyCode::Char('p')), &mut state) {
            Some(UserCommand::RequestPersonalized { request, .. }) => assert_eq!(request, 2),
            other => panic!("Expected RequestPersonalized, got {:?}", other),
        }
    }

    #[test]
    fn settings_edit_name_and_actions() {
        let mut state = signed_in_state(ScreenId::Settings);
        handle_key(key(KeyCode::Char('e')), &mut state);
        assert!(state.editing_name);
        // 's' is text while editing.
        type_text(&mut state, "s");
        assert_eq!(
            handle_key(key(KeyCode::Enter), &mut state),
            Some(UserCommand::UpdateProfile { name: "Adas".into() })
        );
        assert!(!state.editing_name);

        assert_eq!(
            handle_key(key(KeyCode::Char('s')), &mut state),
            Some(UserCommand::SeedSampleData)
        );
        assert_eq!(
            handle_key(key(KeyCode::Char('o')), &mut state),
            Some(UserCommand::SignOut)
        );
    }

    #[test]
    fn escape_restores_profile_name() {
        let mut state = signed_in_state(ScreenId::Settings);
        handle_key(key(KeyCode::Char('e')), &mut state);
        handle_key(key(KeyCode::Backspace), &mut state);
        handle_key(key(KeyCode::Esc), &mut state);
        assert_eq!(state.profile_name, "Ada");
    }

    #[test]
    fn performance_scrolls_without_commands() {
        let mut state = signed_in_state(ScreenId::Performance);
        handle_key(key(KeyCode::PageDown), &mut state);
        handle_key(key(KeyCode::Up), &mut state);
        assert_eq!(state.scroll("performance"), PAGE_SIZE - 1);
    }
}
