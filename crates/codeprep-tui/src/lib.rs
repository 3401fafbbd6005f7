// Terminal UI for CodePrep.
//
// Owns the view state, applies UiUpdate messages from the app loop,
// renders the active screen and turns key presses into UserCommands.

pub mod input;
pub mod layout;
pub mod widgets;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use ratatui::Frame;
use tokio::sync::mpsc;
use tracing::{debug, info};

use codeprep_core::model::{
    ExperienceLevel, GeneratedQuestion, LearningPath, SkillLevel, TECH_OPTIONS,
};
use codeprep_core::protocol::{
    AppSnapshot, LlmStatus, ScreenId, Toast, UiUpdate, UserCommand,
};
use codeprep_practice::generation::{self, ClampedCount, DEFAULT_QUESTION_COUNT};

use layout::build_layout;

/// How long a toast stays in the toast line.
pub const TOAST_TTL: Duration = Duration::from_secs(4);

// ---------------------------------------------------------------------------
// Sign-in form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignInField {
    #[default]
    Email,
    Password,
    Name,
}

#[derive(Debug, Clone, Default)]
pub struct SignInForm {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    pub name: String,
    pub field: SignInField,
}

impl SignInForm {
    fn fields(&self) -> &'static [SignInField] {
        match self.mode {
            AuthMode::SignIn => &[SignInField::Email, SignInField::Password],
            AuthMode::SignUp => &[SignInField::Email, SignInField::Password, SignInField::Name],
        }
    }

    pub fn next_field(&mut self) {
        let fields = self.fields();
        let idx = fields.iter().position(|f| *f == self.field).unwrap_or(0);
        self.field = fields[(idx + 1) % fields.len()];
    }

    pub fn prev_field(&mut self) {
        let fields = self.fields();
        let idx = fields.iter().position(|f| *f == self.field).unwrap_or(0);
        self.field = fields[(idx + fields.len() - 1) % fields.len()];
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        };
        if !self.fields().contains(&self.field) {
            self.field = SignInField::Email;
        }
    }

    pub fn active_mut(&mut self) -> &mut String {
        match self.field {
            SignInField::Email => &mut self.email,
            SignInField::Password => &mut self.password,
            SignInField::Name => &mut self.name,
        }
    }

    /// The command for the current mode. Validation happens in the app loop.
    pub fn submit(&self) -> UserCommand {
        let email = self.email.trim().to_string();
        match self.mode {
            AuthMode::SignIn => UserCommand::SignIn {
                email,
                password: self.password.clone(),
            },
            AuthMode::SignUp => UserCommand::SignUp {
                email,
                password: self.password.clone(),
                name: self.name.trim().to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Path setup form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupFocus {
    #[default]
    Level,
    Tech,
    Count,
}

impl SetupFocus {
    pub fn next(self) -> Self {
        match self {
            SetupFocus::Level => SetupFocus::Tech,
            SetupFocus::Tech => SetupFocus::Count,
            SetupFocus::Count => SetupFocus::Level,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathSetupForm {
    pub level: ExperienceLevel,
    /// Selected tech ids, kept in `TECH_OPTIONS` order.
    pub selected: Vec<String>,
    pub tech_cursor: usize,
    pub count_text: String,
    pub default_count: u32,
    pub max_count: u32,
    pub focus: SetupFocus,
}

impl Default for PathSetupForm {
    fn default() -> Self {
        PathSetupForm::with_limits(DEFAULT_QUESTION_COUNT, generation::MAX_QUESTION_COUNT)
    }
}

impl PathSetupForm {
    /// Form prefilled with the configured `questions.default_count` and
    /// capped at `questions.max_count`.
    pub fn with_limits(default_count: u32, max_count: u32) -> Self {
        let max_count = max_count.max(1);
        let default_count = default_count.clamp(1, max_count);
        PathSetupForm {
            level: ExperienceLevel::default(),
            selected: Vec::new(),
            tech_cursor: 0,
            count_text: default_count.to_string(),
            default_count,
            max_count,
            focus: SetupFocus::default(),
        }
    }

    pub fn shift_level(&mut self, forward: bool) {
        let all = ExperienceLevel::ALL;
        let idx = all.iter().position(|l| *l == self.level).unwrap_or(0);
        let next = if forward {
            (idx + 1) % all.len()
        } else {
            (idx + all.len() - 1) % all.len()
        };
        self.level = all[next];
    }

    pub fn move_cursor(&mut self, down: bool) {
        let len = TECH_OPTIONS.len();
        self.tech_cursor = if down {
            (self.tech_cursor + 1) % len
        } else {
            (self.tech_cursor + len - 1) % len
        };
    }

    /// Select or deselect the tech under the cursor.
    pub fn toggle_tech(&mut self) {
        let Some(option) = TECH_OPTIONS.get(self.tech_cursor) else {
            return;
        };
        if let Some(pos) = self.selected.iter().position(|id| id == option.id) {
            self.selected.remove(pos);
        } else {
            self.selected.push(option.id.to_string());
            self.selected.sort_by_key(|id| {
                TECH_OPTIONS
                    .iter()
                    .position(|t| t.id == id)
                    .unwrap_or(usize::MAX)
            });
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|s| s == id)
    }

    /// Clamp the typed count and write the clamped value back.
    pub fn commit_count(&mut self) -> ClampedCount {
        let clamped =
            generation::clamp_question_count(&self.count_text, self.default_count, self.max_count);
        self.count_text = clamped.value.to_string();
        clamped
    }

    pub fn generate_command(&self, count: u32) -> UserCommand {
        UserCommand::GeneratePath {
            experience_level: self.level,
            tech_stack: self.selected.clone(),
            number_of_questions: count,
        }
    }

    /// Skill level used for personalized suggestions.
    pub fn skill_level(&self) -> SkillLevel {
        match self.level {
            ExperienceLevel::Junior => SkillLevel::Beginner,
            ExperienceLevel::MidLevel => SkillLevel::Intermediate,
            ExperienceLevel::Senior => SkillLevel::Advanced,
        }
    }
}

// ---------------------------------------------------------------------------
// View state
// ---------------------------------------------------------------------------

/// A practice session started on the Practice screen.
#[derive(Debug, Clone)]
pub struct PracticeTimer {
    pub path_id: String,
    pub question_id: String,
    pub started: Instant,
}

/// Everything the TUI needs to draw a frame. Updated from `UiUpdate`
/// messages and local key handling.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub screen: ScreenId,
    pub snapshot: AppSnapshot,
    pub sign_in: SignInForm,
    pub setup: PathSetupForm,
    /// Streamed text of the current generation request.
    pub generation_text: String,
    pub generation_status: LlmStatus,
    pub generation_error: Option<String>,
    /// Path id and question count of the last saved generation.
    pub last_generated: Option<(String, usize)>,
    pub personalized: Vec<String>,
    /// Id of the latest personalized request. Older answers are ignored.
    pub personalized_request: u64,
    /// Index into `practice_items`.
    pub selected_question: usize,
    pub show_hints: bool,
    pub timer: Option<PracticeTimer>,
    pub profile_name: String,
    pub editing_name: bool,
    pub toast: Option<Toast>,
    pub toast_shown_at: Option<Instant>,
    /// Per-widget scroll offsets (keyed by widget name).
    pub scroll_offset: HashMap<String, usize>,
    pub confirm_quit: bool,
}

impl ViewState {
    pub fn with_question_limits(default_count: u32, max_count: u32) -> Self {
        ViewState {
            setup: PathSetupForm::with_limits(default_count, max_count),
            ..ViewState::default()
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: AppSnapshot) {
        if !self.editing_name {
            self.profile_name = snapshot
                .user
                .as_ref()
                .map(|u| u.name.clone())
                .unwrap_or_default();
        }
        self.snapshot = snapshot;
        let count = practice_items(&self.snapshot).len();
        self.selected_question = self.selected_question.min(count.saturating_sub(1));
    }

    /// The question under the Practice screen cursor.
    pub fn selected_item(&self) -> Option<(&LearningPath, &GeneratedQuestion)> {
        practice_items(&self.snapshot)
            .into_iter()
            .nth(self.selected_question)
    }

    /// Drop the toast once it has been visible for `TOAST_TTL`.
    pub fn expire_toast(&mut self, now: Instant) {
        if let Some(shown) = self.toast_shown_at {
            if now.duration_since(shown) >= TOAST_TTL {
                self.toast = None;
                self.toast_shown_at = None;
            }
        }
    }

    pub fn scroll(&self, key: &str) -> usize {
        self.scroll_offset.get(key).copied().unwrap_or(0)
    }
}

/// Questions of every path, in path order, as shown on the Practice screen.
pub fn practice_items(snapshot: &AppSnapshot) -> Vec<(&LearningPath, &GeneratedQuestion)> {
    snapshot
        .paths
        .iter()
        .flat_map(|p| p.questions.iter().map(move |q| (p, q)))
        .collect()
}

// ---------------------------------------------------------------------------
// UiUpdate processing
// ---------------------------------------------------------------------------

pub fn apply_ui_update(state: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::Snapshot(snapshot) => state.apply_snapshot(*snapshot),
        UiUpdate::Screen(screen) => {
            if screen != ScreenId::SignIn {
                state.sign_in.password.clear();
            } else {
                state.timer = None;
                state.editing_name = false;
                state.personalized.clear();
                state.generation_text.clear();
                state.generation_status = LlmStatus::Idle;
            }
            state.screen = screen;
        }
        UiUpdate::Toast(toast) => {
            state.toast = Some(toast);
            state.toast_shown_at = Some(Instant::now());
        }
        UiUpdate::GenerationStarted => {
            state.generation_text.clear();
            state.generation_status = LlmStatus::Streaming;
            state.generation_error = None;
            state.last_generated = None;
            state.scroll_offset.remove("preview");
        }
        UiUpdate::GenerationToken(token) => {
            state.generation_text.push_str(&token);
            state.generation_status = LlmStatus::Streaming;
        }
        UiUpdate::GenerationFinished { path_id, count } => {
            state.generation_status = LlmStatus::Complete;
            state.last_generated = Some((path_id, count));
        }
        UiUpdate::GenerationFailed(message) => {
            state.generation_status = LlmStatus::Error;
            state.generation_error = Some(message);
        }
        UiUpdate::Personalized { request, titles } => {
            if request == state.personalized_request {
                state.personalized = titles;
            } else {
                debug!(
                    "Ignoring stale suggestions (request {}, latest {})",
                    request, state.personalized_request
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render_frame(frame: &mut Frame, state: &ViewState) {
    let layout = build_layout(frame.area());

    widgets::status_bar::render(frame, layout.status_bar, state);
    match state.screen {
        ScreenId::SignIn => widgets::sign_in::render(frame, layout.main, state),
        ScreenId::Dashboard => widgets::dashboard::render(frame, layout.main, state),
        ScreenId::Practice => widgets::practice::render(frame, layout.main, state),
        ScreenId::PathSetup => widgets::path_setup::render(frame, layout.main, state),
        ScreenId::Performance => widgets::performance::render(frame, layout.main, state),
        ScreenId::Settings => widgets::settings::render(frame, layout.main, state),
    }
    widgets::toast::render(frame, layout.toast_line, state.toast.as_ref());
    widgets::help_bar::render(frame, layout.help_bar, state);

    if state.confirm_quit {
        widgets::quit_confirm::render(frame, frame.area());
    }
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI until the user quits or the app loop goes away.
///
/// Initializes the terminal, restores it from a panic hook, then selects
/// over UI updates, keyboard input and a ~30fps render tick.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
    mut view_state: ViewState,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        ratatui::restore();
        original_hook(panic_info);
    }));

    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(ui_update) => apply_ui_update(&mut view_state, ui_update),
                    None => {
                        info!("UI channel closed, leaving TUI");
                        break;
                    }
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, &mut view_state) {
                            let quit = cmd == UserCommand::Quit;
                            debug!("Sending command: {:?}", cmd);
                            let _ = cmd_tx.send(cmd).await;
                            if quit {
                                break;
                            }
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Terminal input error: {}", e);
                        break;
                    }
                    None => break,
                }
            }

            _ = render_tick.tick() => {
                view_state.expire_toast(Instant::now());
                terminal.draw(|frame| render_frame(frame, &view_state))?;
            }
        }
    }

    ratatui::restore();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
