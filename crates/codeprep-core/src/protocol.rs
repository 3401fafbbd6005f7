// Message types passed between the LLM tasks, the app loop and the TUI.

use crate::model::{
    DailyChallenge, ExperienceLevel, LearningPath, PerformanceStats, QuestionSet, SkillLevel,
    User, UserProgress,
};

// ---------------------------------------------------------------------------
// LLM streaming
// ---------------------------------------------------------------------------

/// Events emitted by a streaming LLM task. Every variant carries the
/// generation of the task that produced it so the app loop can drop events
/// from tasks it has since replaced.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmEvent {
    Token {
        text: String,
        generation: u64,
    },
    Complete {
        full_text: String,
        input_tokens: u32,
        output_tokens: u32,
        stop_reason: Option<String>,
        generation: u64,
    },
    Error {
        message: String,
        generation: u64,
    },
}

impl LlmEvent {
    pub fn generation(&self) -> u64 {
        match self {
            LlmEvent::Token { generation, .. }
            | LlmEvent::Complete { generation, .. }
            | LlmEvent::Error { generation, .. } => *generation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmStatus {
    #[default]
    Idle,
    Streaming,
    Complete,
    Error,
}

// ---------------------------------------------------------------------------
// Screens and toasts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScreenId {
    #[default]
    SignIn,
    Dashboard,
    Practice,
    PathSetup,
    Performance,
    Settings,
}

impl ScreenId {
    /// Screens reachable from the navigation bar once signed in.
    pub const NAV: [ScreenId; 5] = [
        ScreenId::Dashboard,
        ScreenId::Practice,
        ScreenId::PathSetup,
        ScreenId::Performance,
        ScreenId::Settings,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            ScreenId::SignIn => "Sign In",
            ScreenId::Dashboard => "Dashboard",
            ScreenId::Practice => "Practice",
            ScreenId::PathSetup => "Path Setup",
            ScreenId::Performance => "Performance",
            ScreenId::Settings => "Settings",
        }
    }

    /// Whether the screen needs a signed-in user.
    pub fn requires_auth(&self) -> bool {
        *self != ScreenId::SignIn
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Transient notification shown in the toast line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub kind: ToastKind,
}

impl Toast {
    pub fn new(kind: ToastKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Toast {
            title: title.into(),
            description: description.into(),
            kind,
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(ToastKind::Success, title, description)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(ToastKind::Warning, title, description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(ToastKind::Error, title, description)
    }
}

// ---------------------------------------------------------------------------
// App -> UI
// ---------------------------------------------------------------------------

/// Everything the screens render for the signed-in user.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppSnapshot {
    pub user: Option<User>,
    pub paths: Vec<LearningPath>,
    pub question_sets: Vec<QuestionSet>,
    pub category_filter: String,
    pub progress: UserProgress,
    pub weekly_progress_percent: u32,
    pub performance: Option<PerformanceStats>,
    pub daily_challenge: Option<DailyChallenge>,
    pub llm_available: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    Snapshot(Box<AppSnapshot>),
    Screen(ScreenId),
    Toast(Toast),
    /// A generation request started; clears the preview pane.
    GenerationStarted,
    GenerationToken(String),
    GenerationFinished { path_id: String, count: usize },
    GenerationFailed(String),
    /// Titles suggested by the personalized flow, tagged with the request
    /// they answer.
    Personalized { request: u64, titles: Vec<String> },
}

// ---------------------------------------------------------------------------
// UI -> App
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        email: String,
        password: String,
        name: String,
    },
    SignOut,
    SwitchScreen(ScreenId),
    GeneratePath {
        experience_level: ExperienceLevel,
        tech_stack: Vec<String>,
        number_of_questions: u32,
    },
    RequestPersonalized {
        skill_level: SkillLevel,
        tech_stack: Vec<String>,
        /// Echoed back in `UiUpdate::Personalized`.
        request: u64,
    },
    CancelGeneration,
    MarkComplete {
        path_id: String,
        question_id: String,
    },
    MarkInProgress {
        path_id: String,
        question_id: String,
    },
    RecordTime {
        path_id: String,
        question_id: String,
        seconds: u64,
    },
    DeletePath {
        path_id: String,
    },
    SelectCategory(String),
    SeedSampleData,
    UpdateProfile {
        name: String,
    },
    Refresh,
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_event_generation_accessor() {
        let events = [
            LlmEvent::Token { text: "a".into(), generation: 3 },
            LlmEvent::Complete {
                full_text: "a".into(),
                input_tokens: 1,
                output_tokens: 1,
                stop_reason: None,
                generation: 3,
            },
            LlmEvent::Error { message: "x".into(), generation: 3 },
        ];
        assert!(events.iter().all(|e| e.generation() == 3));
    }

    #[test]
    fn only_sign_in_skips_auth() {
        assert!(!ScreenId::SignIn.requires_auth());
        assert!(ScreenId::NAV.iter().all(|s| s.requires_auth()));
    }

    #[test]
    fn toast_constructors_set_kind() {
        assert_eq!(Toast::success("a", "b").kind, ToastKind::Success);
        assert_eq!(Toast::warning("a", "b").kind, ToastKind::Warning);
        assert_eq!(Toast::error("a", "b").kind, ToastKind::Error);
    }
}
