// Application state and orchestration logic.
//
// The central event loop that coordinates user commands from the TUI, LLM
// streaming events and store change notifications. Keeps the signed-in
// user's derived data current and pushes UI updates to the render loop.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use codeprep_core::config::Config;
use codeprep_core::db::{Database, StoreChange, StorePath};
use codeprep_core::model::{
    now_millis, DailyChallenge, ExperienceLevel, LearningPath, PerformanceStats, SkillLevel,
};
use codeprep_core::protocol::{
    AppSnapshot, LlmEvent, LlmStatus, ScreenId, Toast, ToastKind, UiUpdate, UserCommand,
};
use codeprep_llm::LlmClient;
use codeprep_practice::analytics;
use codeprep_practice::auth::{AuthError, IdentityProvider, Session};
use codeprep_practice::catalog::{self, BankQuestion};
use codeprep_practice::daily;
use codeprep_practice::generation::{self, GenerateQuestionsInput, PersonalizedInput};
use codeprep_practice::paths::PathService;
use codeprep_practice::seed;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// What the LLM is currently working on.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmMode {
    /// Generating questions for a new learning path.
    LearningPath {
        experience_level: ExperienceLevel,
        tech_stack: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub config: Config,
    pub db: Arc<Database>,
    pub session: Session,
    pub paths: PathService,
    pub bank: Arc<Vec<BankQuestion>>,
    pub active_screen: ScreenId,
    /// Lowercase category or `"all"`.
    pub category_filter: String,
    /// The signed-in user's paths, newest first.
    pub user_paths: Vec<LearningPath>,
    pub performance: Option<PerformanceStats>,
    pub daily_challenge: Option<DailyChallenge>,
    pub current_llm_task: Option<tokio::task::JoinHandle<()>>,
    /// The personalized request in flight; replaced by each new request.
    pub personalized_task: Option<tokio::task::JoinHandle<()>>,
    pub llm_mode: Option<LlmMode>,
    /// Identifies the current LLM task. Events carrying any other value come
    /// from a replaced task and are dropped in `handle_llm_event`.
    pub llm_generation: u64,
    pub generation_text: String,
    pub generation_status: LlmStatus,
    pub llm_client: Arc<LlmClient>,
    /// Spawned tasks stream through clones of this sender.
    pub llm_tx: mpsc::Sender<LlmEvent>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Arc<Database>,
        provider: Arc<dyn IdentityProvider>,
        bank: Vec<BankQuestion>,
        llm_client: LlmClient,
        llm_tx: mpsc::Sender<LlmEvent>,
    ) -> Self {
        AppState {
            config,
            session: Session::new(provider, Arc::clone(&db)),
            paths: PathService::new(Arc::clone(&db)),
            db,
            bank: Arc::new(bank),
            active_screen: ScreenId::SignIn,
            category_filter: "all".to_string(),
            user_paths: Vec::new(),
            performance: None,
            daily_challenge: None,
            current_llm_task: None,
            personalized_task: None,
            llm_mode: None,
            llm_generation: 0,
            generation_text: String::new(),
            generation_status: LlmStatus::Idle,
            llm_client: Arc::new(llm_client),
            llm_tx,
        }
    }

    /// Reload the signed-in user's paths and recompute everything derived
    /// from them. Analytics and the daily challenge are written back to the
    /// store.
    pub fn refresh_user_data(&mut self) -> anyhow::Result<()> {
        let Some(user_id) = self.session.user_id().map(str::to_string) else {
            self.user_paths.clear();
            self.performance = None;
            self.daily_challenge = None;
            return Ok(());
        };

        self.user_paths = self.paths.user_learning_paths(&user_id)?;
        self.performance = Some(analytics::publish(&self.db, &user_id, &self.user_paths)?);
        self.daily_challenge = daily::todays_challenge(&self.user_paths);
        daily::publish_challenge(&self.db, self.daily_challenge.as_ref())?;
        debug!(
            "Refreshed data for {}: {} paths",
            user_id,
            self.user_paths.len()
        );
        Ok(())
    }

    pub fn build_snapshot(&self) -> AppSnapshot {
        let progress = analytics::compute_user_progress(&self.user_paths);
        AppSnapshot {
            user: self.session.user().cloned(),
            paths: self.user_paths.clone(),
            question_sets: analytics::question_sets(&self.user_paths, &self.category_filter),
            category_filter: self.category_filter.clone(),
            weekly_progress_percent: analytics::weekly_progress_percent(&progress),
            progress,
            performance: self.performance.clone(),
            daily_challenge: self.daily_challenge.clone(),
            llm_available: self.llm_client.is_enabled(),
        }
    }

    /// Whether a store change should trigger a refresh. Only the signed-in
    /// user's own records count; analytics documents are written by the
    /// refresh itself.
    pub fn is_relevant_change(&self, change: &StoreChange) -> bool {
        let Some(user_id) = self.session.user_id() else {
            return false;
        };
        match &change.path {
            StorePath::LearningPath { .. } => change.path.is_learning_path_of(user_id),
            StorePath::Questions(id) | StorePath::User(id) => id == user_id,
            _ => false,
        }
    }

    /// Cancel the current LLM task if one is running.
    pub fn cancel_llm_task(&mut self) {
        if let Some(handle) = self.current_llm_task.take() {
            handle.abort();
            info!("Cancelled previous LLM task");
        }
    }

    /// Start streaming questions for a new learning path, replacing any
    /// task in flight.
    pub fn trigger_path_generation(
        &mut self,
        experience_level: ExperienceLevel,
        tech_stack: Vec<String>,
        number_of_questions: u32,
    ) {
        self.cancel_llm_task();

        let count = number_of_questions.clamp(1, self.config.questions.max_count);
        let input = GenerateQuestionsInput {
            experience_level,
            tech_stack: tech_stack.clone(),
            number_of_questions: Some(count),
        };
        let (system, user_content) = input.prompt();

        self.llm_mode = Some(LlmMode::LearningPath {
            experience_level,
            tech_stack,
        });
        self.generation_text.clear();
        self.llm_generation += 1;
        let generation = self.llm_generation;
        self.generation_status = LlmStatus::Streaming;

        let max_tokens = self.config.llm.generation_max_tokens;
        let client = Arc::clone(&self.llm_client);
        let tx = self.llm_tx.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = client
                .stream_message(&system, &user_content, max_tokens, tx, generation)
                .await
            {
                warn!("LLM generation task failed: {}", e);
            }
        });

        self.current_llm_task = Some(handle);
        info!(
            "Triggered generation of {} {} questions (gen: {})",
            count,
            experience_level.as_str(),
            generation
        );
    }

    /// Drop the task in flight and make its remaining events stale.
    pub fn abort_generation(&mut self) -> bool {
        let was_running = self.llm_mode.is_some();
        self.cancel_llm_task();
        self.llm_mode = None;
        self.llm_generation += 1;
        self.generation_status = LlmStatus::Idle;
        was_running
    }

    /// Persist the questions parsed from a completed generation. Returns the
    /// new path id and question count.
    fn save_generated_path(
        &mut self,
        mode: &LlmMode,
        full_text: &str,
    ) -> anyhow::Result<(String, usize)> {
        let LlmMode::LearningPath {
            experience_level,
            tech_stack,
        } = mode;
        let user = self.session.require_user()?.id.clone();
        let questions = generation::questions_from_response(full_text, now_millis())?;
        let count = questions.len();
        let path_id =
            self.paths
                .save_learning_path(&user, experience_level.as_str(), tech_stack, questions)?;
        Ok((path_id, count))
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the main application event loop.
///
/// Listens on three channels using `tokio::select!`:
/// 1. User commands from the TUI
/// 2. LLM streaming events
/// 3. Store change notifications
///
/// Pushes UI updates through `ui_tx` for the TUI render loop.
pub async fn run(
    mut llm_rx: mpsc::Receiver<LlmEvent>,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("Application event loop started");

    let mut changes = state.db.subscribe();
    let mut llm_open = true;
    let mut changes_open = true;

    push_snapshot(&mut state, &ui_tx).await;

    loop {
        tokio::select! {
            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => {
                        handle_user_command(&mut state, cmd, &ui_tx).await;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            // --- LLM events (only poll when channel is open) ---
            llm_event = llm_rx.recv(), if llm_open => {
                match llm_event {
                    Some(event) => handle_llm_event(&mut state, event, &ui_tx).await,
                    None => {
                        info!("LLM channel closed");
                        llm_open = false;
                    }
                }
            }

            // --- Store changes ---
            change = changes.recv(), if changes_open => {
                match change {
                    Ok(change) => {
                        if state.is_relevant_change(&change) {
                            // Coalesce a burst of writes into one refresh.
                            while changes.try_recv().is_ok() {}
                            push_snapshot(&mut state, &ui_tx).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Missed {} store changes, refreshing", skipped);
                        push_snapshot(&mut state, &ui_tx).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Store change channel closed");
                        changes_open = false;
                    }
                }
            }
        }
    }

    state.cancel_llm_task();
    if let Some(handle) = state.personalized_task.take() {
        handle.abort();
    }
    info!("Application event loop exiting");
    Ok(())
}

async fn send_toast(ui_tx: &mpsc::Sender<UiUpdate>, toast: Toast) {
    let _ = ui_tx.send(UiUpdate::Toast(toast)).await;
}

/// Recompute derived data and send a fresh snapshot.
async fn push_snapshot(state: &mut AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    if let Err(e) = state.refresh_user_data() {
        error!("Failed to refresh user data: {e:#}");
        send_toast(ui_tx, Toast::error("Could not load your data", e.to_string())).await;
    }
    let snapshot = state.build_snapshot();
    let _ = ui_tx.send(UiUpdate::Snapshot(Box::new(snapshot))).await;
}

async fn switch_screen(state: &mut AppState, screen: ScreenId, ui_tx: &mpsc::Sender<UiUpdate>) {
    state.active_screen = screen;
    let _ = ui_tx.send(UiUpdate::Screen(screen)).await;
}

async fn handle_llm_event(state: &mut AppState, event: LlmEvent, ui_tx: &mpsc::Sender<UiUpdate>) {
    if event.generation() != state.llm_generation {
        debug!(
            "Discarding stale LLM event (event gen: {}, current gen: {})",
            event.generation(),
            state.llm_generation
        );
        return;
    }

    let Some(mode) = state.llm_mode.clone() else {
        debug!("Received LLM event with no active mode, discarding");
        return;
    };

    match event {
        LlmEvent::Token { text, .. } => {
            state.generation_text.push_str(&text);
            state.generation_status = LlmStatus::Streaming;
            let _ = ui_tx.send(UiUpdate::GenerationToken(text)).await;
        }
        LlmEvent::Complete {
            full_text,
            stop_reason,
            output_tokens,
            ..
        } => {
            state.llm_mode = None;
            state.current_llm_task = None;
            state.generation_text = full_text.clone();
            info!("Generation complete ({} output tokens)", output_tokens);

            match state.save_generated_path(&mode, &full_text) {
                Ok((path_id, count)) => {
                    state.generation_status = LlmStatus::Complete;
                    let _ = ui_tx
                        .send(UiUpdate::GenerationFinished {
                            path_id,
                            count,
                        })
                        .await;
                    send_toast(ui_tx, generation::generated_toast(count)).await;
                }
                Err(e) => {
                    let mut message = e.to_string();
                    if stop_reason.as_deref() == Some("max_tokens") {
                        message.push_str(" (response truncated due to token limit)");
                    }
                    error!("Error saving generated learning path: {e:#}");
                    state.generation_status = LlmStatus::Error;
                    let _ = ui_tx.send(UiUpdate::GenerationFailed(message.clone())).await;
                    send_toast(ui_tx, generation::generation_failed_toast(&message)).await;
                }
            }
        }
        LlmEvent::Error { message, .. } => {
            warn!("LLM generation error: {}", message);
            state.llm_mode = None;
            state.current_llm_task = None;
            state.generation_status = LlmStatus::Error;
            let _ = ui_tx.send(UiUpdate::GenerationFailed(message.clone())).await;
            send_toast(ui_tx, generation::generation_failed_toast(&message)).await;
        }
    }
}

/// Surface an auth failure with the form's title.
async fn auth_failed(title: &str, err: AuthError, ui_tx: &mpsc::Sender<UiUpdate>) {
    warn!("{}: {}", title, err);
    let description = match err.to_string() {
        s if s.is_empty() => "Please try again".to_string(),
        s => s,
    };
    send_toast(ui_tx, Toast::error(title, description)).await;
}

/// Handle a user command from the TUI.
async fn handle_user_command(state: &mut AppState, cmd: UserCommand, ui_tx: &mpsc::Sender<UiUpdate>) {
    match cmd {
        UserCommand::SignIn { email, password } => {
            let signed_in = state.session.sign_in(&email, &password).await.map(|_| ());
            match signed_in {
                Ok(()) => {
                    send_toast(ui_tx, Toast::success("Welcome back!", "Successfully signed in")).await;
                    push_snapshot(state, ui_tx).await;
                    switch_screen(state, ScreenId::Dashboard, ui_tx).await;
                }
                Err(e) => auth_failed("Sign in failed", e, ui_tx).await,
            }
        }
        UserCommand::SignUp {
            email,
            password,
            name,
        } => {
            let name = Some(name.trim()).filter(|n| !n.is_empty());
            let signed_up = state.session.sign_up(&email, &password, name).await.map(|_| ());
            match signed_up {
                Ok(()) => {
                    send_toast(ui_tx, Toast::success("Account created!", "Welcome to CodePrep")).await;
                    push_snapshot(state, ui_tx).await;
                    switch_screen(state, ScreenId::Dashboard, ui_tx).await;
                }
                Err(e) => auth_failed("Sign up failed", e, ui_tx).await,
            }
        }
        UserCommand::SignOut => {
            state.abort_generation();
            state.session.sign_out();
            state.category_filter = "all".to_string();
            push_snapshot(state, ui_tx).await;
            switch_screen(state, ScreenId::SignIn, ui_tx).await;
        }
        UserCommand::SwitchScreen(screen) => {
            if screen.requires_auth() && !state.session.is_signed_in() {
                send_toast(
                    ui_tx,
                    Toast::error("Authentication required", "Please sign in to continue"),
                )
                .await;
                switch_screen(state, ScreenId::SignIn, ui_tx).await;
            } else {
                info!("Switched to screen: {:?}", screen);
                switch_screen(state, screen, ui_tx).await;
            }
        }
        UserCommand::GeneratePath {
            experience_level,
            tech_stack,
            number_of_questions,
        } => {
            if let Err(toast) =
                generation::validate_path_request(state.session.is_signed_in(), &tech_stack)
            {
                let needs_sign_in = !state.session.is_signed_in();
                send_toast(ui_tx, toast).await;
                if needs_sign_in {
                    switch_screen(state, ScreenId::SignIn, ui_tx).await;
                }
                return;
            }
            state.trigger_path_generation(experience_level, tech_stack, number_of_questions);
            let _ = ui_tx.send(UiUpdate::GenerationStarted).await;
        }
        UserCommand::RequestPersonalized {
            skill_level,
            tech_stack,
            request,
        } => {
            if let Some(previous) = state.personalized_task.take() {
                previous.abort();
                debug!("Replaced personalized request with {}", request);
            }
            state.personalized_task =
                Some(spawn_personalized(state, skill_level, tech_stack, request, ui_tx.clone()));
        }
        UserCommand::CancelGeneration => {
            if state.abort_generation() {
                let _ = ui_tx
                    .send(UiUpdate::GenerationFailed("Generation cancelled".to_string()))
                    .await;
                send_toast(
                    ui_tx,
                    Toast::new(ToastKind::Info, "Cancelled", "Generation cancelled"),
                )
                .await;
            }
        }
        UserCommand::MarkComplete {
            path_id,
            question_id,
        } => {
            let Ok(user) = state.session.require_user().map(|u| u.id.clone()) else {
                send_toast(ui_tx, Toast::error("Authentication required", "must be logged in")).await;
                return;
            };
            match state.paths.mark_question_complete(&user, &path_id, &question_id) {
                Ok(q) => {
                    send_toast(ui_tx, Toast::success("Challenge completed!", q.title)).await;
                }
                Err(e) => {
                    send_toast(ui_tx, Toast::error("Could not update question", e.to_string())).await;
                }
            }
        }
        UserCommand::MarkInProgress {
            path_id,
            question_id,
        } => {
            if let Some(user) = state.session.user_id().map(str::to_string) {
                if let Err(e) = state.paths.mark_question_in_progress(&user, &path_id, &question_id) {
                    send_toast(ui_tx, Toast::error("Could not update question", e.to_string())).await;
                }
            }
        }
        UserCommand::RecordTime {
            path_id,
            question_id,
            seconds,
        } => {
            if let Some(user) = state.session.user_id().map(str::to_string) {
                if let Err(e) = state
                    .paths
                    .record_time_spent(&user, &path_id, &question_id, seconds)
                {
                    warn!("Could not record time for {}: {}", question_id, e);
                }
            }
        }
        UserCommand::DeletePath { path_id } => {
            let Some(user) = state.session.user_id().map(str::to_string) else {
                return;
            };
            match state.paths.delete_learning_path(&user, &path_id) {
                Ok(true) => {
                    send_toast(ui_tx, Toast::success("Learning path deleted", "")).await;
                }
                Ok(false) => debug!("Path {} already gone", path_id),
                Err(e) => {
                    send_toast(ui_tx, Toast::error("Could not delete path", e.to_string())).await;
                }
            }
        }
        UserCommand::SelectCategory(category) => {
            let category = category.trim().to_lowercase();
            state.category_filter = if category.is_empty() {
                "all".to_string()
            } else {
                category
            };
            let snapshot = state.build_snapshot();
            let _ = ui_tx.send(UiUpdate::Snapshot(Box::new(snapshot))).await;
        }
        UserCommand::SeedSampleData => {
            let result = seed::seed_sample_data(
                &state.db,
                state.session.user(),
                now_millis(),
                &mut rand::thread_rng(),
            );
            match result {
                Ok(report) => {
                    info!("Seeded path {}", report.path_id);
                    send_toast(ui_tx, Toast::success("Success! Database seeded.", report.challenge_title)).await;
                }
                Err(e) => {
                    error!("Seeding failed: {}", e);
                    send_toast(ui_tx, Toast::error("Seeding failed", e.to_string())).await;
                }
            }
        }
        UserCommand::UpdateProfile { name } => {
            let Some(user) = state.session.user_id().map(str::to_string) else {
                return;
            };
            let name = name.trim();
            if name.is_empty() {
                send_toast(ui_tx, Toast::error("Profile not saved", "Name cannot be empty")).await;
                return;
            }
            let saved = state
                .db
                .update_user_profile(&user, name, None)
                .and_then(|_| state.session.reload());
            match saved {
                Ok(()) => send_toast(ui_tx, Toast::success("Profile updated", name)).await,
                Err(e) => {
                    error!("Failed to update profile: {e:#}");
                    send_toast(ui_tx, Toast::error("Profile not saved", e.to_string())).await;
                }
            }
        }
        UserCommand::Refresh => push_snapshot(state, ui_tx).await,
        UserCommand::Quit => {
            // Handled in the main loop
        }
    }
}

/// Run the personalized flow off the loop; its result goes straight to the
/// UI as bank question titles tagged with `request`.
fn spawn_personalized(
    state: &AppState,
    skill_level: SkillLevel,
    tech_stack: Vec<String>,
    request: u64,
    ui_tx: mpsc::Sender<UiUpdate>,
) -> tokio::task::JoinHandle<()> {
    let client = Arc::clone(&state.llm_client);
    let bank = Arc::clone(&state.bank);
    let max_tokens = state.config.llm.personalized_max_tokens;
    let input = PersonalizedInput {
        skill_level,
        preferred_tech_stack: tech_stack,
        past_performance: None,
    };

    tokio::spawn(async move {
        let result = generation::get_personalized_questions(&client, &bank, &input, max_tokens).await;
        match (result.success, result.questions, result.error) {
            (true, Some(ids), _) => {
                let titles = ids
                    .iter()
                    .filter_map(|id| catalog::find(&bank, id))
                    .map(|q| q.title.clone())
                    .collect();
                let _ = ui_tx.send(UiUpdate::Personalized { request, titles }).await;
            }
            (_, _, error) => {
                let message = error.unwrap_or_else(|| "Please try again".to_string());
                let _ = ui_tx
                    .send(UiUpdate::Toast(Toast::error("Generation failed", message)))
                    .await;
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use codeprep_core::config::{CredentialsConfig, LlmConfig, QuestionsConfig};
    use codeprep_core::model::{Difficulty, GeneratedQuestion};
    use codeprep_practice::auth::LocalIdentityProvider;

    fn test_config() -> Config {
        Config {
            llm: LlmConfig {
                model: "claude-test".to_string(),
                generation_max_tokens: 1000,
                personalized_max_tokens: 500,
            },
            questions: QuestionsConfig {
                default_count: 5,
                max_count: 30,
                bank_path: String::new(),
            },
            credentials: CredentialsConfig {
                anthropic_api_key: None,
            },
            db_path: ":memory:".to_string(),
        }
    }

    fn create_test_app_state() -> (AppState, mpsc::Receiver<LlmEvent>) {
        let db = Arc::new(Database::open(":memory:").unwrap());
        let provider = Arc::new(LocalIdentityProvider::new(Arc::clone(&db)));
        let (llm_tx, llm_rx) = mpsc::channel(16);
        let state = AppState::new(
            test_config(),
            db,
            provider,
            catalog::builtin(),
            LlmClient::Disabled,
            llm_tx,
        );
        (state, llm_rx)
    }

    async fn signed_in_state() -> (AppState, mpsc::Receiver<LlmEvent>) {
        let (mut state, rx) = create_test_app_state();
        state
            .session
            .sign_up("ada@example.com", "secret1", Some("Ada"))
            .await
            .unwrap();
        (state, rx)
    }

    fn question(id: &str) -> GeneratedQuestion {
        GeneratedQuestion {
            id: id.into(),
            title: format!("Q {id}"),
            description: String::new(),
            category: "React".into(),
            difficulty: Difficulty::Intermediate,
            requirements: vec![],
            hints: vec![],
            solution: None,
            test_cases: None,
            estimated_time: None,
            created_at: 0,
            status: None,
            completed_at: None,
            time_spent: None,
        }
    }

    const GENERATED: &str = r#"{"questions":[{"title":"Hooks","description":"d","category":"React","difficulty":"ADVANCED","requirements":[],"hints":[],"estimatedTime":"30m"}]}"#;

    #[tokio::test]
    async fn signed_out_snapshot_is_empty() {
        let (mut state, _rx) = create_test_app_state();
        state.refresh_user_data().unwrap();
        let snap = state.build_snapshot();
        assert!(snap.user.is_none());
        assert!(snap.paths.is_empty());
        assert!(snap.daily_challenge.is_none());
        assert!(!snap.llm_available);
        assert_eq!(snap.category_filter, "all");
    }

    #[tokio::test]
    async fn refresh_computes_and_publishes_derived_data() {
        let (mut state, _rx) = signed_in_state().await;
        let user = state.session.user_id().unwrap().to_string();
        state
            .paths
            .save_learning_path(&user, "junior", &["react".into()], vec![question("a"), question("b")])
            .unwrap();

        state.refresh_user_data().unwrap();
        let snap = state.build_snapshot();
        assert_eq!(snap.paths.len(), 1);
        assert_eq!(snap.question_sets.len(), 2);
        assert_eq!(snap.progress.total_questions, 2);
        assert_eq!(snap.performance.as_ref().unwrap().time_remaining, "1h 0m");
        assert!(snap.daily_challenge.is_some());

        let stored = analytics::load_user_progress(&state.db, &user).unwrap();
        assert_eq!(stored.total_questions, 2);
        assert!(daily::load_seeded_challenge(&state.db).unwrap().is_some());
    }

    #[tokio::test]
    async fn new_personalized_request_aborts_the_previous_one() {
        // A server that accepts and never answers keeps each request pending.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let (mut state, _rx) = signed_in_state().await;
        state.llm_client = Arc::new(LlmClient::Active(
            codeprep_llm::ClaudeClient::new("sk-test".into(), "test".into())
                .with_endpoint(format!("http://{addr}/v1/messages")),
        ));
        let (ui_tx, _ui_rx) = mpsc::channel(16);
        let request = |request| UserCommand::RequestPersonalized {
            skill_level: SkillLevel::Beginner,
            tech_stack: vec!["react".into()],
            request,
        };

        handle_user_command(&mut state, request(1), &ui_tx).await;
        let first = state.personalized_task.as_ref().unwrap().abort_handle();
        handle_user_command(&mut state, request(2), &ui_tx).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(first.is_finished());
        let second = state.personalized_task.take().unwrap();
        assert!(!second.is_finished());
        second.abort();
    }

    #[tokio::test]
    async fn refresh_keeps_the_seeded_challenge_document() {
        let (mut state, _rx) = signed_in_state().await;
        let (ui_tx, _ui_rx) = mpsc::channel(16);
        handle_user_command(&mut state, UserCommand::SeedSampleData, &ui_tx).await;

        state.refresh_user_data().unwrap();
        assert!(state.build_snapshot().daily_challenge.is_some());

        let stored = daily::load_seeded_challenge(&state.db).unwrap().unwrap();
        assert_eq!(stored.question.id, seed::SEEDED_CHALLENGE_ID);
        assert_eq!(stored.time_remaining, seed::SEEDED_TIME_REMAINING);
    }

    #[tokio::test]
    async fn relevant_changes_are_the_users_own_records() {
        let (state, _rx) = signed_in_state().await;
        let user = state.session.user_id().unwrap().to_string();
        let own = StoreChange {
            path: StorePath::LearningPath { user_id: user.clone(), path_id: "p".into() },
        };
        let other = StoreChange {
            path: StorePath::LearningPath { user_id: "someone".into(), path_id: "p".into() },
        };
        let progress_doc = StoreChange { path: StorePath::UserProgress(user.clone()) };
        assert!(state.is_relevant_change(&own));
        assert!(!state.is_relevant_change(&other));
        assert!(!state.is_relevant_change(&progress_doc));
        assert!(!state.is_relevant_change(&StoreChange { path: StorePath::DailyChallenge }));
    }

    #[tokio::test]
    async fn complete_event_saves_generated_path() {
        let (mut state, _rx) = signed_in_state().await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);
        state.llm_generation = 4;
        state.llm_mode = Some(LlmMode::LearningPath {
            experience_level: ExperienceLevel::Senior,
            tech_stack: vec!["react".into()],
        });

        let event = LlmEvent::Complete {
            full_text: GENERATED.into(),
            input_tokens: 1,
            output_tokens: 1,
            stop_reason: Some("end_turn".into()),
            generation: 4,
        };
        handle_llm_event(&mut state, event, &ui_tx).await;

        match ui_rx.recv().await.unwrap() {
            UiUpdate::GenerationFinished { count, .. } => assert_eq!(count, 1),
            other => panic!("Expected GenerationFinished, got {:?}", other),
        }
        match ui_rx.recv().await.unwrap() {
            UiUpdate::Toast(t) => assert_eq!(t.title, "Learning path generated!"),
            other => panic!("Expected Toast, got {:?}", other),
        }
        let user = state.session.user_id().unwrap().to_string();
        let paths = state.paths.user_learning_paths(&user).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].experience_level, "senior");
        assert_eq!(paths[0].questions[0].difficulty, Difficulty::Advanced);
        assert!(state.llm_mode.is_none());
        assert_eq!(state.generation_status, LlmStatus::Complete);
    }

    #[tokio::test]
    async fn stale_events_are_discarded() {
        let (mut state, _rx) = signed_in_state().await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);
        state.llm_generation = 2;
        state.llm_mode = Some(LlmMode::LearningPath {
            experience_level: ExperienceLevel::Junior,
            tech_stack: vec!["javascript".into()],
        });

        handle_llm_event(&mut state, LlmEvent::Token { text: "old".into(), generation: 1 }, &ui_tx).await;
        handle_llm_event(&mut state, LlmEvent::Token { text: "new".into(), generation: 2 }, &ui_tx).await;

        assert_eq!(ui_rx.recv().await.unwrap(), UiUpdate::GenerationToken("new".into()));
        assert!(ui_rx.try_recv().is_err());
        assert_eq!(state.generation_text, "new");
    }

    #[tokio::test]
    async fn unparsable_completion_reports_failure() {
        let (mut state, _rx) = signed_in_state().await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);
        state.llm_mode = Some(LlmMode::LearningPath {
            experience_level: ExperienceLevel::Junior,
            tech_stack: vec!["javascript".into()],
        });
        let event = LlmEvent::Complete {
            full_text: "{\"questions\": [".into(),
            input_tokens: 1,
            output_tokens: 1,
            stop_reason: Some("max_tokens".into()),
            generation: 0,
        };
        handle_llm_event(&mut state, event, &ui_tx).await;

        match ui_rx.recv().await.unwrap() {
            UiUpdate::GenerationFailed(msg) => assert!(msg.contains("truncated")),
            other => panic!("Expected GenerationFailed, got {:?}", other),
        }
        assert_eq!(state.generation_status, LlmStatus::Error);
    }

    #[tokio::test]
    async fn generate_requires_tech_stack() {
        let (mut state, _rx) = signed_in_state().await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);
        let cmd = UserCommand::GeneratePath {
            experience_level: ExperienceLevel::MidLevel,
            tech_stack: vec![],
            number_of_questions: 5,
        };
        handle_user_command(&mut state, cmd, &ui_tx).await;
        match ui_rx.recv().await.unwrap() {
            UiUpdate::Toast(t) => assert_eq!(t.title, "No tech stack selected"),
            other => panic!("Expected Toast, got {:?}", other),
        }
        assert!(state.llm_mode.is_none());
        assert_eq!(state.llm_generation, 0);
    }

    #[tokio::test]
    async fn generate_with_disabled_client_fails_through_event() {
        let (mut state, mut llm_rx) = signed_in_state().await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);
        let cmd = UserCommand::GeneratePath {
            experience_level: ExperienceLevel::MidLevel,
            tech_stack: vec!["react".into()],
            number_of_questions: 99,
        };
        handle_user_command(&mut state, cmd, &ui_tx).await;
        assert_eq!(ui_rx.recv().await.unwrap(), UiUpdate::GenerationStarted);
        assert_eq!(state.llm_generation, 1);

        let event = llm_rx.recv().await.unwrap();
        assert_eq!(event.generation(), 1);
        handle_llm_event(&mut state, event, &ui_tx).await;
        assert_eq!(
            ui_rx.recv().await.unwrap(),
            UiUpdate::GenerationFailed("LLM not configured".into())
        );
    }

    #[tokio::test]
    async fn cancel_makes_in_flight_events_stale() {
        let (mut state, _rx) = signed_in_state().await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);
        state.llm_mode = Some(LlmMode::LearningPath {
            experience_level: ExperienceLevel::Junior,
            tech_stack: vec!["react".into()],
        });
        handle_user_command(&mut state, UserCommand::CancelGeneration, &ui_tx).await;
        assert!(matches!(ui_rx.recv().await.unwrap(), UiUpdate::GenerationFailed(_)));
        assert!(matches!(ui_rx.recv().await.unwrap(), UiUpdate::Toast(_)));

        handle_llm_event(&mut state, LlmEvent::Token { text: "x".into(), generation: 0 }, &ui_tx).await;
        assert!(ui_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn protected_screens_redirect_when_signed_out() {
        let (mut state, _rx) = create_test_app_state();
        let (ui_tx, mut ui_rx) = mpsc::channel(16);
        handle_user_command(&mut state, UserCommand::SwitchScreen(ScreenId::Performance), &ui_tx).await;
        assert!(matches!(ui_rx.recv().await.unwrap(), UiUpdate::Toast(_)));
        assert_eq!(ui_rx.recv().await.unwrap(), UiUpdate::Screen(ScreenId::SignIn));
        assert_eq!(state.active_screen, ScreenId::SignIn);
    }

    #[tokio::test]
    async fn category_filter_is_lowercased() {
        let (mut state, _rx) = signed_in_state().await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);
        handle_user_command(&mut state, UserCommand::SelectCategory("React".into()), &ui_tx).await;
        match ui_rx.recv().await.unwrap() {
            UiUpdate::Snapshot(s) => assert_eq!(s.category_filter, "react"),
            other => panic!("Expected Snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn seeding_signed_out_reports_must_be_logged_in() {
        let (mut state, _rx) = create_test_app_state();
        let (ui_tx, mut ui_rx) = mpsc::channel(16);
        handle_user_command(&mut state, UserCommand::SeedSampleData, &ui_tx).await;
        match ui_rx.recv().await.unwrap() {
            UiUpdate::Toast(t) => assert_eq!(t.description, "must be logged in"),
            other => panic!("Expected Toast, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn event_loop_handles_quit_command() {
        let (state, llm_rx) = create_test_app_state();
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (ui_tx, mut ui_rx) = mpsc::channel(64);

        let handle = tokio::spawn(run(llm_rx, cmd_rx, ui_tx, state));
        assert!(matches!(ui_rx.recv().await.unwrap(), UiUpdate::Snapshot(_)));

        cmd_tx.send(UserCommand::Quit).await.unwrap();
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }
}
