// CodePrep entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Open database
// 4. Load the question bank
// 5. Build the LLM client and identity provider
// 6. Create mpsc channels
// 7. Spawn app logic task
// 8. Run the TUI until the user quits
// 9. Cleanup on exit

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

use codeprep_app::AppState;
use codeprep_core::config;
use codeprep_core::db::Database;
use codeprep_llm::LlmClient;
use codeprep_practice::auth::LocalIdentityProvider;
use codeprep_practice::catalog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("CodePrep starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!("Config loaded: model={}", config.llm.model);

    let db_path = config
        .resolve_db_path()
        .context("failed to resolve database path")?;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Arc::new(
        Database::open(&db_path.to_string_lossy()).context("failed to open database")?,
    );
    info!("Database opened at {}", db_path.display());

    let bank = catalog::load_with_extra(config.question_bank_path().map(std::path::Path::new))
        .context("failed to load question bank")?;
    info!("Question bank loaded: {} questions", bank.len());

    let (llm_tx, llm_rx) = mpsc::channel(256);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    let llm_client = LlmClient::from_config(&config);
    match &llm_client {
        LlmClient::Active(_) => info!("LLM client initialized (API key configured)"),
        LlmClient::Disabled => info!("LLM client disabled (no API key)"),
    }

    let view_state = codeprep_tui::ViewState::with_question_limits(
        config.questions.default_count,
        config.questions.max_count,
    );
    let provider = Arc::new(LocalIdentityProvider::new(Arc::clone(&db)));
    let app_state = AppState::new(config, db, provider, bank, llm_client, llm_tx);

    let app_handle = tokio::spawn(async move {
        if let Err(e) = codeprep_app::run(llm_rx, cmd_rx, ui_tx, app_state).await {
            error!("Application loop error: {}", e);
        }
    });

    info!("Application ready");
    if let Err(e) = codeprep_tui::run(ui_rx, cmd_tx, view_state).await {
        error!("TUI error: {}", e);
    }

    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    info!("CodePrep shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which is used by the TUI).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("codeprep.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("codeprep=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
