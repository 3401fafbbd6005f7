// Configuration loading and parsing (app.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound accepted for `questions.max_count`.
const HARD_MAX_QUESTIONS: u32 = 100;

/// File name of the database when `database.path` is left empty.
const DEFAULT_DB_FILE: &str = "codeprep.db";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },

    #[error("no platform data directory available; set database.path explicitly")]
    NoDataDir,
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub questions: QuestionsConfig,
    pub credentials: CredentialsConfig,
    /// Raw `database.path`; see [`Config::resolve_db_path`].
    pub db_path: String,
}

impl Config {
    /// Database location: the configured path, or `codeprep.db` inside the
    /// platform data directory when the setting is empty.
    pub fn resolve_db_path(&self) -> Result<PathBuf, ConfigError> {
        if !self.db_path.trim().is_empty() {
            return Ok(PathBuf::from(&self.db_path));
        }
        let dirs = directories::ProjectDirs::from("dev", "codeprep", "codeprep")
            .ok_or(ConfigError::NoDataDir)?;
        Ok(dirs.data_dir().join(DEFAULT_DB_FILE))
    }

    /// Extra question bank CSV, if one is configured.
    pub fn question_bank_path(&self) -> Option<&str> {
        let path = self.questions.bank_path.trim();
        (!path.is_empty()).then_some(path)
    }
}

// ---------------------------------------------------------------------------
// app.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire app.toml file.
#[derive(Debug, Clone, Deserialize)]
struct AppFile {
    llm: LlmConfig,
    database: DatabaseSection,
    questions: QuestionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    #[serde(default)]
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub generation_max_tokens: u32,
    pub personalized_max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionsConfig {
    pub default_count: u32,
    pub max_count: u32,
    #[serde(default)]
    pub bank_path: String,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub anthropic_api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/app.toml` and (optionally)
/// `config/credentials.toml`, relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    let app_path = config_dir.join("app.toml");
    let app_text = read_file(&app_path)?;
    let app: AppFile = toml::from_str(&app_text).map_err(|e| ConfigError::ParseError {
        path: app_path.clone(),
        source: e,
    })?;

    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        llm: app.llm,
        questions: app.questions,
        credentials,
        db_path: app.database.path,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy every missing file from `defaults/` into `config/`. Returns the
/// files that were copied. `.example` templates are skipped.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying defaults
/// first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.llm.model.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "llm.model".into(),
            message: "must not be empty".into(),
        });
    }

    let token_fields: &[(&str, u32)] = &[
        ("llm.generation_max_tokens", config.llm.generation_max_tokens),
        ("llm.personalized_max_tokens", config.llm.personalized_max_tokens),
    ];
    for (name, val) in token_fields {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    let q = &config.questions;
    if q.max_count == 0 || q.max_count > HARD_MAX_QUESTIONS {
        return Err(ConfigError::ValidationError {
            field: "questions.max_count".into(),
            message: format!("must be between 1 and {HARD_MAX_QUESTIONS}, got {}", q.max_count),
        });
    }
    if q.default_count == 0 || q.default_count > q.max_count {
        return Err(ConfigError::ValidationError {
            field: "questions.default_count".into(),
            message: format!(
                "must be between 1 and questions.max_count ({}), got {}",
                q.max_count, q.default_count
            ),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Repository root holding `defaults/`, whether tests run from the crate
    /// directory or the workspace root.
    fn project_root() -> PathBuf {
        let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        for candidate in [manifest.clone(), manifest.join("../..")] {
            if candidate.join("defaults/app.toml").exists() {
                return candidate;
            }
        }
        panic!("Cannot locate defaults/ from {:?}", manifest);
    }

    /// Fresh scratch dir with `config/app.toml` copied from the defaults.
    fn scratch(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::copy(
            project_root().join("defaults/app.toml"),
            tmp.join("config/app.toml"),
        )
        .unwrap();
        tmp
    }

    fn rewrite_app(tmp: &Path, from: &str, to: &str) {
        let path = tmp.join("config/app.toml");
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(from), "fixture missing `{from}`");
        fs::write(&path, text.replace(from, to)).unwrap();
    }

    #[test]
    fn load_default_config() {
        let tmp = scratch("codeprep_config_defaults");
        let config = load_config_from(&tmp).expect("defaults should load");

        assert_eq!(config.llm.model, "claude-sonnet-4-5-20250929");
        assert_eq!(config.llm.generation_max_tokens, 4096);
        assert_eq!(config.questions.default_count, 5);
        assert_eq!(config.questions.max_count, 30);
        assert!(config.db_path.is_empty());
        assert!(config.question_bank_path().is_none());
        assert!(config.credentials.anthropic_api_key.is_none());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn credentials_toml_with_api_key() {
        let tmp = scratch("codeprep_config_creds");
        fs::write(
            tmp.join("config/credentials.toml"),
            "anthropic_api_key = \"sk-ant-test-key\"\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(
            config.credentials.anthropic_api_key.as_deref(),
            Some("sk-ant-test-key")
        );

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_app_toml_is_file_not_found() {
        let tmp = std::env::temp_dir().join("codeprep_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let tmp = scratch("codeprep_config_malformed");
        fs::write(tmp.join("config/app.toml"), "[llm\nmodel = ").unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_default_count_above_max() {
        let tmp = scratch("codeprep_config_default_count");
        rewrite_app(&tmp, "default_count = 5", "default_count = 31");

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "questions.default_count");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_max_tokens() {
        let tmp = scratch("codeprep_config_tokens");
        rewrite_app(&tmp, "personalized_max_tokens = 1024", "personalized_max_tokens = 0");

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "llm.personalized_max_tokens");
            }
            other => panic!("expected ValidationError, got: {other}"),
        }

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn explicit_db_path_is_used_verbatim() {
        let tmp = scratch("codeprep_config_db_path");
        rewrite_app(&tmp, "\npath = \"\"", "\npath = \"practice.db\"");

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.resolve_db_path().unwrap(), PathBuf::from("practice.db"));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_once_and_skips_examples() {
        let tmp = std::env::temp_dir().join("codeprep_config_ensure");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::write(tmp.join("defaults/app.toml"), "x = 1\n").unwrap();
        fs::write(tmp.join("defaults/credentials.toml.example"), "k = 1\n").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied, vec![tmp.join("config/app.toml")]);
        assert!(!tmp.join("config/credentials.toml.example").exists());

        // A user edit survives the second run.
        fs::write(tmp.join("config/app.toml"), "x = 2\n").unwrap();
        let copied = ensure_config_files(&tmp).unwrap();
        assert!(copied.is_empty());
        assert_eq!(fs::read_to_string(tmp.join("config/app.toml")).unwrap(), "x = 2\n");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_without_any_dirs() {
        let tmp = std::env::temp_dir().join("codeprep_config_nothing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let err = ensure_config_files(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::DefaultsCopyError { .. }));

        let _ = fs::remove_dir_all(&tmp);
    }
}
