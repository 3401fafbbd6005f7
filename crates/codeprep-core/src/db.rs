// SQLite document store for users, learning paths, questions and derived
// documents, with a change feed for live listeners.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;
use tracing::debug;

use crate::model::{
    GeneratedQuestion, LearningPath, LearningPathUpdate, Millis, QuestionStatus, User,
};

/// Buffered change notifications per subscriber before it starts lagging.
const CHANGE_FEED_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Logical paths
// ---------------------------------------------------------------------------

/// Logical location of a record, rendered the way a hierarchical document
/// store would address it (`learningPaths/{userId}/{pathId}`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StorePath {
    User(String),
    LearningPath { user_id: String, path_id: String },
    Questions(String),
    DailyChallenge,
    UserProgress(String),
    SkillGrowth(String),
    StrengthsWeaknesses(String),
    FocusAreas(String),
}

impl StorePath {
    /// The user the record belongs to, if it is user-scoped.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            StorePath::User(id)
            | StorePath::Questions(id)
            | StorePath::UserProgress(id)
            | StorePath::SkillGrowth(id)
            | StorePath::StrengthsWeaknesses(id)
            | StorePath::FocusAreas(id) => Some(id),
            StorePath::LearningPath { user_id, .. } => Some(user_id),
            StorePath::DailyChallenge => None,
        }
    }

    /// True for changes under `learningPaths/{user_id}`.
    pub fn is_learning_path_of(&self, user: &str) -> bool {
        matches!(self, StorePath::LearningPath { user_id, .. } if user_id == user)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorePath::User(id) => write!(f, "users/{id}"),
            StorePath::LearningPath { user_id, path_id } => {
                write!(f, "learningPaths/{user_id}/{path_id}")
            }
            StorePath::Questions(id) => write!(f, "questions/{id}"),
            StorePath::DailyChallenge => f.write_str("dailyChallenge"),
            StorePath::UserProgress(id) => write!(f, "userProgress/{id}"),
            StorePath::SkillGrowth(id) => write!(f, "skillGrowth/{id}"),
            StorePath::StrengthsWeaknesses(id) => write!(f, "strengthsWeaknesses/{id}"),
            StorePath::FocusAreas(id) => write!(f, "focusAreas/{id}"),
        }
    }
}

/// Emitted on the change feed after every successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub path: StorePath,
}

/// Stored password credentials for the local identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub email: String,
    pub password_hash: String,
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

pub struct Database {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<StoreChange>,
}

impl Database {
    /// Open (or create) the store at `path` and ensure the schema exists.
    /// `":memory:"` gives an ephemeral database for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id         TEXT PRIMARY KEY,
                name       TEXT NOT NULL,
                email      TEXT NOT NULL,
                role       TEXT NOT NULL,
                avatar     TEXT,
                created_at INTEGER NOT NULL,
                last_login INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS credentials (
                user_id       TEXT PRIMARY KEY,
                email         TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS learning_paths (
                id               TEXT PRIMARY KEY,
                user_id          TEXT NOT NULL,
                experience_level TEXT NOT NULL,
                tech_stack       TEXT NOT NULL,
                created_at       INTEGER NOT NULL,
                updated_at       INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS path_questions (
                path_id     TEXT NOT NULL REFERENCES learning_paths(id) ON DELETE CASCADE,
                position    INTEGER NOT NULL,
                question_id TEXT NOT NULL,
                body        TEXT NOT NULL,
                PRIMARY KEY (path_id, position)
            );

            CREATE TABLE IF NOT EXISTS questions (
                id         TEXT NOT NULL,
                user_id    TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                body       TEXT NOT NULL,
                PRIMARY KEY (user_id, id)
            );

            CREATE TABLE IF NOT EXISTS documents (
                path  TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_learning_paths_user ON learning_paths(user_id);
            CREATE INDEX IF NOT EXISTS idx_questions_user ON questions(user_id);
            ",
        )
        .context("failed to create database schema")?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);

        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Receive a [`StoreChange`] for every subsequent write.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn publish(&self, path: StorePath) {
        debug!("store change: {}", path);
        // No subscribers is fine.
        let _ = self.changes.send(StoreChange { path });
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn insert_user(&self, user: &User) -> Result<()> {
        {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO users (id, name, email, role, avatar, created_at, last_login)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id,
                    user.name,
                    user.email,
                    user.role,
                    user.avatar,
                    user.created_at,
                    user.last_login,
                ],
            )
            .context("failed to insert user")?;
        }
        self.publish(StorePath::User(user.id.clone()));
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, email, role, avatar, created_at, last_login
             FROM users WHERE id = ?1",
            params![user_id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    role: row.get(3)?,
                    avatar: row.get(4)?,
                    created_at: row.get(5)?,
                    last_login: row.get(6)?,
                })
            },
        )
        .optional()
        .context("failed to load user")
    }

    /// Set `last_login`. Returns `false` if the user does not exist.
    pub fn touch_last_login(&self, user_id: &str, now: Millis) -> Result<bool> {
        let changed = {
            let conn = self.conn();
            conn.execute(
                "UPDATE users SET last_login = ?2 WHERE id = ?1",
                params![user_id, now],
            )
            .context("failed to update last login")?
        };
        if changed > 0 {
            self.publish(StorePath::User(user_id.to_string()));
        }
        Ok(changed > 0)
    }

    /// Update display name and avatar. Returns `false` if the user does not
    /// exist.
    pub fn update_user_profile(
        &self,
        user_id: &str,
        name: &str,
        avatar: Option<&str>,
    ) -> Result<bool> {
        let changed = {
            let conn = self.conn();
            conn.execute(
                "UPDATE users SET name = ?2, avatar = ?3 WHERE id = ?1",
                params![user_id, name, avatar],
            )
            .context("failed to update user profile")?
        };
        if changed > 0 {
            self.publish(StorePath::User(user_id.to_string()));
        }
        Ok(changed > 0)
    }

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    pub fn insert_credentials(&self, user_id: &str, email: &str, password_hash: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO credentials (user_id, email, password_hash) VALUES (?1, ?2, ?3)",
            params![user_id, email, password_hash],
        )
        .context("failed to insert credentials")?;
        Ok(())
    }

    pub fn credentials_by_email(&self, email: &str) -> Result<Option<Credentials>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT user_id, email, password_hash FROM credentials WHERE email = ?1",
            params![email],
            |row| {
                Ok(Credentials {
                    user_id: row.get(0)?,
                    email: row.get(1)?,
                    password_hash: row.get(2)?,
                })
            },
        )
        .optional()
        .context("failed to load credentials")
    }

    // ------------------------------------------------------------------
    // Learning paths
    // ------------------------------------------------------------------

    /// Store a path and its questions (in order) in one transaction.
    pub fn insert_learning_path(&self, path: &LearningPath) -> Result<()> {
        {
            let mut conn = self.conn();
            let tech_stack_json = serde_json::to_string(&path.tech_stack)
                .context("failed to serialize tech stack")?;
            let tx = conn.transaction().context("failed to begin transaction")?;
            tx.execute(
                "INSERT INTO learning_paths
                    (id, user_id, experience_level, tech_stack, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    path.id,
                    path.user_id,
                    path.experience_level,
                    tech_stack_json,
                    path.created_at,
                    path.updated_at,
                ],
            )
            .context("failed to insert learning path")?;
            write_path_questions(&tx, &path.id, &path.questions)?;
            tx.commit().context("failed to commit learning path")?;
        }
        self.publish(StorePath::LearningPath {
            user_id: path.user_id.clone(),
            path_id: path.id.clone(),
        });
        Ok(())
    }

    /// All paths of a user, newest first.
    pub fn list_learning_paths(&self, user_id: &str) -> Result<Vec<LearningPath>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, experience_level, tech_stack, created_at, updated_at
                 FROM learning_paths WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )
            .context("failed to prepare list_learning_paths query")?;

        let rows = stmt
            .query_map(params![user_id], path_row)
            .context("failed to query learning paths")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map learning path rows")?;

        let mut paths = Vec::with_capacity(rows.len());
        for row in rows {
            let questions = load_path_questions(&conn, &row.id)?;
            paths.push(row.into_path(questions)?);
        }
        Ok(paths)
    }

    pub fn get_learning_path(&self, user_id: &str, path_id: &str) -> Result<Option<LearningPath>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT id, user_id, experience_level, tech_stack, created_at, updated_at
                 FROM learning_paths WHERE id = ?1 AND user_id = ?2",
                params![path_id, user_id],
                path_row,
            )
            .optional()
            .context("failed to load learning path")?;

        match row {
            Some(row) => {
                let questions = load_path_questions(&conn, &row.id)?;
                Ok(Some(row.into_path(questions)?))
            }
            None => Ok(None),
        }
    }

    /// Apply a targeted update and bump `updated_at`. Questions, when given,
    /// replace the stored list wholesale. Returns `false` if the path does
    /// not exist.
    pub fn update_learning_path(
        &self,
        user_id: &str,
        path_id: &str,
        update: &LearningPathUpdate,
        now: Millis,
    ) -> Result<bool> {
        {
            let mut conn = self.conn();
            let tx = conn.transaction().context("failed to begin transaction")?;

            let changed = tx
                .execute(
                    "UPDATE learning_paths SET updated_at = ?3 WHERE id = ?1 AND user_id = ?2",
                    params![path_id, user_id, now],
                )
                .context("failed to touch learning path")?;
            if changed == 0 {
                return Ok(false);
            }

            if let Some(level) = &update.experience_level {
                tx.execute(
                    "UPDATE learning_paths SET experience_level = ?2 WHERE id = ?1",
                    params![path_id, level],
                )
                .context("failed to update experience level")?;
            }
            if let Some(stack) = &update.tech_stack {
                let json =
                    serde_json::to_string(stack).context("failed to serialize tech stack")?;
                tx.execute(
                    "UPDATE learning_paths SET tech_stack = ?2 WHERE id = ?1",
                    params![path_id, json],
                )
                .context("failed to update tech stack")?;
            }
            if let Some(questions) = &update.questions {
                tx.execute(
                    "DELETE FROM path_questions WHERE path_id = ?1",
                    params![path_id],
                )
                .context("failed to clear path questions")?;
                write_path_questions(&tx, path_id, questions)?;
            }

            tx.commit().context("failed to commit learning path update")?;
        }
        self.publish(StorePath::LearningPath {
            user_id: user_id.to_string(),
            path_id: path_id.to_string(),
        });
        Ok(true)
    }

    /// Remove a path and its questions. Returns `false` if it did not exist.
    pub fn delete_learning_path(&self, user_id: &str, path_id: &str) -> Result<bool> {
        let removed = {
            let mut conn = self.conn();
            let tx = conn.transaction().context("failed to begin transaction")?;
            let exists: bool = tx
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM learning_paths WHERE id = ?1 AND user_id = ?2)",
                    params![path_id, user_id],
                    |row| row.get(0),
                )
                .context("failed to check learning path")?;
            if exists {
                tx.execute(
                    "DELETE FROM path_questions WHERE path_id = ?1",
                    params![path_id],
                )
                .context("failed to delete path questions")?;
                tx.execute(
                    "DELETE FROM learning_paths WHERE id = ?1 AND user_id = ?2",
                    params![path_id, user_id],
                )
                .context("failed to delete learning path")?;
            }
            tx.commit().context("failed to commit learning path delete")?;
            exists
        };
        if removed {
            self.publish(StorePath::LearningPath {
                user_id: user_id.to_string(),
                path_id: path_id.to_string(),
            });
        }
        Ok(removed)
    }

    /// Rewrite the question at `index` of a path in place. Only that
    /// question changes; the path's `updated_at` is left alone.
    pub fn modify_path_question<F>(
        &self,
        user_id: &str,
        path_id: &str,
        index: usize,
        modify: F,
    ) -> Result<GeneratedQuestion>
    where
        F: FnOnce(&mut GeneratedQuestion),
    {
        let updated = {
            let conn = self.conn();
            let owned: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM learning_paths WHERE id = ?1 AND user_id = ?2)",
                    params![path_id, user_id],
                    |row| row.get(0),
                )
                .context("failed to check learning path")?;
            if !owned {
                bail!("learning path {path_id} not found for user {user_id}");
            }

            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM path_questions WHERE path_id = ?1 AND position = ?2",
                    params![path_id, index as i64],
                    |row| row.get(0),
                )
                .optional()
                .context("failed to load path question")?;
            let Some(body) = body else {
                bail!("no question at position {index} in path {path_id}");
            };

            let mut question: GeneratedQuestion =
                serde_json::from_str(&body).context("failed to deserialize path question")?;
            modify(&mut question);
            let body = serde_json::to_string(&question).context("failed to serialize question")?;
            conn.execute(
                "UPDATE path_questions SET body = ?3, question_id = ?4
                 WHERE path_id = ?1 AND position = ?2",
                params![path_id, index as i64, body, question.id],
            )
            .context("failed to update path question")?;
            question
        };
        self.publish(StorePath::LearningPath {
            user_id: user_id.to_string(),
            path_id: path_id.to_string(),
        });
        Ok(updated)
    }

    /// Set status (and completion time) of the question at `index`.
    pub fn update_path_question_status(
        &self,
        user_id: &str,
        path_id: &str,
        index: usize,
        status: QuestionStatus,
        completed_at: Option<Millis>,
    ) -> Result<GeneratedQuestion> {
        self.modify_path_question(user_id, path_id, index, |q| {
            q.status = Some(status);
            if completed_at.is_some() {
                q.completed_at = completed_at;
            }
        })
    }

    // ------------------------------------------------------------------
    // Standalone questions
    // ------------------------------------------------------------------

    pub fn insert_question(&self, user_id: &str, question: &GeneratedQuestion) -> Result<()> {
        {
            let conn = self.conn();
            let body = serde_json::to_string(question).context("failed to serialize question")?;
            conn.execute(
                "INSERT INTO questions (id, user_id, created_at, body) VALUES (?1, ?2, ?3, ?4)",
                params![question.id, user_id, question.created_at, body],
            )
            .context("failed to insert question")?;
        }
        self.publish(StorePath::Questions(user_id.to_string()));
        Ok(())
    }

    /// Replace all of a user's standalone questions in one transaction.
    pub fn replace_questions(&self, user_id: &str, questions: &[GeneratedQuestion]) -> Result<()> {
        {
            let mut conn = self.conn();
            let tx = conn.transaction().context("failed to begin transaction")?;
            tx.execute("DELETE FROM questions WHERE user_id = ?1", params![user_id])
                .context("failed to clear questions")?;
            for question in questions {
                let body =
                    serde_json::to_string(question).context("failed to serialize question")?;
                tx.execute(
                    "INSERT INTO questions (id, user_id, created_at, body) VALUES (?1, ?2, ?3, ?4)",
                    params![question.id, user_id, question.created_at, body],
                )
                .context("failed to insert question")?;
            }
            tx.commit().context("failed to commit questions")?;
        }
        self.publish(StorePath::Questions(user_id.to_string()));
        Ok(())
    }

    /// A user's standalone questions, newest first.
    pub fn list_questions(&self, user_id: &str) -> Result<Vec<GeneratedQuestion>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT body FROM questions WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )
            .context("failed to prepare list_questions query")?;
        let bodies = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))
            .context("failed to query questions")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map question rows")?;

        bodies
            .iter()
            .map(|b| serde_json::from_str(b).context("failed to deserialize question"))
            .collect()
    }

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Store a JSON document at `path`, replacing any previous value.
    pub fn put_document(&self, path: &StorePath, value: &serde_json::Value) -> Result<()> {
        {
            let conn = self.conn();
            let json_str =
                serde_json::to_string(value).context("failed to serialize document")?;
            conn.execute(
                "INSERT OR REPLACE INTO documents (path, value) VALUES (?1, ?2)",
                params![path.to_string(), json_str],
            )
            .with_context(|| format!("failed to write document {path}"))?;
        }
        self.publish(path.clone());
        Ok(())
    }

    pub fn get_document(&self, path: &StorePath) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let json_str: Option<String> = conn
            .query_row(
                "SELECT value FROM documents WHERE path = ?1",
                params![path.to_string()],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to read document {path}"))?;

        match json_str {
            Some(s) => {
                let value = serde_json::from_str(&s)
                    .with_context(|| format!("failed to deserialize document {path}"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Returns `true` if a document was removed.
    pub fn delete_document(&self, path: &StorePath) -> Result<bool> {
        let removed = {
            let conn = self.conn();
            conn.execute(
                "DELETE FROM documents WHERE path = ?1",
                params![path.to_string()],
            )
            .with_context(|| format!("failed to delete document {path}"))?
        };
        if removed > 0 {
            self.publish(path.clone());
        }
        Ok(removed > 0)
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

struct PathRow {
    id: String,
    user_id: String,
    experience_level: String,
    tech_stack: String,
    created_at: Millis,
    updated_at: Millis,
}

impl PathRow {
    fn into_path(self, questions: Vec<GeneratedQuestion>) -> Result<LearningPath> {
        let tech_stack: Vec<String> =
            serde_json::from_str(&self.tech_stack).context("failed to deserialize tech stack")?;
        Ok(LearningPath {
            id: self.id,
            user_id: self.user_id,
            experience_level: self.experience_level,
            tech_stack,
            questions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn path_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PathRow> {
    Ok(PathRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        experience_level: row.get(2)?,
        tech_stack: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn load_path_questions(conn: &Connection, path_id: &str) -> Result<Vec<GeneratedQuestion>> {
    let mut stmt = conn
        .prepare("SELECT body FROM path_questions WHERE path_id = ?1 ORDER BY position")
        .context("failed to prepare path questions query")?;
    let bodies = stmt
        .query_map(params![path_id], |row| row.get::<_, String>(0))
        .context("failed to query path questions")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to map path question rows")?;

    bodies
        .iter()
        .map(|b| serde_json::from_str(b).context("failed to deserialize path question"))
        .collect()
}

fn write_path_questions(
    conn: &Connection,
    path_id: &str,
    questions: &[GeneratedQuestion],
) -> Result<()> {
    for (position, question) in questions.iter().enumerate() {
        let body = serde_json::to_string(question).context("failed to serialize question")?;
        conn.execute(
            "INSERT INTO path_questions (path_id, position, question_id, body)
             VALUES (?1, ?2, ?3, ?4)",
            params![path_id, position as i64, question.id, body],
        )
        .context("failed to insert path question")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
