// Sample data for a fresh account: a daily challenge document, two
// standalone questions and a learning path that contains them.

use anyhow::Context;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use codeprep_core::db::{Database, StorePath};
use codeprep_core::model::{
    DailyChallenge, Difficulty, GeneratedQuestion, LearningPath, Millis, User,
};

use crate::auth::AuthError;
use crate::daily::DAILY_POINTS;

pub const SEEDED_CHALLENGE_ID: &str = "daily-1";
pub const SEEDED_TIME_REMAINING: &str = "12h 30m";

/// What a seeding run wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedReport {
    pub path_id: String,
    pub question_ids: Vec<String>,
    pub challenge_title: String,
}

/// The two sample questions, `q1` created at `now` and `q2` ten seconds
/// earlier.
pub fn sample_questions(now: Millis) -> Vec<GeneratedQuestion> {
    let question = |id: &str, title: &str, description: &str, difficulty, created_at| {
        GeneratedQuestion {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category: "JavaScript".to_string(),
            difficulty,
            requirements: vec![],
            hints: vec![],
            solution: None,
            test_cases: None,
            estimated_time: None,
            created_at,
            status: None,
            completed_at: None,
            time_spent: None,
        }
    };
    vec![
        question(
            "q1",
            "Array.prototype.map Implementation",
            "Implement your own version of Array.prototype.map.",
            Difficulty::Beginner,
            now,
        ),
        question(
            "q2",
            "Promise.all Polyfill",
            "Write a polyfill for Promise.all.",
            Difficulty::Advanced,
            now - 10_000,
        ),
    ]
}

/// Id of the seeded path for `user_id`. Seeding twice replaces it.
pub fn sample_path_id(user_id: &str) -> String {
    format!("sample-{user_id}")
}

/// Write the sample data for `user`. Fails with `NotSignedIn` when there is
/// no user.
pub fn seed_sample_data<R: Rng + ?Sized>(
    db: &Database,
    user: Option<&User>,
    now: Millis,
    rng: &mut R,
) -> Result<SeedReport, AuthError> {
    let user = user.ok_or(AuthError::NotSignedIn)?;
    let questions = sample_questions(now);

    let mut daily = questions
        .choose(rng)
        .cloned()
        .context("no sample questions to pick from")?;
    daily.id = SEEDED_CHALLENGE_ID.to_string();
    let challenge = DailyChallenge {
        question: daily,
        points: DAILY_POINTS,
        time_remaining: SEEDED_TIME_REMAINING.to_string(),
    };
    let value = serde_json::to_value(&challenge).context("failed to serialize daily challenge")?;
    db.put_document(&StorePath::DailyChallenge, &value)?;

    db.replace_questions(&user.id, &questions)?;

    let path_id = sample_path_id(&user.id);
    db.delete_learning_path(&user.id, &path_id)?;
    db.insert_learning_path(&LearningPath {
        id: path_id.clone(),
        user_id: user.id.clone(),
        experience_level: "junior".to_string(),
        tech_stack: vec!["javascript".to_string()],
        questions: questions.clone(),
        created_at: now,
        updated_at: now,
    })?;

    info!("Seeded sample data for {}", user.id);
    Ok(SeedReport {
        path_id,
        question_ids: questions.into_iter().map(|q| q.id).collect(),
        challenge_title: challenge.question.title,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
