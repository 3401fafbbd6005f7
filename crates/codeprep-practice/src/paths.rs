// Learning paths and saved questions for a user.
//
// Thin service over the store: each operation logs failures and wraps them
// in a short context message so callers can surface a generic error.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use codeprep_core::db::Database;
use codeprep_core::model::{
    new_id, now_millis, GeneratedQuestion, LearningPath, LearningPathUpdate, QuestionStatus,
};

#[derive(Debug, Error)]
pub enum PathError {
    #[error("path or questions not found")]
    PathNotFound,

    #[error("question not found in path")]
    QuestionNotFound,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// A question located inside one of the user's paths.
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeRef {
    pub question: GeneratedQuestion,
    pub path_id: String,
}

/// Log a store failure and attach `what` as context.
fn logged<T>(result: anyhow::Result<T>, what: &'static str) -> Result<T, PathError> {
    result.map_err(|e| {
        error!("{what}: {e:#}");
        PathError::Store(e.context(what))
    })
}

pub struct PathService {
    db: Arc<Database>,
}

impl PathService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    // ------------------------------------------------------------------
    // Paths
    // ------------------------------------------------------------------

    /// Store a new path and return its id.
    pub fn save_learning_path(
        &self,
        user_id: &str,
        experience_level: &str,
        tech_stack: &[String],
        questions: Vec<GeneratedQuestion>,
    ) -> Result<String, PathError> {
        let now = now_millis();
        let path = LearningPath {
            id: new_id(),
            user_id: user_id.to_string(),
            experience_level: experience_level.to_string(),
            tech_stack: tech_stack.to_vec(),
            questions,
            created_at: now,
            updated_at: now,
        };
        logged(
            self.db.insert_learning_path(&path),
            "failed to save learning path",
        )?;
        info!(
            "Saved learning path {} with {} questions for {}",
            path.id,
            path.questions.len(),
            user_id
        );
        Ok(path.id)
    }

    /// Newest first.
    pub fn user_learning_paths(&self, user_id: &str) -> Result<Vec<LearningPath>, PathError> {
        logged(
            self.db.list_learning_paths(user_id),
            "failed to load learning paths",
        )
    }

    pub fn learning_path(
        &self,
        user_id: &str,
        path_id: &str,
    ) -> Result<Option<LearningPath>, PathError> {
        logged(
            self.db.get_learning_path(user_id, path_id),
            "failed to load learning path",
        )
    }

    pub fn update_learning_path(
        &self,
        user_id: &str,
        path_id: &str,
        update: &LearningPathUpdate,
    ) -> Result<(), PathError> {
        let found = logged(
            self.db
                .update_learning_path(user_id, path_id, update, now_millis()),
            "failed to update learning path",
        )?;
        if !found {
            return Err(PathError::PathNotFound);
        }
        Ok(())
    }

    /// Returns whether a path was removed; deleting a missing path is not an
    /// error.
    pub fn delete_learning_path(&self, user_id: &str, path_id: &str) -> Result<bool, PathError> {
        let removed = logged(
            self.db.delete_learning_path(user_id, path_id),
            "failed to delete learning path",
        )?;
        if removed {
            info!("Deleted learning path {} for {}", path_id, user_id);
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Standalone questions
    // ------------------------------------------------------------------

    /// Store a question under `questions/{user}`. The id and creation time
    /// are assigned here.
    pub fn save_question(
        &self,
        user_id: &str,
        mut question: GeneratedQuestion,
    ) -> Result<String, PathError> {
        question.id = new_id();
        question.created_at = now_millis();
        logged(
            self.db.insert_question(user_id, &question),
            "failed to save question",
        )?;
        Ok(question.id)
    }

    pub fn user_questions(&self, user_id: &str) -> Result<Vec<GeneratedQuestion>, PathError> {
        logged(self.db.list_questions(user_id), "failed to load questions")
    }

    // ------------------------------------------------------------------
    // Question progress
    // ------------------------------------------------------------------

    fn locate(&self, user_id: &str, path_id: &str, question_id: &str) -> Result<usize, PathError> {
        let path = self
            .learning_path(user_id, path_id)?
            .filter(|p| !p.questions.is_empty())
            .ok_or(PathError::PathNotFound)?;
        path.questions
            .iter()
            .position(|q| q.id == question_id)
            .ok_or(PathError::QuestionNotFound)
    }

    /// Set `completed` and `completed_at = now` on one question.
    pub fn mark_question_complete(
        &self,
        user_id: &str,
        path_id: &str,
        question_id: &str,
    ) -> Result<GeneratedQuestion, PathError> {
        let index = self.locate(user_id, path_id, question_id)?;
        let question = logged(
            self.db.update_path_question_status(
                user_id,
                path_id,
                index,
                QuestionStatus::Completed,
                Some(now_millis()),
            ),
            "failed to mark question complete",
        )?;
        info!("Completed question {} in path {}", question_id, path_id);
        Ok(question)
    }

    /// Mark a question as started. Completed questions stay completed.
    pub fn mark_question_in_progress(
        &self,
        user_id: &str,
        path_id: &str,
        question_id: &str,
    ) -> Result<GeneratedQuestion, PathError> {
        let index = self.locate(user_id, path_id, question_id)?;
        logged(
            self.db.modify_path_question(user_id, path_id, index, |q| {
                if !q.is_completed() {
                    q.status = Some(QuestionStatus::InProgress);
                }
            }),
            "failed to mark question in progress",
        )
    }

    /// Add `seconds` to the question's accumulated `time_spent`.
    pub fn record_time_spent(
        &self,
        user_id: &str,
        path_id: &str,
        question_id: &str,
        seconds: u64,
    ) -> Result<GeneratedQuestion, PathError> {
        let index = self.locate(user_id, path_id, question_id)?;
        logged(
            self.db.modify_path_question(user_id, path_id, index, |q| {
                q.time_spent = Some(q.time_spent.unwrap_or(0).saturating_add(seconds));
            }),
            "failed to record time spent",
        )
    }

    /// Find a question by id across the user's paths (optionally only those
    /// of one experience level), together with the first path holding it.
    pub fn find_challenge(
        &self,
        user_id: &str,
        question_id: &str,
        experience_level: Option<&str>,
    ) -> Result<Option<ChallengeRef>, PathError> {
        let paths = self.user_learning_paths(user_id)?;
        Ok(find_in_paths(&paths, question_id, experience_level))
    }
}

/// Search already loaded paths; see [`PathService::find_challenge`].
pub fn find_in_paths(
    paths: &[LearningPath],
    question_id: &str,
    experience_level: Option<&str>,
) -> Option<ChallengeRef> {
    paths
        .iter()
        .filter(|p| experience_level.map_or(true, |level| p.experience_level == level))
        .find_map(|p| {
            p.questions
                .iter()
                .find(|q| q.id == question_id)
                .map(|q| ChallengeRef {
                    question: q.clone(),
                    path_id: p.id.clone(),
                })
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use codeprep_core::model::Difficulty;

    fn service() -> PathService {
        PathService::new(Arc::new(Database::open(":memory:").unwrap()))
    }

    fn question(id: &str) -> GeneratedQuestion {
        GeneratedQuestion {
            id: id.to_string(),
            title: format!("Question {id}"),
            description: "Build it".to_string(),
            category: "React".to_string(),
            difficulty: Difficulty::Intermediate,
            requirements: vec![],
            hints: vec![],
            solution: None,
            test_cases: None,
            estimated_time: Some("30m".to_string()),
            created_at: 1,
            status: None,
            completed_at: None,
            time_spent: None,
        }
    }

    fn stack() -> Vec<String> {
        vec!["react".to_string()]
    }

    #[test]
    fn save_and_list_paths() {
        let svc = service();
        let id = svc
            .save_learning_path("u1", "junior", &stack(), vec![question("a"), question("b")])
            .unwrap();

        let paths = svc.user_learning_paths("u1").unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].id, id);
        assert_eq!(paths[0].created_at, paths[0].updated_at);
        assert_eq!(paths[0].questions.len(), 2);
        assert!(svc.user_learning_paths("u2").unwrap().is_empty());
    }

    #[test]
    fn mark_complete_changes_only_target_question() {
        let svc = service();
        let path_id = svc
            .save_learning_path(
                "u1",
                "mid-level",
                &stack(),
                vec![question("a"), question("b"), question("c")],
            )
            .unwrap();

        let done = svc.mark_question_complete("u1", &path_id, "b").unwrap();
        assert!(done.is_completed());
        assert!(done.completed_at.is_some());

        let path = svc.learning_path("u1", &path_id).unwrap().unwrap();
        let statuses: Vec<_> = path.questions.iter().map(|q| q.status).collect();
        assert_eq!(statuses, vec![None, Some(QuestionStatus::Completed), None]);
    }

    #[test]
    fn mark_complete_errors() {
        let svc = service();
        let err = svc.mark_question_complete("u1", "missing", "a").unwrap_err();
        assert!(matches!(err, PathError::PathNotFound));
        assert_eq!(err.to_string(), "path or questions not found");

        let empty = svc.save_learning_path("u1", "junior", &stack(), vec![]).unwrap();
        assert!(matches!(
            svc.mark_question_complete("u1", &empty, "a").unwrap_err(),
            PathError::PathNotFound
        ));

        let path_id = svc
            .save_learning_path("u1", "junior", &stack(), vec![question("a")])
            .unwrap();
        let err = svc.mark_question_complete("u1", &path_id, "zzz").unwrap_err();
        assert_eq!(err.to_string(), "question not found in path");
    }

    #[test]
    fn in_progress_does_not_undo_completion() {
        let svc = service();
        let path_id = svc
            .save_learning_path("u1", "junior", &stack(), vec![question("a"), question("b")])
            .unwrap();

        let started = svc.mark_question_in_progress("u1", &path_id, "a").unwrap();
        assert_eq!(started.status, Some(QuestionStatus::InProgress));

        svc.mark_question_complete("u1", &path_id, "b").unwrap();
        let still_done = svc.mark_question_in_progress("u1", &path_id, "b").unwrap();
        assert_eq!(still_done.status, Some(QuestionStatus::Completed));
    }

    #[test]
    fn time_spent_accumulates() {
        let svc = service();
        let path_id = svc
            .save_learning_path("u1", "junior", &stack(), vec![question("a")])
            .unwrap();

        svc.record_time_spent("u1", &path_id, "a", 90).unwrap();
        let q = svc.record_time_spent("u1", &path_id, "a", 30).unwrap();
        assert_eq!(q.time_spent, Some(120));
    }

    #[test]
    fn update_and_delete_path() {
        let svc = service();
        let path_id = svc
            .save_learning_path("u1", "junior", &stack(), vec![question("a")])
            .unwrap();

        let update = LearningPathUpdate {
            experience_level: Some("senior".into()),
            ..Default::default()
        };
        svc.update_learning_path("u1", &path_id, &update).unwrap();
        let path = svc.learning_path("u1", &path_id).unwrap().unwrap();
        assert_eq!(path.experience_level, "senior");

        assert!(matches!(
            svc.update_learning_path("u1", "nope", &update).unwrap_err(),
            PathError::PathNotFound
        ));

        assert!(svc.delete_learning_path("u1", &path_id).unwrap());
        assert!(!svc.delete_learning_path("u1", &path_id).unwrap());
    }

    #[test]
    fn save_question_assigns_id_and_timestamp() {
        let svc = service();
        let id = svc.save_question("u1", question("ignored")).unwrap();
        assert_ne!(id, "ignored");

        let saved = svc.user_questions("u1").unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, id);
        assert!(saved[0].created_at > 1);
    }

    #[test]
    fn find_challenge_respects_experience_level() {
        let svc = service();
        let junior = svc
            .save_learning_path("u1", "junior", &stack(), vec![question("shared")])
            .unwrap();

        let found = svc.find_challenge("u1", "shared", None).unwrap().unwrap();
        assert_eq!(found.path_id, junior);
        assert_eq!(found.question.id, "shared");

        assert!(svc.find_challenge("u1", "shared", Some("senior")).unwrap().is_none());
        assert!(svc.find_challenge("u1", "shared", Some("junior")).unwrap().is_some());
        assert!(svc.find_challenge("u1", "nope", None).unwrap().is_none());
    }
}
