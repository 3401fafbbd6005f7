// Question generation flows: learning path questions and personalized
// question sets, plus the path-setup form rules that guard them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use codeprep_core::model::{
    tech_label, Difficulty, ExperienceLevel, GeneratedQuestion, Millis, SkillLevel,
};
use codeprep_core::protocol::Toast;
use codeprep_llm::parse::extract_typed;
use codeprep_llm::prompt::{self, ToolSuggestion};
use codeprep_llm::LlmClient;

use crate::catalog::{self, BankQuestion};

pub const DEFAULT_QUESTION_COUNT: u32 = 5;
pub const MAX_QUESTION_COUNT: u32 = 30;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("LLM not configured")]
    Disabled,

    #[error("{0}")]
    Llm(String),

    #[error("could not read questions from the model: {0}")]
    Parse(String),

    #[error("the model returned no questions")]
    Empty,
}

// ---------------------------------------------------------------------------
// Learning path questions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateQuestionsInput {
    pub experience_level: ExperienceLevel,
    /// Technology ids as selected on the setup screen.
    pub tech_stack: Vec<String>,
    pub number_of_questions: Option<u32>,
}

impl GenerateQuestionsInput {
    pub fn count(&self) -> u32 {
        match self.number_of_questions {
            Some(n) if n > 0 => n,
            _ => DEFAULT_QUESTION_COUNT,
        }
    }

    /// `(system, user)` prompt pair.
    pub fn prompt(&self) -> (String, String) {
        let labels: Vec<String> = self
            .tech_stack
            .iter()
            .map(|id| tech_label(id).to_string())
            .collect();
        (
            prompt::question_system_prompt(),
            prompt::build_generate_questions_prompt(
                self.experience_level.as_str(),
                &labels,
                self.count(),
            ),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    difficulty: String,
    #[serde(default)]
    requirements: Vec<String>,
    #[serde(default)]
    hints: Vec<String>,
    #[serde(default)]
    estimated_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuestions {
    questions: Vec<RawQuestion>,
}

/// Turn a model answer into questions with ids `"{now}-{index}"`.
pub fn questions_from_response(
    text: &str,
    now: Millis,
) -> Result<Vec<GeneratedQuestion>, GenerationError> {
    let raw: RawQuestions = extract_typed(text).map_err(GenerationError::Parse)?;
    if raw.questions.is_empty() {
        return Err(GenerationError::Empty);
    }
    Ok(raw
        .questions
        .into_iter()
        .enumerate()
        .map(|(index, q)| {
            let difficulty = Difficulty::from_str_opt(&q.difficulty).unwrap_or_else(|| {
                warn!("unknown difficulty '{}' for '{}', using default", q.difficulty, q.title);
                Difficulty::default()
            });
            GeneratedQuestion {
                id: format!("{now}-{index}"),
                title: q.title,
                description: q.description,
                category: q.category,
                difficulty,
                requirements: q.requirements,
                hints: q.hints,
                solution: None,
                test_cases: None,
                estimated_time: q.estimated_time.filter(|t| !t.trim().is_empty()),
                created_at: now,
                status: None,
                completed_at: None,
                time_spent: None,
            }
        })
        .collect())
}

/// `{ success, questions }` or `{ success: false, error }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPathResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<GeneratedQuestion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LearningPathResult {
    pub fn ok(questions: Vec<GeneratedQuestion>) -> Self {
        LearningPathResult {
            success: true,
            questions: Some(questions),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        LearningPathResult {
            success: false,
            questions: None,
            error: Some(error.into()),
        }
    }
}

pub async fn generate_learning_path_questions(
    client: &LlmClient,
    input: &GenerateQuestionsInput,
    max_tokens: u32,
) -> LearningPathResult {
    if !client.is_enabled() {
        return LearningPathResult::failed(GenerationError::Disabled.to_string());
    }
    let (system, user) = input.prompt();
    let text = match client.complete(&system, &user, max_tokens).await {
        Ok(text) => text,
        Err(e) => {
            error!("Error generating learning path questions: {e:#}");
            return LearningPathResult::failed(GenerationError::Llm(e.to_string()).to_string());
        }
    };
    match questions_from_response(&text, codeprep_core::model::now_millis()) {
        Ok(questions) => {
            info!("generated {} questions", questions.len());
            LearningPathResult::ok(questions)
        }
        Err(e) => {
            error!("Error generating learning path questions: {e}");
            LearningPathResult::failed(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Personalized question sets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalizedInput {
    pub skill_level: SkillLevel,
    pub preferred_tech_stack: Vec<String>,
    /// Question id to score in `0..=1`.
    pub past_performance: Option<BTreeMap<String, f64>>,
}

impl PersonalizedInput {
    /// Run the suggestion tool against `bank`.
    pub fn suggestions<'a>(&self, bank: &'a [BankQuestion]) -> Vec<&'a BankQuestion> {
        catalog::suggest_practice_questions(
            bank,
            self.skill_level,
            &self.preferred_tech_stack,
            self.past_performance.as_ref(),
        )
        .iter()
        .filter_map(|id| catalog::find(bank, id))
        .collect()
    }

    /// `(system, user)` prompt pair embedding the tool output.
    pub fn prompt(&self, suggestions: &[&BankQuestion]) -> (String, String) {
        let tool: Vec<ToolSuggestion> = suggestions
            .iter()
            .map(|q| ToolSuggestion {
                id: q.id.clone(),
                title: q.title.clone(),
                category: q.category.clone(),
                level: q.level.clone(),
            })
            .collect();
        (
            prompt::personalized_system_prompt(),
            prompt::build_personalized_prompt(
                self.skill_level.as_str(),
                &self.preferred_tech_stack,
                self.past_performance.as_ref(),
                &tool,
            ),
        )
    }
}

#[derive(Debug, Deserialize)]
struct RawIds {
    questions: Vec<String>,
}

/// Ids from the model answer that the tool offered, in answer order and
/// without repeats. Falls back to `offered` when nothing usable remains.
pub fn select_personalized(text: &str, offered: &[String]) -> Vec<String> {
    let mut picked: Vec<String> = Vec::new();
    match extract_typed::<RawIds>(text) {
        Ok(raw) => {
            for id in raw.questions {
                let id = id.trim().to_string();
                if !offered.contains(&id) {
                    warn!("dropping question id '{id}' not offered by the suggestion tool");
                } else if !picked.contains(&id) {
                    picked.push(id);
                }
            }
        }
        Err(e) => warn!("personalized answer unreadable ({e}), using tool output"),
    }
    if picked.is_empty() {
        offered.to_vec()
    } else {
        picked
    }
}

/// `{ success, questions }` or `{ success: false, error }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalizedResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PersonalizedResult {
    fn failed(message: impl std::fmt::Display) -> Self {
        PersonalizedResult {
            success: false,
            questions: None,
            error: Some(format!("Failed to generate questions: {message}")),
        }
    }
}

pub async fn get_personalized_questions(
    client: &LlmClient,
    bank: &[BankQuestion],
    input: &PersonalizedInput,
    max_tokens: u32,
) -> PersonalizedResult {
    if !client.is_enabled() {
        return PersonalizedResult::failed(GenerationError::Disabled);
    }
    let suggestions = input.suggestions(bank);
    let offered: Vec<String> = suggestions.iter().map(|q| q.id.clone()).collect();
    let (system, user) = input.prompt(&suggestions);

    match client.complete(&system, &user, max_tokens).await {
        Ok(text) => PersonalizedResult {
            success: true,
            questions: Some(select_personalized(&text, &offered)),
            error: None,
        },
        Err(e) => {
            error!("Error generating personalized questions: {e:#}");
            PersonalizedResult::failed(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Path setup form rules
// ---------------------------------------------------------------------------

/// A question count after clamping, with the toast to show if it was capped.
#[derive(Debug, Clone, PartialEq)]
pub struct ClampedCount {
    pub value: u32,
    pub warning: Option<Toast>,
}

/// Leading integer of `raw`, like a lenient `parseInt`: `"12abc"` is 12.
fn leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    // Absurdly long inputs saturate.
    let n = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(sign * n)
}

/// Unparsable resets to `default`, below 1 becomes 1, above the maximum
/// is capped with a "Maximum reached" warning.
pub fn clamp_question_count(raw: &str, default: u32, max: u32) -> ClampedCount {
    match leading_int(raw) {
        None => ClampedCount {
            value: default.clamp(1, max.max(1)),
            warning: None,
        },
        Some(n) if n < 1 => ClampedCount {
            value: 1,
            warning: None,
        },
        Some(n) if n > i64::from(max) => ClampedCount {
            value: max,
            warning: Some(Toast::error(
                "Maximum reached",
                format!("Maximum {max} questions allowed"),
            )),
        },
        Some(n) => ClampedCount {
            value: n as u32,
            warning: None,
        },
    }
}

/// Checks run before a learning path is generated.
pub fn validate_path_request(signed_in: bool, tech_stack: &[String]) -> Result<(), Toast> {
    if !signed_in {
        return Err(Toast::error(
            "Authentication required",
            "Please sign in to generate a learning path",
        ));
    }
    if tech_stack.is_empty() {
        return Err(Toast::error(
            "No tech stack selected",
            "Please select at least one technology",
        ));
    }
    Ok(())
}

pub fn generated_toast(count: usize) -> Toast {
    Toast::success(
        "Learning path generated!",
        format!("Successfully created {count} questions and saved to database."),
    )
}

pub fn generation_failed_toast(message: &str) -> Toast {
    let description = if message.trim().is_empty() {
        "Failed to generate learning path"
    } else {
        message
    };
    Toast::error("Generation failed", description)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
