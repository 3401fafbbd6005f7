// Domain records: users, learning paths, and generated practice questions.
//
// Everything here is a plain serde record. Field names are serialized in
// camelCase so stored documents keep the same shape as the logical store
// paths (`learningPaths/{userId}/{pathId}`, ...).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> Millis {
    chrono::Utc::now().timestamp_millis()
}

/// Fresh random identifier for users and paths.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Role assigned to every freshly created profile.
pub const DEFAULT_ROLE: &str = "Dev Student";

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_at: Millis,
    pub last_login: Millis,
}

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// Question difficulty as produced by the generator.
///
/// `Basic` only shows up in legacy/seeded data. It is drawn like
/// `Beginner` but is not counted in the difficulty bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
    Basic,
}

impl Difficulty {
    /// Parse the wire form (`BEGINNER`, ...). Case-insensitive.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BEGINNER" => Some(Difficulty::Beginner),
            "INTERMEDIATE" => Some(Difficulty::Intermediate),
            "ADVANCED" => Some(Difficulty::Advanced),
            "BASIC" => Some(Difficulty::Basic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "BEGINNER",
            Difficulty::Intermediate => "INTERMEDIATE",
            Difficulty::Advanced => "ADVANCED",
            Difficulty::Basic => "BASIC",
        }
    }

    /// Human label used by badges.
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
            Difficulty::Basic => "Basic",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// QuestionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionStatus {
    Completed,
    InProgress,
    NotStarted,
}

impl QuestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionStatus::Completed => "completed",
            QuestionStatus::InProgress => "in-progress",
            QuestionStatus::NotStarted => "not-started",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(QuestionStatus::Completed),
            "in-progress" => Some(QuestionStatus::InProgress),
            "not-started" => Some(QuestionStatus::NotStarted),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// GeneratedQuestion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_cases: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
    pub created_at: Millis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<QuestionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Millis>,
    /// Seconds spent on the question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<u64>,
}

impl GeneratedQuestion {
    /// Only an explicit `completed` status counts; missing status means the
    /// question has not been finished.
    pub fn is_completed(&self) -> bool {
        self.status == Some(QuestionStatus::Completed)
    }

    /// Category with the `General` fallback applied.
    pub fn category_or_general(&self) -> &str {
        if self.category.trim().is_empty() {
            "General"
        } else {
            &self.category
        }
    }
}

// ---------------------------------------------------------------------------
// LearningPath
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPath {
    pub id: String,
    pub user_id: String,
    pub experience_level: String,
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub questions: Vec<GeneratedQuestion>,
    pub created_at: Millis,
    pub updated_at: Millis,
}

impl LearningPath {
    pub fn completed_count(&self) -> usize {
        self.questions.iter().filter(|q| q.is_completed()).count()
    }
}

/// Targeted update of a learning path. `None` fields are left untouched;
/// `updated_at` is always bumped when the update is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LearningPathUpdate {
    pub experience_level: Option<String>,
    pub tech_stack: Option<Vec<String>>,
    pub questions: Option<Vec<GeneratedQuestion>>,
}

impl LearningPathUpdate {
    pub fn is_empty(&self) -> bool {
        self.experience_level.is_none() && self.tech_stack.is_none() && self.questions.is_none()
    }
}

// ---------------------------------------------------------------------------
// Levels and tech stack options
// ---------------------------------------------------------------------------

/// Experience level chosen on the path setup screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExperienceLevel {
    Junior,
    #[default]
    MidLevel,
    Senior,
}

impl ExperienceLevel {
    pub const ALL: [ExperienceLevel; 3] = [
        ExperienceLevel::Junior,
        ExperienceLevel::MidLevel,
        ExperienceLevel::Senior,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Junior => "junior",
            ExperienceLevel::MidLevel => "mid-level",
            ExperienceLevel::Senior => "senior",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "junior" => Some(ExperienceLevel::Junior),
            "mid-level" => Some(ExperienceLevel::MidLevel),
            "senior" => Some(ExperienceLevel::Senior),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ExperienceLevel::Junior => "Junior",
            ExperienceLevel::MidLevel => "Mid-Level",
            ExperienceLevel::Senior => "Senior",
        }
    }

    pub fn subtitle(&self) -> &'static str {
        match self {
            ExperienceLevel::Junior => "0-2 years",
            ExperienceLevel::MidLevel => "2-5 years",
            ExperienceLevel::Senior => "5+ years",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ExperienceLevel::Junior => "Focus on syntax, core concepts, and DOM manipulation",
            ExperienceLevel::MidLevel => {
                "Deep dive into state management, data structures, and performance"
            }
            ExperienceLevel::Senior => {
                "System design, scalability, team leadership, and architecture patterns"
            }
        }
    }

    pub fn is_recommended(&self) -> bool {
        *self == ExperienceLevel::MidLevel
    }
}

/// Skill level accepted by the personalized question-set flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Beginner => "beginner",
            SkillLevel::Intermediate => "intermediate",
            SkillLevel::Advanced => "advanced",
        }
    }

    /// Ordinal used for "level closeness" comparisons.
    pub fn rank(&self) -> u8 {
        match self {
            SkillLevel::Beginner => 0,
            SkillLevel::Intermediate => 1,
            SkillLevel::Advanced => 2,
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Some(SkillLevel::Beginner),
            "intermediate" => Some(SkillLevel::Intermediate),
            "advanced" => Some(SkillLevel::Advanced),
            _ => None,
        }
    }
}

/// A selectable technology on the path setup screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TechOption {
    pub id: &'static str,
    pub label: &'static str,
}

pub const TECH_OPTIONS: &[TechOption] = &[
    TechOption { id: "javascript", label: "JavaScript" },
    TechOption { id: "typescript", label: "TypeScript" },
    TechOption { id: "react", label: "React.js" },
    TechOption { id: "react-native", label: "React Native" },
    TechOption { id: "nextjs", label: "Next.js" },
    TechOption { id: "algorithm", label: "Algorithm" },
    TechOption { id: "system-design", label: "System Design" },
];

/// Display label for a tech id, falling back to the id itself.
pub fn tech_label(id: &str) -> &str {
    TECH_OPTIONS
        .iter()
        .find(|t| t.id == id)
        .map(|t| t.label)
        .unwrap_or(id)
}

// ---------------------------------------------------------------------------
// Identity handoff
// ---------------------------------------------------------------------------

/// An identity already verified by an external (federated) provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Derived records (stored under userProgress/, skillGrowth/, ...)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillBreakdown {
    pub skill: String,
    pub completed: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub total_questions: u32,
    pub completed_questions: u32,
    pub success_rate: u32,
    pub time_remaining: String,
    #[serde(default)]
    pub skill_breakdown: Vec<SkillBreakdown>,
}

impl Default for UserProgress {
    fn default() -> Self {
        UserProgress {
            total_questions: 0,
            completed_questions: 0,
            success_rate: 0,
            time_remaining: "0h 0m".to_string(),
            skill_breakdown: Vec::new(),
        }
    }
}

/// One point of the skill growth chart: a label plus per-category counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillGrowthPoint {
    pub week: String,
    #[serde(flatten)]
    pub counts: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrengthWeakness {
    pub skill: String,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusArea {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub estimated_time: String,
}

/// Aggregate statistics shown on the performance screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    pub problems_solved: u32,
    pub success_rate: u32,
    pub time_remaining: String,
    pub skill_growth: Vec<SkillGrowthPoint>,
    pub strength_weakness: Vec<StrengthWeakness>,
    pub focus_areas: Vec<FocusArea>,
}

/// Today's challenge: a question plus points and time left in the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyChallenge {
    #[serde(flatten)]
    pub question: GeneratedQuestion,
    pub points: u32,
    pub time_remaining: String,
}

/// A dashboard card: one question with its path's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSet {
    pub path_id: String,
    pub question_id: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub difficulty: Difficulty,
    pub total_questions: usize,
    pub completed_questions: usize,
    pub estimated_time: String,
    pub completed: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn question(status: Option<QuestionStatus>) -> GeneratedQuestion {
        GeneratedQuestion {
            id: "q1".into(),
            title: "Debounce".into(),
            description: "Write a debounce helper".into(),
            category: "JavaScript".into(),
            difficulty: Difficulty::Intermediate,
            requirements: vec![],
            hints: vec![],
            solution: None,
            test_cases: None,
            estimated_time: None,
            created_at: 1,
            status,
            completed_at: None,
            time_spent: None,
        }
    }

    #[test]
    fn difficulty_serializes_uppercase() {
        let json = serde_json::to_string(&Difficulty::Advanced).unwrap();
        assert_eq!(json, "\"ADVANCED\"");
        let parsed: Difficulty = serde_json::from_str("\"BASIC\"").unwrap();
        assert_eq!(parsed, Difficulty::Basic);
    }

    #[test]
    fn difficulty_parse_is_case_insensitive() {
        assert_eq!(Difficulty::from_str_opt("intermediate"), Some(Difficulty::Intermediate));
        assert_eq!(Difficulty::from_str_opt(" Advanced "), Some(Difficulty::Advanced));
        assert_eq!(Difficulty::from_str_opt("expert"), None);
    }

    #[test]
    fn status_uses_kebab_case() {
        let json = serde_json::to_string(&QuestionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        assert_eq!(
            QuestionStatus::from_str_opt("not-started"),
            Some(QuestionStatus::NotStarted)
        );
    }

    #[test]
    fn only_completed_status_counts_as_completed() {
        assert!(question(Some(QuestionStatus::Completed)).is_completed());
        assert!(!question(Some(QuestionStatus::InProgress)).is_completed());
        assert!(!question(None).is_completed());
    }

    #[test]
    fn question_json_uses_camel_case_and_skips_empty_optionals() {
        let q = question(None);
        let v = serde_json::to_value(&q).unwrap();
        assert!(v.get("createdAt").is_some());
        assert!(v.get("completedAt").is_none());
        assert!(v.get("status").is_none());
    }

    #[test]
    fn question_deserializes_with_missing_lists() {
        let q: GeneratedQuestion = serde_json::from_str(
            r#"{"id":"x","title":"t","description":"d","createdAt":5}"#,
        )
        .unwrap();
        assert!(q.requirements.is_empty());
        assert_eq!(q.difficulty, Difficulty::Beginner);
        assert_eq!(q.category_or_general(), "General");
    }

    #[test]
    fn experience_level_round_trip_strings() {
        for level in ExperienceLevel::ALL {
            assert_eq!(ExperienceLevel::from_str_opt(level.as_str()), Some(level));
        }
        assert!(ExperienceLevel::MidLevel.is_recommended());
        assert_eq!(ExperienceLevel::Senior.subtitle(), "5+ years");
    }

    #[test]
    fn tech_label_falls_back_to_id() {
        assert_eq!(tech_label("nextjs"), "Next.js");
        assert_eq!(tech_label("rust"), "rust");
    }

    #[test]
    fn skill_growth_point_flattens_counts() {
        let mut counts = BTreeMap::new();
        counts.insert("JavaScript".to_string(), 2);
        counts.insert("React".to_string(), 0);
        let point = SkillGrowthPoint { week: "Current".into(), counts };
        let v = serde_json::to_value(&point).unwrap();
        assert_eq!(v["week"], "Current");
        assert_eq!(v["JavaScript"], 2);
        assert_eq!(v["React"], 0);
    }

    #[test]
    fn user_progress_default_is_zeroed() {
        let p = UserProgress::default();
        assert_eq!(p.total_questions, 0);
        assert_eq!(p.time_remaining, "0h 0m");
        assert!(p.skill_breakdown.is_empty());
    }

    #[test]
    fn daily_challenge_flattens_question_fields() {
        let challenge = DailyChallenge {
            question: question(None),
            points: 100,
            time_remaining: "3h 5m".into(),
        };
        let v = serde_json::to_value(&challenge).unwrap();
        assert_eq!(v["id"], "q1");
        assert_eq!(v["points"], 100);
        assert_eq!(v["timeRemaining"], "3h 5m");
        let back: DailyChallenge = serde_json::from_value(v).unwrap();
        assert_eq!(back, challenge);
    }

    #[test]
    fn path_update_empty_detection() {
        assert!(LearningPathUpdate::default().is_empty());
        let update = LearningPathUpdate {
            tech_stack: Some(vec!["react".into()]),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
