// Performance analytics derived from a user's learning paths.
//
// Everything is recomputed from the paths on read. `publish` also stores
// the results under the per-user analytics documents so other readers
// (and the next start-up) see the same numbers.

use std::collections::BTreeMap;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;

use codeprep_core::db::{Database, StorePath};
use codeprep_core::model::{
    Difficulty, FocusArea, GeneratedQuestion, LearningPath, PerformanceStats, QuestionSet,
    SkillBreakdown, SkillGrowthPoint, StrengthWeakness, UserProgress,
};

/// Minutes assumed for each uncompleted question.
pub const MINUTES_PER_QUESTION: u32 = 30;

/// Categories that always appear on the skill growth chart.
const BASE_SKILLS: [&str; 3] = ["JavaScript", "TypeScript", "React"];

const MAX_FOCUS_AREAS: usize = 3;

/// Dashboard card estimate when a question carries none.
const DEFAULT_SET_ESTIMATE: &str = "30m";

/// `"{h}h {m}m"` for a number of minutes.
pub fn format_hours_minutes(total_minutes: u32) -> String {
    format!("{}h {}m", total_minutes / 60, total_minutes % 60)
}

/// `round(part / total * 100)`, 0 when `total` is 0.
pub fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        ((part as f64 / total as f64) * 100.0).round() as u32
    }
}

fn all_questions(paths: &[LearningPath]) -> impl Iterator<Item = &GeneratedQuestion> {
    paths.iter().flat_map(|p| p.questions.iter())
}

/// Counts per key, remembering first-seen order.
fn ordered_counts<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(String, u32)> {
    let mut counts: Vec<(String, u32)> = Vec::new();
    for key in keys {
        match counts.iter_mut().find(|(k, _)| k == key) {
            Some((_, n)) => *n += 1,
            None => counts.push((key.to_string(), 1)),
        }
    }
    counts
}

/// `"1.5h"`, `"2h"`: half an hour per question, no trailing `.0`.
fn half_hours(count: u32) -> String {
    if count % 2 == 0 {
        format!("{}h", count / 2)
    } else {
        format!("{}.5h", count / 2)
    }
}

// ---------------------------------------------------------------------------
// Performance
// ---------------------------------------------------------------------------

pub fn skill_growth(paths: &[LearningPath]) -> Vec<SkillGrowthPoint> {
    let mut counts: BTreeMap<String, u32> =
        BASE_SKILLS.iter().map(|s| (s.to_string(), 0)).collect();
    for q in all_questions(paths) {
        *counts.entry(q.category_or_general().to_string()).or_insert(0) += 1;
    }
    vec![SkillGrowthPoint {
        week: "Current".to_string(),
        counts,
    }]
}

/// Question counts per difficulty band. `BASIC` questions fall in no band.
pub fn strength_weakness(paths: &[LearningPath]) -> Vec<StrengthWeakness> {
    let (mut beginner, mut intermediate, mut advanced) = (0, 0, 0);
    for q in all_questions(paths) {
        match q.difficulty {
            Difficulty::Beginner => beginner += 1,
            Difficulty::Intermediate => intermediate += 1,
            Difficulty::Advanced => advanced += 1,
            Difficulty::Basic => {}
        }
    }
    vec![
        StrengthWeakness { skill: "Beginner".into(), value: beginner },
        StrengthWeakness { skill: "Intermediate".into(), value: intermediate },
        StrengthWeakness { skill: "Advanced".into(), value: advanced },
    ]
}

/// Up to three categories with the most uncompleted questions. Ties keep
/// the order in which the categories first appear.
pub fn focus_areas(paths: &[LearningPath]) -> Vec<FocusArea> {
    let mut counts = ordered_counts(
        all_questions(paths)
            .filter(|q| !q.is_completed())
            .map(|q| q.category_or_general()),
    );
    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    counts
        .into_iter()
        .take(MAX_FOCUS_AREAS)
        .enumerate()
        .map(|(i, (category, n))| FocusArea {
            id: format!("focus-{i}"),
            title: format!("{category} Mastery"),
            description: format!("{n} uncompleted challenges"),
            difficulty: Difficulty::Intermediate,
            estimated_time: half_hours(n),
        })
        .collect()
}

pub fn compute_performance(paths: &[LearningPath]) -> PerformanceStats {
    let total = all_questions(paths).count();
    let solved = all_questions(paths).filter(|q| q.is_completed()).count();
    let remaining = (total - solved) as u32;

    PerformanceStats {
        problems_solved: solved as u32,
        success_rate: percent(solved, total),
        time_remaining: format_hours_minutes(remaining * MINUTES_PER_QUESTION),
        skill_growth: skill_growth(paths),
        strength_weakness: strength_weakness(paths),
        focus_areas: focus_areas(paths),
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

pub fn compute_user_progress(paths: &[LearningPath]) -> UserProgress {
    let total = all_questions(paths).count();
    let completed = all_questions(paths).filter(|q| q.is_completed()).count();

    let mut breakdown: Vec<SkillBreakdown> = Vec::new();
    for q in all_questions(paths) {
        let skill = q.category_or_general();
        let idx = match breakdown.iter().position(|b| b.skill == skill) {
            Some(idx) => idx,
            None => {
                breakdown.push(SkillBreakdown {
                    skill: skill.to_string(),
                    completed: 0,
                    total: 0,
                });
                breakdown.len() - 1
            }
        };
        breakdown[idx].total += 1;
        if q.is_completed() {
            breakdown[idx].completed += 1;
        }
    }

    UserProgress {
        total_questions: total as u32,
        completed_questions: completed as u32,
        success_rate: percent(completed, total),
        time_remaining: format_hours_minutes((total - completed) as u32 * MINUTES_PER_QUESTION),
        skill_breakdown: breakdown,
    }
}

/// Completed share of all questions, 0 when there are none.
pub fn weekly_progress_percent(progress: &UserProgress) -> u32 {
    percent(
        progress.completed_questions as usize,
        progress.total_questions as usize,
    )
}

// ---------------------------------------------------------------------------
// Dashboard question sets
// ---------------------------------------------------------------------------

/// One card per question. `filter` is `"all"` or a lowercase category.
pub fn question_sets(paths: &[LearningPath], filter: &str) -> Vec<QuestionSet> {
    let filter = filter.trim().to_lowercase();
    paths
        .iter()
        .flat_map(|path| {
            let completed = path.completed_count();
            path.questions.iter().map(move |q| QuestionSet {
                path_id: path.id.clone(),
                question_id: q.id.clone(),
                title: q.title.clone(),
                description: q.description.clone(),
                category: q.category.clone(),
                difficulty: q.difficulty,
                total_questions: path.questions.len(),
                completed_questions: completed,
                estimated_time: q
                    .estimated_time
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SET_ESTIMATE.to_string()),
                completed: q.is_completed(),
            })
        })
        .filter(|set| filter == "all" || filter.is_empty() || set.category.to_lowercase() == filter)
        .collect()
}

/// Distinct lowercase categories in first-seen order, for the filter bar.
pub fn categories(paths: &[LearningPath]) -> Vec<String> {
    ordered_counts(all_questions(paths).map(|q| q.category.as_str()))
        .into_iter()
        .map(|(c, _)| c.to_lowercase())
        .filter(|c| !c.is_empty())
        .fold(Vec::new(), |mut acc, c| {
            if !acc.contains(&c) {
                acc.push(c);
            }
            acc
        })
}

// ---------------------------------------------------------------------------
// Stored documents
// ---------------------------------------------------------------------------

/// Recompute and store all analytics documents for `user_id`.
pub fn publish(db: &Database, user_id: &str, paths: &[LearningPath]) -> anyhow::Result<PerformanceStats> {
    let stats = compute_performance(paths);
    let progress = compute_user_progress(paths);

    let docs: [(StorePath, Value); 4] = [
        (
            StorePath::UserProgress(user_id.to_string()),
            serde_json::to_value(&progress).context("failed to serialize user progress")?,
        ),
        (
            StorePath::SkillGrowth(user_id.to_string()),
            serde_json::to_value(&stats.skill_growth).context("failed to serialize skill growth")?,
        ),
        (
            StorePath::StrengthsWeaknesses(user_id.to_string()),
            serde_json::to_value(&stats.strength_weakness)
                .context("failed to serialize strengths")?,
        ),
        (
            StorePath::FocusAreas(user_id.to_string()),
            serde_json::to_value(&stats.focus_areas).context("failed to serialize focus areas")?,
        ),
    ];
    for (path, value) in &docs {
        db.put_document(path, value)?;
    }
    Ok(stats)
}

/// Stored list documents may be arrays or id-keyed objects.
fn load_list<T: DeserializeOwned>(db: &Database, path: &StorePath) -> anyhow::Result<Vec<T>> {
    let items = match db.get_document(path)? {
        Some(Value::Array(items)) => items,
        Some(Value::Object(map)) => map.into_iter().map(|(_, v)| v).collect(),
        Some(_) | None => return Ok(Vec::new()),
    };
    items
        .into_iter()
        .map(|v| serde_json::from_value(v).with_context(|| format!("malformed entry in {path}")))
        .collect()
}

pub fn load_user_progress(db: &Database, user_id: &str) -> anyhow::Result<UserProgress> {
    match db.get_document(&StorePath::UserProgress(user_id.to_string()))? {
        Some(value) => serde_json::from_value(value).context("malformed user progress document"),
        None => Ok(UserProgress::default()),
    }
}

pub fn load_skill_growth(db: &Database, user_id: &str) -> anyhow::Result<Vec<SkillGrowthPoint>> {
    load_list(db, &StorePath::SkillGrowth(user_id.to_string()))
}

pub fn load_strengths_weaknesses(
    db: &Database,
    user_id: &str,
) -> anyhow::Result<Vec<StrengthWeakness>> {
    load_list(db, &StorePath::StrengthsWeaknesses(user_id.to_string()))
}

pub fn load_focus_areas(db: &Database, user_id: &str) -> anyhow::Result<Vec<FocusArea>> {
    load_list(db, &StorePath::FocusAreas(user_id.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
