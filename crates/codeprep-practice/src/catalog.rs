// Static question bank and the practice-question suggestion tool.
//
// The built-in bank ships as an embedded CSV. Extra banks with the same
// columns can be imported from disk.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use codeprep_core::model::{tech_label, SkillLevel};

const BUILTIN_BANK: &str = include_str!("../data/question_bank.csv");

/// Past scores at or above this are considered mastered and not suggested.
pub const MASTERED_SCORE: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BankQuestion {
    pub id: String,
    pub category: String,
    pub level: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub link: String,
}

impl BankQuestion {
    pub fn skill_level(&self) -> Option<SkillLevel> {
        SkillLevel::from_str_opt(&self.level)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("failed to read question bank {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

/// Rows that fail to deserialize or have an empty id are skipped with a
/// warning.
fn load_from_reader<R: Read>(rdr: R) -> Result<Vec<BankQuestion>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut questions = Vec::new();
    for result in reader.deserialize::<BankQuestion>() {
        match result {
            Ok(q) if q.id.trim().is_empty() => {
                warn!("skipping question bank row without id: '{}'", q.title);
            }
            Ok(q) => questions.push(q),
            Err(e) => warn!("skipping malformed question bank row: {}", e),
        }
    }
    Ok(questions)
}

/// The embedded bank.
pub fn builtin() -> Vec<BankQuestion> {
    match load_from_reader(BUILTIN_BANK.as_bytes()) {
        Ok(questions) => questions,
        Err(e) => {
            warn!("built-in question bank unreadable: {}", e);
            Vec::new()
        }
    }
}

pub fn load_question_bank(path: &Path) -> Result<Vec<BankQuestion>, BankError> {
    let display = path.display().to_string();
    let file = std::fs::File::open(path).map_err(|source| BankError::Io {
        path: display.clone(),
        source,
    })?;
    load_from_reader(file).map_err(|source| BankError::Csv {
        path: display,
        source,
    })
}

/// Built-in bank plus an optional extra file. Ids already present in the
/// built-in bank are not duplicated.
pub fn load_with_extra(extra: Option<&Path>) -> Result<Vec<BankQuestion>, BankError> {
    let mut bank = builtin();
    if let Some(path) = extra {
        for q in load_question_bank(path)? {
            if bank.iter().any(|b| b.id == q.id) {
                warn!("question bank {}: duplicate id '{}' ignored", path.display(), q.id);
                continue;
            }
            bank.push(q);
        }
    }
    Ok(bank)
}

fn in_stack(category: &str, tech_stack: &[String]) -> bool {
    if tech_stack.is_empty() {
        return true;
    }
    let category = category.trim().to_lowercase();
    tech_stack.iter().any(|tech| {
        let tech = tech.trim().to_lowercase();
        tech == category || tech_label(&tech).to_lowercase() == category
    })
}

/// Suggest question ids for a candidate.
///
/// Questions in the tech stack (all when the stack is empty), minus those
/// already scored at [`MASTERED_SCORE`] or better, ordered by how far their
/// level is from `skill_level`, then by lowest past score. Unscored
/// questions sort before scored ones at the same distance.
pub fn suggest_practice_questions(
    bank: &[BankQuestion],
    skill_level: SkillLevel,
    tech_stack: &[String],
    past_performance: Option<&BTreeMap<String, f64>>,
) -> Vec<String> {
    let score_of = |id: &str| past_performance.and_then(|m| m.get(id).copied());

    let mut picked: Vec<(u8, f64, usize, &BankQuestion)> = bank
        .iter()
        .enumerate()
        .filter(|(_, q)| in_stack(&q.category, tech_stack))
        .filter(|(_, q)| score_of(&q.id).map_or(true, |s| s < MASTERED_SCORE))
        .map(|(i, q)| {
            // Unknown levels sort last.
            let distance = q
                .skill_level()
                .map_or(u8::MAX, |l| l.rank().abs_diff(skill_level.rank()));
            let score = score_of(&q.id).unwrap_or(-1.0);
            (distance, score, i, q)
        })
        .collect();

    picked.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then(a.1.total_cmp(&b.1))
            .then(a.2.cmp(&b.2))
    });
    picked.into_iter().map(|(_, _, _, q)| q.id.clone()).collect()
}

pub fn find<'a>(bank: &'a [BankQuestion], id: &str) -> Option<&'a BankQuestion> {
    bank.iter().find(|q| q.id == id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builtin_bank_parses_multiline_examples() {
        let bank = builtin();
        let ids: Vec<_> = bank.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["js-1", "js-2", "ts-1", "ts-2", "react-1", "react-2"]);
        let js1 = find(&bank, "js-1").unwrap();
        assert_eq!(js1.category, "JavaScript");
        assert_eq!(js1.skill_level(), Some(SkillLevel::Beginner));
        assert!(js1.example.contains("scopeTest();"));
        assert!(js1.example.lines().count() > 5);
        assert!(find(&bank, "react-2").unwrap().link.starts_with("https://react.dev"));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let data = "id,category,level,title,description,example,link\n\
                    x-1,Go,Beginner,Title,Desc,,\n\
                    ,Go,Beginner,No id,Desc,,\n\
                    x-2,Go\n";
        let bank = load_from_reader(data.as_bytes()).unwrap();
        assert_eq!(bank.len(), 1);
        assert_eq!(bank[0].id, "x-1");
    }

    #[test]
    fn suggestions_filter_by_stack_case_insensitively() {
        let bank = builtin();
        let ids = suggest_practice_questions(&bank, SkillLevel::Beginner, &stack(&["react"]), None);
        assert_eq!(ids, vec!["react-1", "react-2"]);

        let ids = suggest_practice_questions(&bank, SkillLevel::Beginner, &stack(&["TYPESCRIPT"]), None);
        assert_eq!(ids, vec!["ts-1", "ts-2"]);
    }

    #[test]
    fn empty_stack_means_whole_bank_by_level_closeness() {
        let bank = builtin();
        let ids = suggest_practice_questions(&bank, SkillLevel::Advanced, &[], None);
        // All questions are Beginner or Intermediate; Intermediate is closer.
        assert_eq!(ids, vec!["js-2", "ts-2", "react-2", "js-1", "ts-1", "react-1"]);
    }

    #[test]
    fn mastered_questions_are_dropped_and_low_scores_come_first() {
        let bank = builtin();
        let mut scores = BTreeMap::new();
        scores.insert("js-1".to_string(), 0.9);
        scores.insert("ts-1".to_string(), 0.6);
        scores.insert("react-1".to_string(), 0.2);

        let ids = suggest_practice_questions(&bank, SkillLevel::Beginner, &[], Some(&scores));
        assert!(!ids.contains(&"js-1".to_string()));
        assert_eq!(&ids[..2], &["react-1".to_string(), "ts-1".to_string()]);
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn score_exactly_at_threshold_is_mastered() {
        let bank = builtin();
        let scores = BTreeMap::from([("react-1".to_string(), 0.8)]);
        let ids =
            suggest_practice_questions(&bank, SkillLevel::Beginner, &stack(&["react"]), Some(&scores));
        assert_eq!(ids, vec!["react-2"]);
    }

    #[test]
    fn extra_bank_is_appended_without_duplicates() {
        let dir = std::env::temp_dir().join(format!("codeprep_bank_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("extra.csv");
        std::fs::write(
            &path,
            "id,category,level,title,description,example,link\n\
             js-1,JavaScript,Beginner,Dup,Dup,,\n\
             go-1,Go,Advanced,Goroutines,Explain goroutines,,\n",
        )
        .unwrap();

        let bank = load_with_extra(Some(&path)).unwrap();
        assert_eq!(bank.len(), 7);
        assert_eq!(bank.last().unwrap().id, "go-1");
        assert_ne!(find(&bank, "js-1").unwrap().title, "Dup");

        let missing = load_question_bank(&dir.join("nope.csv")).unwrap_err();
        assert!(matches!(missing, BankError::Io { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
