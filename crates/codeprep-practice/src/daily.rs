// Daily challenge selection.
//
// One uncompleted question per calendar day, picked by hashing the day's
// date string. The same candidates on the same day always give the same
// question.

use anyhow::Context;
use chrono::{Days, Local, NaiveDate, NaiveDateTime};
use tracing::debug;

use codeprep_core::db::{Database, StorePath};
use codeprep_core::model::{DailyChallenge, GeneratedQuestion, LearningPath};

use crate::seed::SEEDED_CHALLENGE_ID;

pub const DAILY_POINTS: u32 = 100;

/// Day key in the `Fri Jan 17 2026` form.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%a %b %d %Y").to_string()
}

/// 32-bit string hash: `h = h * 31 + unit` over UTF-16 code units, wrapping.
pub fn day_hash(key: &str) -> i32 {
    key.encode_utf16().fold(0i32, |hash, unit| {
        (hash << 5).wrapping_sub(hash).wrapping_add(i32::from(unit))
    })
}

/// Index into `len` candidates for `key`.
pub fn pick_index(key: &str, len: usize) -> usize {
    (i64::from(day_hash(key)).unsigned_abs() % len as u64) as usize
}

/// Uncompleted questions of all paths, in path order then question order.
pub fn candidates(paths: &[LearningPath]) -> Vec<&GeneratedQuestion> {
    paths
        .iter()
        .flat_map(|p| p.questions.iter())
        .filter(|q| !q.is_completed())
        .collect()
}

/// Time left until the next local midnight, as `"{h}h {m}m"`.
pub fn time_until_midnight(now: NaiveDateTime) -> String {
    let Some(midnight) = now
        .date()
        .checked_add_days(Days::new(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return "0h 0m".to_string();
    };
    let minutes = (midnight - now).num_minutes().max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// The challenge for the local date of `now`, or `None` when every question
/// is done (or there are no paths).
pub fn select_daily_challenge(
    paths: &[LearningPath],
    now: NaiveDateTime,
) -> Option<DailyChallenge> {
    let pool = candidates(paths);
    if pool.is_empty() {
        return None;
    }
    let index = pick_index(&day_key(now.date()), pool.len());
    Some(DailyChallenge {
        question: pool[index].clone(),
        points: DAILY_POINTS,
        time_remaining: time_until_midnight(now),
    })
}

/// [`select_daily_challenge`] for the current local time.
pub fn todays_challenge(paths: &[LearningPath]) -> Option<DailyChallenge> {
    select_daily_challenge(paths, Local::now().naive_local())
}

/// Write the challenge to the shared `dailyChallenge` document, or clear it
/// when there is none. A document written by the seeder is left in place.
pub fn publish_challenge(db: &Database, challenge: Option<&DailyChallenge>) -> anyhow::Result<()> {
    if let Some(existing) = load_seeded_challenge(db)? {
        if existing.question.id == SEEDED_CHALLENGE_ID {
            debug!("Keeping seeded daily challenge document");
            return Ok(());
        }
    }
    match challenge {
        Some(c) => {
            let value = serde_json::to_value(c).context("failed to serialize daily challenge")?;
            db.put_document(&StorePath::DailyChallenge, &value)
        }
        None => db.delete_document(&StorePath::DailyChallenge).map(|_| ()),
    }
}

/// Read whatever challenge document is stored (e.g. one written by the
/// seeder).
pub fn load_seeded_challenge(db: &Database) -> anyhow::Result<Option<DailyChallenge>> {
    match db.get_document(&StorePath::DailyChallenge)? {
        Some(value) => {
            let challenge =
                serde_json::from_value(value).context("failed to parse daily challenge document")?;
            Ok(Some(challenge))
        }
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
