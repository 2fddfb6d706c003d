//! Per-user knowledge state: which words a user has marked as known, and
//! the aggregates the progress displays are built from. A missing row
//! means "not known"; only explicit marks create rows.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use crate::corpus;
use crate::errors::*;
use crate::levels;
use crate::models::{Level, UserWord};

/// A level counts as finished once this share of its words is known.
pub const LEVEL_DONE_THRESHOLD: f32 = 98.0;

#[derive(Debug, Clone, Serialize)]
pub struct ScopeProgress {
    pub total: i64,
    pub known: i64,
    pub unknown: i64,
    pub percentage: f32,
}

impl ScopeProgress {
    fn from_counts(total: i64, known: i64) -> ScopeProgress {
        let percentage = if total > 0 {
            known as f32 / total as f32 * 100.0
        } else {
            0.0
        };
        ScopeProgress { total,
                        known,
                        unknown: total - known,
                        percentage }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub total_words: i64,
    pub known_words: i64,
    pub unknown_words: i64,
    pub percentage: f32,
    pub total_levels: i64,
    pub current_level: Option<i32>,
    pub current_level_name: Option<String>,
    pub current_level_percentage: f32,
}

pub fn set_known(conn: &mut SqliteConnection,
                 user_id: i32,
                 word_id: i32,
                 known: bool)
                 -> Result<()> {
    use crate::schema::user_words;

    let word = corpus::word_by_id(conn, word_id)?;
    let now = Utc::now().naive_utc();
    diesel::insert_into(user_words::table)
        .values(&UserWord { user_id,
                            word_id: word.id,
                            known,
                            last_updated: now })
        .on_conflict((user_words::user_id, user_words::word_id))
        .do_update()
        .set((user_words::known.eq(known), user_words::last_updated.eq(now)))
        .execute(conn)
        .chain_err(|| "Couldn't update the known flag!")?;
    debug!("User {} marked word {} as {}", user_id, word_id, if known { "known" } else { "unknown" });
    Ok(())
}

pub fn is_known(conn: &mut SqliteConnection, user_id: i32, word_id: i32) -> Result<bool> {
    use crate::schema::user_words;

    let row: Option<UserWord> = user_words::table.find((user_id, word_id))
                                                 .first(conn)
                                                 .optional()?;
    Ok(row.map_or(false, |r| r.known))
}

pub fn known_words(conn: &mut SqliteConnection, user_id: i32) -> Result<i64> {
    use crate::schema::user_words;

    user_words::table.filter(user_words::user_id.eq(user_id))
                     .filter(user_words::known.eq(true))
                     .count()
                     .get_result(conn)
                     .chain_err(|| "Couldn't count the known words!")
}

pub fn level_progress(conn: &mut SqliteConnection,
                      user_id: i32,
                      level_id: i32)
                      -> Result<ScopeProgress> {
    use crate::schema::{level_words, user_words};

    let total: i64 = level_words::table.filter(level_words::level_id.eq(level_id))
                                       .count()
                                       .get_result(conn)?;
    let known: i64 = level_words::table
        .filter(level_words::level_id.eq(level_id))
        .filter(level_words::word_id.eq_any(
            user_words::table.filter(user_words::user_id.eq(user_id))
                             .filter(user_words::known.eq(true))
                             .select(user_words::word_id)))
        .count()
        .get_result(conn)?;
    Ok(ScopeProgress::from_counts(total, known))
}

pub fn video_progress(conn: &mut SqliteConnection,
                      user_id: i32,
                      video_id: i32)
                      -> Result<ScopeProgress> {
    use crate::schema::{user_words, video_words};

    let total: i64 = video_words::table.filter(video_words::video_id.eq(video_id))
                                       .count()
                                       .get_result(conn)?;
    let known: i64 = video_words::table
        .filter(video_words::video_id.eq(video_id))
        .filter(video_words::word_id.eq_any(
            user_words::table.filter(user_words::user_id.eq(user_id))
                             .filter(user_words::known.eq(true))
                             .select(user_words::word_id)))
        .count()
        .get_result(conn)?;
    Ok(ScopeProgress::from_counts(total, known))
}

/// The dashboard aggregate: overall knowledge plus the user's current
/// level, which is the first level in number order still below the
/// completion threshold. A user who has finished everything stays on the
/// last level.
pub fn user_stats(conn: &mut SqliteConnection, user_id: i32) -> Result<UserStats> {
    let total_words = corpus::word_count(conn)?;
    let known = known_words(conn, user_id)?;
    let percentage = if total_words > 0 {
        known as f32 / total_words as f32 * 100.0
    } else {
        0.0
    };

    let level_list = levels::all_levels(conn)?;
    let mut current: Option<(&Level, ScopeProgress)> = None;
    for level in &level_list {
        let progress = level_progress(conn, user_id, level.id)?;
        if progress.percentage < LEVEL_DONE_THRESHOLD {
            current = Some((level, progress));
            break;
        }
    }
    if current.is_none() {
        if let Some(last) = level_list.last() {
            let progress = level_progress(conn, user_id, last.id)?;
            current = Some((last, progress));
        }
    }

    let (current_level, current_level_name, current_level_percentage) = match current {
        Some((level, progress)) => (Some(level.number), Some(level.name.clone()), progress.percentage),
        None => (None, None, 0.0),
    };

    Ok(UserStats { total_words,
                   known_words: known,
                   unknown_words: total_words - known,
                   percentage,
                   total_levels: level_list.len() as i64,
                   current_level,
                   current_level_name,
                   current_level_percentage })
}
