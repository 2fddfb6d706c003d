//! The practice session engine. A session snapshots an eligible word set
//! for one user and scope, then serves cards until every word is answered
//! correctly or the caller gives up. The snapshot is immutable: corpus or
//! level changes after creation never alter an open session.

use chrono::{NaiveDateTime, Utc};
use diesel::dsl::{count_star, sql};
use diesel::prelude::*;
use diesel::sql_types;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;

use crate::errors::*;
use crate::models::{NewSession, NewSessionProgress, ProgressUpdate, Session, SessionProgress,
                    Word};
use crate::problem;

/// Session size caps for the open-ended scopes.
pub const ALL_SCOPE_CAP: i64 = 100;
pub const PROBLEM_SCOPE_CAP: i64 = 50;
pub const RANDOM_SCOPE_CAP: i64 = 50;

/// What a session draws its words from. Words the user already knows are
/// excluded from every scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// One level, in rank order.
    Level(i32),
    /// One video's vocabulary, most frequent first.
    Video(i32),
    /// The whole corpus, most frequent first, capped.
    All,
    /// The user's problem words, most-missed first, capped.
    Problem,
    /// A uniform sample of unknown words, capped.
    Random,
}

impl Scope {
    pub fn kind(self) -> &'static str {
        match self {
            Scope::Level(_) => "level",
            Scope::Video(_) => "video",
            Scope::All => "all",
            Scope::Problem => "problem",
            Scope::Random => "random",
        }
    }

    pub fn target(self) -> Option<i32> {
        match self {
            Scope::Level(id) | Scope::Video(id) => Some(id),
            _ => None,
        }
    }

    /// Parses the stored or user-supplied form. Level and video scopes
    /// require a target id, the others must not have one.
    pub fn from_parts(kind: &str, target: Option<i32>) -> Result<Scope> {
        Ok(match (kind, target) {
            ("level", Some(id)) => Scope::Level(id),
            ("video", Some(id)) => Scope::Video(id),
            ("all", None) => Scope::All,
            ("problem", None) => Scope::Problem,
            ("random", None) => Scope::Random,
            _ => bail!(ErrorKind::InvalidInput),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    Pending,
    Correct,
    Incorrect,
    Skipped,
}

impl CardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CardStatus::Pending => "pending",
            CardStatus::Correct => "correct",
            CardStatus::Incorrect => "incorrect",
            CardStatus::Skipped => "skipped",
        }
    }

    fn from_db(status: &str) -> Result<CardStatus> {
        Ok(match status {
            "pending" => CardStatus::Pending,
            "correct" => CardStatus::Correct,
            "incorrect" => CardStatus::Incorrect,
            "skipped" => CardStatus::Skipped,
            _ => bail!(ErrorKind::DatabaseOdd("unknown card status")),
        })
    }
}

/// One word under study, as served to the application layer.
#[derive(Debug, Clone, Serialize)]
pub struct Card {
    pub word_id: i32,
    pub word: String,
    pub definition: Option<String>,
    pub pronunciation: Option<String>,
    pub frequency: i32,
    pub attempts: i32,
    pub status: CardStatus,
}

/// The running score shown after every answer.
#[derive(Debug, Clone, Serialize)]
pub struct QuickStats {
    pub total: i32,
    pub correct: i32,
    pub remaining: i32,
    pub percentage: f32,
}

impl QuickStats {
    fn of(session: &Session) -> QuickStats {
        let percentage = if session.total_cards > 0 {
            session.correct_answers as f32 / session.total_cards as f32 * 100.0
        } else {
            0.0
        };
        QuickStats { total: session.total_cards,
                     correct: session.correct_answers,
                     remaining: session.total_cards - session.correct_answers,
                     percentage }
    }
}

#[derive(Debug, Serialize)]
pub struct Answered {
    pub correct: bool,
    pub next: Option<Card>,
    pub stats: QuickStats,
}

/// The full per-status breakdown. `remaining` counts the cards still in
/// rotation (pending or incorrect); skipped cards are out of rotation and
/// reported separately.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub total: i64,
    pub correct: i64,
    pub incorrect: i64,
    pub skipped: i64,
    pub pending: i64,
    pub remaining: i64,
    pub percentage: f32,
    pub started: NaiveDateTime,
    pub completed: Option<NaiveDateTime>,
}

/// Materializes a session for the user and scope: resolves the eligible
/// words, then writes the session row and one pending progress row per
/// word in one transaction. Fails with `NoEligibleWords` when the scope
/// has nothing left to study.
pub fn create_session(conn: &mut SqliteConnection, user_id: i32, scope: Scope) -> Result<Session> {
    use crate::schema::{session_progress, sessions};

    conn.transaction(|conn| {
        let eligible = eligible_words(conn, user_id, scope)?;
        if eligible.is_empty() {
            bail!(ErrorKind::NoEligibleWords);
        }

        let session: Session = diesel::insert_into(sessions::table)
            .values(&NewSession { user_id,
                                  scope: scope.kind(),
                                  target_id: scope.target(),
                                  started: Utc::now().naive_utc(),
                                  total_cards: eligible.len() as i32 })
            .get_result(conn)?;

        // Insertion order is the tie-break order for next_card, so the
        // rows go in exactly as the scope resolved them.
        let cards: Vec<NewSessionProgress> =
            eligible.iter()
                    .map(|word| NewSessionProgress { session_id: session.id,
                                                     word_id: word.id })
                    .collect();
        diesel::insert_into(session_progress::table).values(&cards)
                                                    .execute(conn)?;

        info!("User {} started a {} session of {} cards",
              user_id,
              session.scope,
              session.total_cards);
        Ok(session)
    })
}

fn eligible_words(conn: &mut SqliteConnection, user_id: i32, scope: Scope) -> Result<Vec<Word>> {
    use crate::schema::{level_words, problem_words, user_words, video_words, words};

    let known = user_words::table.filter(user_words::user_id.eq(user_id))
                                 .filter(user_words::known.eq(true))
                                 .select(user_words::word_id);

    let found = match scope {
        Scope::Level(level_id) => {
            level_words::table.inner_join(words::table)
                              .filter(level_words::level_id.eq(level_id))
                              .filter(words::id.ne_all(known))
                              .order(level_words::rank.asc())
                              .select(words::all_columns)
                              .load(conn)?
        }
        Scope::Video(video_id) => {
            video_words::table.inner_join(words::table)
                              .filter(video_words::video_id.eq(video_id))
                              .filter(words::id.ne_all(known))
                              .order(words::frequency.desc())
                              .select(words::all_columns)
                              .load(conn)?
        }
        Scope::All => {
            words::table.filter(words::id.ne_all(known))
                        .order(words::frequency.desc())
                        .limit(ALL_SCOPE_CAP)
                        .load(conn)?
        }
        Scope::Problem => {
            problem_words::table.inner_join(words::table)
                                .filter(problem_words::user_id.eq(user_id))
                                .filter(words::id.ne_all(known))
                                .order((problem_words::times_incorrect.desc(),
                                        problem_words::last_seen.desc()))
                                .limit(PROBLEM_SCOPE_CAP)
                                .select(words::all_columns)
                                .load(conn)?
        }
        Scope::Random => {
            words::table.filter(words::id.ne_all(known))
                        .order(sql::<sql_types::Integer>("RANDOM()"))
                        .limit(RANDOM_SCOPE_CAP)
                        .load(conn)?
        }
    };
    Ok(found)
}

/// The card to show next: least attempts first, then oldest progress row.
/// Fresh words therefore always come before words already gotten wrong,
/// and a wrong answer sends its word to the back of the line. Correct and
/// skipped cards are out of the rotation for good.
pub fn next_card(conn: &mut SqliteConnection, session_id: i32) -> Result<Option<Card>> {
    use crate::schema::{session_progress, words};

    let row: Option<(SessionProgress, Word)> = session_progress::table
        .inner_join(words::table)
        .filter(session_progress::session_id.eq(session_id))
        .filter(session_progress::status.ne_all(vec![CardStatus::Correct.as_str(),
                                                     CardStatus::Skipped.as_str()]))
        .order((session_progress::attempts.asc(), session_progress::id.asc()))
        .first(conn)
        .optional()?;

    match row {
        Some((progress, word)) => Ok(Some(card_from_row(progress, word)?)),
        None => Ok(None),
    }
}

fn card_from_row(progress: SessionProgress, word: Word) -> Result<Card> {
    Ok(Card { word_id: word.id,
              word: word.word,
              definition: word.definition,
              pronunciation: word.pronunciation,
              frequency: word.frequency,
              attempts: progress.attempts,
              status: CardStatus::from_db(&progress.status)? })
}

/// Applies one answer as a single atomic unit: the progress row flips to
/// correct or incorrect with its attempt counted, a correct answer bumps
/// the session score, an incorrect one goes into the problem ledger for
/// the session's user. Returns the outcome together with the next card.
pub fn submit_answer(conn: &mut SqliteConnection,
                     session_id: i32,
                     word_id: i32,
                     correct: bool)
                     -> Result<Answered> {
    use crate::schema::sessions;

    conn.transaction(|conn| {
        let session = session_by_id(conn, session_id)?;
        let progress = progress_row(conn, session_id, word_id)?;
        let now = Utc::now().naive_utc();
        let status = if correct { CardStatus::Correct } else { CardStatus::Incorrect };

        diesel::update(&progress)
            .set(&ProgressUpdate { status: status.as_str(),
                                   attempts: progress.attempts + 1,
                                   first_answer: progress.first_answer.is_none().then_some(now),
                                   last_answer: now })
            .execute(conn)?;

        let session: Session = if correct {
            diesel::update(&session)
                .set(sessions::correct_answers.eq(sessions::correct_answers + 1))
                .get_result(conn)?
        } else {
            problem::record_incorrect(conn, session.user_id, word_id)?;
            session
        };

        debug!("Session {}: word {} answered {}",
               session_id,
               word_id,
               if correct { "correctly" } else { "incorrectly" });

        let next = next_card(conn, session_id)?;
        Ok(Answered { correct,
                      next,
                      stats: QuickStats::of(&session) })
    })
}

/// Takes the card out of the current rotation without judging it: no
/// score change, no problem ledger entry. The word only comes back in a
/// later session.
pub fn skip_card(conn: &mut SqliteConnection,
                 session_id: i32,
                 word_id: i32)
                 -> Result<Option<Card>> {
    conn.transaction(|conn| {
        session_by_id(conn, session_id)?;
        let progress = progress_row(conn, session_id, word_id)?;

        diesel::update(&progress)
            .set(&ProgressUpdate { status: CardStatus::Skipped.as_str(),
                                   attempts: progress.attempts + 1,
                                   first_answer: None,
                                   last_answer: Utc::now().naive_utc() })
            .execute(conn)?;
        debug!("Session {}: word {} skipped", session_id, word_id);

        next_card(conn, session_id)
    })
}

pub fn session_stats(conn: &mut SqliteConnection, session_id: i32) -> Result<SessionStats> {
    use crate::schema::session_progress;

    let session = session_by_id(conn, session_id)?;

    let by_status: Vec<(String, i64)> = session_progress::table
        .filter(session_progress::session_id.eq(session_id))
        .group_by(session_progress::status)
        .select((session_progress::status, count_star()))
        .load(conn)?;

    let mut correct = 0;
    let mut incorrect = 0;
    let mut skipped = 0;
    let mut pending = 0;
    for (status, count) in by_status {
        match CardStatus::from_db(&status)? {
            CardStatus::Correct => correct = count,
            CardStatus::Incorrect => incorrect = count,
            CardStatus::Skipped => skipped = count,
            CardStatus::Pending => pending = count,
        }
    }

    let total = i64::from(session.total_cards);
    let percentage = if total > 0 {
        correct as f32 / total as f32 * 100.0
    } else {
        0.0
    };
    Ok(SessionStats { total,
                      correct,
                      incorrect,
                      skipped,
                      pending,
                      remaining: pending + incorrect,
                      percentage,
                      started: session.started,
                      completed: session.completed })
}

/// Closes the session wherever it stands; an early end is fine, the
/// statistics simply reflect the state it was left in.
pub fn complete_session(conn: &mut SqliteConnection, session_id: i32) -> Result<Session> {
    use crate::schema::sessions;

    let session: Session = diesel::update(sessions::table.find(session_id))
        .set((sessions::completed.eq(Utc::now().naive_utc()), sessions::active.eq(false)))
        .get_result(conn)
        .optional()?
        .ok_or_else(|| Error::from(ErrorKind::SessionNotFound(session_id)))?;
    info!("Session {} completed: {}/{} correct",
          session.id,
          session.correct_answers,
          session.total_cards);
    Ok(session)
}

/// The user's most recent still-open session, if any, so the application
/// can offer to resume instead of stacking up new ones.
pub fn active_session(conn: &mut SqliteConnection, user_id: i32) -> Result<Option<Session>> {
    use crate::schema::sessions;

    sessions::table.filter(sessions::user_id.eq(user_id))
                   .filter(sessions::active.eq(true))
                   .order(sessions::started.desc())
                   .first(conn)
                   .optional()
                   .chain_err(|| "Couldn't look for an active session!")
}

fn session_by_id(conn: &mut SqliteConnection, session_id: i32) -> Result<Session> {
    use crate::schema::sessions;

    sessions::table.find(session_id)
                   .first(conn)
                   .optional()?
                   .ok_or_else(|| ErrorKind::SessionNotFound(session_id).into())
}

fn progress_row(conn: &mut SqliteConnection,
                session_id: i32,
                word_id: i32)
                -> Result<SessionProgress> {
    use crate::schema::session_progress;

    session_progress::table.filter(session_progress::session_id.eq(session_id))
                           .filter(session_progress::word_id.eq(word_id))
                           .first(conn)
                           .optional()?
                           .ok_or_else(|| ErrorKind::WordNotFound(word_id).into())
}
