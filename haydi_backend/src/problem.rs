//! The problem word ledger: a per-user, lifetime count of incorrect
//! answers. Rows are only ever inserted or incremented; there is no decay
//! or cleanup, so remediation can always see the full history.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::errors::*;
use crate::models::{ProblemWord, Word};

pub fn record_incorrect(conn: &mut SqliteConnection, user_id: i32, word_id: i32) -> Result<()> {
    use crate::schema::problem_words;

    let now = Utc::now().naive_utc();
    diesel::insert_into(problem_words::table)
        .values(&ProblemWord { user_id,
                               word_id,
                               times_incorrect: 1,
                               last_seen: now })
        .on_conflict((problem_words::user_id, problem_words::word_id))
        .do_update()
        .set((problem_words::times_incorrect.eq(problem_words::times_incorrect + 1),
              problem_words::last_seen.eq(now)))
        .execute(conn)
        .chain_err(|| "Couldn't record the incorrect answer!")?;
    Ok(())
}

/// The user's hardest words, most-missed first, most recently seen first
/// among equals.
pub fn top_problems(conn: &mut SqliteConnection,
                    user_id: i32,
                    limit: i64)
                    -> Result<Vec<(ProblemWord, Word)>> {
    use crate::schema::{problem_words, words};

    problem_words::table
        .inner_join(words::table)
        .filter(problem_words::user_id.eq(user_id))
        .order((problem_words::times_incorrect.desc(), problem_words::last_seen.desc()))
        .limit(limit)
        .load(conn)
        .chain_err(|| "Couldn't load the problem words!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus;
    use crate::testutil::test_conn;
    use crate::user;

    #[test]
    fn misses_accumulate_per_user() {
        let mut conn = test_conn();
        let ayse = user::get_or_add_user(&mut conn, "ayse").unwrap();
        let emre = user::get_or_add_user(&mut conn, "emre").unwrap();
        let zor = corpus::get_or_add_word(&mut conn, "zor").unwrap();
        let kolay = corpus::get_or_add_word(&mut conn, "kolay").unwrap();

        record_incorrect(&mut conn, ayse.id, zor.id).unwrap();
        record_incorrect(&mut conn, ayse.id, zor.id).unwrap();
        record_incorrect(&mut conn, ayse.id, kolay.id).unwrap();
        record_incorrect(&mut conn, emre.id, kolay.id).unwrap();

        let ayse_problems = top_problems(&mut conn, ayse.id, 10).unwrap();
        assert_eq!(ayse_problems.len(), 2);
        assert_eq!(ayse_problems[0].1.id, zor.id);
        assert_eq!(ayse_problems[0].0.times_incorrect, 2);
        assert_eq!(ayse_problems[1].0.times_incorrect, 1);

        // The other user's ledger is untouched.
        let emre_problems = top_problems(&mut conn, emre.id, 10).unwrap();
        assert_eq!(emre_problems.len(), 1);
        assert_eq!(emre_problems[0].1.id, kolay.id);
    }

    #[test]
    fn counts_never_reset() {
        let mut conn = test_conn();
        let user = user::get_or_add_user(&mut conn, "ayse").unwrap();
        let word = corpus::get_or_add_word(&mut conn, "zor").unwrap();

        let mut last = 0;
        for _ in 0..5 {
            record_incorrect(&mut conn, user.id, word.id).unwrap();
            let current = top_problems(&mut conn, user.id, 1).unwrap()[0].0.times_incorrect;
            assert!(current > last);
            last = current;
        }
        assert_eq!(last, 5);
    }
}
