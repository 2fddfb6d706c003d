use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use super::schema::*;

#[derive(Insertable, Debug)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub joined: NaiveDateTime,
}

#[derive(Identifiable, Queryable, Clone, Debug, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub joined: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = words)]
pub struct NewWord<'a> {
    pub word: &'a str,
    pub frequency: i32,
    pub added: NaiveDateTime,
}

#[derive(Identifiable, Queryable, Clone, Debug, Serialize)]
#[diesel(table_name = words)]
pub struct Word {
    pub id: i32,
    pub word: String,
    pub frequency: i32,
    pub definition: Option<String>,
    pub pronunciation: Option<String>,
    pub added: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = videos)]
pub struct NewVideo<'a> {
    pub title: &'a str,
    pub added: NaiveDateTime,
}

#[derive(Identifiable, Queryable, Clone, Debug, Serialize)]
#[diesel(table_name = videos)]
pub struct Video {
    pub id: i32,
    pub title: String,
    pub added: NaiveDateTime,
}

#[derive(Identifiable, Queryable, Insertable, Associations, Debug)]
#[diesel(table_name = video_words)]
#[diesel(primary_key(video_id, word_id))]
#[diesel(belongs_to(Video))]
#[diesel(belongs_to(Word))]
pub struct VideoWord {
    pub video_id: i32,
    pub word_id: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = levels)]
pub struct NewLevel<'a> {
    pub number: i32,
    pub name: &'a str,
    pub word_count: i32,
    pub min_frequency: i32,
    pub max_frequency: i32,
    pub created: NaiveDateTime,
}

#[derive(Identifiable, Queryable, Clone, Debug, Serialize)]
#[diesel(table_name = levels)]
pub struct Level {
    pub id: i32,
    pub number: i32,
    pub name: String,
    pub word_count: i32,
    pub min_frequency: i32,
    pub max_frequency: i32,
    pub created: NaiveDateTime,
}

#[derive(Identifiable, Queryable, Insertable, Associations, Debug)]
#[diesel(table_name = level_words)]
#[diesel(primary_key(level_id, word_id))]
#[diesel(belongs_to(Level))]
#[diesel(belongs_to(Word))]
pub struct LevelWord {
    pub level_id: i32,
    pub word_id: i32,
    pub rank: i32,
}

#[derive(Identifiable, Queryable, Insertable, Associations, AsChangeset, Debug)]
#[diesel(table_name = user_words)]
#[diesel(primary_key(user_id, word_id))]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(Word))]
pub struct UserWord {
    pub user_id: i32,
    pub word_id: i32,
    pub known: bool,
    pub last_updated: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = sessions)]
pub struct NewSession<'a> {
    pub user_id: i32,
    pub scope: &'a str,
    pub target_id: Option<i32>,
    pub started: NaiveDateTime,
    pub total_cards: i32,
}

#[derive(Identifiable, Queryable, Associations, Clone, Debug, Serialize)]
#[diesel(table_name = sessions)]
#[diesel(belongs_to(User))]
pub struct Session {
    pub id: i32,
    pub user_id: i32,
    pub scope: String,
    pub target_id: Option<i32>,
    pub started: NaiveDateTime,
    pub completed: Option<NaiveDateTime>,
    pub total_cards: i32,
    pub correct_answers: i32,
    pub active: bool,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = session_progress)]
pub struct NewSessionProgress {
    pub session_id: i32,
    pub word_id: i32,
}

#[derive(Identifiable, Queryable, Associations, Debug, Serialize)]
#[diesel(table_name = session_progress)]
#[diesel(belongs_to(Session))]
#[diesel(belongs_to(Word))]
pub struct SessionProgress {
    pub id: i32,
    pub session_id: i32,
    pub word_id: i32,
    pub status: String,
    pub attempts: i32,
    pub first_answer: Option<NaiveDateTime>,
    pub last_answer: Option<NaiveDateTime>,
}

// None fields leave the column untouched, so a first answer timestamp is
// written once and kept.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = session_progress)]
pub struct ProgressUpdate<'a> {
    pub status: &'a str,
    pub attempts: i32,
    pub first_answer: Option<NaiveDateTime>,
    pub last_answer: NaiveDateTime,
}

#[derive(Identifiable, Queryable, Insertable, Associations, AsChangeset, Debug, Serialize)]
#[diesel(table_name = problem_words)]
#[diesel(primary_key(user_id, word_id))]
#[diesel(belongs_to(User))]
#[diesel(belongs_to(Word))]
pub struct ProblemWord {
    pub user_id: i32,
    pub word_id: i32,
    pub times_incorrect: i32,
    pub last_seen: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use diesel::prelude::*;

    use super::*;
    use crate::schema::{session_progress, sessions};
    use crate::testutil::test_conn;
    use crate::{corpus, user};

    // Writes a session and a progress row through the derives, reads them
    // back, and checks that a changeset with `first_answer: None` leaves
    // the stored timestamp alone.
    #[test]
    fn session_rows_roundtrip_and_keep_the_first_answer() {
        let mut conn = test_conn();
        let ayse = user::get_or_add_user(&mut conn, "ayse").unwrap();
        let kale = corpus::get_or_add_word(&mut conn, "kale").unwrap();

        let session: Session = diesel::insert_into(sessions::table)
            .values(&NewSession { user_id: ayse.id,
                                  scope: "all",
                                  target_id: None,
                                  started: Utc::now().naive_utc(),
                                  total_cards: 1 })
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(session.correct_answers, 0);
        assert!(session.active);
        assert!(session.completed.is_none());

        let fresh: SessionProgress = diesel::insert_into(session_progress::table)
            .values(&NewSessionProgress { session_id: session.id,
                                          word_id: kale.id })
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(fresh.status, "pending");
        assert_eq!(fresh.attempts, 0);
        assert!(fresh.first_answer.is_none());

        let t1 = Utc::now().naive_utc();
        diesel::update(session_progress::table.find(fresh.id))
            .set(&ProgressUpdate { status: "incorrect",
                                   attempts: 1,
                                   first_answer: Some(t1),
                                   last_answer: t1 })
            .execute(&mut conn)
            .unwrap();
        let missed: SessionProgress = session_progress::table.find(fresh.id)
                                                             .first(&mut conn)
                                                             .unwrap();
        assert!(missed.first_answer.is_some());
        assert_eq!(missed.last_answer, missed.first_answer);

        diesel::update(session_progress::table.find(fresh.id))
            .set(&ProgressUpdate { status: "correct",
                                   attempts: 2,
                                   first_answer: None,
                                   last_answer: t1 + Duration::seconds(7) })
            .execute(&mut conn)
            .unwrap();
        let solved: SessionProgress = session_progress::table.find(fresh.id)
                                                             .first(&mut conn)
                                                             .unwrap();
        assert_eq!(solved.status, "correct");
        assert_eq!(solved.attempts, 2);
        assert_eq!(solved.first_answer, missed.first_answer);
        assert_ne!(solved.last_answer, missed.last_answer);
    }
}
