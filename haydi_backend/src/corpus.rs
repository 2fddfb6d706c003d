//! The vocabulary store: words with observed frequencies, and the videos
//! they were observed in. External collaborators feed this module raw
//! `(word, occurrence count)` pairs and optional definitions; everything
//! else in the crate only reads from it.

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use unicode_normalization::UnicodeNormalization;

use crate::errors::*;
use crate::models::{NewVideo, NewWord, Video, VideoWord, Word};

/// Words are stored trimmed, lowercased and NFC-normalized, so the same
/// word observed with different casing or composition counts as one.
pub fn normalize_word(text: &str) -> String {
    text.trim().to_lowercase().chars().nfc().collect()
}

pub fn get_or_add_word(conn: &mut SqliteConnection, text: &str) -> Result<Word> {
    add_observations(conn, text, 1)
}

/// Records `count` observations of a word: inserts it on first sighting,
/// otherwise bumps its frequency counter.
pub fn add_observations(conn: &mut SqliteConnection, text: &str, count: i32) -> Result<Word> {
    use crate::schema::words;

    if count < 1 {
        bail!(ErrorKind::InvalidInput);
    }
    let normalized = normalize_word(text);
    if normalized.is_empty() {
        bail!(ErrorKind::InvalidInput);
    }

    diesel::insert_into(words::table)
        .values(&NewWord { word: &normalized,
                           frequency: count,
                           added: Utc::now().naive_utc() })
        .on_conflict(words::word)
        .do_update()
        .set(words::frequency.eq(words::frequency + count))
        .get_result(conn)
        .chain_err(|| "Couldn't record the word observation!")
}

pub fn word_by_id(conn: &mut SqliteConnection, id: i32) -> Result<Word> {
    use crate::schema::words;

    words::table.find(id)
                .first(conn)
                .optional()?
                .ok_or_else(|| ErrorKind::WordNotFound(id).into())
}

pub fn find_word(conn: &mut SqliteConnection, text: &str) -> Result<Option<Word>> {
    use crate::schema::words;

    words::table.filter(words::word.eq(normalize_word(text)))
                .first(conn)
                .optional()
                .chain_err(|| "Couldn't look up the word!")
}

pub fn word_count(conn: &mut SqliteConnection) -> Result<i64> {
    use crate::schema::words;

    words::table.count()
                .get_result(conn)
                .chain_err(|| "Couldn't count the words!")
}

/// Definitions and pronunciations are opaque strings from the translation
/// collaborator; both columns are overwritten on every call.
pub fn update_definition(conn: &mut SqliteConnection,
                         word_id: i32,
                         definition: Option<&str>,
                         pronunciation: Option<&str>)
                         -> Result<Word> {
    use crate::schema::words;

    let word = word_by_id(conn, word_id)?;
    diesel::update(&word).set((words::definition.eq(definition),
                               words::pronunciation.eq(pronunciation)))
                         .get_result(conn)
                         .chain_err(|| "Couldn't update the word definition!")
}

/// Work queue for the enrichment collaborator, most frequent words first.
pub fn words_missing_definition(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<Word>> {
    use crate::schema::words;

    words::table.filter(words::definition.is_null().or(words::definition.eq("")))
                .order(words::frequency.desc())
                .limit(limit)
                .load(conn)
                .chain_err(|| "Couldn't list the words without a definition!")
}

pub fn get_or_add_video(conn: &mut SqliteConnection, title: &str) -> Result<Video> {
    use crate::schema::videos;

    let title = title.trim();
    if title.is_empty() {
        bail!(ErrorKind::InvalidInput);
    }

    if let Some(video) = videos::table.filter(videos::title.eq(title))
                                      .first(conn)
                                      .optional()?
    {
        return Ok(video);
    }

    let video: Video = diesel::insert_into(videos::table)
        .values(&NewVideo { title, added: Utc::now().naive_utc() })
        .get_result(conn)
        .chain_err(|| "Couldn't add the video!")?;
    info!("Added video {} (id {})", video.title, video.id);
    Ok(video)
}

/// Links a word to a video for the video practice scope. Returns false if
/// the link already existed.
pub fn add_video_word(conn: &mut SqliteConnection, video_id: i32, word_id: i32) -> Result<bool> {
    use crate::schema::video_words;

    let word = word_by_id(conn, word_id)?;
    let inserted = diesel::insert_into(video_words::table)
        .values(&VideoWord { video_id, word_id: word.id })
        .on_conflict_do_nothing()
        .execute(conn)
        .chain_err(|| "Couldn't link the word to the video!")?;
    Ok(inserted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_conn;

    #[test]
    fn repeated_observations_accumulate() {
        let mut conn = test_conn();

        let first = get_or_add_word(&mut conn, "Merhaba").unwrap();
        assert_eq!(first.word, "merhaba");
        assert_eq!(first.frequency, 1);

        let again = add_observations(&mut conn, "  merhaba ", 4).unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.frequency, 5);
        assert_eq!(word_count(&mut conn).unwrap(), 1);
    }

    #[test]
    fn zero_and_blank_observations_are_rejected() {
        let mut conn = test_conn();

        match add_observations(&mut conn, "word", 0) {
            Err(Error(ErrorKind::InvalidInput, _)) => (),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
        match add_observations(&mut conn, "   ", 1) {
            Err(Error(ErrorKind::InvalidInput, _)) => (),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn definitions_are_opaque_and_clearable() {
        let mut conn = test_conn();

        let word = get_or_add_word(&mut conn, "kitap").unwrap();
        assert!(word.definition.is_none());

        let enriched =
            update_definition(&mut conn, word.id, Some("book"), Some("kee-TAHP")).unwrap();
        assert_eq!(enriched.definition.as_deref(), Some("book"));
        assert_eq!(enriched.pronunciation.as_deref(), Some("kee-TAHP"));

        let cleared = update_definition(&mut conn, word.id, None, None).unwrap();
        assert!(cleared.definition.is_none());

        match update_definition(&mut conn, 9999, Some("x"), None) {
            Err(Error(ErrorKind::WordNotFound(9999), _)) => (),
            other => panic!("expected WordNotFound, got {:?}", other),
        }
    }

    #[test]
    fn missing_definition_queue_is_frequency_ordered() {
        let mut conn = test_conn();

        let rare = add_observations(&mut conn, "nadir", 2).unwrap();
        let common = add_observations(&mut conn, "yaygin", 90).unwrap();
        let defined = add_observations(&mut conn, "tamam", 50).unwrap();
        update_definition(&mut conn, defined.id, Some("okay"), None).unwrap();

        let queue = words_missing_definition(&mut conn, 10).unwrap();
        let ids: Vec<i32> = queue.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![common.id, rare.id]);
    }

    #[test]
    fn video_membership_is_idempotent() {
        let mut conn = test_conn();

        let video = get_or_add_video(&mut conn, "Kapadokya vlog").unwrap();
        let same = get_or_add_video(&mut conn, "  Kapadokya vlog ").unwrap();
        assert_eq!(video.id, same.id);

        let word = get_or_add_word(&mut conn, "balon").unwrap();
        assert!(add_video_word(&mut conn, video.id, word.id).unwrap());
        assert!(!add_video_word(&mut conn, video.id, word.id).unwrap());

        match add_video_word(&mut conn, video.id, 4242) {
            Err(Error(ErrorKind::WordNotFound(4242), _)) => (),
            other => panic!("expected WordNotFound, got {:?}", other),
        }
    }
}
