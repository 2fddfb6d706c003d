//! The leveling engine: slices the frequency-ranked vocabulary into
//! fixed-size bands ("levels") that the practice scopes and the progress
//! displays are built on. Levels are never patched in place; a rebuild
//! drops and regenerates all of them in one transaction.

use std::thread;
use std::time::Duration;

use chrono::Utc;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::errors::*;
use crate::models::{Level, LevelWord, NewLevel, Word};

pub const DEFAULT_PACKAGE_SIZE: usize = 500;

const REBUILD_RETRIES: u32 = 3;

/// Rebuilds all levels from the current word frequencies: words sorted by
/// frequency descending are chunked into consecutive levels of
/// `package_size` words (the last one may be smaller). Returns the number
/// of levels created.
///
/// The rebuild takes the write lock up front and runs as one unit, so
/// readers either see the old levels or the new ones, never a mix. If the
/// lock stays contended through the retries, the call gives up with
/// `ConcurrentRebuild`.
pub fn generate_levels(conn: &mut SqliteConnection, package_size: usize) -> Result<usize> {
    if package_size == 0 {
        bail!(ErrorKind::InvalidInput);
    }

    let mut tries = 0;
    loop {
        match conn.immediate_transaction(|conn| rebuild_levels(conn, package_size)) {
            Err(Error(ErrorKind::Diesel(ref e), _))
                if is_lock_contention(e) && tries < REBUILD_RETRIES => {
                tries += 1;
                warn!("Level rebuild is waiting on the database lock (retry {}/{})",
                      tries,
                      REBUILD_RETRIES);
                thread::sleep(Duration::from_millis(250 * u64::from(tries)));
            }
            Err(Error(ErrorKind::Diesel(ref e), _)) if is_lock_contention(e) => {
                return Err(ErrorKind::ConcurrentRebuild.into());
            }
            other => return other,
        }
    }
}

fn rebuild_levels(conn: &mut SqliteConnection, package_size: usize) -> Result<usize> {
    use crate::schema::{level_words, levels, words};

    // Stable order: frequency ties keep their original insertion order, so
    // repeated rebuilds over unchanged data assign identical levels.
    let vocabulary: Vec<Word> = words::table
        .order((words::frequency.desc(), words::id.asc()))
        .load(conn)?;

    if vocabulary.is_empty() {
        bail!(ErrorKind::EmptyCorpus);
    }

    diesel::delete(level_words::table).execute(conn)?;
    diesel::delete(levels::table).execute(conn)?;

    let created = Utc::now().naive_utc();
    let mut level_count = 0;

    for (index, chunk) in vocabulary.chunks(package_size).enumerate() {
        let number = (index + 1) as i32;
        let first = &chunk[0];
        let last = &chunk[chunk.len() - 1];
        let name = format!("Level {}: {} - {}", number, first.word, last.word);

        let level: Level = diesel::insert_into(levels::table)
            .values(&NewLevel { number,
                                name: &name,
                                word_count: chunk.len() as i32,
                                min_frequency: last.frequency,
                                max_frequency: first.frequency,
                                created })
            .get_result(conn)?;

        let members: Vec<LevelWord> = chunk.iter()
                                           .enumerate()
                                           .map(|(position, word)| LevelWord {
                                               level_id: level.id,
                                               word_id: word.id,
                                               rank: (position + 1) as i32,
                                           })
                                           .collect();
        diesel::insert_into(level_words::table).values(&members)
                                               .execute(conn)?;
        level_count += 1;
    }

    info!("Rebuilt {} levels from {} words (package size {})",
          level_count,
          vocabulary.len(),
          package_size);
    Ok(level_count)
}

fn is_lock_contention(e: &diesel::result::Error) -> bool {
    match *e {
        diesel::result::Error::DatabaseError(_, ref info) => {
            let message = info.message();
            message.contains("database is locked") || message.contains("database table is locked")
        }
        _ => false,
    }
}

pub fn have_levels(conn: &mut SqliteConnection) -> Result<bool> {
    use crate::schema::levels;

    let count: i64 = levels::table.count()
                                  .get_result(conn)
                                  .chain_err(|| "Couldn't count the levels!")?;
    Ok(count > 0)
}

pub fn all_levels(conn: &mut SqliteConnection) -> Result<Vec<Level>> {
    use crate::schema::levels;

    levels::table.order(levels::number.asc())
                 .load(conn)
                 .chain_err(|| "Couldn't load the levels!")
}

pub fn level_by_number(conn: &mut SqliteConnection, number: i32) -> Result<Option<Level>> {
    use crate::schema::levels;

    levels::table.filter(levels::number.eq(number))
                 .first(conn)
                 .optional()
                 .chain_err(|| "Couldn't look up the level!")
}

/// The words of a level in rank order (rank 1 = most frequent).
pub fn words_in_level(conn: &mut SqliteConnection, level_id: i32) -> Result<Vec<(i32, Word)>> {
    use crate::schema::{level_words, words};

    level_words::table.inner_join(words::table)
                      .filter(level_words::level_id.eq(level_id))
                      .order(level_words::rank.asc())
                      .select((level_words::rank, words::all_columns))
                      .load(conn)
                      .chain_err(|| "Couldn't load the words of the level!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus;
    use crate::testutil::test_conn;

    fn seed_words(conn: &mut SqliteConnection, counts: &[(&str, i32)]) {
        for &(word, count) in counts {
            corpus::add_observations(conn, word, count).unwrap();
        }
    }

    #[test]
    fn levels_partition_the_vocabulary() {
        let mut conn = test_conn();
        seed_words(&mut conn,
                   &[("bir", 120),
                     ("iki", 100),
                     ("uc", 90),
                     ("dort", 80),
                     ("bes", 70),
                     ("alti", 60),
                     ("yedi", 50),
                     ("sekiz", 40),
                     ("dokuz", 30),
                     ("on", 20),
                     ("yirmi", 10),
                     ("otuz", 5)]);

        let created = generate_levels(&mut conn, 5).unwrap();
        assert_eq!(created, 3);

        let levels = all_levels(&mut conn).unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0].number, 1);
        assert_eq!(levels[0].word_count, 5);
        assert_eq!(levels[0].max_frequency, 120);
        assert_eq!(levels[0].min_frequency, 70);
        assert_eq!(levels[2].word_count, 2);
        assert_eq!(levels[2].name, "Level 3: yirmi - otuz");

        // Bands don't overlap and the word count adds up.
        let total: i32 = levels.iter().map(|l| l.word_count).sum();
        assert_eq!(i64::from(total), corpus::word_count(&mut conn).unwrap());
        for pair in levels.windows(2) {
            assert!(pair[0].min_frequency >= pair[1].max_frequency);
        }

        // Every level holds exactly the words its row claims, rank-ordered.
        for level in &levels {
            let members = words_in_level(&mut conn, level.id).unwrap();
            assert_eq!(members.len() as i32, level.word_count);
            for (expected_rank, (rank, _)) in members.iter().enumerate() {
                assert_eq!(*rank, expected_rank as i32 + 1);
            }
        }
    }

    #[test]
    fn rebuild_is_deterministic_with_frequency_ties() {
        let mut conn = test_conn();
        // All the same frequency, so any order shuffle would show up.
        seed_words(&mut conn,
                   &[("a", 7), ("b", 7), ("c", 7), ("d", 7), ("e", 7)]);

        generate_levels(&mut conn, 2).unwrap();
        let first_run: Vec<(i32, Vec<(i32, i32)>)> = all_levels(&mut conn)
            .unwrap()
            .iter()
            .map(|l| {
                let members = words_in_level(&mut conn, l.id)
                    .unwrap()
                    .into_iter()
                    .map(|(rank, w)| (rank, w.id))
                    .collect();
                (l.number, members)
            })
            .collect();

        generate_levels(&mut conn, 2).unwrap();
        let second_run: Vec<(i32, Vec<(i32, i32)>)> = all_levels(&mut conn)
            .unwrap()
            .iter()
            .map(|l| {
                let members = words_in_level(&mut conn, l.id)
                    .unwrap()
                    .into_iter()
                    .map(|(rank, w)| (rank, w.id))
                    .collect();
                (l.number, members)
            })
            .collect();

        assert_eq!(first_run, second_run);
    }

    #[test]
    fn rebuild_replaces_stale_levels_completely() {
        let mut conn = test_conn();
        seed_words(&mut conn, &[("eski", 10), ("yeni", 20), ("son", 30)]);

        generate_levels(&mut conn, 1).unwrap();
        assert_eq!(all_levels(&mut conn).unwrap().len(), 3);

        generate_levels(&mut conn, 10).unwrap();
        let levels = all_levels(&mut conn).unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].word_count, 3);

        // No orphaned membership rows survive the rebuild.
        let members = words_in_level(&mut conn, levels[0].id).unwrap();
        assert_eq!(members.len(), 3);
    }

    #[test]
    fn empty_corpus_is_an_error() {
        let mut conn = test_conn();
        match generate_levels(&mut conn, DEFAULT_PACKAGE_SIZE) {
            Err(Error(ErrorKind::EmptyCorpus, _)) => (),
            other => panic!("expected EmptyCorpus, got {:?}", other),
        }
        assert!(!have_levels(&mut conn).unwrap());
    }

    #[test]
    fn zero_package_size_is_rejected() {
        let mut conn = test_conn();
        seed_words(&mut conn, &[("bir", 1)]);
        match generate_levels(&mut conn, 0) {
            Err(Error(ErrorKind::InvalidInput, _)) => (),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }
}
