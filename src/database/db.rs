//! Database operations for the review engine
//!
//! Handles SQLite schema initialization, CRUD operations for decks and flashcards,
//! per-learner SM-2 review records and the review history log.

use crate::error::{Result, ReviewError};
use crate::models::{Deck, Flashcard, ReviewRecord, SchedulingState};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;

/// Summary row for deck listings
#[derive(Clone, Debug, PartialEq)]
pub struct DeckInfo {
    pub id: i64,
    pub title: String,
    pub note_id: Option<String>,
    pub card_count: i64,
}

/// One persisted rating, as appended by the background log writer
#[derive(Clone, Debug, PartialEq)]
pub struct ReviewLogEntry {
    pub record_id: i64,
    pub learner_id: String,
    pub card_id: i64,
    pub quality: u8,
    pub previous_interval: i64,
    pub interval: i64,
    pub ease_factor: f64,
    pub reviewed_at: DateTime<Utc>,
}

/// Opens (or creates) the database file and makes sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    log::debug!("Opened review database at {}", path.display());
    Ok(conn)
}

/// Fresh in-memory database, used by tests and dry runs
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Creates tables for decks, flashcards, review records, review log and app state.
/// Sets current date to now if not already initialized.
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Cascading deletes depend on this being on for every connection
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS decks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL UNIQUE,
            note_id TEXT
        );

        CREATE TABLE IF NOT EXISTS flashcards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            deck_id INTEGER NOT NULL,
            card_type TEXT NOT NULL DEFAULT 'definition',
            front TEXT NOT NULL,
            back TEXT NOT NULL,
            FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE,
            UNIQUE(deck_id, front)
        );

        CREATE TABLE IF NOT EXISTS review_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            learner_id TEXT NOT NULL,
            card_id INTEGER NOT NULL,
            ease_factor REAL NOT NULL DEFAULT 2.5,
            interval_days INTEGER NOT NULL DEFAULT 0,
            repetitions INTEGER NOT NULL DEFAULT 0,
            next_review_at INTEGER NOT NULL,
            FOREIGN KEY (card_id) REFERENCES flashcards(id) ON DELETE CASCADE,
            UNIQUE(learner_id, card_id)
        );

        CREATE INDEX IF NOT EXISTS idx_review_records_due
            ON review_records (learner_id, next_review_at);

        CREATE TABLE IF NOT EXISTS review_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id INTEGER NOT NULL,
            learner_id TEXT NOT NULL,
            card_id INTEGER NOT NULL,
            quality INTEGER NOT NULL,
            previous_interval INTEGER NOT NULL,
            interval_days INTEGER NOT NULL,
            ease_factor REAL NOT NULL,
            reviewed_at INTEGER NOT NULL,
            FOREIGN KEY (record_id) REFERENCES review_records(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS app_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO app_state (key, value) VALUES ('current_date', ?1)",
        params![Utc::now().timestamp().to_string()],
    )?;

    Ok(())
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let secs: i64 = row.get(idx)?;
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

/// Retrieves the review clock. Starts at the wall clock and only moves
/// forward through [`advance_day`], so multi-day schedules can be walked through.
pub fn get_current_date(conn: &Connection) -> Result<DateTime<Utc>> {
    let timestamp: String = conn.query_row(
        "SELECT value FROM app_state WHERE key = 'current_date'",
        [],
        |row| row.get(0),
    )?;

    let secs = timestamp
        .parse::<i64>()
        .map_err(|e| ReviewError::Validation(format!("corrupt current_date '{timestamp}': {e}")))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ReviewError::Validation(format!("current_date {secs} is out of range")))
}

fn set_current_date(date: DateTime<Utc>, conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO app_state (key, value) VALUES ('current_date', ?1)",
        params![date.timestamp().to_string()],
    )?;
    Ok(())
}

/// Advances current date by 24 hours
pub fn advance_day(conn: &Connection) -> Result<DateTime<Utc>> {
    let next_day = get_current_date(conn)? + Duration::days(1);
    set_current_date(next_day, conn)?;
    log::info!("Review clock advanced to {}", next_day.format("%Y-%m-%d"));
    Ok(next_day)
}

/// Moves the review clock back to the wall clock
pub fn reset_current_date(conn: &Connection) -> Result<DateTime<Utc>> {
    let now = Utc::now();
    set_current_date(now, conn)?;
    Ok(now)
}

/// Creates a new deck in the database and returns its id
pub fn new_deck(title: &str, note_id: Option<&str>, conn: &Connection) -> Result<i64> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ReviewError::Validation("deck title must not be empty".into()));
    }
    conn.execute(
        "INSERT INTO decks (title, note_id) VALUES (?1, ?2)",
        params![title, note_id],
    )?;
    let id = conn.last_insert_rowid();
    log::info!("Deck '{}' created (id {})", title, id);
    Ok(id)
}

/// Looks a deck up by exact title
pub fn find_deck(title: &str, conn: &Connection) -> Result<DeckInfo> {
    conn.query_row(
        "SELECT d.id, d.title, d.note_id, COUNT(f.id)
         FROM decks d LEFT JOIN flashcards f ON f.deck_id = d.id
         WHERE d.title = ?1
         GROUP BY d.id",
        params![title],
        |row| {
            Ok(DeckInfo {
                id: row.get(0)?,
                title: row.get(1)?,
                note_id: row.get(2)?,
                card_count: row.get(3)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| ReviewError::DeckNotFound(title.to_string()))
}

/// Retrieves every deck with its card count
pub fn get_all_decks(conn: &Connection) -> Result<Vec<DeckInfo>> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.title, d.note_id, COUNT(f.id)
         FROM decks d LEFT JOIN flashcards f ON f.deck_id = d.id
         GROUP BY d.id
         ORDER BY d.title",
    )?;
    let decks = stmt
        .query_map([], |row| {
            Ok(DeckInfo {
                id: row.get(0)?,
                title: row.get(1)?,
                note_id: row.get(2)?,
                card_count: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(decks)
}

/// Adds a flashcard to a deck and returns its id
///
/// Fronts are unique within a deck; adding a second card with the same front
/// is a validation error and leaves the existing card untouched.
pub fn add_flashcard(deck_id: i64, card: &Flashcard, conn: &Connection) -> Result<i64> {
    if card.front.trim().is_empty() || card.back.trim().is_empty() {
        return Err(ReviewError::Validation(
            "flashcard front and back must not be empty".into(),
        ));
    }

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM flashcards WHERE deck_id = ?1 AND front = ?2",
            params![deck_id, card.front],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Err(ReviewError::Validation(format!(
            "deck already has a card with front '{}'",
            card.front
        )));
    }

    conn.execute(
        "INSERT INTO flashcards (deck_id, card_type, front, back) VALUES (?1, ?2, ?3, ?4)",
        params![deck_id, card.card_type.as_str(), card.front, card.back],
    )?;

    Ok(conn.last_insert_rowid())
}

fn flashcard_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Flashcard> {
    let card_type: String = row.get(offset)?;
    Ok(Flashcard {
        card_type: card_type.parse().unwrap_or_default(),
        front: row.get(offset + 1)?,
        back: row.get(offset + 2)?,
    })
}

pub fn get_flashcard(card_id: i64, conn: &Connection) -> Result<Flashcard> {
    conn.query_row(
        "SELECT card_type, front, back FROM flashcards WHERE id = ?1",
        params![card_id],
        |row| flashcard_from_row(row, 0),
    )
    .optional()?
    .ok_or(ReviewError::CardNotFound(card_id))
}

/// Retrieves all flashcards for a given deck
///
/// Returns vector of (flashcard_id, Flashcard) tuples in insertion order
pub fn get_flashcards_for_deck(deck_id: i64, conn: &Connection) -> Result<Vec<(i64, Flashcard)>> {
    let mut stmt = conn.prepare(
        "SELECT id, card_type, front, back FROM flashcards WHERE deck_id = ?1 ORDER BY id",
    )?;

    let flashcards = stmt
        .query_map(params![deck_id], |row| {
            Ok((row.get(0)?, flashcard_from_row(row, 1)?))
        })?
        .collect::<rusqlite::Result<Vec<(i64, Flashcard)>>>()?;

    Ok(flashcards)
}

/// Loads a deck with its flashcards into memory
pub fn load_deck(title: &str, conn: &Connection) -> Result<Deck> {
    let info = find_deck(title, conn)?;
    let flashcards = get_flashcards_for_deck(info.id, conn)?
        .into_iter()
        .map(|(_, card)| card)
        .collect();

    Ok(Deck {
        title: info.title,
        note_id: info.note_id,
        flashcards,
    })
}

/// Deletes a flashcard; its review records and log go with it
pub fn delete_flashcard(card_id: i64, conn: &Connection) -> Result<()> {
    let deleted = conn.execute("DELETE FROM flashcards WHERE id = ?1", params![card_id])?;
    if deleted == 0 {
        return Err(ReviewError::CardNotFound(card_id));
    }
    Ok(())
}

/// Deletes a deck together with its cards and their review records
pub fn delete_deck(title: &str, conn: &Connection) -> Result<()> {
    let deleted = conn.execute("DELETE FROM decks WHERE title = ?1", params![title])?;
    if deleted == 0 {
        return Err(ReviewError::DeckNotFound(title.to_string()));
    }
    log::info!("Deck '{}' deleted", title);
    Ok(())
}

/// Persists a freshly generated deck and schedules every card for the learner
///
/// Deck, cards and review records are written in one transaction, so a
/// failure leaves nothing behind. Returns the deck id.
pub fn create_deck_for_learner(
    learner_id: &str,
    deck: &Deck,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<i64> {
    if deck.flashcards.is_empty() {
        return Err(ReviewError::Validation(format!(
            "deck '{}' has no flashcards",
            deck.title
        )));
    }

    let tx = conn.unchecked_transaction()?;
    let deck_id = new_deck(&deck.title, deck.note_id.as_deref(), &tx)?;
    for card in &deck.flashcards {
        let card_id = add_flashcard(deck_id, card, &tx)?;
        create_review_record(learner_id, card_id, now, &tx)?;
    }
    tx.commit()?;

    log::info!(
        "Scheduled {} cards from '{}' for learner {}",
        deck.flashcards.len(),
        deck.title,
        learner_id
    );
    Ok(deck_id)
}

const RECORD_COLUMNS: &str =
    "id, learner_id, card_id, ease_factor, interval_days, repetitions, next_review_at";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ReviewRecord> {
    Ok(ReviewRecord {
        id: row.get(0)?,
        learner_id: row.get(1)?,
        card_id: row.get(2)?,
        state: SchedulingState {
            ease_factor: row.get(3)?,
            interval: row.get(4)?,
            repetitions: row.get(5)?,
            next_review_at: timestamp_column(row, 6)?,
        },
    })
}

/// Creates the initial SM-2 record for a (learner, card) pair
///
/// The pair is unique; calling this again returns the existing record untouched.
pub fn create_review_record(
    learner_id: &str,
    card_id: i64,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<ReviewRecord> {
    let initial = SchedulingState::initial(now);
    conn.execute(
        "INSERT OR IGNORE INTO review_records
            (learner_id, card_id, ease_factor, interval_days, repetitions, next_review_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            learner_id,
            card_id,
            initial.ease_factor,
            initial.interval,
            initial.repetitions,
            initial.next_review_at.timestamp()
        ],
    )?;

    get_record_for_card(learner_id, card_id, conn)?
        .ok_or_else(|| ReviewError::CardNotFound(card_id))
}

pub fn get_review_record(record_id: i64, conn: &Connection) -> Result<Option<ReviewRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM review_records WHERE id = ?1"),
            params![record_id],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

pub fn get_record_for_card(
    learner_id: &str,
    card_id: i64,
    conn: &Connection,
) -> Result<Option<ReviewRecord>> {
    let record = conn
        .query_row(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM review_records WHERE learner_id = ?1 AND card_id = ?2"
            ),
            params![learner_id, card_id],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

/// Retrieves records due for review for a learner
///
/// Returns records where next_review_at <= as_of, ordered by next_review_at
/// (oldest first) and then by insertion order.
pub fn get_due_records(
    learner_id: &str,
    as_of: DateTime<Utc>,
    conn: &Connection,
) -> Result<Vec<ReviewRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM review_records
         WHERE learner_id = ?1 AND next_review_at <= ?2
         ORDER BY next_review_at ASC, id ASC"
    ))?;

    let records = stmt
        .query_map(params![learner_id, as_of.timestamp()], record_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(records)
}

pub fn count_due(learner_id: &str, as_of: DateTime<Utc>, conn: &Connection) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM review_records WHERE learner_id = ?1 AND next_review_at <= ?2",
        params![learner_id, as_of.timestamp()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Result of a conditional record update
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The record matched the expected base state and was rewritten.
    Applied,
    /// The record already holds the requested state; nothing was written.
    AlreadyApplied,
}

/// Compare-and-swap write of new SM-2 state
///
/// The row is only rewritten while it still holds `expected`. A retry of an
/// update that already landed is reported as [`UpdateOutcome::AlreadyApplied`];
/// any other mismatch is [`ReviewError::StaleRecord`].
pub fn update_review_record(
    record_id: i64,
    expected: &SchedulingState,
    update: &SchedulingState,
    conn: &Connection,
) -> Result<UpdateOutcome> {
    let changed = conn.execute(
        "UPDATE review_records
         SET ease_factor = ?1, interval_days = ?2, repetitions = ?3, next_review_at = ?4
         WHERE id = ?5
           AND ease_factor = ?6 AND interval_days = ?7 AND repetitions = ?8 AND next_review_at = ?9",
        params![
            update.ease_factor,
            update.interval,
            update.repetitions,
            update.next_review_at.timestamp(),
            record_id,
            expected.ease_factor,
            expected.interval,
            expected.repetitions,
            expected.next_review_at.timestamp()
        ],
    )?;

    if changed == 1 {
        return Ok(UpdateOutcome::Applied);
    }

    match get_review_record(record_id, conn)? {
        None => Err(ReviewError::RecordNotFound(record_id)),
        Some(current) if current.state.same_schedule(update) => {
            log::debug!("Record {} already holds the submitted state", record_id);
            Ok(UpdateOutcome::AlreadyApplied)
        }
        Some(_) => Err(ReviewError::StaleRecord { record_id }),
    }
}

pub fn append_review_log(entry: &ReviewLogEntry, conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO review_log
            (record_id, learner_id, card_id, quality, previous_interval, interval_days, ease_factor, reviewed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.record_id,
            entry.learner_id,
            entry.card_id,
            entry.quality,
            entry.previous_interval,
            entry.interval,
            entry.ease_factor,
            entry.reviewed_at.timestamp()
        ],
    )?;
    Ok(())
}

/// Most recent review log entries for a learner, newest first
pub fn get_review_log(
    learner_id: &str,
    limit: usize,
    conn: &Connection,
) -> Result<Vec<ReviewLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT record_id, learner_id, card_id, quality, previous_interval, interval_days, ease_factor, reviewed_at
         FROM review_log
         WHERE learner_id = ?1
         ORDER BY reviewed_at DESC, id DESC
         LIMIT ?2",
    )?;

    let entries = stmt
        .query_map(params![learner_id, limit as i64], |row| {
            Ok(ReviewLogEntry {
                record_id: row.get(0)?,
                learner_id: row.get(1)?,
                card_id: row.get(2)?,
                quality: row.get(3)?,
                previous_interval: row.get(4)?,
                interval: row.get(5)?,
                ease_factor: row.get(6)?,
                reviewed_at: timestamp_column(row, 7)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(entries)
}
