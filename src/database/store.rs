//! Persisted-state contract consumed by the review session.

use super::db::{self, UpdateOutcome};
use crate::error::Result;
use crate::models::{ReviewRecord, SchedulingState};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Storage for per-learner review records.
pub trait ReviewStore {
    /// Records with `next_review_at <= as_of`, earliest first, ties in insertion order.
    fn get_due_records(&self, learner_id: &str, as_of: DateTime<Utc>) -> Result<Vec<ReviewRecord>>;

    /// Atomically replaces `expected` with `update`. Must not compound when
    /// the same submission is retried.
    fn update_record(
        &self,
        record_id: i64,
        expected: &SchedulingState,
        update: &SchedulingState,
    ) -> Result<UpdateOutcome>;

    /// Initial record for a newly generated card, due at `now`.
    fn create_record(&self, learner_id: &str, card_id: i64, now: DateTime<Utc>)
    -> Result<ReviewRecord>;

    /// Current stored copy of a record, `None` once it has been deleted.
    fn get_record(&self, record_id: i64) -> Result<Option<ReviewRecord>>;
}

impl<S: ReviewStore + ?Sized> ReviewStore for &S {
    fn get_due_records(&self, learner_id: &str, as_of: DateTime<Utc>) -> Result<Vec<ReviewRecord>> {
        (**self).get_due_records(learner_id, as_of)
    }

    fn update_record(
        &self,
        record_id: i64,
        expected: &SchedulingState,
        update: &SchedulingState,
    ) -> Result<UpdateOutcome> {
        (**self).update_record(record_id, expected, update)
    }

    fn create_record(
        &self,
        learner_id: &str,
        card_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewRecord> {
        (**self).create_record(learner_id, card_id, now)
    }

    fn get_record(&self, record_id: i64) -> Result<Option<ReviewRecord>> {
        (**self).get_record(record_id)
    }
}

/// SQLite-backed store sharing one connection
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self::new(Arc::new(Mutex::new(conn)))
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// A panic while holding the lock cannot leave a half-applied UPDATE
    /// behind, so a poisoned mutex is still safe to use.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReviewStore for SqliteStore {
    fn get_due_records(&self, learner_id: &str, as_of: DateTime<Utc>) -> Result<Vec<ReviewRecord>> {
        db::get_due_records(learner_id, as_of, &self.lock())
    }

    fn update_record(
        &self,
        record_id: i64,
        expected: &SchedulingState,
        update: &SchedulingState,
    ) -> Result<UpdateOutcome> {
        db::update_review_record(record_id, expected, update, &self.lock())
    }

    fn create_record(
        &self,
        learner_id: &str,
        card_id: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewRecord> {
        db::create_review_record(learner_id, card_id, now, &self.lock())
    }

    fn get_record(&self, record_id: i64) -> Result<Option<ReviewRecord>> {
        db::get_review_record(record_id, &self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Flashcard;
    use chrono::TimeZone;

    #[test]
    fn test_sqlite_store_contract() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap();
        let store = SqliteStore::from_connection(db::open_in_memory().unwrap());
        let card_id = {
            let conn = store.lock();
            let deck_id = db::new_deck("Spanish", None, &conn).unwrap();
            db::add_flashcard(deck_id, &Flashcard::new("perro", "dog"), &conn).unwrap()
        };

        let record = store.create_record("learner-a", card_id, now).unwrap();
        assert_eq!(store.get_due_records("learner-a", now).unwrap(), vec![record.clone()]);

        let mut update = record.state.clone();
        update.interval = 1;
        update.repetitions = 1;
        update.next_review_at = now + chrono::Duration::days(1);
        assert_eq!(
            store.update_record(record.id, &record.state, &update).unwrap(),
            UpdateOutcome::Applied
        );
        assert!(store.get_due_records("learner-a", now).unwrap().is_empty());
        assert_eq!(store.get_record(record.id).unwrap().unwrap().state, update);
        assert!(store.get_record(record.id + 100).unwrap().is_none());

        // Works as a trait object too
        let by_ref: &dyn ReviewStore = &store;
        assert_eq!(
            by_ref.get_due_records("learner-a", update.next_review_at).unwrap().len(),
            1
        );
    }
}
