//! Background event dispatch.
//!
//! Secondary work triggered by a review (history logging, statistics) runs on
//! a worker thread fed through a channel. The foreground only enqueues; a
//! failing or panicking handler is logged and never reaches the caller.

use crate::database::{ReviewLogEntry, SqliteStore, db};
use crate::error::Result;
use crate::models::{Quality, ReviewRecord, SchedulingState};
use chrono::{DateTime, Utc};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

#[derive(Clone, Debug, PartialEq)]
pub enum ReviewEvent {
    /// A rating was persisted. `record` holds the state before the update.
    CardReviewed {
        record: ReviewRecord,
        quality: Quality,
        updated: SchedulingState,
        reviewed_at: DateTime<Utc>,
    },
    SessionCompleted {
        learner_id: String,
        reviewed: usize,
        lapses: usize,
    },
}

pub trait EventHandler: Send + 'static {
    fn handle(&mut self, event: &ReviewEvent) -> Result<()>;
}

impl<F> EventHandler for F
where
    F: FnMut(&ReviewEvent) -> Result<()> + Send + 'static,
{
    fn handle(&mut self, event: &ReviewEvent) -> Result<()> {
        self(event)
    }
}

/// Cloneable producer side of the dispatcher
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<ReviewEvent>,
}

impl EventSender {
    /// Enqueues an event. Never fails the caller; a dead worker is only logged.
    pub fn send(&self, event: ReviewEvent) {
        if let Err(e) = self.tx.send(event) {
            log::warn!("Background worker is gone, dropping event: {:?}", e.0);
        }
    }
}

pub struct Dispatcher {
    sender: Option<EventSender>,
    worker: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Starts the worker thread running `handler`
    pub fn spawn<H: EventHandler>(mut handler: H) -> Self {
        let (tx, rx) = mpsc::channel::<ReviewEvent>();

        let worker = thread::spawn(move || {
            while let Ok(event) = rx.recv() {
                match catch_unwind(AssertUnwindSafe(|| handler.handle(&event))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::warn!("Background review task failed: {}", e),
                    Err(_) => log::warn!("Background review task panicked on {:?}", event),
                }
            }
            log::debug!("Background review worker stopped");
        });

        Self {
            sender: Some(EventSender { tx }),
            worker: Some(worker),
        }
    }

    pub fn sender(&self) -> Option<EventSender> {
        self.sender.clone()
    }

    pub fn dispatch(&self, event: ReviewEvent) {
        if let Some(sender) = &self.sender {
            sender.send(event);
        }
    }

    /// Stops accepting events, drains the queue and joins the worker.
    /// Other clones of the sender keep the worker alive until they drop.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("Background review worker exited abnormally");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Appends every persisted rating to the review history table
pub struct ReviewLogWriter {
    store: SqliteStore,
}

impl ReviewLogWriter {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }
}

impl EventHandler for ReviewLogWriter {
    fn handle(&mut self, event: &ReviewEvent) -> Result<()> {
        match event {
            ReviewEvent::CardReviewed {
                record,
                quality,
                updated,
                reviewed_at,
            } => {
                let entry = ReviewLogEntry {
                    record_id: record.id,
                    learner_id: record.learner_id.clone(),
                    card_id: record.card_id,
                    quality: quality.value(),
                    previous_interval: record.state.interval,
                    interval: updated.interval,
                    ease_factor: updated.ease_factor,
                    reviewed_at: *reviewed_at,
                };
                db::append_review_log(&entry, &self.store.lock())
            }
            ReviewEvent::SessionCompleted {
                learner_id,
                reviewed,
                lapses,
            } => {
                log::info!(
                    "Learner {} finished a session: {} reviewed, {} lapses",
                    learner_id,
                    reviewed,
                    lapses
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReviewError;
    use crate::models::Flashcard;
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    fn completed(reviewed: usize) -> ReviewEvent {
        ReviewEvent::SessionCompleted {
            learner_id: "learner-a".into(),
            reviewed,
            lapses: 0,
        }
    }

    #[test]
    fn test_events_reach_handler_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let dispatcher = Dispatcher::spawn(move |event: &ReviewEvent| -> Result<()> {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });

        dispatcher.dispatch(completed(1));
        dispatcher.dispatch(completed(2));
        dispatcher.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec![completed(1), completed(2)]);
    }

    #[test]
    fn test_failing_and_panicking_handlers_are_isolated() {
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let dispatcher = Dispatcher::spawn(move |event: &ReviewEvent| -> Result<()> {
            *counter.lock().unwrap() += 1;
            match event {
                ReviewEvent::SessionCompleted { reviewed: 1, .. } => {
                    Err(ReviewError::Validation("boom".into()))
                }
                ReviewEvent::SessionCompleted { reviewed: 2, .. } => panic!("handler bug"),
                _ => Ok(()),
            }
        });

        dispatcher.dispatch(completed(1));
        dispatcher.dispatch(completed(2));
        dispatcher.dispatch(completed(3));
        dispatcher.shutdown();

        assert_eq!(*count.lock().unwrap(), 3);
    }

    #[test]
    fn test_review_log_writer_appends_rows() {
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 7, 0, 0).unwrap();
        let store = SqliteStore::from_connection(db::open_in_memory().unwrap());
        let record = {
            let conn = store.lock();
            let deck_id = db::new_deck("Geography", None, &conn).unwrap();
            let card_id =
                db::add_flashcard(deck_id, &Flashcard::new("Oslo", "Norway"), &conn).unwrap();
            db::create_review_record("learner-a", card_id, now, &conn).unwrap()
        };
        let updated = crate::models::sm2::calculate_next_review(&record.state, 5, now).unwrap();

        let dispatcher = Dispatcher::spawn(ReviewLogWriter::new(store.clone()));
        dispatcher.dispatch(ReviewEvent::CardReviewed {
            record: record.clone(),
            quality: Quality::new(5).unwrap(),
            updated,
            reviewed_at: now,
        });
        dispatcher.shutdown();

        let log = db::get_review_log("learner-a", 5, &store.lock()).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].record_id, record.id);
        assert_eq!(log[0].quality, 5);
        assert_eq!(log[0].interval, 1);
    }
}
