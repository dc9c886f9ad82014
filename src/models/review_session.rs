//! Review session management for spaced repetition practice.
//! Walks a learner through the cards due today, one rating at a time.

use super::quality::{Quality, Rating};
use super::review_record::{ReviewRecord, SchedulingState};
use super::sm2;
use crate::database::{ReviewStore, UpdateOutcome};
use crate::dispatch::{EventSender, ReviewEvent};
use crate::error::{Result, ReviewError};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting to show the next card.
    Idle,
    /// Front of the current card is showing.
    Presenting,
    /// Answer revealed; waiting for a rating.
    Flipped,
    /// Every queued card has been rated.
    Complete,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Presenting => "presenting",
            SessionState::Flipped => "flipped",
            SessionState::Complete => "complete",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a successful rating did to the card
#[derive(Clone, Debug, PartialEq)]
pub struct RatedCard {
    pub record_id: i64,
    pub card_id: i64,
    pub quality: Quality,
    pub updated: SchedulingState,
    pub outcome: UpdateOutcome,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSummary {
    pub total: usize,
    pub reviewed: usize,
    /// Ratings below the passing grade
    pub lapses: usize,
    pub ratings: Vec<(i64, Quality)>,
}

/// Manages a single review session over the cards due at start time.
///
/// The queue is fetched once; cards that become due later wait for the next
/// session. A card only leaves the queue after its new schedule is persisted.
pub struct ReviewSession<S: ReviewStore> {
    learner_id: String,
    store: S,
    queue: VecDeque<ReviewRecord>,
    state: SessionState,
    summary: SessionSummary,
    /// Update computed for the head card whose write failed, reused on retry
    pending: Option<(Quality, SchedulingState)>,
    events: Option<EventSender>,
}

impl<S: ReviewStore> ReviewSession<S> {
    /// Creates a new session from the records due for review at `as_of`.
    pub fn start(store: S, learner_id: impl Into<String>, as_of: DateTime<Utc>) -> Result<Self> {
        Self::start_with_limit(store, learner_id, as_of, None)
    }

    /// Like [`ReviewSession::start`], keeping at most `max_cards` of the
    /// earliest-due records. The rest stay due for a later session.
    pub fn start_with_limit(
        store: S,
        learner_id: impl Into<String>,
        as_of: DateTime<Utc>,
        max_cards: Option<usize>,
    ) -> Result<Self> {
        let learner_id = learner_id.into();
        let mut due = store.get_due_records(&learner_id, as_of)?;
        // Stable sort keeps the store's insertion order for ties
        due.sort_by_key(|record| record.state.next_review_at);
        if let Some(max) = max_cards {
            due.truncate(max);
        }

        log::info!(
            "Starting review session for {} with {} due cards",
            learner_id,
            due.len()
        );

        let state = if due.is_empty() {
            SessionState::Complete
        } else {
            SessionState::Idle
        };

        Ok(Self {
            learner_id,
            store,
            summary: SessionSummary {
                total: due.len(),
                ..SessionSummary::default()
            },
            queue: due.into(),
            state,
            pending: None,
            events: None,
        })
    }

    /// Reports ratings and completion to a background worker
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn learner_id(&self) -> &str {
        &self.learner_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == SessionState::Complete
    }

    /// The card being shown, if any
    pub fn current(&self) -> Option<&ReviewRecord> {
        match self.state {
            SessionState::Presenting | SessionState::Flipped => self.queue.front(),
            _ => None,
        }
    }

    pub fn remaining_count(&self) -> usize {
        self.queue.len()
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    fn invalid(&self, action: &'static str) -> ReviewError {
        ReviewError::InvalidTransition {
            from: self.state.name(),
            action,
        }
    }

    /// Shows the next queued card.
    pub fn present(&mut self) -> Result<&ReviewRecord> {
        if self.state != SessionState::Idle {
            return Err(self.invalid("present a card"));
        }
        self.state = SessionState::Presenting;
        self.queue.front().ok_or(ReviewError::InvalidTransition {
            from: "idle",
            action: "present a card",
        })
    }

    /// Reveals the answer side. Has no scheduling effect.
    pub fn flip(&mut self) -> Result<()> {
        if self.state != SessionState::Presenting {
            return Err(self.invalid("flip"));
        }
        self.state = SessionState::Flipped;
        Ok(())
    }

    pub fn rate_with(&mut self, rating: Rating, now: DateTime<Utc>) -> Result<RatedCard> {
        self.rate(rating.quality_value(), now)
    }

    /// Grades the current card, persists its new schedule and advances.
    ///
    /// On any error the session stays on the same flipped card so the rating
    /// can be retried; nothing is skipped and no counters move. If an earlier
    /// attempt was in fact stored, the session advances with that attempt's
    /// grade instead of applying a second review on top of it.
    pub fn rate(&mut self, quality: u8, now: DateTime<Utc>) -> Result<RatedCard> {
        if self.state != SessionState::Flipped {
            return Err(self.invalid("rate"));
        }
        let quality = Quality::new(quality)?;
        let record = self.queue.front().ok_or_else(|| self.invalid("rate"))?;

        let updated = match &self.pending {
            Some((pending_quality, pending)) if *pending_quality == quality => pending.clone(),
            _ => {
                record.state.validate()?;
                sm2::apply(&record.state, quality, now)?
            }
        };

        match self.store.update_record(record.id, &record.state, &updated) {
            Ok(outcome) => {
                self.pending = None;
                self.advance(quality, updated, outcome, now)
            }
            Err(ReviewError::StaleRecord { record_id }) => self.resolve_stale(record_id, now),
            Err(e) => {
                log::warn!(
                    "Failed to persist rating for record {}: {}",
                    record.id,
                    e
                );
                self.pending = Some((quality, updated));
                Err(e)
            }
        }
    }

    /// The head record no longer holds the schedule it was queued with.
    /// Either an earlier attempt whose acknowledgement was lost landed, or the
    /// record was reviewed elsewhere; in the latter case the card is rebased on
    /// the stored schedule and must be rated again.
    fn resolve_stale(&mut self, record_id: i64, now: DateTime<Utc>) -> Result<RatedCard> {
        let current = self
            .store
            .get_record(record_id)?
            .ok_or(ReviewError::RecordNotFound(record_id))?;

        if let Some((pending_quality, pending)) = self.pending.take() {
            if current.state.same_schedule(&pending) {
                log::info!(
                    "Record {} already holds the earlier q={} rating",
                    record_id,
                    pending_quality
                );
                return self.advance(pending_quality, pending, UpdateOutcome::AlreadyApplied, now);
            }
        }

        log::warn!(
            "Record {} changed during the session; rebasing on the stored schedule",
            record_id
        );
        if let Some(head) = self.queue.front_mut() {
            head.state = current.state;
        }
        Err(ReviewError::StaleRecord { record_id })
    }

    /// Pops the head card once its update is in the store.
    fn advance(
        &mut self,
        quality: Quality,
        updated: SchedulingState,
        outcome: UpdateOutcome,
        now: DateTime<Utc>,
    ) -> Result<RatedCard> {
        let Some(record) = self.queue.pop_front() else {
            return Err(self.invalid("rate"));
        };

        self.summary.reviewed += 1;
        if !quality.is_correct() {
            self.summary.lapses += 1;
        }
        self.summary.ratings.push((record.id, quality));

        let rated = RatedCard {
            record_id: record.id,
            card_id: record.card_id,
            quality,
            updated: updated.clone(),
            outcome,
        };

        if let Some(events) = &self.events {
            events.send(ReviewEvent::CardReviewed {
                record,
                quality,
                updated,
                reviewed_at: now,
            });
        }

        if self.queue.is_empty() {
            self.state = SessionState::Complete;
            log::info!(
                "Review session for {} complete: {} reviewed, {} lapses",
                self.learner_id,
                self.summary.reviewed,
                self.summary.lapses
            );
            if let Some(events) = &self.events {
                events.send(ReviewEvent::SessionCompleted {
                    learner_id: self.learner_id.clone(),
                    reviewed: self.summary.reviewed,
                    lapses: self.summary.lapses,
                });
            }
        } else {
            self.state = SessionState::Idle;
        }

        Ok(rated)
    }

    /// Ends the session early. Unrated cards are left exactly as they were.
    pub fn abandon(self) -> SessionSummary {
        if !self.queue.is_empty() {
            log::info!(
                "Review session for {} abandoned with {} cards unrated",
                self.learner_id,
                self.queue.len()
            );
        }
        self.summary
    }

    pub fn progress_message(&self) -> String {
        match self.state {
            SessionState::Complete => {
                format!("Session complete: {} cards reviewed", self.summary.reviewed)
            }
            _ => format!(
                "Card {} of {}",
                self.summary.reviewed + 1,
                self.summary.total
            ),
        }
    }
}
