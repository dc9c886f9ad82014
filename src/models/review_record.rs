//! Per-learner scheduling state for a single flashcard.
use crate::error::{Result, ReviewError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// The mutable half of a review record: everything the SM-2 update rewrites.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulingState {
    pub ease_factor: f64,
    pub interval: i64,
    pub repetitions: i64,
    pub next_review_at: DateTime<Utc>,
}

impl SchedulingState {
    /// Fresh state for a card that has never been reviewed; due at `now`.
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            ease_factor: INITIAL_EASE_FACTOR,
            interval: 0,
            repetitions: 0,
            next_review_at: now,
        }
    }

    /// Rejects states no valid update could have produced. Input is never
    /// clamped here; an invalid base state is a bug in the caller.
    pub fn validate(&self) -> Result<()> {
        if !self.ease_factor.is_finite() || self.ease_factor < MIN_EASE_FACTOR {
            return Err(ReviewError::Precondition(format!(
                "ease factor {} is below the minimum of {}",
                self.ease_factor, MIN_EASE_FACTOR
            )));
        }
        if self.interval < 0 {
            return Err(ReviewError::Precondition(format!(
                "interval {} is negative",
                self.interval
            )));
        }
        if self.repetitions < 0 {
            return Err(ReviewError::Precondition(format!(
                "repetitions {} is negative",
                self.repetitions
            )));
        }
        Ok(())
    }

    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        as_of >= self.next_review_at
    }

    /// Equality at the precision the store keeps (whole seconds).
    pub fn same_schedule(&self, other: &SchedulingState) -> bool {
        self.ease_factor == other.ease_factor
            && self.interval == other.interval
            && self.repetitions == other.repetitions
            && self.next_review_at.timestamp() == other.next_review_at.timestamp()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: i64,
    pub learner_id: String,
    pub card_id: i64,
    #[serde(flatten)]
    pub state: SchedulingState,
}

impl ReviewRecord {
    pub fn is_due(&self, as_of: DateTime<Utc>) -> bool {
        self.state.is_due(as_of)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_initial_state_is_due_immediately() {
        let state = SchedulingState::initial(at(1));

        assert_eq!(state.ease_factor, 2.5);
        assert_eq!(state.interval, 0);
        assert_eq!(state.repetitions, 0);
        assert!(state.is_due(at(1)));
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_not_due_before_next_review() {
        let mut state = SchedulingState::initial(at(1));
        state.next_review_at = at(5);

        assert!(!state.is_due(at(4)));
        assert!(state.is_due(at(5)));
    }

    #[test]
    fn test_validate_rejects_low_ease_factor() {
        let mut state = SchedulingState::initial(at(1));
        state.ease_factor = 1.2;

        assert!(matches!(
            state.validate(),
            Err(ReviewError::Precondition(_))
        ));
    }

    #[test]
    fn test_validate_rejects_negative_counters() {
        let mut state = SchedulingState::initial(at(1));
        state.interval = -1;
        assert!(state.validate().is_err());

        let mut state = SchedulingState::initial(at(1));
        state.repetitions = -3;
        assert!(state.validate().is_err());

        let mut state = SchedulingState::initial(at(1));
        state.ease_factor = f64::NAN;
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_same_schedule_ignores_sub_second_precision() {
        let state = SchedulingState::initial(at(1));
        let mut other = state.clone();
        other.next_review_at = at(1) + chrono::Duration::milliseconds(400);
        assert!(state.same_schedule(&other));

        other.repetitions = 1;
        assert!(!state.same_schedule(&other));
    }
}
