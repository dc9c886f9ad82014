//! SM-2 (SuperMemo 2) spaced repetition algorithm implementation.
//!
//! The SM-2 algorithm calculates optimal review intervals based on recall quality:
//! - Each card has an ease factor (EF) that adjusts based on performance
//! - Quality grades 0-2: Interval drops back to one day and repetitions reset
//! - Quality grades 3-5: Increase interval progressively (1 day → 6 days → EF multiplier)
//! - EF is adjusted after every review and has a minimum value of 1.3
//! - Higher quality responses lead to longer intervals between reviews

use super::quality::{Quality, Rating};
use super::review_record::{MIN_EASE_FACTOR, SchedulingState};
use crate::error::{Result, ReviewError};
use chrono::{DateTime, Duration, Utc};

/// Change in ease factor for a given quality grade.
/// EF' = EF + (0.1 - (5-q) * (0.08 + (5-q) * 0.02))
pub fn ease_delta(quality: Quality) -> f64 {
    let miss = (Quality::MAX - quality.value()) as f64;
    0.1 - miss * (0.08 + miss * 0.02)
}

/// Calculates new scheduling state according to the SM-2 algorithm.
///
/// quality: 0-5 (0 = complete blackout, 5 = perfect response). Out-of-range
/// grades are a validation error and an invalid base state is a precondition
/// error; neither is clamped.
pub fn calculate_next_review(
    state: &SchedulingState,
    quality: u8,
    now: DateTime<Utc>,
) -> Result<SchedulingState> {
    let quality = Quality::new(quality)?;
    state.validate()?;
    apply(state, quality, now)
}

/// Same as [`calculate_next_review`] for an already validated grade.
///
/// Fails with a validation error instead of overflowing when the next review
/// date would fall outside the representable range.
pub fn apply(
    state: &SchedulingState,
    quality: Quality,
    now: DateTime<Utc>,
) -> Result<SchedulingState> {
    let ease_factor = (state.ease_factor + ease_delta(quality)).max(MIN_EASE_FACTOR);

    let (interval, repetitions) = if quality.is_correct() {
        let interval = match state.repetitions {
            0 => 1,
            1 => 6,
            // Saturates at i64::MAX; the date check below rejects it
            _ => (state.interval as f64 * ease_factor).round() as i64,
        };
        let repetitions = state.repetitions.checked_add(1).ok_or_else(|| {
            ReviewError::Validation(format!("repetitions {} cannot grow", state.repetitions))
        })?;
        (interval, repetitions)
    } else {
        (1, 0)
    };

    let next_review_at = Duration::try_days(interval)
        .and_then(|offset| now.checked_add_signed(offset))
        .ok_or_else(|| {
            ReviewError::Validation(format!(
                "interval of {} days puts the next review out of range",
                interval
            ))
        })?;

    log::debug!(
        "sm2: q={} ef {:.2}->{:.2} interval {}->{} reps {}->{}",
        quality,
        state.ease_factor,
        ease_factor,
        state.interval,
        interval,
        state.repetitions,
        repetitions
    );

    Ok(SchedulingState {
        ease_factor,
        interval,
        repetitions,
        next_review_at,
    })
}

/// Interval each review button would produce, in [`Rating::ALL`] order.
/// `None` where that rating would push the date out of range.
pub fn preview_intervals(state: &SchedulingState) -> [Option<i64>; 4] {
    let now = state.next_review_at;
    Rating::ALL.map(|rating| {
        apply(state, rating.into(), now)
            .ok()
            .map(|next| next.interval)
    })
}

/// Short human label for an interval in days.
pub fn format_interval(days: i64) -> String {
    match days {
        d if d <= 0 => "now".to_string(),
        d if d < 7 => format!("{}d", d),
        d if d < 30 => format!("{}w", d / 7),
        d if d < 365 => format!("{}mo", d / 30),
        d => format!("{}y", d / 365),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 14, 30, 0).unwrap()
    }

    fn state(ease_factor: f64, interval: i64, repetitions: i64) -> SchedulingState {
        SchedulingState {
            ease_factor,
            interval,
            repetitions,
            next_review_at: now(),
        }
    }

    #[test]
    fn test_first_review() {
        let next = calculate_next_review(&state(2.5, 0, 0), 4, now()).unwrap();

        assert!((next.ease_factor - 2.5).abs() < 1e-9);
        assert_eq!(next.interval, 1);
        assert_eq!(next.repetitions, 1);
        assert_eq!(next.next_review_at, now() + Duration::days(1));
    }

    #[test]
    fn test_second_review() {
        let next = calculate_next_review(&state(2.5, 1, 1), 5, now()).unwrap();

        assert!((next.ease_factor - 2.6).abs() < 1e-9);
        assert_eq!(next.interval, 6);
        assert_eq!(next.repetitions, 2);
        assert_eq!(next.next_review_at, now() + Duration::days(6));
    }

    #[test]
    fn test_subsequent_review_multiplies_by_new_ease_factor() {
        let next = calculate_next_review(&state(2.5, 6, 2), 5, now()).unwrap();

        // 6 * 2.6 = 15.6
        assert_eq!(next.interval, 16);
        assert_eq!(next.repetitions, 3);
    }

    #[test]
    fn test_quality_below_3_resets() {
        let next = calculate_next_review(&state(2.0, 6, 2), 2, now()).unwrap();

        assert_eq!(next.interval, 1);
        assert_eq!(next.repetitions, 0);
        assert!(next.ease_factor < 2.0);
        assert!(next.ease_factor >= MIN_EASE_FACTOR);
    }

    #[test]
    fn test_failure_ignores_prior_progress() {
        for quality in 0..3 {
            for (interval, repetitions) in [(0, 0), (1, 1), (40, 7), (365, 20)] {
                let next =
                    calculate_next_review(&state(2.3, interval, repetitions), quality, now())
                        .unwrap();
                assert_eq!(next.repetitions, 0);
                assert_eq!(next.interval, 1);
            }
        }
    }

    #[test]
    fn test_correct_interval_ladder() {
        for quality in 3..=5 {
            assert_eq!(
                calculate_next_review(&state(2.5, 0, 0), quality, now())
                    .unwrap()
                    .interval,
                1
            );
            assert_eq!(
                calculate_next_review(&state(2.5, 9, 1), quality, now())
                    .unwrap()
                    .interval,
                6
            );

            let base = state(1.9, 11, 4);
            let next = calculate_next_review(&base, quality, now()).unwrap();
            assert_eq!(
                next.interval,
                (base.interval as f64 * next.ease_factor).round() as i64
            );
        }
    }

    #[test]
    fn test_ef_floor() {
        let next = calculate_next_review(&state(1.3, 1, 1), 0, now()).unwrap();
        assert_eq!(next.ease_factor, 1.3);

        for quality in 0..=5 {
            let next = calculate_next_review(&state(1.31, 3, 2), quality, now()).unwrap();
            assert!(next.ease_factor >= MIN_EASE_FACTOR);
        }
    }

    #[test]
    fn test_rejects_out_of_range_quality() {
        let result = calculate_next_review(&state(2.5, 0, 0), 6, now());
        assert!(matches!(result, Err(ReviewError::Validation(_))));
    }

    #[test]
    fn test_rejects_invalid_base_state_without_clamping() {
        let result = calculate_next_review(&state(1.1, 0, 0), 4, now());
        assert!(matches!(result, Err(ReviewError::Precondition(_))));

        let result = calculate_next_review(&state(2.5, -2, 0), 4, now());
        assert!(matches!(result, Err(ReviewError::Precondition(_))));
    }

    #[test]
    fn test_preview_intervals() {
        assert_eq!(
            preview_intervals(&state(2.5, 0, 0)),
            [Some(1), Some(1), Some(1), Some(1)]
        );
        assert_eq!(
            preview_intervals(&state(2.5, 6, 2)),
            [Some(1), Some(14), Some(15), Some(16)]
        );
        assert_eq!(
            preview_intervals(&state(2.5, 200_000_000, 5)),
            [Some(1), None, None, None]
        );
    }

    #[test]
    fn test_huge_interval_is_rejected_not_panicking() {
        let result = calculate_next_review(&state(2.5, 200_000_000, 5), 5, now());
        assert!(matches!(result, Err(ReviewError::Validation(_))));

        let result = calculate_next_review(&state(2.5, i64::MAX, 5), 4, now());
        assert!(matches!(result, Err(ReviewError::Validation(_))));

        // A failed recall still resets, however far out the card was
        let next = calculate_next_review(&state(2.5, 200_000_000, 5), 1, now()).unwrap();
        assert_eq!(next.interval, 1);
    }

    #[test]
    fn test_repetition_counter_overflow_is_rejected() {
        let result = calculate_next_review(&state(2.5, 10, i64::MAX), 5, now());
        assert!(matches!(result, Err(ReviewError::Validation(_))));
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0), "now");
        assert_eq!(format_interval(1), "1d");
        assert_eq!(format_interval(6), "6d");
        assert_eq!(format_interval(15), "2w");
        assert_eq!(format_interval(90), "3mo");
        assert_eq!(format_interval(800), "2y");
    }
}
