//! Recall quality grades and the review buttons that produce them.
use crate::error::{Result, ReviewError};
use std::fmt;

/// SM-2 recall quality, 0 (blackout) to 5 (perfect recall).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u8);

impl Quality {
    pub const MAX: u8 = 5;
    /// Lowest grade counted as a correct recall.
    pub const PASSING: u8 = 3;

    pub fn new(value: u8) -> Result<Self> {
        if value > Self::MAX {
            return Err(ReviewError::Validation(format!(
                "quality must be between 0 and {}, got {}",
                Self::MAX,
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_correct(self) -> bool {
        self.0 >= Self::PASSING
    }
}

impl TryFrom<u8> for Quality {
    type Error = ReviewError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<i64> for Quality {
    type Error = ReviewError;

    fn try_from(value: i64) -> Result<Self> {
        let value = u8::try_from(value).map_err(|_| {
            ReviewError::Validation(format!("quality must be between 0 and 5, got {value}"))
        })?;
        Self::new(value)
    }
}

impl From<Rating> for Quality {
    fn from(rating: Rating) -> Self {
        Self(rating.quality_value())
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four answer buttons shown after flipping a card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    pub fn quality_value(self) -> u8 {
        match self {
            Rating::Again => 1,
            Rating::Hard => 3,
            Rating::Good => 4,
            Rating::Easy => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Rating::Again => "Again",
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        }
    }

    /// Keyboard shortcut used by the terminal reviewer.
    pub fn key(self) -> char {
        match self {
            Rating::Again => 'a',
            Rating::Hard => 'h',
            Rating::Good => 'g',
            Rating::Easy => 'e',
        }
    }

    pub fn from_key(key: char) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rating| rating.key() == key.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_bounds() {
        assert!(Quality::new(0).is_ok());
        assert!(Quality::new(5).is_ok());
        assert!(matches!(Quality::new(6), Err(ReviewError::Validation(_))));
        assert!(Quality::try_from(-1i64).is_err());
        assert!(Quality::try_from(300i64).is_err());
    }

    #[test]
    fn test_passing_threshold() {
        assert!(!Quality::new(2).unwrap().is_correct());
        assert!(Quality::new(3).unwrap().is_correct());
    }

    #[test]
    fn test_rating_maps_to_button_qualities() {
        let values: Vec<u8> = Rating::ALL.iter().map(|r| r.quality_value()).collect();
        assert_eq!(values, vec![1, 3, 4, 5]);
        assert_eq!(Quality::from(Rating::Good).value(), 4);
    }

    #[test]
    fn test_rating_from_key() {
        assert_eq!(Rating::from_key('E'), Some(Rating::Easy));
        assert_eq!(Rating::from_key('a'), Some(Rating::Again));
        assert_eq!(Rating::from_key('x'), None);
    }
}
