//! Flashcard is a pair <front, back> tagged with the kind of question it asks.
use crate::error::ReviewError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    #[default]
    Definition,
    Conceptual,
    Cloze,
}

impl CardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::Conceptual => "conceptual",
            Self::Cloze => "cloze",
        }
    }
}

impl FromStr for CardType {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "definition" => Ok(Self::Definition),
            "conceptual" => Ok(Self::Conceptual),
            "cloze" => Ok(Self::Cloze),
            _ => Err(ReviewError::Validation(format!(
                "unknown card type '{}' (use definition, conceptual or cloze)",
                s.trim()
            ))),
        }
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    #[serde(rename = "type", default)]
    pub card_type: CardType,
    pub front: String,
    pub back: String,
}

impl Flashcard {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            card_type: CardType::Definition,
            front: front.into(),
            back: back.into(),
        }
    }

    pub fn with_type(mut self, card_type: CardType) -> Self {
        self.card_type = card_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flashcard_creation() {
        let card = Flashcard::new("mitochondria", "powerhouse of the cell");

        assert_eq!(card.front, "mitochondria");
        assert_eq!(card.back, "powerhouse of the cell");
        assert_eq!(card.card_type, CardType::Definition);
    }

    #[test]
    fn test_card_type_parsing() {
        assert_eq!("Cloze".parse::<CardType>().unwrap(), CardType::Cloze);
        assert_eq!(" conceptual ".parse::<CardType>().unwrap(), CardType::Conceptual);
        assert!(matches!(
            "essay".parse::<CardType>(),
            Err(ReviewError::Validation(_))
        ));
    }

    #[test]
    fn test_card_type_serializes_as_type_key() {
        let card = Flashcard::new("H2O", "water").with_type(CardType::Conceptual);
        let json = serde_json::to_value(&card).unwrap();

        assert_eq!(json["type"], "conceptual");
        assert_eq!(json["front"], "H2O");
    }
}
