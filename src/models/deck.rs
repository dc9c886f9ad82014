//! Deck is a titled set of flashcards, optionally generated from a note
use super::Flashcard;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Deck {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_id: Option<String>,
    pub flashcards: Vec<Flashcard>,
}

impl Deck {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            note_id: None,
            flashcards: Vec::new(),
        }
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new("Flashcards for Note")
    }
}
