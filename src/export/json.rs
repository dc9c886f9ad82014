//! JSON import/export module for flashcard decks.
//! Saves and loads Deck structures to/from JSON files, and reads the card
//! list produced by the flashcard generator.

use crate::error::{Result, ReviewError};
use crate::models::{Deck, Flashcard};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Exports a deck to a JSON file at the specified path.
pub fn export_json_to_path(deck: &Deck, path: &Path) -> Result<()> {
    let json_string = serde_json::to_string_pretty(deck)?;
    fs::write(path, json_string)?;
    log::info!("Deck '{}' exported to '{}'", deck.title, path.display());
    Ok(())
}

/// Imports a deck from a JSON file.
/// Returns an error if the file doesn't exist or contains invalid JSON.
pub fn import_json(path: &Path) -> Result<Deck> {
    let contents = fs::read_to_string(path)?;
    let deck: Deck = serde_json::from_str(&contents)?;

    log::info!("Deck '{}' imported from '{}'", deck.title, path.display());
    Ok(deck)
}

#[derive(Deserialize)]
struct GeneratedCards {
    #[serde(default)]
    cards: Vec<Flashcard>,
}

/// Parses a generator response of the form
/// `{ "cards": [ { "type": "definition", "front": "...", "back": "..." } ] }`.
///
/// An empty or missing card list, or a card with a blank side, is rejected.
pub fn parse_generated_cards(json: &str) -> Result<Vec<Flashcard>> {
    let GeneratedCards { cards } = serde_json::from_str(json)?;

    if cards.is_empty() {
        return Err(ReviewError::Validation(
            "generator returned no flashcards".into(),
        ));
    }
    if let Some(pos) = cards
        .iter()
        .position(|c| c.front.trim().is_empty() || c.back.trim().is_empty())
    {
        return Err(ReviewError::Validation(format!(
            "generated card {} has an empty side",
            pos + 1
        )));
    }

    Ok(cards)
}

/// Reads a generator response file into a deck titled `title`
pub fn import_generated_deck(path: &Path, title: &str, note_id: Option<&str>) -> Result<Deck> {
    let contents = fs::read_to_string(path)?;
    Ok(Deck {
        title: title.to_string(),
        note_id: note_id.map(str::to_string),
        flashcards: parse_generated_cards(&contents)?,
    })
}
