//! Terminal front-end: deck management commands and the interactive review loop.

use anyhow::Context;
use chrono::{DateTime, Utc};
use spaced_review::database::{SqliteStore, db};
use spaced_review::dispatch::{Dispatcher, ReviewLogWriter};
use spaced_review::export::json::{export_json_to_path, import_generated_deck, import_json};
use spaced_review::models::{
    CardType, Flashcard, Quality, Rating, ReviewSession, SchedulingState, SessionSummary, sm2,
};
use spaced_review::{Config, ReviewError, ReviewStore};
use std::io::{BufRead, Write};
use std::path::Path;

pub struct App {
    config: Config,
    store: SqliteStore,
    dispatcher: Dispatcher,
}

enum Prompt {
    Line(String),
    Quit,
}

/// Reads one trimmed line; EOF and `q` both mean quit.
fn read_prompt<R: BufRead>(input: &mut R) -> std::io::Result<Prompt> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(Prompt::Quit);
    }
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") {
        return Ok(Prompt::Quit);
    }
    Ok(Prompt::Line(line.to_string()))
}

fn format_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Review buttons with the interval each would schedule
fn rating_buttons(state: &SchedulingState) -> String {
    Rating::ALL
        .iter()
        .zip(sm2::preview_intervals(state))
        .map(|(rating, days)| {
            let preview = days.map_or_else(|| "-".to_string(), sm2::format_interval);
            format!("({}) {} {}", rating.key(), rating.label(), preview)
        })
        .collect::<Vec<_>>()
        .join("  ")
}

impl App {
    pub fn new(config: Config, store: SqliteStore) -> Self {
        let dispatcher = Dispatcher::spawn(ReviewLogWriter::new(store.clone()));
        Self {
            config,
            store,
            dispatcher,
        }
    }

    pub fn open(config: Config) -> anyhow::Result<Self> {
        let conn = db::open_database(&config.database_path).with_context(|| {
            format!("Failed to open database {}", config.database_path.display())
        })?;
        Ok(Self::new(config, SqliteStore::from_connection(conn)))
    }

    /// Waits for background work (review log writes) to finish
    pub fn shutdown(self) {
        self.dispatcher.shutdown();
    }

    fn learner(&self) -> &str {
        &self.config.learner_id
    }

    fn current_date(&self) -> anyhow::Result<DateTime<Utc>> {
        Ok(db::get_current_date(&self.store.lock())?)
    }

    pub fn deck_new(&self, title: &str) -> anyhow::Result<()> {
        db::new_deck(title, None, &self.store.lock())
            .with_context(|| format!("Failed to create deck '{}'", title))?;
        println!("Deck '{}' created.", title);
        Ok(())
    }

    pub fn deck_list(&self) -> anyhow::Result<()> {
        let decks = db::get_all_decks(&self.store.lock())?;
        if decks.is_empty() {
            println!("No decks yet. Use 'deck new' or 'deck generate' to create one.");
            return Ok(());
        }
        println!("Decks ({}):", decks.len());
        for deck in decks {
            println!("  {}. {} ({} cards)", deck.id, deck.title, deck.card_count);
        }
        Ok(())
    }

    pub fn deck_show(&self, title: &str) -> anyhow::Result<()> {
        let conn = self.store.lock();
        let info = db::find_deck(title, &conn)?;
        println!("{} ({} cards)", info.title, info.card_count);
        if let Some(note_id) = &info.note_id {
            println!("Generated from note {}", note_id);
        }
        for (id, card) in db::get_flashcards_for_deck(info.id, &conn)? {
            let schedule = match db::get_record_for_card(self.learner(), id, &conn)? {
                Some(record) => format!(
                    "due {} (ease {:.2}, {} reps)",
                    format_date(record.state.next_review_at),
                    record.state.ease_factor,
                    record.state.repetitions
                ),
                None => "not scheduled".to_string(),
            };
            println!("  #{} [{}] {} -> {}  {}", id, card.card_type, card.front, card.back, schedule);
        }
        Ok(())
    }

    pub fn deck_delete(&self, title: &str) -> anyhow::Result<()> {
        db::delete_deck(title, &self.store.lock())?;
        println!("Deck '{}' and its review history deleted.", title);
        Ok(())
    }

    /// Imports a deck file and schedules its cards for the current learner
    pub fn deck_import(&self, path: &Path) -> anyhow::Result<()> {
        let deck = import_json(path)
            .with_context(|| format!("Failed to import deck from {}", path.display()))?;
        let now = self.current_date()?;
        db::create_deck_for_learner(self.learner(), &deck, now, &self.store.lock())
            .with_context(|| format!("Failed to store deck '{}'", deck.title))?;
        println!(
            "Deck '{}' imported with {} cards.",
            deck.title,
            deck.flashcards.len()
        );
        Ok(())
    }

    pub fn deck_export(&self, title: &str, path: &Path) -> anyhow::Result<()> {
        let deck = db::load_deck(title, &self.store.lock())?;
        export_json_to_path(&deck, path)?;
        println!("Deck '{}' exported to {}.", deck.title, path.display());
        Ok(())
    }

    /// Stores the card list produced by the flashcard generator as a new deck
    pub fn deck_generate(
        &self,
        path: &Path,
        title: &str,
        note_id: Option<&str>,
    ) -> anyhow::Result<()> {
        let deck = import_generated_deck(path, title, note_id)
            .with_context(|| format!("Failed to read generated cards from {}", path.display()))?;
        let now = self.current_date()?;
        db::create_deck_for_learner(self.learner(), &deck, now, &self.store.lock())?;
        println!(
            "Created '{}' with {} cards; all due now.",
            deck.title,
            deck.flashcards.len()
        );
        Ok(())
    }

    pub fn card_add(
        &self,
        deck_title: &str,
        front: &str,
        back: &str,
        card_type: &str,
    ) -> anyhow::Result<()> {
        let card_type: CardType = card_type.parse()?;
        let card = Flashcard::new(front, back).with_type(card_type);
        let card_id = {
            let conn = self.store.lock();
            let deck = db::find_deck(deck_title, &conn)?;
            db::add_flashcard(deck.id, &card, &conn)?
        };
        let record = self
            .store
            .create_record(self.learner(), card_id, self.current_date()?)?;
        println!(
            "Card #{} added to '{}', first review {}.",
            card_id,
            deck_title,
            format_date(record.state.next_review_at)
        );
        Ok(())
    }

    pub fn card_delete(&self, card_id: i64) -> anyhow::Result<()> {
        db::delete_flashcard(card_id, &self.store.lock())?;
        println!("Card #{} deleted.", card_id);
        Ok(())
    }

    pub fn due(&self) -> anyhow::Result<()> {
        let now = self.current_date()?;
        let due = self.store.get_due_records(self.learner(), now)?;
        println!("{} cards due on {}", due.len(), format_date(now));
        let conn = self.store.lock();
        for record in due {
            let card = db::get_flashcard(record.card_id, &conn)?;
            println!(
                "  #{} {} (scheduled {})",
                record.card_id,
                card.front,
                format_date(record.state.next_review_at)
            );
        }
        Ok(())
    }

    pub fn advance_day(&self, reset: bool) -> anyhow::Result<()> {
        let conn = self.store.lock();
        let date = if reset {
            db::reset_current_date(&conn)?
        } else {
            db::advance_day(&conn)?
        };
        let due = db::count_due(self.learner(), date, &conn)?;
        println!("Review date is now {} ({} cards due).", format_date(date), due);
        Ok(())
    }

    pub fn history(&self, limit: usize) -> anyhow::Result<()> {
        let entries = db::get_review_log(self.learner(), limit, &self.store.lock())?;
        if entries.is_empty() {
            println!("No reviews recorded yet.");
        }
        for entry in entries {
            println!(
                "  {}  card #{}  q={}  {} -> {}  ease {:.2}",
                format_date(entry.reviewed_at),
                entry.card_id,
                entry.quality,
                sm2::format_interval(entry.previous_interval),
                sm2::format_interval(entry.interval),
                entry.ease_factor
            );
        }
        Ok(())
    }

    /// Runs an interactive review session over today's due cards
    pub fn review<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        out: &mut W,
    ) -> anyhow::Result<SessionSummary> {
        let as_of = self.current_date()?;
        let mut session = ReviewSession::start_with_limit(
            self.store.clone(),
            self.learner(),
            as_of,
            self.config.session.max_cards,
        )?;
        if let Some(events) = self.dispatcher.sender() {
            session = session.with_events(events);
        }

        if session.is_complete() {
            writeln!(out, "All caught up! You have no flashcards to review today.")?;
            return Ok(session.abandon());
        }
        writeln!(
            out,
            "Daily review session ({} cards)",
            session.remaining_count()
        )?;

        while !session.is_complete() {
            let card_id = session.present()?.card_id;
            let card = db::get_flashcard(card_id, &self.store.lock())?;

            writeln!(out, "\n{}  [{}]", session.progress_message(), card.card_type)?;
            writeln!(out, "Q: {}", card.front)?;
            write!(out, "Press Enter to reveal the answer (q to quit) ")?;
            out.flush()?;
            if let Prompt::Quit = read_prompt(input)? {
                return Ok(session.abandon());
            }

            session.flip()?;
            writeln!(out, "A: {}", card.back)?;

            loop {
                let state = &session.current().context("no card is showing")?.state;
                write!(out, "How well did you remember? {} ", rating_buttons(state))?;
                out.flush()?;

                let choice = match read_prompt(input)? {
                    Prompt::Quit => return Ok(session.abandon()),
                    Prompt::Line(line) => line,
                };
                let Some(rating) = choice.chars().next().and_then(Rating::from_key) else {
                    writeln!(out, "Unknown choice '{}'.", choice)?;
                    continue;
                };

                match session.rate_with(rating, self.current_date()?) {
                    Ok(rated) => {
                        if rated.quality != Quality::from(rating) {
                            writeln!(
                                out,
                                "Your earlier rating (q={}) had already been saved.",
                                rated.quality
                            )?;
                        }
                        writeln!(
                            out,
                            "Next review on {}.",
                            format_date(rated.updated.next_review_at)
                        )?;
                        break;
                    }
                    Err(ReviewError::StaleRecord { .. }) => {
                        writeln!(
                            out,
                            "This card was reviewed elsewhere; its schedule has been refreshed. Please rate again."
                        )?;
                    }
                    Err(e) if e.is_retryable() => {
                        writeln!(out, "Could not save your rating ({}). Please rate again.", e)?;
                    }
                    Err(e) => {
                        writeln!(out, "Could not save your rating: {}", e)?;
                        writeln!(out, "Ending the session early.")?;
                        return Ok(session.abandon());
                    }
                }
            }
        }

        writeln!(
            out,
            "\nSession complete! {} reviewed, {} to relearn. Come back tomorrow for more!",
            session.summary().reviewed,
            session.summary().lapses
        )?;
        Ok(session.abandon())
    }
}
