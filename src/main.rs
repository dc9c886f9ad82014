mod app;

use anyhow::Context;
use app::App;
use clap::{Parser, Subcommand};
use spaced_review::Config;
use std::io;
use std::path::PathBuf;

/// Spaced-repetition flashcard reviews with the SM-2 scheduler.
#[derive(Parser, Debug)]
#[command(name = "spaced-review", author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/spaced-review/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overrides the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Learner to act for, overrides the configuration
    #[arg(long, global = true)]
    learner: Option<String>,

    /// Maximum cards in one review session
    #[arg(long, global = true)]
    max_cards: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deck management
    #[command(subcommand)]
    Deck(DeckCommand),

    /// Flashcard management
    #[command(subcommand)]
    Card(CardCommand),

    /// Lists cards due for review
    Due,

    /// Reviews today's due cards interactively
    #[command(alias = "r")]
    Review,

    /// Moves the review clock forward one day
    AdvanceDay {
        /// Reset the review clock to the current date instead
        #[arg(long)]
        reset: bool,
    },

    /// Shows recent review history
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Prints the effective configuration
    Config,
}

#[derive(Subcommand, Debug)]
enum DeckCommand {
    /// Creates an empty deck
    New { title: String },
    /// Lists all decks
    List,
    /// Shows a deck's cards and their schedule
    Show { title: String },
    /// Deletes a deck with its cards and review records
    Delete { title: String },
    /// Imports a deck exported with `deck export`
    Import { path: PathBuf },
    /// Exports a deck to JSON
    Export { title: String, path: PathBuf },
    /// Stores a generator response ({"cards": [...]}) as a new deck
    Generate {
        path: PathBuf,
        /// Deck title
        #[arg(long, default_value = "Flashcards for Note")]
        title: String,
        /// Note the cards were generated from
        #[arg(long)]
        note: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CardCommand {
    /// Adds a card to a deck and schedules it
    Add {
        deck: String,
        front: String,
        back: String,
        /// definition, conceptual or cloze
        #[arg(long = "type", default_value = "definition")]
        card_type: String,
    },
    /// Deletes a card and its review records
    Delete { id: i64 },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    if let Some(learner) = cli.learner {
        config.learner_id = learner;
    }
    if cli.max_cards.is_some() {
        config.session.max_cards = cli.max_cards;
    }
    config.validate()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    if let Command::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let app = App::open(config)?;
    let result = match cli.command {
        Command::Deck(DeckCommand::New { title }) => app.deck_new(&title),
        Command::Deck(DeckCommand::List) => app.deck_list(),
        Command::Deck(DeckCommand::Show { title }) => app.deck_show(&title),
        Command::Deck(DeckCommand::Delete { title }) => app.deck_delete(&title),
        Command::Deck(DeckCommand::Import { path }) => app.deck_import(&path),
        Command::Deck(DeckCommand::Export { title, path }) => app.deck_export(&title, &path),
        Command::Deck(DeckCommand::Generate { path, title, note }) => {
            app.deck_generate(&path, &title, note.as_deref())
        }
        Command::Card(CardCommand::Add {
            deck,
            front,
            back,
            card_type,
        }) => app.card_add(&deck, &front, &back, &card_type),
        Command::Card(CardCommand::Delete { id }) => app.card_delete(id),
        Command::Due => app.due(),
        Command::Review => {
            let stdin = io::stdin();
            app.review(&mut stdin.lock(), &mut io::stdout())
                .map(|_| ())
        }
        Command::AdvanceDay { reset } => app.advance_day(reset),
        Command::History { limit } => app.history(limit),
        Command::Config => Ok(()),
    };

    // Let queued review log writes land before exiting
    app.shutdown();
    result
}
