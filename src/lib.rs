pub mod config;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod models;

pub use config::Config;
pub use database::{ReviewStore, SqliteStore, UpdateOutcome};
pub use error::{Result, ReviewError};
pub use models::{Deck, Flashcard, Quality, Rating, ReviewRecord, ReviewSession, SchedulingState};
