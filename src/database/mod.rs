pub mod db;
pub mod store;

pub use db::{DeckInfo, ReviewLogEntry, UpdateOutcome};
pub use store::{ReviewStore, SqliteStore};
