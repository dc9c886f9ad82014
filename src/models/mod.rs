pub mod deck;
pub mod flashcard;
pub mod quality;
pub mod review_record;
pub mod review_session;
pub mod sm2;

pub use deck::Deck;
pub use flashcard::{CardType, Flashcard};
pub use quality::{Quality, Rating};
pub use review_record::{ReviewRecord, SchedulingState};
pub use review_session::{RatedCard, ReviewSession, SessionState, SessionSummary};
