pub mod game_service;

pub use game_service::{GameService, PlayOutcome};
