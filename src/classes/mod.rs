//! Teacher-owned classes ("teams"), their rosters and decks

pub mod models;
pub mod storage;

pub use models::*;
