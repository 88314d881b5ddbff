//! Flashcard learning management server
//!
//! Decks of cards, teacher-run classes with join codes, due-dated
//! assignments and per-user study progress behind a JSON REST API.

pub mod api;
pub mod assignments;
pub mod auth;
pub mod classes;
pub mod config;
pub mod flashcards;
pub mod permissions;
pub mod progress;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod users;

mod serde_util;
