//! Decks, cards and review scheduling
//!
//! This module provides:
//! - Deck and card models with per-type validation
//! - Deck and card persistence, including card ordering
//! - SM-2 interval scheduling used by the progress tracker

pub mod algorithm;
pub mod models;
pub mod storage;

pub use models::*;
