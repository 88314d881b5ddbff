//! Due-dated mastery requirements on a class deck, with embedded submissions

pub mod models;
pub mod storage;

pub use models::*;
