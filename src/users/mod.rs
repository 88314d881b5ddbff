//! Accounts, roles and study streaks

pub mod accounts;
pub mod models;
pub mod storage;
pub mod streak;

pub use models::*;
