//! Per-user study progress
//!
//! This module provides:
//! - Mastery math over 1-5 ratings
//! - The per-(user, deck) progress record with its rolling session log
//! - Recording study ratings, including streak and schedule updates
//! - The study queue and class gradebook views

pub mod mastery;
pub mod models;
pub mod queue;
pub mod report;
pub mod storage;
pub mod tracker;

pub use models::*;
