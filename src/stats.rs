//! System-wide counts for the admin dashboard and the CLI

use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::storage::Result;
use crate::users::Role;
use crate::{assignments, classes, flashcards, progress, users};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub users: u64,
    /// Every role is present, zero when nobody holds it
    pub users_by_role: BTreeMap<Role, u64>,
    pub decks: u64,
    pub cards: u64,
    pub classes: u64,
    pub assignments: u64,
    pub progress_records: u64,
}

pub fn collect(conn: &Connection) -> Result<SystemStats> {
    let mut users_by_role = users::storage::count_by_role(conn)?;
    for role in Role::all() {
        users_by_role.entry(role).or_insert(0);
    }

    Ok(SystemStats {
        users: users_by_role.values().sum(),
        users_by_role,
        decks: flashcards::storage::count_decks(conn)?,
        cards: flashcards::storage::count_cards(conn)?,
        classes: classes::storage::count(conn)?,
        assignments: assignments::storage::count(conn)?,
        progress_records: progress::storage::count(conn)?,
    })
}
