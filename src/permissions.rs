//! Role and ownership checks shared by every handler
//!
//! | resource   | view                                            | change                  |
//! |------------|-------------------------------------------------|-------------------------|
//! | deck/card  | admin, creator, assignee, class teacher/student | admin, creator          |
//! | class      | admin, teacher, enrolled student                | admin, teacher          |
//! | assignment | as its class                                    | as its class            |
//! | user       | admin, self, teacher of the user                | admin, self (role: admin)|
//! | progress   | admin, self, teacher sharing student and deck   | self                    |

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::classes::{self, Class};
use crate::flashcards::Deck;
use crate::storage::StorageError;
use crate::users::{Role, User};

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type AccessResult = Result<(), AccessError>;

fn deny(actor: &User, message: &str) -> AccessResult {
    log::debug!("Denied {} ({}): {}", actor.username, actor.role, message);
    Err(AccessError::Forbidden(message.to_string()))
}

pub fn require_role(actor: &User, roles: &[Role]) -> AccessResult {
    if roles.contains(&actor.role) {
        Ok(())
    } else {
        deny(actor, "Insufficient role")
    }
}

pub fn can_view_deck(conn: &Connection, actor: &User, deck: &Deck) -> Result<bool, StorageError> {
    if actor.is_admin() || deck.creator_id == actor.id || actor.deck_ids.contains(&deck.id) {
        return Ok(true);
    }
    classes::storage::deck_in_user_classes(conn, actor.id, deck.id)
}

pub fn ensure_view_deck(conn: &Connection, actor: &User, deck: &Deck) -> AccessResult {
    if can_view_deck(conn, actor, deck)? {
        Ok(())
    } else {
        deny(actor, "You do not have access to this deck")
    }
}

pub fn ensure_edit_deck(actor: &User, deck: &Deck) -> AccessResult {
    if actor.is_admin() || deck.creator_id == actor.id {
        Ok(())
    } else {
        deny(actor, "Only the deck's creator can change it")
    }
}

pub fn can_manage_class(actor: &User, class: &Class) -> bool {
    actor.is_admin() || class.teacher_id == actor.id
}

pub fn ensure_manage_class(actor: &User, class: &Class) -> AccessResult {
    if can_manage_class(actor, class) {
        Ok(())
    } else {
        deny(actor, "Only the class's teacher can do this")
    }
}

pub fn ensure_view_class(actor: &User, class: &Class) -> AccessResult {
    if can_manage_class(actor, class) || class.student_ids.contains(&actor.id) {
        Ok(())
    } else {
        deny(actor, "You are not a member of this class")
    }
}

/// Only students enrolled in the class may submit its assignments.
pub fn ensure_submit(actor: &User, class: &Class) -> AccessResult {
    if actor.role == Role::Student && class.student_ids.contains(&actor.id) {
        Ok(())
    } else {
        deny(actor, "Only enrolled students can submit assignments")
    }
}

pub fn ensure_view_user(conn: &Connection, actor: &User, target_id: Uuid) -> AccessResult {
    if actor.is_admin() || actor.id == target_id {
        return Ok(());
    }
    if actor.role == Role::Teacher && classes::storage::teaches_student(conn, actor.id, target_id)? {
        return Ok(());
    }
    deny(actor, "You cannot view this user")
}

pub fn ensure_update_user(actor: &User, target_id: Uuid, changes_role: bool) -> AccessResult {
    if changes_role && !actor.is_admin() {
        return deny(actor, "Only admins can change roles");
    }
    if actor.is_admin() || actor.id == target_id {
        Ok(())
    } else {
        deny(actor, "You cannot update this user")
    }
}

/// Teachers may hand decks only to students of their own classes.
pub fn ensure_assign_deck(conn: &Connection, actor: &User, target: &User) -> AccessResult {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Teacher if target.role != Role::Student => deny(actor, "Decks can only be assigned to students"),
        Role::Teacher if classes::storage::teaches_student(conn, actor.id, target.id)? => Ok(()),
        Role::Teacher => deny(actor, "Student is not in any of your classes"),
        Role::Student => deny(actor, "Students cannot assign decks"),
    }
}

pub fn ensure_view_progress(conn: &Connection, actor: &User, student_id: Uuid, deck_id: Uuid) -> AccessResult {
    if actor.is_admin() || actor.id == student_id {
        return Ok(());
    }
    if actor.role == Role::Teacher
        && classes::storage::teaches_student_on_deck(conn, actor.id, student_id, deck_id)?
    {
        return Ok(());
    }
    deny(actor, "You cannot view this user's progress")
}
