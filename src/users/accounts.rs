//! Account creation shared by registration, admin tools and bootstrap

use crate::auth;
use crate::config::BootstrapAdmin;
use crate::storage::{Database, Result, StorageError};

use super::models::{validate_email, validate_username, Role, User};
use super::storage;

/// Validate the fields and hash the password into a new, unsaved account.
///
/// Hashing is slow on purpose, so this runs outside any database lock.
pub fn prepare_account(username: &str, email: &str, password: &str, role: Role) -> Result<User> {
    let username = validate_username(username).map_err(StorageError::Invalid)?;
    let email = validate_email(email).map_err(StorageError::Invalid)?;
    let hash = auth::hash_password(password).map_err(|e| StorageError::Invalid(e.to_string()))?;
    Ok(User::new(username, email, hash, role))
}

/// Create the configured admin unless an admin already exists.
/// Returns the new account when one was created.
pub fn ensure_bootstrap_admin(db: &Database, admin: &BootstrapAdmin) -> Result<Option<User>> {
    if db.read(storage::admin_exists)? {
        return Ok(None);
    }

    let user = prepare_account(&admin.username, &admin.email, &admin.password, Role::Admin)?;
    db.write(|tx| {
        // Checked again under the write lock
        if storage::admin_exists(tx)? {
            return Ok(None);
        }
        storage::insert(tx, &user)?;
        Ok(Some(user))
    })
}
