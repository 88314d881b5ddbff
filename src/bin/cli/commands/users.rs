use anyhow::{bail, Result};

use studydeck_lib::auth;
use studydeck_lib::storage::StorageError;
use studydeck_lib::users::{self, accounts, Role, User};

use crate::app::App;
use crate::render::terminal::{paint, role_color, Color};
use crate::OutputFormat;

fn print_user(user: &User, format: &OutputFormat, use_color: bool) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(user)?),
        OutputFormat::Plain => println!(
            "{} {} <{}> {}",
            paint(&user.role.to_string(), role_color(user.role), use_color),
            user.username,
            user.email,
            paint(&user.id.to_string(), Color::GRAY, use_color),
        ),
    }
    Ok(())
}

pub fn create(
    app: &App,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let user = accounts::prepare_account(username, email, password, role)?;
    app.db.write(|tx| users::storage::insert(tx, &user))?;
    log::info!("Created {} account {}", user.role, user.username);
    print_user(&user, format, use_color)
}

pub fn list(app: &App, role: Option<Role>, format: &OutputFormat, use_color: bool) -> Result<()> {
    let list = app.db.read(|conn| users::storage::list(conn, role))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&list)?),
        OutputFormat::Plain => {
            if list.is_empty() {
                println!("(no users)");
            }
            let width = list.iter().map(|u| u.username.len()).max().unwrap_or(0);
            for user in &list {
                println!(
                    "{:<8} {:<width$}  {}  {}",
                    paint(user.role.as_str(), role_color(user.role), use_color),
                    user.username,
                    user.email,
                    paint(&format!("streak {}", user.study_streak), Color::DIM, use_color),
                    width = width,
                );
            }
        }
    }
    Ok(())
}

pub fn set_role(app: &App, login: &str, role: Role, format: &OutputFormat, use_color: bool) -> Result<()> {
    let mut user = app.find_user(login)?;
    if user.role == role {
        println!("{} is already {}", user.username, role);
        return Ok(());
    }

    let user = app.db.write(|tx| {
        if user.role == Role::Admin {
            let admins = users::storage::count_by_role(tx)?;
            if admins.get(&Role::Admin).copied().unwrap_or(0) <= 1 {
                return Err(StorageError::Conflict("Cannot demote the last admin".to_string()));
            }
        }
        user.role = role;
        users::storage::update_profile(tx, &user)?;
        users::storage::require(tx, user.id)
    })?;

    log::info!("Changed role of {} to {}", user.username, role);
    print_user(&user, format, use_color)
}

pub fn reset_password(app: &App, login: &str, password: &str) -> Result<()> {
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    let user = app.find_user(login)?;
    let hash = auth::hash_password(password)?;
    app.db.write(|tx| users::storage::update_password(tx, user.id, &hash))?;
    println!("Password updated for {}", user.username);
    Ok(())
}
