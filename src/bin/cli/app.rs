use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use studydeck_lib::config::ServerConfig;
use studydeck_lib::storage::Database;
use studydeck_lib::users::{self, User};

/// Shared state for CLI commands
pub struct App {
    pub db: Database,
}

impl App {
    /// Open the database named by `--database`, or the one in the server config
    pub fn open(config_path: Option<&Path>, database: Option<PathBuf>) -> Result<Self> {
        let path = match database {
            Some(path) => path,
            None => ServerConfig::load(config_path)?.database_path,
        };
        log::debug!("Opening database {}", path.display());

        let db = Database::open(&path).with_context(|| format!("Failed to open database {}", path.display()))?;
        Ok(Self { db })
    }

    /// Find an account by username or email (case-insensitive)
    pub fn find_user(&self, login: &str) -> Result<User> {
        self.db
            .read(|conn| users::storage::find_by_login(conn, login))?
            .with_context(|| format!("No user matching '{}'", login))
    }
}
