mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use studydeck_lib::users::Role;

#[derive(Parser)]
#[command(name = "studydeck-cli", about = "Operator tools for a studydeck database", version)]
struct Cli {
    /// Path to the server config file (used to locate the database)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file, overriding the config
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account of any role
    CreateUser {
        username: String,
        email: String,
        #[arg(long, default_value = "student")]
        role: Role,
        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// List accounts
    ListUsers {
        /// Only show this role
        #[arg(long)]
        role: Option<Role>,
    },

    /// Change an account's role
    SetRole {
        /// Username or email
        login: String,
        role: Role,
    },

    /// Replace an account's password
    ResetPassword {
        /// Username or email
        login: String,
        /// New password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Print system-wide counts
    Stats,

    /// Show or edit system settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the current settings
    Show,

    /// Change one or more settings
    Set {
        #[arg(long)]
        registration_open: Option<bool>,
        #[arg(long)]
        allow_teacher_signup: Option<bool>,
        #[arg(long)]
        session_log_limit: Option<u32>,
        #[arg(long)]
        rating_history_limit: Option<u32>,
        #[arg(long)]
        default_required_mastery: Option<f64>,
    },
}

/// Use the given password or read the first line of stdin.
fn resolve_password(password: Option<String>) -> anyhow::Result<String> {
    match password {
        Some(p) if p != "-" => Ok(p),
        _ => {
            if std::io::stdin().is_terminal() {
                eprint!("Password: ");
            }
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && std::io::stdout().is_terminal();
    let app = app::App::open(cli.config.as_deref(), cli.database)?;

    match cli.command {
        Command::CreateUser { username, email, role, password } => {
            let password = resolve_password(password)?;
            commands::users::create(&app, &username, &email, &password, role, &cli.format, use_color)?;
        }
        Command::ListUsers { role } => {
            commands::users::list(&app, role, &cli.format, use_color)?;
        }
        Command::SetRole { login, role } => {
            commands::users::set_role(&app, &login, role, &cli.format, use_color)?;
        }
        Command::ResetPassword { login, password } => {
            let password = resolve_password(password)?;
            commands::users::reset_password(&app, &login, &password)?;
        }
        Command::Stats => {
            commands::stats::run(&app, &cli.format, use_color)?;
        }
        Command::Settings(SettingsCommand::Show) => {
            commands::settings::show(&app, &cli.format)?;
        }
        Command::Settings(SettingsCommand::Set {
            registration_open,
            allow_teacher_signup,
            session_log_limit,
            rating_history_limit,
            default_required_mastery,
        }) => {
            let request = studydeck_lib::settings::UpdateSettingsRequest {
                registration_open,
                allow_teacher_signup,
                session_log_limit,
                rating_history_limit,
                default_required_mastery,
            };
            commands::settings::set(&app, request, &cli.format)?;
        }
    }

    Ok(())
}
