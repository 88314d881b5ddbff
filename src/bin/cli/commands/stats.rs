use anyhow::Result;

use studydeck_lib::stats;

use crate::app::App;
use crate::render::terminal::{paint, role_color, Color};
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let stats = app.db.read(stats::collect)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Plain => {
            println!("{}", paint("Users", Color::BOLD, use_color));
            for (role, count) in &stats.users_by_role {
                println!("  {:<10} {}", paint(role.as_str(), role_color(*role), use_color), count);
            }
            println!("  {:<10} {}", "total", stats.users);
            println!();
            println!("{:<12} {}", "Decks", stats.decks);
            println!("{:<12} {}", "Cards", stats.cards);
            println!("{:<12} {}", "Classes", stats.classes);
            println!("{:<12} {}", "Assignments", stats.assignments);
            println!("{:<12} {}", "Progress", stats.progress_records);
        }
    }
    Ok(())
}
