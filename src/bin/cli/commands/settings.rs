use anyhow::Result;

use studydeck_lib::settings::{self, SystemSettings, UpdateSettingsRequest};

use crate::app::App;
use crate::OutputFormat;

fn print_settings(settings: &SystemSettings, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(settings)?),
        OutputFormat::Plain => {
            println!("registration_open         {}", settings.registration_open);
            println!("allow_teacher_signup      {}", settings.allow_teacher_signup);
            println!("session_log_limit         {}", settings.session_log_limit);
            println!("rating_history_limit      {}", settings.rating_history_limit);
            println!("default_required_mastery  {}", settings.default_required_mastery);
            if let Some(updated) = settings.updated_at {
                println!("updated_at                {}", updated.to_rfc3339());
            }
        }
    }
    Ok(())
}

pub fn show(app: &App, format: &OutputFormat) -> Result<()> {
    let current = app.db.read(settings::load)?;
    print_settings(&current, format)
}

pub fn set(app: &App, request: UpdateSettingsRequest, format: &OutputFormat) -> Result<()> {
    let updated = app.db.write(|tx| settings::update(tx, request))?;
    print_settings(&updated, format)
}
