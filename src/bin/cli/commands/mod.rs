pub mod settings;
pub mod stats;
pub mod users;
