//! Persistent entities of the events and accounts platform

pub mod event;
pub mod location;
pub mod user;

pub use event::{Event, EventCategory, EventDuration, EventStatus, EventSubCategory, EventTicket};
pub use location::{City, Country, Province};
pub use user::{REGISTRATION_STEP_PROFILE, RegistrationType, User, UserLoginHistory, UtmParams};

use crate::core::Result;
use crate::repository::Entity;
use crate::storage::{Database, TableSchema};
use tracing::debug;

/// Declarations of every table the platform uses
pub fn schemas() -> Vec<TableSchema> {
    vec![
        User::schema(),
        UserLoginHistory::schema(),
        Country::schema(),
        Province::schema(),
        City::schema(),
        EventCategory::schema(),
        EventSubCategory::schema(),
        Event::schema(),
        EventTicket::schema(),
    ]
}

/// Create every missing table on `database`
pub fn install_schema(database: &Database) -> Result<()> {
    for schema in schemas() {
        if !database.has_table(schema.name())? {
            debug!(database = %database.name(), table = %schema.name(), "creating table");
            database.create_table(schema)?;
        }
    }
    Ok(())
}
