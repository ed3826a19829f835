//! Demo reference data for local environments

use crate::connection::DataSources;
use crate::core::DbError;
use crate::domain::{
    City, Country, Event, EventCategory, EventDuration, EventStatus, EventSubCategory, EventTicket, Province, User,
};
use crate::repository::Repository;
use crate::transaction::TransactionManager;
use chrono::{Duration, Utc};
use tracing::info;

/// Insert demo locations, categories and events in one transaction
///
/// Does nothing when countries already exist. Returns whether data was
/// written.
pub async fn seed_demo_data(sources: &DataSources) -> Result<bool, DbError> {
    let countries: Repository<Country> = Repository::new(sources)?;
    if countries.count().await? > 0 {
        return Ok(false);
    }

    let provinces: Repository<Province> = Repository::new(sources)?;
    let cities: Repository<City> = Repository::new(sources)?;
    let users: Repository<User> = Repository::new(sources)?;
    let categories: Repository<EventCategory> = Repository::new(sources)?;
    let subcategories: Repository<EventSubCategory> = Repository::new(sources)?;
    let events: Repository<Event> = Repository::new(sources)?;
    let tickets: Repository<EventTicket> = Repository::new(sources)?;

    let transactions = TransactionManager::new(sources.clone());
    transactions
        .run_default(|| async {
            countries.insert(&Country::new("ID", "Indonesia").with_codes("ID", "+62")).await?;
            countries.insert(&Country::new("SG", "Singapore").with_codes("SG", "+65")).await?;

            provinces.insert(&Province::new("ID-JK", "DKI Jakarta", "ID")).await?;
            provinces.insert(&Province::new("ID-JB", "Jawa Barat", "ID")).await?;
            provinces.insert(&Province::new("SG-01", "Central Singapore", "SG")).await?;

            cities.insert(&City::new("jakarta-selatan", "Jakarta Selatan", "ID-JK")).await?;
            cities.insert(&City::new("bandung", "Bandung", "ID-JB")).await?;
            cities.insert(&City::new("singapore", "Singapore", "SG-01")).await?;

            let mut organizer = User::new("organizer@hifella.id");
            organizer.name = Some("Hi-Fella Events".to_string());
            organizer.registration_step = None;
            organizer.finish_registration_at = Some(Utc::now());
            users.insert(&organizer).await?;

            categories.insert(&EventCategory::new("cat-music", "Music", "music")).await?;
            categories.insert(&EventCategory::new("cat-sports", "Sports", "sports")).await?;
            subcategories
                .insert(&EventSubCategory::new("sub-concert", "cat-music", "Concert", "concert"))
                .await?;
            subcategories
                .insert(&EventSubCategory::new("sub-running", "cat-sports", "Running", "running"))
                .await?;

            let now = Utc::now();
            let demo = [
                ("evt-jazz-night", "Jazz Night", "cat-music", "sub-concert", 3, EventDuration::TwoHours),
                ("evt-city-run", "City Fun Run", "cat-sports", "sub-running", 10, EventDuration::OneHour),
            ];
            for (id, name, category, subcategory, days_ahead, duration) in demo {
                let start = now + Duration::days(days_ahead);
                let hours = match duration {
                    EventDuration::OneHour => 1,
                    EventDuration::TwoHours => 2,
                };
                events
                    .insert(&Event {
                        id_event: id.to_string(),
                        id_user_creator: organizer.id_user.clone(),
                        name_event: name.to_string(),
                        description: Some(format!("{name} hosted by Hi-Fella")),
                        id_event_category: category.to_string(),
                        id_event_subcategory: Some(subcategory.to_string()),
                        thumbnail_url: None,
                        start_date: start,
                        end_date: start + Duration::hours(hours),
                        duration,
                        status: EventStatus::Upcoming,
                        total_ticket_sold: Some(0),
                        total_revenue: Some(0),
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;

                for (suffix, ticket_name, price) in [("regular", "Regular", 75_000), ("vip", "VIP", 250_000)] {
                    tickets
                        .insert(&EventTicket {
                            id_ticket: format!("{id}-{suffix}"),
                            id_event: id.to_string(),
                            name_ticket: ticket_name.to_string(),
                            description: format!("{ticket_name} admission"),
                            price,
                            inventory_total: 100,
                            inventory_sold: 0,
                            active: true,
                            created_at: now,
                            updated_at: now,
                        })
                        .await?;
                }
            }

            Ok::<_, DbError>(())
        })
        .await?;

    info!("demo data seeded");
    Ok(true)
}
