use crate::repository::Entity;
use crate::storage::TableSchema;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventDuration {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "2h")]
    TwoHours,
}

impl EventDuration {
    /// Human readable length shown on the detail page
    pub fn label(&self) -> &'static str {
        match self {
            EventDuration::OneHour => "1 hour",
            EventDuration::TwoHours => "2 hours",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Cancelled,
    Finished,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "upcoming",
            EventStatus::Ongoing => "ongoing",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Finished => "finished",
        }
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(EventStatus::Upcoming),
            "ongoing" => Ok(EventStatus::Ongoing),
            "cancelled" => Ok(EventStatus::Cancelled),
            "finished" => Ok(EventStatus::Finished),
            other => Err(format!("unknown event status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id_event: String,
    pub id_user_creator: String,
    pub name_event: String,
    pub description: Option<String>,
    pub id_event_category: String,
    pub id_event_subcategory: Option<String>,
    pub thumbnail_url: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration: EventDuration,
    pub status: EventStatus,
    pub total_ticket_sold: Option<i64>,
    pub total_revenue: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Event {
    const TABLE: &'static str = "events";

    fn id(&self) -> String {
        self.id_event.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCategory {
    pub id_event_category: String,
    pub name: String,
    pub slug: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EventCategory {
    pub fn new(id: impl Into<String>, name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id_event_category: id.into(),
            name: name.into(),
            slug: Some(slug.into()),
            created_at: Utc::now(),
        }
    }
}

impl Entity for EventCategory {
    const TABLE: &'static str = "event_categories";

    fn id(&self) -> String {
        self.id_event_category.clone()
    }

    fn schema() -> TableSchema {
        TableSchema::new(Self::TABLE).unique("slug")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSubCategory {
    pub id_event_subcategory: String,
    pub event_category_id: String,
    pub name: String,
    pub slug: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EventSubCategory {
    pub fn new(
        id: impl Into<String>,
        category_id: impl Into<String>,
        name: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        Self {
            id_event_subcategory: id.into(),
            event_category_id: category_id.into(),
            name: name.into(),
            slug: Some(slug.into()),
            created_at: Utc::now(),
        }
    }
}

impl Entity for EventSubCategory {
    const TABLE: &'static str = "event_subcategories";

    fn id(&self) -> String {
        self.id_event_subcategory.clone()
    }

    fn schema() -> TableSchema {
        TableSchema::new(Self::TABLE).unique("slug")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTicket {
    pub id_ticket: String,
    pub id_event: String,
    pub name_ticket: String,
    pub description: String,
    pub price: i64,
    pub inventory_total: i64,
    pub inventory_sold: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventTicket {
    pub fn is_available(&self) -> bool {
        self.active && self.inventory_sold < self.inventory_total
    }
}

impl Entity for EventTicket {
    const TABLE: &'static str = "event_tickets";

    fn id(&self) -> String {
        self.id_ticket.clone()
    }
}
