use super::pagination::{Page, PageRequest, matches_search};
use super::{ServiceError, ServiceResult};
use crate::connection::DataSources;
use crate::core::DbError;
use crate::domain::{Event, EventCategory, EventStatus, EventSubCategory, EventTicket, User};
use crate::repository::Repository;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventTimeFilter {
    Day,
    Week,
    Month,
    Year,
}

impl EventTimeFilter {
    /// Half-open `[start, end)` window containing `now`
    ///
    /// Weeks start on Sunday.
    pub fn window(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let today = now.date_naive();
        let (start, end) = match self {
            EventTimeFilter::Day => (today, today.checked_add_signed(Duration::days(1))?),
            EventTimeFilter::Week => {
                let start = today.checked_sub_signed(Duration::days(
                    i64::from(today.weekday().num_days_from_sunday()),
                ))?;
                (start, start.checked_add_signed(Duration::days(7))?)
            }
            EventTimeFilter::Month => {
                let start = today.with_day(1)?;
                (start, start.checked_add_months(Months::new(1))?)
            }
            EventTimeFilter::Year => {
                let start = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
                (start, start.checked_add_months(Months::new(12))?)
            }
        };
        Some((midnight(start), midnight(end)))
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
    /// One or more category slugs, comma separated
    pub category: Option<String>,
    pub status: Option<EventStatus>,
    pub time: Option<EventTimeFilter>,
}

impl EventQuery {
    pub fn paging(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn category_slugs(&self) -> Vec<String> {
        self.category
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
    /// Parent category slug, for subcategory listings
    pub category: Option<String>,
}

impl CategoryQuery {
    pub fn paging(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Organizer {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventItem {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    /// Cheapest ticket, "0" when the event has no tickets
    pub price: String,
    pub date: String,
    pub status: EventStatus,
    pub organizer: Organizer,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryItem {
    pub id: String,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventTime {
    pub start: String,
    pub end: String,
    pub long: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_available: bool,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDetail {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub description: String,
    pub status: EventStatus,
    pub time: EventTime,
    pub category: Option<CategoryItem>,
    pub organizer: Organizer,
    pub tickets: Vec<TicketItem>,
}

#[derive(Clone, Debug)]
pub struct EventService {
    events: Repository<Event>,
    categories: Repository<EventCategory>,
    subcategories: Repository<EventSubCategory>,
    tickets: Repository<EventTicket>,
    users: Repository<User>,
}

impl EventService {
    pub fn new(sources: &DataSources) -> Result<Self, DbError> {
        Ok(Self {
            events: Repository::new(sources)?,
            categories: Repository::new(sources)?,
            subcategories: Repository::new(sources)?,
            tickets: Repository::new(sources)?,
            users: Repository::new(sources)?,
        })
    }

    pub async fn get_events(&self, query: EventQuery) -> ServiceResult<Page<EventItem>> {
        self.get_events_at(query, Utc::now()).await
    }

    /// Event listing with time windows evaluated at `now`
    pub async fn get_events_at(
        &self,
        query: EventQuery,
        now: DateTime<Utc>,
    ) -> ServiceResult<Page<EventItem>> {
        let slugs = query.category_slugs();
        let categories: Option<HashSet<String>> = if slugs.is_empty() {
            None
        } else {
            let matching = self
                .categories
                .find_by(|category| category.slug.as_ref().is_some_and(|slug| slugs.contains(slug)))
                .await?;
            Some(matching.into_iter().map(|c| c.id_event_category).collect())
        };
        let window = query.time.and_then(|filter| filter.window(now));
        let search = query.search.as_deref();

        let mut events = self
            .events
            .find_by(|event| {
                matches_search(Some(&event.name_event), search)
                    && categories
                        .as_ref()
                        .is_none_or(|ids| ids.contains(&event.id_event_category))
                    && query.status.is_none_or(|status| event.status == status)
                    && window.is_none_or(|(start, end)| event.start_date >= start && event.start_date < end)
            })
            .await?;
        events.sort_by(|a, b| a.start_date.cmp(&b.start_date).then_with(|| a.id_event.cmp(&b.id_event)));

        let page = Page::paginate(events, query.paging());
        let event_ids: HashSet<&str> = page.data.iter().map(|e| e.id_event.as_str()).collect();

        let mut min_prices: HashMap<String, i64> = HashMap::new();
        for ticket in self.tickets.find_by(|t| event_ids.contains(t.id_event.as_str())).await? {
            min_prices
                .entry(ticket.id_event.clone())
                .and_modify(|price| *price = (*price).min(ticket.price))
                .or_insert(ticket.price);
        }

        let mut items = Vec::with_capacity(page.data.len());
        for event in &page.data {
            let organizer = self.organizer(&event.id_user_creator).await?;
            items.push(EventItem {
                id: event.id_event.clone(),
                name: event.name_event.clone(),
                image: non_empty(event.thumbnail_url.as_deref()),
                price: min_prices.get(&event.id_event).copied().unwrap_or(0).to_string(),
                date: event.start_date.to_rfc3339(),
                status: event.status,
                organizer,
            });
        }

        Ok(Page {
            data: items,
            total: page.total,
            page: page.page,
            total_pages: page.total_pages,
        })
    }

    pub async fn get_event_categories(&self, query: CategoryQuery) -> ServiceResult<Page<CategoryItem>> {
        let search = query.search.as_deref();
        let mut categories = self
            .categories
            .find_by(|category| matches_search(Some(&category.name), search))
            .await?;
        categories.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Page::paginate(categories, query.paging()).map(|category| CategoryItem {
            id: category.id_event_category,
            name: category.name,
            slug: category.slug.unwrap_or_default(),
        }))
    }

    pub async fn get_event_subcategories(&self, query: CategoryQuery) -> ServiceResult<Page<CategoryItem>> {
        let parent: Option<Option<String>> = match query.category.as_deref() {
            Some(slug) => Some(
                self.categories
                    .find_one_by("slug", slug)
                    .await?
                    .map(|category| category.id_event_category),
            ),
            None => None,
        };

        let search = query.search.as_deref();
        let mut subcategories = self
            .subcategories
            .find_by(|sub| {
                let in_parent = match &parent {
                    None => true,
                    Some(Some(id)) => &sub.event_category_id == id,
                    Some(None) => false,
                };
                in_parent && matches_search(Some(&sub.name), search)
            })
            .await?;
        subcategories.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(Page::paginate(subcategories, query.paging()).map(|sub| CategoryItem {
            id: sub.id_event_subcategory,
            name: sub.name,
            slug: sub.slug.unwrap_or_default(),
        }))
    }

    pub async fn get_event_detail(&self, id_event: &str) -> ServiceResult<EventDetail> {
        let event = self
            .events
            .find_by_id(id_event)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Event not found".into()))?;

        let category = self
            .categories
            .find_by_id(&event.id_event_category)
            .await?
            .map(|category| CategoryItem {
                id: category.id_event_category,
                name: category.name,
                slug: category.slug.unwrap_or_default(),
            });

        let mut tickets = self.tickets.find_by(|t| t.id_event == event.id_event).await?;
        tickets.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.id_ticket.cmp(&b.id_ticket)));
        let tickets = tickets
            .into_iter()
            .map(|ticket| TicketItem {
                is_available: ticket.is_available(),
                id: ticket.id_ticket,
                name: ticket.name_ticket,
                description: ticket.description,
                price: ticket.price.to_string(),
            })
            .collect();

        let organizer = self.organizer(&event.id_user_creator).await?;

        Ok(EventDetail {
            id: event.id_event,
            name: event.name_event,
            image: non_empty(event.thumbnail_url.as_deref()),
            description: event.description.unwrap_or_default(),
            status: event.status,
            time: EventTime {
                start: event.start_date.to_rfc3339(),
                end: event.end_date.to_rfc3339(),
                long: event.duration.label().to_string(),
            },
            category,
            organizer,
            tickets,
        })
    }

    async fn organizer(&self, id_user: &str) -> ServiceResult<Organizer> {
        let user = self.users.find_by_id(id_user).await?;
        Ok(Organizer {
            id: id_user.to_string(),
            name: user.as_ref().and_then(|u| u.name.clone()).unwrap_or_default(),
            image: user.and_then(|u| non_empty(u.profile_image.as_deref())),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_time_windows() {
        // Wednesday
        let now = at(2026, 10, 14, 15);

        assert_eq!(EventTimeFilter::Day.window(now), Some((at(2026, 10, 14, 0), at(2026, 10, 15, 0))));
        assert_eq!(EventTimeFilter::Week.window(now), Some((at(2026, 10, 11, 0), at(2026, 10, 18, 0))));
        assert_eq!(EventTimeFilter::Month.window(now), Some((at(2026, 10, 1, 0), at(2026, 11, 1, 0))));
        assert_eq!(EventTimeFilter::Year.window(now), Some((at(2026, 1, 1, 0), at(2027, 1, 1, 0))));
    }

    #[test]
    fn test_december_rolls_over() {
        let now = at(2026, 12, 31, 23);
        assert_eq!(EventTimeFilter::Month.window(now), Some((at(2026, 12, 1, 0), at(2027, 1, 1, 0))));
        assert_eq!(EventTimeFilter::Day.window(now), Some((at(2026, 12, 31, 0), at(2027, 1, 1, 0))));
    }

    #[test]
    fn test_category_slugs() {
        let query = EventQuery {
            category: Some("music, sports,,".into()),
            ..Default::default()
        };
        assert_eq!(query.category_slugs(), vec!["music", "sports"]);
        assert!(EventQuery::default().category_slugs().is_empty());
    }
}
