use crate::repository::Entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id_country: String,
    pub name_country: Option<String>,
    pub country_code: Option<String>,
    pub phone_code: Option<String>,
    pub status: Option<bool>,
    pub flag: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Country {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id_country: id.into(),
            name_country: Some(name.into()),
            country_code: None,
            phone_code: None,
            status: Some(true),
            flag: None,
            updated_at: None,
            deleted_at: None,
        }
    }

    pub fn with_codes(mut self, country_code: &str, phone_code: &str) -> Self {
        self.country_code = Some(country_code.to_string());
        self.phone_code = Some(phone_code.to_string());
        self
    }

    /// Listed to clients: enabled and not deleted
    pub fn is_listed(&self) -> bool {
        self.status == Some(true) && self.deleted_at.is_none()
    }
}

impl Entity for Country {
    const TABLE: &'static str = "countries";

    fn id(&self) -> String {
        self.id_country.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Province {
    pub id_province: String,
    pub name_province: Option<String>,
    pub country_id: Option<String>,
    pub status: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Province {
    pub fn new(id: impl Into<String>, name: impl Into<String>, country_id: impl Into<String>) -> Self {
        Self {
            id_province: id.into(),
            name_province: Some(name.into()),
            country_id: Some(country_id.into()),
            status: Some(true),
            updated_at: None,
            deleted_at: None,
        }
    }
}

impl Entity for Province {
    const TABLE: &'static str = "provinces";

    fn id(&self) -> String {
        self.id_province.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub id_city: String,
    pub name_city: Option<String>,
    pub province_id: Option<String>,
    pub status: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl City {
    pub fn new(id: impl Into<String>, name: impl Into<String>, province_id: impl Into<String>) -> Self {
        Self {
            id_city: id.into(),
            name_city: Some(name.into()),
            province_id: Some(province_id.into()),
            status: Some(true),
            updated_at: None,
            deleted_at: None,
        }
    }

    pub fn is_listed(&self) -> bool {
        self.status == Some(true) && self.deleted_at.is_none()
    }
}

impl Entity for City {
    const TABLE: &'static str = "cities";

    fn id(&self) -> String {
        self.id_city.clone()
    }
}
