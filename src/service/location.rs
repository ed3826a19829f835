use super::ServiceResult;
use super::pagination::{Page, PageRequest, matches_search};
use crate::connection::DataSources;
use crate::core::DbError;
use crate::domain::{City, Country, Province};
use crate::repository::Repository;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
}

impl CountryQuery {
    pub fn paging(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CityQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
    pub country_id: Option<String>,
}

impl CityQuery {
    pub fn paging(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryItem {
    pub id: String,
    pub name: Option<String>,
    pub country_code: Option<String>,
    pub phone_code: Option<String>,
    pub flag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityItem {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LocationService {
    countries: Repository<Country>,
    provinces: Repository<Province>,
    cities: Repository<City>,
}

impl LocationService {
    pub fn new(sources: &DataSources) -> Result<Self, DbError> {
        Ok(Self {
            countries: Repository::new(sources)?,
            provinces: Repository::new(sources)?,
            cities: Repository::new(sources)?,
        })
    }

    /// Listed countries ordered by name
    pub async fn get_countries(&self, query: CountryQuery) -> ServiceResult<Page<CountryItem>> {
        let search = query.search.as_deref();
        let mut countries = self
            .countries
            .find_by(|country| country.is_listed() && matches_search(country.name_country.as_deref(), search))
            .await?;
        countries.sort_by(|a, b| a.name_country.cmp(&b.name_country));

        Ok(Page::paginate(countries, query.paging()).map(|country| CountryItem {
            id: country.id_country,
            name: country.name_country,
            country_code: country.country_code,
            phone_code: country.phone_code,
            flag: country.flag,
        }))
    }

    /// Listed cities ordered by name, optionally limited to one country
    pub async fn get_cities(&self, query: CityQuery) -> ServiceResult<Page<CityItem>> {
        let provinces: Option<HashSet<String>> = match &query.country_id {
            Some(country_id) => Some(
                self.provinces
                    .find_by(|province| province.country_id.as_deref() == Some(country_id.as_str()))
                    .await?
                    .into_iter()
                    .map(|province| province.id_province)
                    .collect(),
            ),
            None => None,
        };

        let search = query.search.as_deref();
        let mut cities = self
            .cities
            .find_by(|city| {
                let in_country = match (&provinces, &city.province_id) {
                    (None, _) => true,
                    (Some(ids), Some(province_id)) => ids.contains(province_id),
                    (Some(_), None) => false,
                };
                city.is_listed() && in_country && matches_search(city.name_city.as_deref(), search)
            })
            .await?;
        cities.sort_by(|a, b| a.name_city.cmp(&b.name_city));

        Ok(Page::paginate(cities, query.paging()).map(|city| CityItem {
            id: city.id_city,
            name: city.name_city,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionConfig, DEFAULT_ALIAS};
    use crate::domain::install_schema;
    use chrono::Utc;

    async fn service() -> LocationService {
        let sources = DataSources::new()
            .with_config(DEFAULT_ALIAS, ConnectionConfig::new("location_tests"))
            .unwrap();
        install_schema(sources.default_pool().unwrap().database()).unwrap();

        let countries: Repository<Country> = Repository::new(&sources).unwrap();
        let provinces: Repository<Province> = Repository::new(&sources).unwrap();
        let cities: Repository<City> = Repository::new(&sources).unwrap();

        let mut hidden = Country::new("1", "Atlantis");
        hidden.deleted_at = Some(Utc::now());
        for country in [Country::new("62", "Indonesia"), Country::new("60", "Malaysia"), hidden] {
            countries.insert(&country).await.unwrap();
        }
        provinces.insert(&Province::new("31", "DKI Jakarta", "62")).await.unwrap();
        provinces.insert(&Province::new("14", "Selangor", "60")).await.unwrap();
        for city in [
            City::new("3171", "Jakarta Selatan", "31"),
            City::new("3172", "Jakarta Timur", "31"),
            City::new("1401", "Shah Alam", "14"),
        ] {
            cities.insert(&city).await.unwrap();
        }

        LocationService::new(&sources).unwrap()
    }

    #[tokio::test]
    async fn test_countries_listed_and_searched() {
        let service = service().await;

        let page = service.get_countries(CountryQuery::default()).await.unwrap();
        let names: Vec<_> = page.data.iter().filter_map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["Indonesia", "Malaysia"]);

        let page = service
            .get_countries(CountryQuery {
                search: Some("INDO".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_cities_by_country() {
        let service = service().await;

        let page = service
            .get_cities(CityQuery {
                country_id: Some("62".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<_> = page.data.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["3171", "3172"]);

        let page = service
            .get_cities(CityQuery {
                page: Some(2),
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!((page.total, page.total_pages, page.data.len()), (3, 2, 1));
    }
}
