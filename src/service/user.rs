use super::{ServiceError, ServiceResult};
use crate::connection::DataSources;
use crate::core::DbError;
use crate::domain::{
    City, Country, Province, REGISTRATION_STEP_PROFILE, RegistrationType, User, UserLoginHistory,
    UtmParams,
};
use crate::repository::Repository;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// bcrypt cost used for stored passwords
pub const DEFAULT_HASH_COST: u32 = 10;

/// Credentials and attribution of a manual registration
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub utm: UtmParams,
}

#[derive(Debug, Clone, Default)]
pub struct NewLoginHistory {
    pub user_id: String,
    /// Reuse the session with this token when it exists, otherwise create a
    /// session carrying it; a fresh token is generated when absent.
    pub token: Option<String>,
    pub ip_address: Option<String>,
    pub browser: Option<String>,
    pub device_info: Option<String>,
}

/// Partial profile update; `None` leaves a column untouched
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub city_id: Option<String>,
    pub phone_code: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub finish_registration: bool,
}

/// A user joined with its city, province and country
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user: User,
    pub city: Option<City>,
    pub province: Option<Province>,
    pub country: Option<Country>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryRef {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityRef {
    pub id: String,
    pub name: Option<String>,
    pub country: Option<String>,
}

/// Public view of an account returned by the auth and profile endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub phone_code: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<String>,
    pub country: Option<CountryRef>,
    pub city: Option<CityRef>,
}

impl UserProfile {
    pub fn summary(&self) -> UserSummary {
        let country = self.country.as_ref().map(|country| CountryRef {
            id: country.id_country.clone(),
            name: country.name_country.clone(),
        });

        let city = match (&self.city, &self.country) {
            (Some(city), Some(country)) => Some(CityRef {
                id: city.id_city.clone(),
                name: city.name_city.clone(),
                country: country.name_country.clone(),
            }),
            _ => None,
        };

        UserSummary {
            id: self.user.id_user.clone(),
            email: self.user.email.clone(),
            name: self.user.name.clone(),
            phone_code: self.user.phone_code.clone(),
            phone: self.user.phone.clone(),
            gender: self.user.gender.clone(),
            birth_date: self.user.birthdate.map(|date| date.format("%Y-%m-%d").to_string()),
            country,
            city,
        }
    }
}

#[derive(Clone, Debug)]
pub struct UserService {
    users: Repository<User>,
    login_history: Repository<UserLoginHistory>,
    cities: Repository<City>,
    provinces: Repository<Province>,
    countries: Repository<Country>,
    hash_cost: u32,
}

impl UserService {
    pub fn new(sources: &DataSources) -> Result<Self, DbError> {
        Ok(Self {
            users: Repository::new(sources)?,
            login_history: Repository::new(sources)?,
            cities: Repository::new(sources)?,
            provinces: Repository::new(sources)?,
            countries: Repository::new(sources)?,
            hash_cost: DEFAULT_HASH_COST,
        })
    }

    /// Override the bcrypt cost (lower costs keep tests fast)
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Register an account, or restart an unfinished registration
    ///
    /// An email that already belongs to a completed account is rejected.
    pub async fn create_user(&self, new_user: NewUser) -> ServiceResult<User> {
        let existing = self.find_by_email(&new_user.email).await?;
        if existing.as_ref().is_some_and(User::is_registration_complete) {
            return Err(ServiceError::bad_request("Invalid input")
                .with_field("email", "Email is already in use."));
        }

        let password = self.hash_password(&new_user.password).await?;
        let is_new = existing.is_none();
        let mut user = existing.unwrap_or_else(|| User::new(new_user.email.clone()));

        user.password = Some(password);
        user.utm = new_user.utm;
        user.token_bearer = Some(generate_token());
        user.token_socket = Some(generate_socket_token());
        user.registration_step = Some(REGISTRATION_STEP_PROFILE);
        user.registration_type = Some(RegistrationType::Manual);
        user.account_status = true;
        user.updated_at = Utc::now();

        if is_new {
            self.users.insert(&user).await?;
            info!(user_id = %user.id_user, "user registered");
        } else {
            self.users.update(&user).await?;
            info!(user_id = %user.id_user, "unfinished registration restarted");
        }

        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let user = self.users.find_one_by("email", email).await?;
        Ok(user.filter(|user| !user.is_deleted()))
    }

    pub async fn find_by_token(&self, token_bearer: &str) -> ServiceResult<Option<User>> {
        let user = self.users.find_one_by("token_bearer", token_bearer).await?;
        Ok(user.filter(|user| !user.is_deleted()))
    }

    pub async fn find_one_by_id(&self, id_user: &str) -> ServiceResult<Option<User>> {
        let user = self.users.find_by_id(id_user).await?;
        Ok(user.filter(|user| !user.is_deleted()))
    }

    /// Session carrying `token`, if it is still active
    pub async fn find_login_by_token(&self, token: &str) -> ServiceResult<Option<UserLoginHistory>> {
        let history = self.login_history.find_one_by("token", token).await?;
        Ok(history.filter(UserLoginHistory::is_active))
    }

    pub async fn update_user(&self, id_user: &str, changes: UserChanges) -> ServiceResult<User> {
        let mut user = self
            .find_one_by_id(id_user)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))?;

        if let Some(city_id) = &changes.city_id {
            if self.cities.find_by_id(city_id).await?.is_none() {
                return Err(ServiceError::bad_request("City not found")
                    .with_field("city_id", "City not found"));
            }
        }

        if let Some(phone_code) = &changes.phone_code {
            if self.countries.find_one_by("phone_code", phone_code.as_str()).await?.is_none() {
                return Err(ServiceError::bad_request("Phone code not found")
                    .with_field("phone_code", "Phone code not found"));
            }
        }

        if let Some(password) = &changes.password {
            user.password = Some(self.hash_password(password).await?);
        }

        let now = Utc::now();
        user.name = changes.name.or(user.name);
        user.gender = changes.gender.or(user.gender);
        user.birthdate = changes.birthdate.or(user.birthdate);
        user.city_id = changes.city_id.or(user.city_id);
        user.phone_code = changes.phone_code.or(user.phone_code);
        user.phone = changes.phone.or(user.phone);
        if changes.finish_registration {
            user.registration_step = None;
            user.finish_registration_at = Some(now);
        }
        user.updated_at = now;

        self.users.update(&user).await?;
        debug!(user_id = %user.id_user, "user updated");
        Ok(user)
    }

    /// Record a successful login
    pub async fn touch_last_login(&self, user: &User) -> ServiceResult<User> {
        let mut user = user.clone();
        let now = Utc::now();
        user.last_login = Some(now);
        user.updated_at = now;
        self.users.update(&user).await?;
        Ok(user)
    }

    pub async fn find_or_create_login_history(
        &self,
        request: NewLoginHistory,
    ) -> ServiceResult<UserLoginHistory> {
        if let Some(token) = &request.token {
            if let Some(existing) = self.login_history.find_one_by("token", token.as_str()).await? {
                return Ok(existing);
            }
        }

        let token = request.token.unwrap_or_else(generate_token);
        let mut history = UserLoginHistory::new(request.user_id, token);
        history.ip_address = request.ip_address;
        history.browser = request.browser;
        history.device_info = request.device_info;

        self.login_history.insert(&history).await?;
        debug!(user_id = %history.user_id, "login session recorded");
        Ok(history)
    }

    /// Compare a plain password with a stored bcrypt hash
    pub async fn check_password(&self, password: &str, hashed: Option<&str>) -> ServiceResult<bool> {
        let Some(hashed) = hashed else {
            return Ok(false);
        };

        let (password, hashed) = (password.to_string(), hashed.to_string());
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed)).await?;
        // A malformed stored hash cannot match anything
        Ok(verified.unwrap_or(false))
    }

    /// The account joined with its location
    pub async fn view_profile(&self, id_user: &str) -> ServiceResult<UserProfile> {
        let user = self
            .find_one_by_id(id_user)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))?;
        self.load_profile(user).await
    }

    pub async fn load_profile(&self, user: User) -> ServiceResult<UserProfile> {
        let city = match &user.city_id {
            Some(city_id) => self.cities.find_by_id(city_id).await?,
            None => None,
        };
        let province = match city.as_ref().and_then(|city| city.province_id.as_deref()) {
            Some(province_id) => self.provinces.find_by_id(province_id).await?,
            None => None,
        };
        let country = match province.as_ref().and_then(|province| province.country_id.as_deref()) {
            Some(country_id) => self.countries.find_by_id(country_id).await?,
            None => None,
        };

        Ok(UserProfile {
            user,
            city,
            province,
            country,
        })
    }

    async fn hash_password(&self, password: &str) -> ServiceResult<String> {
        let (password, cost) = (password.to_string(), self.hash_cost);
        Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
    }
}

/// 32 random bytes, hex encoded
pub fn generate_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

fn generate_socket_token() -> String {
    let raw = format!(
        "user-{}{}",
        Utc::now().format("%d%m%Y"),
        hex::encode(rand::random::<[u8; 32]>())
    );
    let digest = Sha256::digest(raw.as_bytes());
    format!("{}{}", hex::encode(digest), hex::encode(rand::random::<[u8; 3]>()))
}
