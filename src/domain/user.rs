use crate::repository::Entity;
use crate::storage::TableSchema;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Registration step of an account that still has to complete its profile
pub const REGISTRATION_STEP_PROFILE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationType {
    Manual,
    Google,
}

impl RegistrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationType::Manual => "manual",
            RegistrationType::Google => "google",
        }
    }
}

/// Marketing attribution captured at registration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UtmParams {
    pub utm_id: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id_user: String,
    pub email: String,
    pub password: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub phone_code: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub city_id: Option<String>,
    pub profile_image: Option<String>,
    pub banner_image: Option<String>,
    pub account_status: bool,
    pub token_socket: Option<String>,
    pub token_bearer: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub email_verified_at: Option<DateTime<Utc>>,
    /// `Some(1)` while the profile is incomplete, `None` once finished
    pub registration_step: Option<i32>,
    pub registration_type: Option<RegistrationType>,
    pub finish_registration_at: Option<DateTime<Utc>>,
    pub about: Option<String>,
    pub google_id: Option<String>,
    #[serde(flatten)]
    pub utm: UtmParams,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// A fresh manual registration
    pub fn new(email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id_user: uuid::Uuid::new_v4().to_string(),
            email: email.into(),
            password: None,
            name: None,
            phone: None,
            phone_code: None,
            gender: None,
            birthdate: None,
            city_id: None,
            profile_image: None,
            banner_image: None,
            account_status: true,
            token_socket: None,
            token_bearer: None,
            last_login: None,
            email_verified_at: None,
            registration_step: Some(REGISTRATION_STEP_PROFILE),
            registration_type: Some(RegistrationType::Manual),
            finish_registration_at: None,
            about: None,
            google_id: None,
            utm: UtmParams::default(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Whether the account finished its profile
    pub fn is_registration_complete(&self) -> bool {
        self.registration_step.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Entity for User {
    const TABLE: &'static str = "users";

    fn id(&self) -> String {
        self.id_user.clone()
    }

    fn schema() -> TableSchema {
        TableSchema::new(Self::TABLE).unique("email")
    }
}

/// One login session of a user; its token authenticates bearer requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLoginHistory {
    pub id_user_login_history: String,
    pub user_id: String,
    pub city_id: Option<String>,
    pub ip_address: Option<String>,
    pub isp_provider: Option<String>,
    pub browser: Option<String>,
    pub device_info: Option<String>,
    pub city_name: Option<String>,
    pub token: Option<String>,
    pub logout_at: Option<DateTime<Utc>>,
    pub session_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl UserLoginHistory {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id_user_login_history: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            city_id: None,
            ip_address: None,
            isp_provider: None,
            browser: None,
            device_info: None,
            city_name: None,
            token: Some(token.into()),
            logout_at: None,
            session_status: Some("active".to_string()),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Not logged out and not deleted
    pub fn is_active(&self) -> bool {
        self.logout_at.is_none() && self.deleted_at.is_none()
    }
}

impl Entity for UserLoginHistory {
    const TABLE: &'static str = "user_login_history";

    fn id(&self) -> String {
        self.id_user_login_history.clone()
    }

    fn schema() -> TableSchema {
        TableSchema::new(Self::TABLE).unique("token")
    }
}
