use super::user::{NewLoginHistory, NewUser, UserChanges, UserService, UserSummary};
use super::{FieldErrors, ServiceError, ServiceResult};
use crate::domain::{REGISTRATION_STEP_PROFILE, User, UtmParams};
use crate::queue::{JobQueue, USER_SYNC_QUEUE, UserSyncJob};
use crate::transaction::TransactionManager;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub browser: Option<String>,
    pub device_info: Option<String>,
    #[serde(flatten)]
    pub utm: UtmParams,
}

impl RegisterRequest {
    pub fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, &self.email);

        if self.password.is_empty() {
            errors.insert("password".into(), "Password is required.".into());
        } else if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.insert(
                "password".into(),
                format!("Password must be at least {} characters.", MIN_PASSWORD_LEN),
            );
        }

        if self.password_confirmation != self.password {
            errors.insert(
                "password_confirmation".into(),
                "Password confirmation does not match.".into(),
            );
        }

        into_result(errors)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub browser: Option<String>,
    pub device_info: Option<String>,
}

impl LoginRequest {
    pub fn validate(&self) -> ServiceResult<()> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, &self.email);
        if self.password.is_empty() {
            errors.insert("password".into(), "Password is required.".into());
        }
        into_result(errors)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompleteProfileRequest {
    pub fullname: String,
    pub gender: String,
    /// `YYYY-MM-DD`
    pub birth_date: String,
    pub city_id: String,
    pub phone_code: String,
    pub phone_number: String,
}

impl CompleteProfileRequest {
    /// Validate and turn the request into a profile update
    pub fn into_changes(self) -> ServiceResult<UserChanges> {
        let mut errors = FieldErrors::new();

        if self.fullname.trim().is_empty() {
            errors.insert("fullname".into(), "Full name is required.".into());
        }
        if !matches!(self.gender.as_str(), "male" | "female") {
            errors.insert("gender".into(), "Gender must be male or female.".into());
        }
        let birthdate = NaiveDate::parse_from_str(&self.birth_date, "%Y-%m-%d").ok();
        if birthdate.is_none() {
            errors.insert("birth_date".into(), "Birth date must use the YYYY-MM-DD format.".into());
        }
        if self.city_id.trim().is_empty() {
            errors.insert("city_id".into(), "City is required.".into());
        }
        if self.phone_code.trim().is_empty() {
            errors.insert("phone_code".into(), "Phone code is required.".into());
        }
        let phone = self.phone_number.trim();
        if phone.len() < 6 || !phone.chars().all(|c| c.is_ascii_digit()) {
            errors.insert("phone_number".into(), "Phone number must contain at least 6 digits.".into());
        }

        into_result(errors)?;

        Ok(UserChanges {
            name: Some(self.fullname.trim().to_string()),
            gender: Some(self.gender),
            birthdate,
            city_id: Some(self.city_id),
            phone_code: Some(self.phone_code),
            phone: Some(phone.to_string()),
            password: None,
            finish_registration: true,
        })
    }
}

/// Returned by registration and profile completion
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub registration_type: Option<String>,
    pub registration_complete: bool,
    pub token_bearer: Option<String>,
    pub token_socket: Option<String>,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token_bearer: Option<String>,
    pub token_socket: Option<String>,
    pub user: UserSummary,
}

#[derive(Clone, Debug)]
pub struct AuthService {
    users: UserService,
    transactions: TransactionManager,
    user_sync: Option<JobQueue>,
}

impl AuthService {
    pub fn new(users: UserService, transactions: TransactionManager) -> Self {
        Self {
            users,
            transactions,
            user_sync: None,
        }
    }

    /// Push every new registration to the user-sync queue
    pub fn with_user_sync(mut self, queue: JobQueue) -> Self {
        self.user_sync = Some(queue);
        self
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    /// Create the account and its first login session in one unit of work
    pub async fn register(&self, request: RegisterRequest, ip: Option<&str>) -> ServiceResult<AuthResponse> {
        request.validate()?;
        let email = normalize_email(&request.email);

        let user = self
            .transactions
            .run_default(|| async {
                let user = self
                    .users
                    .create_user(NewUser {
                        email: email.clone(),
                        password: request.password.clone(),
                        utm: request.utm.clone(),
                    })
                    .await?;

                self.users
                    .find_or_create_login_history(NewLoginHistory {
                        user_id: user.id_user.clone(),
                        token: user.token_bearer.clone(),
                        ip_address: ip.map(str::to_string),
                        browser: request.browser.clone(),
                        device_info: request.device_info.clone(),
                    })
                    .await?;

                Ok::<_, ServiceError>(user)
            })
            .await?;

        self.enqueue_user_sync(&user);

        let profile = self.users.load_profile(user).await?;
        Ok(AuthResponse {
            registration_type: profile.user.registration_type.map(|kind| kind.as_str().to_string()),
            registration_complete: false,
            token_bearer: profile.user.token_bearer.clone(),
            token_socket: profile.user.token_socket.clone(),
            user: profile.summary(),
        })
    }

    pub async fn login(&self, request: LoginRequest, ip: Option<&str>) -> ServiceResult<LoginResponse> {
        request.validate()?;
        let email = normalize_email(&request.email);

        let user = self.users.find_by_email(&email).await?.ok_or_else(|| {
            ServiceError::unauthorized("Invalid credentials").with_field(
                "email",
                "We couldn't recognize that email. Please make sure it's correct.",
            )
        })?;

        if !self
            .users
            .check_password(&request.password, user.password.as_deref())
            .await?
        {
            return Err(ServiceError::unauthorized("Invalid credentials")
                .with_field("password", "Incorrect password. Double-check and try again."));
        }

        if !user.account_status {
            return Err(ServiceError::Forbidden("Your account has been deactivated".into()));
        }

        let (user, session) = self
            .transactions
            .run_default(|| async {
                let session = self
                    .users
                    .find_or_create_login_history(NewLoginHistory {
                        user_id: user.id_user.clone(),
                        token: None,
                        ip_address: ip.map(str::to_string),
                        browser: request.browser.clone(),
                        device_info: request.device_info.clone(),
                    })
                    .await?;
                let user = self.users.touch_last_login(&user).await?;
                Ok::<_, ServiceError>((user, session))
            })
            .await?;

        info!(user_id = %user.id_user, "user logged in");

        let profile = self.users.load_profile(user).await?;
        Ok(LoginResponse {
            token_bearer: session.token,
            token_socket: profile.user.token_socket.clone(),
            user: profile.summary(),
        })
    }

    /// Resolve a bearer token to its account
    ///
    /// Login session tokens are checked first, then the token issued at
    /// registration.
    pub async fn validate_token(&self, token: &str) -> ServiceResult<Option<User>> {
        if let Some(session) = self.users.find_login_by_token(token).await? {
            if let Some(user) = self.users.find_one_by_id(&session.user_id).await? {
                return Ok(Some(user));
            }
        }
        self.users.find_by_token(token).await
    }

    pub async fn complete_profile(
        &self,
        user: &User,
        token: &str,
        request: CompleteProfileRequest,
    ) -> ServiceResult<AuthResponse> {
        if user.registration_step != Some(REGISTRATION_STEP_PROFILE) {
            return Err(ServiceError::bad_request(
                "Registration had been completed previously",
            ));
        }

        let changes = request.into_changes()?;
        let users = &self.users;
        let user_id = user.id_user.clone();
        let updated = self
            .transactions
            .run_default(move || async move { users.update_user(&user_id, changes).await })
            .await?;

        info!(user_id = %updated.id_user, "registration completed");

        let profile = self.users.load_profile(updated).await?;
        Ok(AuthResponse {
            registration_type: profile.user.registration_type.map(|kind| kind.as_str().to_string()),
            registration_complete: true,
            token_bearer: Some(token.to_string()),
            token_socket: profile.user.token_socket.clone(),
            user: profile.summary(),
        })
    }

    fn enqueue_user_sync(&self, user: &User) {
        let Some(queue) = &self.user_sync else {
            return;
        };

        let job = UserSyncJob {
            user_id: user.id_user.clone(),
            email: user.email.clone(),
        };
        if let Err(err) = queue.enqueue(USER_SYNC_QUEUE, &job) {
            warn!(user_id = %user.id_user, error = %err, "user sync not scheduled");
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_email(errors: &mut FieldErrors, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        errors.insert("email".into(), "Email is required.".into());
        return;
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|part| !part.is_empty())
        }
        None => false,
    };
    if !valid {
        errors.insert("email".into(), "Email is not valid.".into());
    }
}

fn into_result(errors: FieldErrors) -> ServiceResult<()> {
    if errors.is_empty() {
        return Ok(());
    }
    Err(ServiceError::Validation {
        message: "Invalid input".into(),
        field_errors: errors,
    })
}
