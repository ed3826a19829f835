use super::ApiError;
use crate::service::{AuthService, EmailService, EventService, LocationService, ServiceError, UserService};

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: AuthService,
    pub locations: LocationService,
    pub events: EventService,
    email: Option<EmailService>,
    expose_errors: bool,
}

impl AppState {
    pub fn new(auth: AuthService, locations: LocationService, events: EventService) -> Self {
        Self {
            auth,
            locations,
            events,
            email: None,
            expose_errors: false,
        }
    }

    /// Include internal error detail in 500 responses
    pub fn expose_errors(mut self, expose: bool) -> Self {
        self.expose_errors = expose;
        self
    }

    pub fn with_email(mut self, email: EmailService) -> Self {
        self.email = Some(email);
        self
    }

    pub fn email(&self) -> Result<&EmailService, ApiError> {
        self.email
            .as_ref()
            .ok_or_else(|| self.reject(ServiceError::Internal("email queue is not configured".into())))
    }

    pub fn users(&self) -> &UserService {
        self.auth.users()
    }

    pub fn reject(&self, error: impl Into<ServiceError>) -> ApiError {
        ApiError::new(error.into(), self.expose_errors)
    }
}
