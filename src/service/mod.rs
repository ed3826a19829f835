//! Business operations behind the HTTP surface

pub mod auth;
pub mod email;
pub mod error;
pub mod event;
pub mod location;
pub mod pagination;
pub mod user;

pub use auth::{AuthResponse, AuthService, CompleteProfileRequest, LoginRequest, LoginResponse, RegisterRequest};
pub use email::EmailService;
pub use error::{FieldErrors, ServiceError, ServiceResult};
pub use event::{CategoryQuery, EventQuery, EventService, EventTimeFilter};
pub use location::{CityQuery, CountryQuery, LocationService};
pub use pagination::{Page, PageRequest};
pub use user::{UserProfile, UserService, UserSummary};
