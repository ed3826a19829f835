use super::{ApiError, ApiResponse, ApiResult, AppState, AuthUser, ClientIp};
use crate::service::event::{CategoryItem, EventDetail, EventItem};
use crate::service::location::{CityItem, CountryItem};
use crate::service::{
    AuthResponse, CategoryQuery, CityQuery, CompleteProfileRequest, CountryQuery, EventQuery, FieldErrors,
    LoginRequest, LoginResponse, Page, RegisterRequest, ServiceError, UserSummary,
};
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub async fn health() -> ApiResponse<Health> {
    ApiResponse::success(Health { status: "ok" })
}

pub async fn not_found(State(state): State<AppState>) -> ApiError {
    state.reject(ServiceError::NotFound("Route not found".into()))
}

pub async fn register(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<AuthResponse>> {
    let request = body(&state, payload)?;
    let response = state
        .auth
        .register(request, ip.as_deref())
        .await
        .map_err(|err| state.reject(err))?;
    Ok(ApiResponse::created(response))
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<LoginResponse>> {
    let request = body(&state, payload)?;
    let response = state
        .auth
        .login(request, ip.as_deref())
        .await
        .map_err(|err| state.reject(err))?;
    Ok(ApiResponse::success(response).with_message("Login success"))
}

pub async fn complete_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<CompleteProfileRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<AuthResponse>> {
    let request = body(&state, payload)?;
    let response = state
        .auth
        .complete_profile(&auth.user, &auth.token, request)
        .await
        .map_err(|err| state.reject(err))?;
    Ok(ApiResponse::success(response).with_message("Profile completed"))
}

pub async fn view_profile(State(state): State<AppState>, auth: AuthUser) -> ApiResult<ApiResponse<UserSummary>> {
    let profile = state
        .users()
        .load_profile(auth.user)
        .await
        .map_err(|err| state.reject(err))?;
    Ok(ApiResponse::success(profile.summary()).with_message("View Profile"))
}

pub async fn countries(
    State(state): State<AppState>,
    query: Result<Query<CountryQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<Page<CountryItem>>> {
    let query = params(&state, query)?;
    let page = state
        .locations
        .get_countries(query)
        .await
        .map_err(|err| state.reject(err))?;
    Ok(ApiResponse::success(page))
}

pub async fn cities(
    State(state): State<AppState>,
    query: Result<Query<CityQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<Page<CityItem>>> {
    let query = params(&state, query)?;
    let page = state
        .locations
        .get_cities(query)
        .await
        .map_err(|err| state.reject(err))?;
    Ok(ApiResponse::success(page))
}

pub async fn events(
    State(state): State<AppState>,
    query: Result<Query<EventQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<Page<EventItem>>> {
    let query = params(&state, query)?;
    let page = state.events.get_events(query).await.map_err(|err| state.reject(err))?;
    Ok(ApiResponse::success(page))
}

pub async fn event_categories(
    State(state): State<AppState>,
    query: Result<Query<CategoryQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<Page<CategoryItem>>> {
    let query = params(&state, query)?;
    let page = state
        .events
        .get_event_categories(query)
        .await
        .map_err(|err| state.reject(err))?;
    Ok(ApiResponse::success(page))
}

pub async fn event_subcategories(
    State(state): State<AppState>,
    query: Result<Query<CategoryQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<Page<CategoryItem>>> {
    let query = params(&state, query)?;
    let page = state
        .events
        .get_event_subcategories(query)
        .await
        .map_err(|err| state.reject(err))?;
    Ok(ApiResponse::success(page))
}

pub async fn event_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<EventDetail>> {
    let detail = state
        .events
        .get_event_detail(&id)
        .await
        .map_err(|err| state.reject(err))?;
    Ok(ApiResponse::success(detail))
}

#[derive(Debug, Serialize)]
pub struct ScheduledEmail {
    pub job_id: String,
}

pub async fn test_email(State(state): State<AppState>) -> ApiResult<ApiResponse<ScheduledEmail>> {
    let job_id = state
        .email()?
        .send_test_email()
        .map_err(|err| state.reject(err))?;
    Ok(ApiResponse::success(ScheduledEmail { job_id }).with_message("test email sent successfully"))
}

fn body<T>(state: &AppState, payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| invalid_input(state, "body", rejection.body_text()))
}

fn params<T>(state: &AppState, query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| invalid_input(state, "query", rejection.body_text()))
}

fn invalid_input(state: &AppState, field: &str, detail: String) -> ApiError {
    let mut field_errors = FieldErrors::new();
    field_errors.insert(field.to_string(), detail);
    state.reject(ServiceError::Validation {
        message: "Invalid input".to_string(),
        field_errors,
    })
}
