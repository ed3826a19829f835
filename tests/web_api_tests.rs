use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use hifella::app::{Queues, build_state, open_sources};
use hifella::domain::{User, UserLoginHistory};
use hifella::queue::{EMAIL_QUEUE, EmailJob, EmailJobHandler, JobError, JobQueue, Mailer, QueueConfig};
use hifella::seed::seed_demo_data;
use hifella::service::{AuthService, EmailService, EventService, LocationService, UserService};
use hifella::web::{AppState, build_router};
use hifella::{ConnectionConfig, DEFAULT_ALIAS, DataSources, Repository, TransactionManager};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<EmailJob>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &EmailJob) -> Result<(), JobError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

fn state_for(sources: &DataSources) -> AppState {
    let users = UserService::new(sources).unwrap().with_hash_cost(4);
    let auth = AuthService::new(users, TransactionManager::new(sources.clone()));
    AppState::new(
        auth,
        LocationService::new(sources).unwrap(),
        EventService::new(sources).unwrap(),
    )
}

async fn app(name: &str) -> (DataSources, Router) {
    let sources = open_sources(ConnectionConfig::new(name)).unwrap();
    seed_demo_data(&sources).await.unwrap();
    let router = build_router(state_for(&sources));
    (sources, router)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn register(router: &Router, email: &str) -> String {
    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/v1/auth/register",
            json!({
                "email": email,
                "password": "rahasia123",
                "password_confirmation": "rahasia123",
                "utm_source": "newsletter"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["token_bearer"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let (_, router) = app("web_health").await;

    let (status, body) = send(&router, get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_register_then_view_profile() {
    let (sources, router) = app("web_register").await;

    let token = register(&router, "ayu@hifella.id").await;
    let (status, body) = send(&router, get("/v1/user/profile", Some(&token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "View Profile");
    assert_eq!(body["data"]["email"], "ayu@hifella.id");

    let users: Repository<User> = Repository::new(&sources).unwrap();
    let user = users.find_one_by("email", "ayu@hifella.id").await.unwrap().unwrap();
    assert_eq!(user.utm.utm_source.as_deref(), Some("newsletter"));
}

#[tokio::test]
async fn test_register_validation_errors_per_field() {
    let (_, router) = app("web_register_invalid").await;

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/v1/auth/register",
            json!({ "email": "ayu", "password": "short", "password_confirmation": "nope" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["code"], 400);
    assert!(body["field_errors"]["email"].is_string());
    assert!(body["field_errors"]["password"].is_string());
    assert!(body["field_errors"]["password_confirmation"].is_string());
}

#[tokio::test]
async fn test_malformed_body_is_a_bad_request() {
    let (_, router) = app("web_malformed").await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"email\":"))
        .unwrap();
    let (status, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["body"].is_string());
}

#[tokio::test]
async fn test_login_records_client_ip_from_proxy_header() {
    let (sources, router) = app("web_login").await;
    register(&router, "budi@hifella.id").await;

    let mut request = json_request(
        "POST",
        "/v1/auth/login",
        json!({ "email": "budi@hifella.id", "password": "rahasia123" }),
    );
    request
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
    let (status, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login success");
    let token = body["data"]["token_bearer"].as_str().unwrap();

    let sessions: Repository<UserLoginHistory> = Repository::new(&sources).unwrap();
    let session = sessions.find_one_by("token", token).await.unwrap().unwrap();
    assert_eq!(session.ip_address.as_deref(), Some("203.0.113.7"));
}

#[tokio::test]
async fn test_login_failures() {
    let (_, router) = app("web_login_fail").await;
    register(&router, "citra@hifella.id").await;

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/v1/auth/login",
            json!({ "email": "citra@hifella.id", "password": "wrong-password" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 401);
    assert!(body["field_errors"]["password"].is_string());
}

#[tokio::test]
async fn test_protected_routes_need_a_valid_token() {
    let (_, router) = app("web_unauthorized").await;

    let (status, body) = send(&router, get("/v1/user/profile", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "failed");

    let (status, _) = send(&router, get("/v1/user/profile", Some("forged"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deactivated_account_is_forbidden() {
    let (sources, router) = app("web_forbidden").await;
    let token = register(&router, "dewi@hifella.id").await;

    let users: Repository<User> = Repository::new(&sources).unwrap();
    let mut user = users.find_one_by("email", "dewi@hifella.id").await.unwrap().unwrap();
    user.account_status = false;
    users.update(&user).await.unwrap();

    let (status, body) = send(&router, get("/v1/user/profile", Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 403);
}

#[tokio::test]
async fn test_complete_profile_only_once() {
    let (_, router) = app("web_complete").await;
    let token = register(&router, "eka@hifella.id").await;

    let complete = || {
        let mut request = json_request(
            "POST",
            "/v1/auth/complete-profile",
            json!({
                "fullname": "Eka Putri",
                "gender": "female",
                "birth_date": "1998-02-20",
                "city_id": "jakarta-selatan",
                "phone_code": "+62",
                "phone_number": "81200011122"
            }),
        );
        request
            .headers_mut()
            .insert(header::AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        request
    };

    let (status, body) = send(&router, complete()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["registration_complete"], true);
    assert_eq!(body["data"]["user"]["city"]["name"], "Jakarta Selatan");
    assert_eq!(body["data"]["user"]["city"]["country"], "Indonesia");

    let (status, body) = send(&router, complete()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Registration had been completed previously");
}

#[tokio::test]
async fn test_event_listing_and_detail() {
    let (_, router) = app("web_events").await;

    let (status, body) = send(&router, get("/v1/event?category=music&limit=5", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["data"][0]["id"], "evt-jazz-night");
    assert_eq!(body["data"]["data"][0]["price"], "75000");

    let (status, body) = send(&router, get("/v1/event/evt-city-run", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["time"]["long"], "1 hour");
    assert_eq!(body["data"]["tickets"].as_array().unwrap().len(), 2);

    let (status, body) = send(&router, get("/v1/event/evt-missing", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Event not found");

    let (status, body) = send(&router, get("/v1/event/subcategories?category=sports", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["data"][0]["slug"], "running");
}

#[tokio::test]
async fn test_invalid_query_is_a_bad_request() {
    let (_, router) = app("web_bad_query").await;

    let (status, body) = send(&router, get("/v1/event?page=first", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["field_errors"]["query"].is_string());

    let (status, _) = send(&router, get("/v1/event?time=fortnight", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_location_listing() {
    let (_, router) = app("web_locations").await;

    let (status, body) = send(&router, get("/v1/location/countries?search=indo", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["data"][0]["phone_code"], "+62");

    let (status, body) = send(&router, get("/v1/location/cities?country_id=SG", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["data"][0]["name"], "Singapore");
}

#[tokio::test]
async fn test_unknown_route_uses_envelope() {
    let (_, router) = app("web_fallback").await;

    let (status, body) = send(&router, get("/v2/anything", None)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "failed");
}

#[tokio::test]
async fn test_internal_errors_hide_detail_outside_local() {
    // tables are never created, so every query fails inside the datastore
    let sources = DataSources::new()
        .with_config(DEFAULT_ALIAS, ConnectionConfig::new("web_internal"))
        .unwrap();

    let production = build_router(state_for(&sources));
    let (status, body) = send(&production, get("/v1/location/countries", None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");
    assert!(body.get("msg").is_none());

    let local = build_router(state_for(&sources).expose_errors(true));
    let (status, body) = send(&local, get("/v1/location/countries", None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["msg"].as_str().unwrap().contains("countries"));
}

#[tokio::test]
async fn test_test_email_reaches_the_mailer() {
    let sources = open_sources(ConnectionConfig::new("web_test_email")).unwrap();
    let mailer = Arc::new(RecordingMailer::default());
    let (queue, _worker) = JobQueue::start(
        EMAIL_QUEUE,
        Arc::new(EmailJobHandler::new(mailer.clone())),
        QueueConfig::default(),
    );
    let router = build_router(state_for(&sources).with_email(EmailService::new(queue.clone())));

    let (status, body) = send(&router, json_request("POST", "/v1/test-email", json!({}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "test email sent successfully");
    assert!(body["data"]["job_id"].is_string());

    tokio::time::timeout(Duration::from_secs(5), async {
        while queue.stats().completed() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let sent = mailer.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "test@hi-fella.com");
    assert_eq!(sent[0].template_name, "test");
}

#[tokio::test]
async fn test_test_email_without_queue_is_an_internal_error() {
    let (_, router) = app("web_test_email_missing").await;

    let (status, body) = send(&router, json_request("POST", "/v1/test-email", json!({}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");
}

#[tokio::test]
async fn test_huge_page_number_returns_an_empty_page() {
    let (_, router) = app("web_huge_page").await;

    let uri = format!("/v1/location/countries?page={}", usize::MAX);
    let (status, body) = send(&router, get(&uri, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["total_pages"], 1);
    assert!(body["data"]["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_application_state_schedules_email_on_its_queue() {
    let sources = open_sources(ConnectionConfig::new("web_state_email")).unwrap();
    let queues = Queues::start(QueueConfig::default());
    let router = build_router(build_state(&sources, Some(&queues), false).unwrap());

    let (status, _) = send(&router, json_request("POST", "/v1/test-email", json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    tokio::time::timeout(Duration::from_secs(5), async {
        while queues.email.stats().completed() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    // the router holds producer clones; workers stop once it is gone
    drop(router);
    tokio::time::timeout(Duration::from_secs(5), queues.shutdown())
        .await
        .unwrap();
}
