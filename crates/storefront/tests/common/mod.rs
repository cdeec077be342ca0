//! Shared fixtures for storefront integration tests.
//!
//! `FakeUserService` is a small axum app bound to `127.0.0.1:0` that speaks
//! the user service's REST dialect. `TestClient` drives the real storefront
//! router with `oneshot`, carrying the session cookie between requests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Body,
    extract::{Multipart, Path as UrlPath, State},
    http::{HeaderMap, Request, Response, StatusCode, header},
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use atelier_core::Catalog;
use atelier_storefront::config::StorefrontConfig;
use atelier_storefront::content::ContentStore;
use atelier_storefront::state::AppState;

pub const EMAIL: &str = "emma@example.com";
pub const PASSWORD: &str = "correct-horse";
pub const USER_ID: i64 = 42;
pub const ACCESS_TOKEN: &str = "at-1";

// =============================================================================
// Fake user service
// =============================================================================

/// What the fake service has seen and how it should answer.
#[derive(Default)]
pub struct ServiceLog {
    pub signups: Vec<Value>,
    pub logouts: usize,
    pub refreshes: usize,
    pub password_changes: usize,
    pub avatars: Vec<(String, usize)>,
    /// Reject every bearer token with 401.
    pub reject_tokens: bool,
    /// Reject every refresh token with 401.
    pub reject_refresh: bool,
    /// Access token lifetime handed out on login.
    pub expires_in: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image_url: Option<String>,
}

type Shared = Arc<Mutex<ServiceLog>>;

pub struct FakeUserService {
    pub addr: SocketAddr,
    pub log: Shared,
}

impl FakeUserService {
    pub async fn start() -> Self {
        let log: Shared = Arc::new(Mutex::new(ServiceLog {
            first_name: "Emma".to_string(),
            last_name: "Reed".to_string(),
            email: EMAIL.to_string(),
            expires_in: 900,
            ..ServiceLog::default()
        }));

        let app = Router::new()
            .route("/auth/log-in", post(login))
            .route("/auth/refresh", post(refresh))
            .route("/auth/log-out", post(logout))
            .route("/users/customer/create", post(signup))
            .route("/users/{id}", get(get_user).patch(update_user))
            .route("/users/{id}/password", put(change_password))
            .route("/users/{id}/image", post(upload_image))
            .with_state(log.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, log }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, ServiceLog> {
        self.log.lock().unwrap()
    }
}

fn error(status: StatusCode, code: &str, message: &str) -> axum::response::Response {
    (
        status,
        Json(json!({ "error": { "code": code, "type": "CLIENT", "message": message } })),
    )
        .into_response()
}

fn user_json(log: &ServiceLog) -> Value {
    json!({
        "userId": USER_ID,
        "firstName": log.first_name,
        "lastName": log.last_name,
        "phoneNumber": null,
        "email": log.email,
        "imageUrl": log.image_url,
    })
}

fn authorized(headers: &HeaderMap, log: &ServiceLog) -> bool {
    !log.reject_tokens
        && headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {ACCESS_TOKEN}"))
}

async fn login(State(log): State<Shared>, Json(body): Json<Value>) -> axum::response::Response {
    if body["username"] == EMAIL && body["password"] == PASSWORD {
        let expires_in = log.lock().unwrap().expires_in;
        Json(json!({
            "userId": USER_ID,
            "accessToken": ACCESS_TOKEN,
            "refreshToken": "rt-1",
            "expiresIn": expires_in,
            "roles": ["CUSTOMER"],
        }))
        .into_response()
    } else {
        error(
            StatusCode::UNAUTHORIZED,
            "BAD_CREDENTIALS",
            "Invalid username or password",
        )
    }
}

async fn refresh(State(log): State<Shared>, Json(body): Json<Value>) -> axum::response::Response {
    let mut log = log.lock().unwrap();
    log.refreshes += 1;
    if body["refreshToken"] == "rt-1" && !log.reject_refresh {
        Json(json!({ "accessToken": ACCESS_TOKEN, "expiresIn": 900 })).into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn logout(State(log): State<Shared>) -> StatusCode {
    log.lock().unwrap().logouts += 1;
    StatusCode::NO_CONTENT
}

async fn signup(State(log): State<Shared>, Json(body): Json<Value>) -> axum::response::Response {
    if body["email"] == "taken@example.com" {
        return error(
            StatusCode::CONFLICT,
            "USER_EXISTS",
            "An account with this email already exists",
        );
    }
    log.lock().unwrap().signups.push(body);
    StatusCode::CREATED.into_response()
}

async fn get_user(
    State(log): State<Shared>,
    headers: HeaderMap,
    UrlPath(_id): UrlPath<i64>,
) -> axum::response::Response {
    let log = log.lock().unwrap();
    if !authorized(&headers, &log) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(user_json(&log)).into_response()
}

async fn update_user(
    State(log): State<Shared>,
    headers: HeaderMap,
    UrlPath(_id): UrlPath<i64>,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let mut log = log.lock().unwrap();
    if !authorized(&headers, &log) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    log.first_name = body["firstName"].as_str().unwrap_or_default().to_string();
    log.last_name = body["lastName"].as_str().unwrap_or_default().to_string();
    log.email = body["email"].as_str().unwrap_or_default().to_string();
    Json(user_json(&log)).into_response()
}

async fn change_password(
    State(log): State<Shared>,
    headers: HeaderMap,
    UrlPath(_id): UrlPath<i64>,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let mut log = log.lock().unwrap();
    if !authorized(&headers, &log) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if body["currentPassword"] != PASSWORD {
        return error(
            StatusCode::BAD_REQUEST,
            "BAD_PASSWORD",
            "Current password is incorrect",
        );
    }
    log.password_changes += 1;
    StatusCode::NO_CONTENT.into_response()
}

async fn upload_image(
    State(log): State<Shared>,
    headers: HeaderMap,
    UrlPath(_id): UrlPath<i64>,
    mut multipart: Multipart,
) -> axum::response::Response {
    let allowed = authorized(&headers, &log.lock().unwrap());
    if !allowed {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut received = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            let content_type = field.content_type().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap();
            received = Some((content_type, bytes.len()));
        }
    }
    let Some(received) = received else {
        return error(StatusCode::BAD_REQUEST, "NO_FILE", "No file uploaded");
    };

    let mut log = log.lock().unwrap();
    log.avatars.push(received);
    log.image_url = Some("https://cdn.example.com/u/42.png".to_string());
    Json(user_json(&log)).into_response()
}

// =============================================================================
// Storefront under test
// =============================================================================

/// Build the storefront state against the given user service URL.
pub fn state(api_url: &str) -> AppState {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let mut config = StorefrontConfig::new(
        url::Url::parse(api_url).unwrap(),
        "http://localhost:3000",
    );
    config.static_dir = manifest_dir.join("static");

    let catalog = Catalog::from_json(include_str!("../../data/products.json")).unwrap();
    let content = ContentStore::load(&manifest_dir.join("content")).unwrap();

    AppState::from_parts(config, catalog, content).unwrap()
}

/// A response with its body collected.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.header("location")
    }
}

/// Drives the router and remembers the session cookie.
pub struct TestClient {
    app: Router,
    cookie: Option<String>,
}

impl TestClient {
    pub fn new(state: AppState) -> Self {
        Self {
            app: atelier_storefront::app(state),
            cookie: None,
        }
    }

    pub async fn send(&mut self, mut request: Request<Body>) -> TestResponse {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response: Response<Body> = self.app.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
        {
            let pair = set_cookie.split(';').next().unwrap_or_default().to_string();
            self.cookie = Some(pair);
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub async fn post_htmx(&mut self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header("hx-request", "true")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    /// Sign in as the fake service's customer.
    pub async fn login(&mut self) -> TestResponse {
        self.post_form("/auth/login", &[("email", EMAIL), ("password", PASSWORD)])
            .await
    }
}
