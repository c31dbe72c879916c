//! End-to-end login flow through the real router.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, StatusCode};
use axum_test::{TestResponse, TestServer};
use serde_json::Value;
use tempfile::TempDir;

use sessiongate::{
    auth::{password, AuthError, UserIdentity, Verifier},
    config::{Config, Messages},
    db::{self, DbPool},
    routes,
    state::AppState,
};

struct App {
    _temp: TempDir,
    server: TestServer,
    messages: Messages,
    pool: DbPool,
}

impl App {
    fn session_rows(&self) -> i64 {
        let conn = db::try_lock(&self.pool).unwrap();
        conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap()
    }
}

fn app() -> App {
    app_with(|_| {})
}

fn app_with(customize: impl FnOnce(&mut AppState)) -> App {
    let temp = TempDir::new().unwrap();
    let config = Config {
        database_path: temp.path().join("app.db"),
        ..Config::default()
    };
    let messages = config.messages.clone();

    let pool = db::init_db(&config.database_path).unwrap();
    {
        let conn = db::try_lock(&pool).unwrap();
        let hash = password::hash_password("admin").unwrap();
        db::seed_user(&conn, "admin", &hash).unwrap();
    }

    let mut state = AppState::new(config, pool.clone());
    customize(&mut state);

    let mut server = TestServer::new(routes::router(state)).unwrap();
    server.save_cookies();

    App {
        _temp: temp,
        server,
        messages,
        pool,
    }
}

fn location(response: &TestResponse) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[derive(serde::Serialize)]
struct LoginForm<'a> {
    username: &'a str,
    password: &'a str,
}

async fn log_in(app: &App, username: &str, password: &str) -> TestResponse {
    app.server
        .post("/auth/login")
        .form(&LoginForm { username, password })
        .await
}

#[tokio::test]
async fn anonymous_protected_access_redirects_to_login() {
    let app = app();

    let response = app.server.get("/protected").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login");

    let login = app.server.get("/auth/login").await;
    login.assert_status_ok();
    assert!(login.text().contains(&app.messages.must_log_in));

    // flash is shown once
    let again = app.server.get("/auth/login").await;
    assert!(!again.text().contains(&app.messages.must_log_in));
}

#[tokio::test]
async fn login_returns_to_first_attempted_path() {
    let app = app();

    app.server.get("/protected").await;
    app.server.get("/protected?second=1").await;

    let response = log_in(&app, "admin", "admin").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/protected");

    let page = app.server.get("/protected").await;
    page.assert_status_ok();
    let body = page.text();
    assert!(body.contains("admin"));
    assert!(body.contains(&app.messages.logged_in));
}

#[tokio::test]
async fn login_without_pending_path_lands_on_index() {
    let app = app();

    let response = log_in(&app, "admin", "admin").await;
    assert_eq!(location(&response), "/");

    let index = app.server.get("/").await;
    let body = index.text();
    assert!(body.contains("Logged in as"));
    assert!(body.contains(&app.messages.logged_in));
}

#[tokio::test]
async fn failed_logins_flash_the_reason() {
    let app = app();
    let cases = [
        ("admin", "wrong", app.messages.invalid_credentials.clone()),
        ("nobody", "x", app.messages.unknown_user.clone()),
        ("", "x", app.messages.missing_username.clone()),
        ("admin", "", app.messages.missing_password.clone()),
    ];

    for (username, password, expected) in cases {
        let response = log_in(&app, username, password).await;
        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login");

        let page = app.server.get("/auth/login").await;
        assert!(
            page.text().contains(&expected),
            "expected {:?} after login as {:?}",
            expected,
            username
        );
    }

    // still anonymous
    let response = app.server.get("/protected").await;
    assert_eq!(location(&response), "/auth/login");
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = app();
    log_in(&app, "admin", "admin").await;
    app.server.get("/protected").await.assert_status_ok();

    let response = app.server.get("/auth/logout").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let index = app.server.get("/").await;
    let body = index.text();
    assert!(body.contains(&app.messages.logged_out));
    assert!(body.contains("You are not logged in."));

    let protected = app.server.get("/protected").await;
    assert_eq!(location(&protected), "/auth/login");
}

#[tokio::test]
async fn logout_while_anonymous_is_harmless() {
    let app = app();
    let response = app.server.get("/auth/logout").await;
    assert_eq!(location(&response), "/");
    assert!(app.server.get("/").await.text().contains(&app.messages.logged_out));
}

#[tokio::test]
async fn unauthenticated_target_flashes_default_message() {
    let app = app();
    let response = app.server.post("/auth/unauthenticated").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login");

    let page = app.server.get("/auth/login").await;
    assert!(page.text().contains(&app.messages.must_log_in));

    // nothing was recorded, so login lands on the index
    let login = log_in(&app, "admin", "admin").await;
    assert_eq!(location(&login), "/");
}

async fn assert_bounced_with_default_message(app: &App, response: TestResponse) {
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login");
    let page = app.server.get("/auth/login").await;
    assert!(page.text().contains(&app.messages.must_log_in));
}

#[tokio::test]
async fn unusable_login_bodies_go_through_the_failure_handler() {
    let app = app();

    let empty = app.server.post("/auth/login").await;
    assert_bounced_with_default_message(&app, empty).await;

    let plain = app.server.post("/auth/login").text("username=admin&password=admin").await;
    assert_bounced_with_default_message(&app, plain).await;

    let duplicated = app
        .server
        .post("/auth/login")
        .content_type("application/x-www-form-urlencoded")
        .bytes(Bytes::from_static(b"username=a&username=b&password=x"))
        .await;
    assert_bounced_with_default_message(&app, duplicated).await;

    // still anonymous
    let protected = app.server.get("/protected").await;
    assert_eq!(location(&protected), "/auth/login");
}

struct PanickingVerifier;

impl Verifier for PanickingVerifier {
    fn verify(&self, _username: &str, _password: &str) -> Result<UserIdentity, AuthError> {
        panic!("verifier blew up");
    }
}

#[tokio::test]
async fn failed_login_task_still_redirects() {
    let app = app_with(|state| state.verifier = Arc::new(PanickingVerifier));

    let response = log_in(&app, "admin", "admin").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login");

    let page = app.server.get("/auth/login").await;
    assert!(page.text().contains(&app.messages.store_unavailable));
}

#[tokio::test]
async fn cookieless_requests_store_nothing() {
    let app = app();

    for _ in 0..50 {
        let response = app.server.get("/").await;
        response.assert_status_ok();
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        app.server.get("/auth/login").await.assert_status_ok();
    }
    assert_eq!(app.session_rows(), 0);

    // the first thing worth storing creates exactly one row
    app.server.get("/protected").await;
    assert_eq!(app.session_rows(), 1);
}

#[tokio::test]
async fn logout_removes_the_old_row() {
    let app = app();
    log_in(&app, "admin", "admin").await;
    assert_eq!(app.session_rows(), 1);

    app.server.get("/auth/logout").await;
    // only the row carrying the logout flash is left
    assert_eq!(app.session_rows(), 1);
    app.server.get("/").await;
    app.server.get("/protected").await;
    assert_eq!(app.session_rows(), 1);
}

#[tokio::test]
async fn session_cookie_is_http_only() {
    let app = app();
    let response = app.server.get("/protected").await;
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("sg_session="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn health_is_outside_the_session_layer() {
    let app = app();
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
}
