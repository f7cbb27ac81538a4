mod common;

use auth_session::{create_routes, UserDirectory};
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use chrono::Duration;
use common::{Harness, PASSWORD};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(h: &Harness) -> Router {
    create_routes(h.state())
}

fn json_request(method: &str, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// `Cookie` header value echoing back the auth cookies a response set
fn cookie_header(response: &Response<Body>) -> String {
    set_cookies(response)
        .iter()
        .filter_map(|c| c.split(';').next().map(str::to_string))
        .collect::<Vec<_>>()
        .join("; ")
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_account(app: &Router, email: &str) -> Response<Body> {
    app.clone()
        .oneshot(json_request(
            "POST",
            "/v1/user/create-account",
            json!({ "name": "Ana Souza", "email": email, "password": PASSWORD }),
            None,
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new().await;
    let response = app(&h)
        .oneshot(empty_request("GET", "/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body, json!({ "status": "WORKING", "database": "healthy" }));
}

#[tokio::test]
async fn test_create_account_sets_cookies() {
    let h = Harness::new().await;
    let response = create_account(&app(&h), "new@example.com").await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies[0].starts_with("access_token="));
    assert!(cookies[0].contains("Max-Age=3600"));
    assert!(cookies[0].contains("HttpOnly"));
    assert!(cookies[0].contains("SameSite=Strict"));
    assert!(!cookies[0].contains("Secure"));
    assert!(cookies[1].starts_with("refresh_token="));
    assert!(cookies[1].contains("Max-Age=604800"));

    let body = body_json(response).await;
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
}

#[tokio::test]
async fn test_create_account_rejects_duplicate_and_invalid() {
    let h = Harness::new().await;
    let app = app(&h);
    create_account(&app, "dup@example.com").await;

    let response = create_account(&app, "dup@example.com").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["type"], "urn:auth-session-api/user/email-already-exists");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/user/create-account",
            json!({ "name": "X", "email": "bad", "password": "short" }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_me_requires_session() {
    let h = Harness::new().await;
    let response = app(&h)
        .oneshot(empty_request("GET", "/v1/auth/me", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).is_empty());

    let body = body_json(response).await;
    assert_eq!(body["type"], "urn:auth-session-api/auth/unauthorized");
    assert_eq!(body["title"], "Unauthorized");
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn test_me_returns_identity_and_rotates() {
    let h = Harness::new().await;
    let app = app(&h);
    let created = create_account(&app, "me@example.com").await;
    let cookie = cookie_header(&created);

    h.clock.advance(Duration::minutes(5));

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/v1/auth/me", Some(&cookie)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let rotated = set_cookies(&response);
    assert_eq!(rotated.len(), 2);
    assert!(rotated[0].starts_with("access_token="));
    assert!(rotated[1].starts_with("refresh_token="));

    let body = body_json(response).await;
    assert_eq!(body["email"], "me@example.com");
    assert_eq!(body["name"], "Ana Souza");
    assert_eq!(body["avatar"], "");
}

#[tokio::test]
async fn test_missing_refresh_cookie_clears_both() {
    let h = Harness::new().await;
    let app = app(&h);
    let created = create_account(&app, "half@example.com").await;
    let access_only = set_cookies(&created)[0]
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(empty_request("GET", "/v1/auth/me", Some(&access_only)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|c| c.contains("Max-Age=-1")));
}

#[tokio::test]
async fn test_login_and_logout() {
    let h = Harness::new().await;
    let app = app(&h);
    create_account(&app, "login@example.com").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/v1/auth/login",
            json!({ "email": "login@example.com", "password": PASSWORD }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_header(&response);

    let response = app
        .clone()
        .oneshot(empty_request("POST", "/v1/auth/logout", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = set_cookies(&response);
    assert_eq!(cleared.len(), 2);
    assert!(cleared.iter().all(|c| c.contains("Max-Age=-1")));

    // The session is gone, so the old cookies no longer work
    let response = app
        .oneshot(empty_request("GET", "/v1/auth/me", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let h = Harness::new().await;
    let app = app(&h);
    create_account(&app, "wrong@example.com").await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/v1/auth/login",
            json!({ "email": "wrong@example.com", "password": "not-the-password" }),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["type"], "urn:auth-session-api/auth/invalid-credentials");
}

#[tokio::test]
async fn test_update_password() {
    let h = Harness::new().await;
    let app = app(&h);
    let created = create_account(&app, "pw@example.com").await;
    let cookie = cookie_header(&created);

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/v1/user/password",
            json!({ "current_password": "nope", "new_password": "another-passphrase" }),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            "/v1/user/password",
            json!({ "current_password": PASSWORD, "new_password": "another-passphrase" }),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(json_request(
            "POST",
            "/v1/auth/login",
            json!({ "email": "pw@example.com", "password": "another-passphrase" }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_deactivate_and_reactivate() {
    let h = Harness::new().await;
    let app = app(&h);
    let created = create_account(&app, "gone@example.com").await;
    let cookie = cookie_header(&created);

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/v1/user", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response)
        .iter()
        .all(|c| c.contains("Max-Age=-1")));

    let user = h.users.find_by_email("gone@example.com").await.unwrap();
    assert!(!user.is_active());

    let login = json!({ "email": "gone@example.com", "password": PASSWORD });

    let response = app
        .clone()
        .oneshot(json_request("POST", "/v1/auth/login", login.clone(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(json_request("PATCH", "/v1/user/reactivate", login.clone(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookies(&response).len(), 2);

    let response = app
        .oneshot(json_request("PATCH", "/v1/user/reactivate", login, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_purge_removes_long_deactivated_accounts() {
    let h = Harness::new().await;
    h.signup("old@example.com").await;
    let user = h.users.find_by_email("old@example.com").await.unwrap();

    h.accounts.deactivate(user.id).await.unwrap();

    h.clock.advance(Duration::days(6));
    assert_eq!(h.accounts.purge_deactivated(Duration::days(7)).await.unwrap(), 0);

    h.clock.advance(Duration::days(1));
    assert_eq!(h.accounts.purge_deactivated(Duration::days(7)).await.unwrap(), 1);
    assert!(h.users.find_by_id(user.id).await.is_err());
}
