//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sporthub_api::routes;
use sporthub_api::state::ActivitiesState;
use sporthub_core::publisher::EventPublisher;
use sporthub_store::{PgActivityRepository, PgBookingRepository, PgSessionRepository};
use sporthub_test_support::{FixedClock, RecordingPublisher, StaticUserDirectory};
use sqlx::PgPool;
use tower::ServiceExt;

/// Admin identity headers.
pub const ADMIN: (&str, &str) = ("1", "admin");

/// Plain member identity headers.
pub const MEMBER: (&str, &str) = ("5", "user");

/// Users known to the stub users service.
pub const KNOWN_USERS: &[&str] = &["1", "5", "7"];

/// Activities state over Postgres with a deterministic clock.
pub fn activities_state(pool: PgPool, publisher: Arc<dyn EventPublisher>) -> ActivitiesState {
    ActivitiesState {
        clock: Arc::new(FixedClock::default_instant()),
        users: Arc::new(StaticUserDirectory::with_users(KNOWN_USERS)),
        activities: Arc::new(PgActivityRepository::new(pool.clone())),
        sessions: Arc::new(PgSessionRepository::new(pool.clone())),
        bookings: Arc::new(PgBookingRepository::new(pool)),
        publisher,
        branch_timeout: Duration::from_secs(5),
    }
}

/// Build the activities router the same way the binary does.
pub fn build_test_app(pool: PgPool) -> Router {
    routes::activities_app(activities_state(pool, Arc::new(RecordingPublisher::new())))
}

/// Build the activities router and keep a handle on its publisher.
pub fn build_test_app_with_publisher(pool: PgPool) -> (Router, Arc<RecordingPublisher>) {
    let publisher = Arc::new(RecordingPublisher::new());
    let app = routes::activities_app(activities_state(pool, publisher.clone()));
    (app, publisher)
}

async fn send(
    app: Router,
    method: &str,
    uri: &str,
    identity: Option<(&str, &str)>,
    body: Option<&serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user_id, role)) = identity {
        builder = builder
            .header("x-user-id", user_id)
            .header("x-user-role", role);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Send a POST request with a JSON body as `identity`.
pub async fn post_json(
    app: Router,
    uri: &str,
    identity: (&str, &str),
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(identity), Some(body)).await
}

/// Send a PUT request with a JSON body as `identity`.
pub async fn put_json(
    app: Router,
    uri: &str,
    identity: (&str, &str),
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "PUT", uri, Some(identity), Some(body)).await
}

/// Send a PATCH request without a body as `identity`.
pub async fn patch(
    app: Router,
    uri: &str,
    identity: (&str, &str),
) -> (StatusCode, serde_json::Value) {
    send(app, "PATCH", uri, Some(identity), None).await
}

/// Send a DELETE request as `identity`.
pub async fn delete(app: Router, uri: &str, identity: (&str, &str)) -> StatusCode {
    send(app, "DELETE", uri, Some(identity), None).await.0
}

/// Send an anonymous GET request.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None, None).await
}

/// Send a GET request as `identity`.
pub async fn get_json_as(
    app: Router,
    uri: &str,
    identity: (&str, &str),
) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, Some(identity), None).await
}

/// Creates an activity as admin and returns its id.
pub async fn create_activity(pool: &PgPool, name: &str, base_price: f64) -> i64 {
    let (status, json) = post_json(
        build_test_app(pool.clone()),
        "/activities",
        ADMIN,
        &serde_json::json!({
            "owner_user_id": "7",
            "category": "football",
            "name": name,
            "location": "Club Norte",
            "base_price": base_price
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_i64().unwrap()
}

/// Creates a session as admin and returns its id.
pub async fn create_session(
    pool: &PgPool,
    activity_id: i64,
    start_time: &str,
    end_time: &str,
    capacity: i32,
) -> i64 {
    let (status, json) = post_json(
        build_test_app(pool.clone()),
        &format!("/activities/{activity_id}/sessions"),
        ADMIN,
        &serde_json::json!({
            "date": "2026-02-01",
            "start_time": start_time,
            "end_time": end_time,
            "capacity": capacity
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_i64().unwrap()
}
