//! Integration tests for enrollments over Postgres.

mod common;

use axum::http::StatusCode;
use futures::future::join_all;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../migrations")]
async fn test_enroll_and_cancel_round_trip(pool: PgPool) {
    let activity_id = common::create_activity(&pool, "Futbol 5", 100.0).await;
    let session_id = common::create_session(&pool, activity_id, "19:00", "20:00", 10).await;

    // POST /enrollments at a peak hour
    let (app, publisher) = common::build_test_app_with_publisher(pool.clone());
    let (status, json) = common::post_json(
        app,
        "/enrollments",
        common::MEMBER,
        &serde_json::json!({ "session_id": session_id }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "confirmed");
    assert_eq!(json["user_id"], "5");
    assert_eq!(json["final_price"], 104.5);
    assert_eq!(publisher.routing_keys(), vec!["booking.created".to_owned()]);
    let booking_id = json["id"].as_i64().unwrap();

    // PATCH /enrollments/{id}/cancel
    let app = common::build_test_app(pool.clone());
    let (status, json) =
        common::patch(app, &format!("/enrollments/{booking_id}/cancel"), common::MEMBER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");

    // A second cancel is an invalid transition
    let app = common::build_test_app(pool.clone());
    let (status, json) =
        common::patch(app, &format!("/enrollments/{booking_id}/cancel"), common::MEMBER).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "invalid_transition");

    // The user can book the same session again
    let app = common::build_test_app(pool);
    let (status, _) = common::post_json(
        app,
        "/enrollments",
        common::MEMBER,
        &serde_json::json!({ "session_id": session_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_duplicate_enrollment_returns_409(pool: PgPool) {
    let activity_id = common::create_activity(&pool, "Futbol 5", 100.0).await;
    let session_id = common::create_session(&pool, activity_id, "10:00", "11:00", 10).await;
    let body = serde_json::json!({ "session_id": session_id });

    let app = common::build_test_app(pool.clone());
    let (first, _) = common::post_json(app, "/enrollments", common::MEMBER, &body).await;
    let app = common::build_test_app(pool);
    let (second, json) = common::post_json(app, "/enrollments", common::MEMBER, &body).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(json["error"], "duplicate_booking");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_enrollments_never_exceed_capacity(pool: PgPool) {
    let activity_id = common::create_activity(&pool, "Futbol 5", 100.0).await;
    let session_id = common::create_session(&pool, activity_id, "10:00", "11:00", 2).await;
    let users = ["1", "5", "7"];

    let results = join_all(users.iter().map(|user| {
        let app = common::build_test_app(pool.clone());
        let body = serde_json::json!({ "session_id": session_id });
        async move { common::post_json(app, "/enrollments", (*user, "user"), &body).await }
    }))
    .await;

    let created = results
        .iter()
        .filter(|(status, _)| *status == StatusCode::CREATED)
        .count();
    let full = results
        .iter()
        .filter(|(status, json)| *status == StatusCode::CONFLICT && json["error"] == "no_capacity")
        .count();
    assert_eq!(created, 2);
    assert_eq!(full, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_enroll_into_missing_session_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);

    let (status, json) = common::post_json(
        app,
        "/enrollments",
        common::MEMBER,
        &serde_json::json!({ "session_id": 999 }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_by_user_is_newest_first_and_private(pool: PgPool) {
    let activity_id = common::create_activity(&pool, "Futbol 5", 100.0).await;
    let early = common::create_session(&pool, activity_id, "10:00", "11:00", 10).await;
    let late = common::create_session(&pool, activity_id, "12:00", "13:00", 10).await;
    for session_id in [early, late] {
        let (status, _) = common::post_json(
            common::build_test_app(pool.clone()),
            "/enrollments",
            common::MEMBER,
            &serde_json::json!({ "session_id": session_id }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = common::get_json_as(
        common::build_test_app(pool.clone()),
        "/enrollments/by-user/5",
        common::MEMBER,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let bookings = json.as_array().unwrap();
    assert_eq!(bookings.len(), 2);
    assert_eq!(bookings[0]["session_id"], late);

    let (status, _) = common::get_json_as(
        common::build_test_app(pool),
        "/enrollments/by-user/5",
        ("7", "user"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
