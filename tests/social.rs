//! Follow graph: follow, unfollow, idempotence, and self-follow rejection.

mod common;

use axum::http::StatusCode;
use serde_json::json;

async fn is_following(app: &common::TestApp, follower_id: i64, followee_id: i64) -> bool {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = ? AND followee_id = ?)",
    )
    .bind(follower_id)
    .bind(followee_id)
    .fetch_one(app.pool())
    .await
    .unwrap()
}

#[tokio::test]
async fn follow_user() {
    let app = common::app().await;
    let user_a = app.create_user("follow_a").await;
    let user_b = app.create_user("follow_b").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", user_b.username),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["followed"].as_bool().unwrap(), true);
    assert!(is_following(&app, user_a.id, user_b.id).await);
    // the relation is directed
    assert!(!is_following(&app, user_b.id, user_a.id).await);
}

#[tokio::test]
async fn follow_is_idempotent() {
    let app = common::app().await;
    let user_a = app.create_user("dup_a").await;
    let user_b = app.create_user("dup_b").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", user_b.username),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["followed"].as_bool().unwrap(), true);

    // second follow is a no-op, same graph state as a single follow
    let resp = app
        .post_json(
            &format!("/users/{}/follow", user_b.username),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["followed"].as_bool().unwrap(), false);

    let edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = ?")
        .bind(user_a.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(edges, 1);
}

#[tokio::test]
async fn follow_self_rejected() {
    let app = common::app().await;
    let user = app.create_user("self").await;

    let resp = app
        .post_json(
            &format!("/users/{}/follow", user.username),
            json!({}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "cannot follow yourself");

    // graph unchanged
    let edges: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows")
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(edges, 0);
}

#[tokio::test]
async fn unfollow_self_rejected() {
    let app = common::app().await;
    let user = app.create_user("unself").await;

    let resp = app
        .post_json(
            &format!("/users/{}/unfollow", user.username),
            json!({}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "cannot unfollow yourself");
}

#[tokio::test]
async fn follow_unknown_user() {
    let app = common::app().await;
    let user = app.create_user("ghosthunter").await;

    let resp = app
        .post_json(
            "/users/no_such_user/follow",
            json!({}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "user not found");
}

#[tokio::test]
async fn follow_then_unfollow_round_trip() {
    let app = common::app().await;
    let user_a = app.create_user("rt_a").await;
    let user_b = app.create_user("rt_b").await;

    app.follow(&user_a, &user_b).await;
    assert!(is_following(&app, user_a.id, user_b.id).await);

    let resp = app
        .post_json(
            &format!("/users/{}/unfollow", user_b.username),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["unfollowed"].as_bool().unwrap(), true);
    assert!(!is_following(&app, user_a.id, user_b.id).await);
}

#[tokio::test]
async fn unfollow_not_following_is_noop() {
    let app = common::app().await;
    let user_a = app.create_user("noop_a").await;
    let user_b = app.create_user("noop_b").await;

    let resp = app
        .post_json(
            &format!("/users/{}/unfollow", user_b.username),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["unfollowed"].as_bool().unwrap(), false);
}

#[tokio::test]
async fn follow_requires_auth() {
    let app = common::app().await;
    let user = app.create_user("target").await;

    let resp = app
        .post_json(&format!("/users/{}/follow", user.username), json!({}), None)
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}
