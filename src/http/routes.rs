use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::get_current_user))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users/:username", get(handlers::get_user))
        .route("/users/:username/posts", get(handlers::list_user_posts))
        .route("/users/:username/follow", post(handlers::follow_user))
        .route("/users/:username/unfollow", post(handlers::unfollow_user))
        .route("/profile", patch(handlers::update_profile))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", post(handlers::create_post))
        .route("/posts/:id", delete(handlers::delete_post))
}

pub fn feed() -> Router<AppState> {
    Router::new()
        .route("/feed", get(handlers::home_feed))
        .route("/explore", get(handlers::explore_feed))
}
