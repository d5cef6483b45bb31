use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;

use crate::app::auth::AuthService;
use crate::app::feed::{FeedService, Page};
use crate::app::posts::PostService;
use crate::app::social::{SocialError, SocialService};
use crate::app::users::UserService;
use crate::domain::post::Post;
use crate::domain::user::{Profile, User};
use crate::http::{AppError, AuthUser};
use crate::AppState;

const MAX_PASSWORD_LEN: usize = 128;
const MAX_POST_LEN: usize = 140;
const MAX_USERNAME_LEN: usize = 64;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

/// Pagination envelope: the page's items plus flags and cursors for the
/// neighbouring pages.
#[derive(Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_page: Option<u32>,
    pub prev_page: Option<u32>,
}

impl<T> From<Page<T>> for PageResponse<T> {
    fn from(page: Page<T>) -> Self {
        let next_page = page.next_page();
        let prev_page = page.prev_page();
        Self {
            items: page.items,
            page: page.page,
            has_next: page.has_next,
            has_prev: page.has_prev,
            next_page,
            prev_page,
        }
    }
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<User>, AppError> {
    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_string();

    if username.is_empty() {
        return Err(AppError::bad_request("username cannot be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::bad_request("username must be at most 64 characters"));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }
    if payload.password.trim().len() < 8 {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.access_ttl_minutes,
    );
    let user = service
        .register(username, email, payload.password)
        .await
        .map_err(|err| {
            if let Some(conflict) = unique_violation(&err) {
                return AppError::conflict(conflict);
            }
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register user")
        })?;

    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AccessTokenResponse>, AppError> {
    if payload.identifier.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("identifier and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.access_ttl_minutes,
    );
    let token = service
        .login(payload.identifier.trim(), &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match token {
        Some(token) => Ok(Json(AccessTokenResponse {
            access_token: token.token,
            expires_at: token.expires_at,
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

    let service = AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.access_ttl_minutes,
    );
    // Revoking twice is a no-op, but a token that never authenticated
    // cannot log out.
    let revoked = service.logout(token).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to logout");
        AppError::internal("failed to logout")
    })?;

    if !revoked {
        return Err(AppError::unauthorized("invalid token"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let service = AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.access_ttl_minutes,
    );
    let user = service.get_current_user(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = auth.user_id, "failed to fetch current user");
        AppError::internal("failed to fetch current user")
    })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

// ---------------------------------------------------------------------------
// Users & profiles
// ---------------------------------------------------------------------------

pub async fn get_user(
    auth: AuthUser,
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Profile>, AppError> {
    let users = UserService::new(state.db.clone());
    let user = users.get_by_username(&username).await.map_err(|err| {
        tracing::error!(error = ?err, %username, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;

    let user = user.ok_or_else(|| AppError::not_found("user not found"))?;

    let social = SocialService::new(state.db.clone());
    let counts = social.profile_counts(user.id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = user.id, "failed to fetch profile counts");
        AppError::internal("failed to fetch profile counts")
    })?;
    let is_following = social
        .is_following(auth.user_id, user.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to fetch follow state");
            AppError::internal("failed to fetch follow state")
        })?;

    Ok(Json(Profile {
        id: user.id,
        username: user.username,
        about_me: user.about_me,
        last_seen: user.last_seen,
        created_at: user.created_at,
        followers_count: counts.followers,
        following_count: counts.following,
        posts_count: counts.posts,
        is_following,
    }))
}

pub async fn list_user_posts(
    _auth: AuthUser,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Json<PageResponse<Post>>, AppError> {
    let users = UserService::new(state.db.clone());
    let user = users.get_by_username(&username).await.map_err(|err| {
        tracing::error!(error = ?err, %username, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;

    let user = user.ok_or_else(|| AppError::not_found("user not found"))?;

    let feed = FeedService::new(state.db.clone(), state.posts_per_page);
    let page = feed
        .user_posts(user.id, query.page.unwrap_or(1))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = user.id, "failed to fetch user posts");
            AppError::internal("failed to fetch user posts")
        })?;

    Ok(Json(page.into()))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub about_me: Option<String>,
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let username = match payload.username {
        Some(username) => {
            let username = username.trim().to_string();
            if username.is_empty() {
                return Err(AppError::bad_request("username cannot be empty"));
            }
            if username.chars().count() > MAX_USERNAME_LEN {
                return Err(AppError::bad_request("username must be at most 64 characters"));
            }
            Some(username)
        }
        None => None,
    };

    let service = UserService::new(state.db.clone());
    let user = service
        .update_profile(auth.user_id, username, payload.about_me)
        .await
        .map_err(|err| {
            if let Some(conflict) = unique_violation(&err) {
                return AppError::conflict(conflict);
            }
            tracing::error!(error = ?err, user_id = auth.user_id, "failed to update profile");
            AppError::internal("failed to update profile")
        })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

// ---------------------------------------------------------------------------
// Follow graph
// ---------------------------------------------------------------------------

pub async fn follow_user(
    auth: AuthUser,
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let target = resolve_username(&state, &username).await?;

    let service = SocialService::new(state.db.clone());
    match service.follow(auth.user_id, target.id).await {
        Ok(followed) => Ok(Json(json!({ "followed": followed }))),
        Err(SocialError::SelfFollow) => Err(AppError::bad_request("cannot follow yourself")),
        Err(SocialError::Db(err)) => {
            tracing::error!(error = ?err, "failed to follow user");
            Err(AppError::internal("failed to follow user"))
        }
    }
}

pub async fn unfollow_user(
    auth: AuthUser,
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let target = resolve_username(&state, &username).await?;

    let service = SocialService::new(state.db.clone());
    match service.unfollow(auth.user_id, target.id).await {
        Ok(unfollowed) => Ok(Json(json!({ "unfollowed": unfollowed }))),
        Err(SocialError::SelfFollow) => Err(AppError::bad_request("cannot unfollow yourself")),
        Err(SocialError::Db(err)) => {
            tracing::error!(error = ?err, "failed to unfollow user");
            Err(AppError::internal("failed to unfollow user"))
        }
    }
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub body: String,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let body = payload.body.trim().to_string();
    if body.is_empty() {
        return Err(AppError::bad_request("body cannot be empty"));
    }
    if body.chars().count() > MAX_POST_LEN {
        return Err(AppError::bad_request("body must be at most 140 characters"));
    }

    let service = PostService::new(state.db.clone());
    let post = service.create_post(auth.user_id, body).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = auth.user_id, "failed to create post");
        AppError::internal("failed to create post")
    })?;

    Ok(Json(post))
}

pub async fn delete_post(
    auth: AuthUser,
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = PostService::new(state.db.clone());
    let deleted = service.delete_post(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = id, "failed to delete post");
        AppError::internal("failed to delete post")
    })?;

    if !deleted {
        return Err(AppError::not_found("post not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

pub async fn home_feed(
    auth: AuthUser,
    Query(query): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Json<PageResponse<Post>>, AppError> {
    let service = FeedService::new(state.db.clone(), state.posts_per_page);
    let page = service
        .followed_posts(auth.user_id, query.page.unwrap_or(1))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = auth.user_id, "failed to fetch home feed");
            AppError::internal("failed to fetch home feed")
        })?;

    Ok(Json(page.into()))
}

pub async fn explore_feed(
    _auth: AuthUser,
    Query(query): Query<PageQuery>,
    State(state): State<AppState>,
) -> Result<Json<PageResponse<Post>>, AppError> {
    let service = FeedService::new(state.db.clone(), state.posts_per_page);
    let page = service
        .explore_posts(query.page.unwrap_or(1))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to fetch explore feed");
            AppError::internal("failed to fetch explore feed")
        })?;

    Ok(Json(page.into()))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn resolve_username(state: &AppState, username: &str) -> Result<User, AppError> {
    let users = UserService::new(state.db.clone());
    let user = users.get_by_username(username).await.map_err(|err| {
        tracing::error!(error = ?err, %username, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;

    user.ok_or_else(|| AppError::not_found("user not found"))
}

fn unique_violation(err: &anyhow::Error) -> Option<&'static str> {
    let sqlx_err = err.downcast_ref::<sqlx::Error>()?;
    let db_err = sqlx_err.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }
    let message = db_err.message();
    if message.contains("users.username") {
        Some("username already taken")
    } else if message.contains("users.email") {
        Some("email already registered")
    } else {
        None
    }
}
