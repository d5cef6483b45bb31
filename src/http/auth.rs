use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::app::auth::AuthService;
use crate::app::users::UserService;
use crate::http::AppError;
use crate::AppState;

/// The authenticated identity, threaded explicitly into every operation.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("invalid Authorization header"))?;

        let service = AuthService::new(
            state.db.clone(),
            state.paseto_access_key,
            state.access_ttl_minutes,
        );
        let session = service
            .authenticate_access_token(token)
            .await
            .map_err(|_| AppError::internal("failed to authenticate"))?;

        let session = session.ok_or_else(|| AppError::unauthorized("invalid token"))?;

        // Every authenticated request records activity.
        let users = UserService::new(state.db.clone());
        if let Err(err) = users.touch_last_seen(session.user_id).await {
            tracing::warn!(error = ?err, user_id = session.user_id, "failed to update last_seen");
        }

        Ok(AuthUser {
            user_id: session.user_id,
        })
    }
}
