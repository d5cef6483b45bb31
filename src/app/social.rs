use sqlx::Row;
use thiserror::Error;
use time::OffsetDateTime;

use crate::infra::db::Db;

#[derive(Debug, Error)]
pub enum SocialError {
    #[error("cannot follow yourself")]
    SelfFollow,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct ProfileCounts {
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
}

/// Directed follow graph, stored as an explicit edge set of
/// (follower_id, followee_id) pairs. Commits happen per statement;
/// callers never see partial edges.
#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Adds the edge actor -> target. Idempotent: returns false when the
    /// edge already existed.
    pub async fn follow(&self, actor_id: i64, target_id: i64) -> Result<bool, SocialError> {
        if actor_id == target_id {
            return Err(SocialError::SelfFollow);
        }

        let result = sqlx::query(
            "INSERT INTO follows (follower_id, followee_id, created_at) \
             VALUES (?, ?, ?) \
             ON CONFLICT DO NOTHING",
        )
        .bind(actor_id)
        .bind(target_id)
        .bind(OffsetDateTime::now_utc().unix_timestamp())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes the edge actor -> target if present. Idempotent.
    pub async fn unfollow(&self, actor_id: i64, target_id: i64) -> Result<bool, SocialError> {
        if actor_id == target_id {
            return Err(SocialError::SelfFollow);
        }

        let result = sqlx::query(
            "DELETE FROM follows WHERE follower_id = ? AND followee_id = ?",
        )
        .bind(actor_id)
        .bind(target_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_following(&self, actor_id: i64, target_id: i64) -> Result<bool, SocialError> {
        let following: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE follower_id = ? AND followee_id = ?)",
        )
        .bind(actor_id)
        .bind(target_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(following)
    }

    pub async fn profile_counts(&self, user_id: i64) -> Result<ProfileCounts, SocialError> {
        let row = sqlx::query(
            "SELECT \
                (SELECT COUNT(*) FROM follows WHERE followee_id = ?) AS followers, \
                (SELECT COUNT(*) FROM follows WHERE follower_id = ?) AS following, \
                (SELECT COUNT(*) FROM posts WHERE author_id = ?) AS posts",
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(ProfileCounts {
            followers: row.get("followers"),
            following: row.get("following"),
            posts: row.get("posts"),
        })
    }
}
