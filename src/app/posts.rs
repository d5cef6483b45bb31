use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;

use crate::domain::post::Post;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Persists a new post with a server-assigned timestamp. The body is
    /// validated at the HTTP layer before reaching this point.
    pub async fn create_post(&self, author_id: i64, body: String) -> Result<Post> {
        let row = sqlx::query(
            "INSERT INTO posts (author_id, body, created_at) \
             VALUES (?, ?, ?) \
             RETURNING id, author_id, body, created_at",
        )
        .bind(author_id)
        .bind(body)
        .bind(OffsetDateTime::now_utc().unix_timestamp())
        .fetch_one(self.db.pool())
        .await?;

        let author_username: String =
            sqlx::query_scalar("SELECT username FROM users WHERE id = ?")
                .bind(author_id)
                .fetch_one(self.db.pool())
                .await?;

        Ok(Post {
            id: row.get("id"),
            author_id: row.get("author_id"),
            author_username: Some(author_username),
            body: row.get("body"),
            created_at: row.get("created_at"),
        })
    }

    /// Deletes a post only when it exists and belongs to the actor.
    /// A missing or foreign post is a no-op returning false.
    pub async fn delete_post(&self, author_id: i64, post_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ? AND author_id = ?")
            .bind(post_id)
            .bind(author_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
