use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;

use crate::domain::user::User;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, about_me, last_seen, created_at \
             FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(row_to_user))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, about_me, last_seen, created_at \
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(row_to_user))
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        username: Option<String>,
        about_me: Option<String>,
    ) -> Result<Option<User>> {
        let row = sqlx::query(
            "UPDATE users \
             SET username = COALESCE(?, username), \
                 about_me = COALESCE(?, about_me) \
             WHERE id = ? \
             RETURNING id, username, email, about_me, last_seen, created_at",
        )
        .bind(username)
        .bind(about_me)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(row_to_user))
    }

    /// Records activity for an authenticated request.
    pub async fn touch_last_seen(&self, user_id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_seen = ? WHERE id = ?")
            .bind(OffsetDateTime::now_utc().unix_timestamp())
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }
}

fn row_to_user(row: &SqliteRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        about_me: row.get("about_me"),
        last_seen: row.get("last_seen"),
        created_at: row.get("created_at"),
    }
}
