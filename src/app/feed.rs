use anyhow::Result;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::domain::post::Post;
use crate::infra::db::Db;

/// One fixed-size window into an ordered result set. Pages are 1-based;
/// a page past the end of the data is empty with `has_next` false.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn next_page(&self) -> Option<u32> {
        self.has_next.then(|| self.page + 1)
    }

    pub fn prev_page(&self) -> Option<u32> {
        self.has_prev.then(|| self.page - 1)
    }
}

#[derive(Clone)]
pub struct FeedService {
    db: Db,
    posts_per_page: u32,
}

impl FeedService {
    pub fn new(db: Db, posts_per_page: u32) -> Self {
        Self { db, posts_per_page }
    }

    /// Posts authored by the user or by anyone they follow, newest first.
    /// Equal timestamps are broken by id, newest insertion first.
    pub async fn followed_posts(&self, user_id: i64, page: u32) -> Result<Page<Post>> {
        let page = page.max(1);
        let rows = sqlx::query(
            "SELECT p.id, p.author_id, u.username AS author_username, p.body, p.created_at \
             FROM posts p \
             JOIN users u ON u.id = p.author_id \
             WHERE p.author_id = ? \
                OR p.author_id IN (SELECT followee_id FROM follows WHERE follower_id = ?) \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(user_id)
        .bind(self.limit_plus_one())
        .bind(self.offset(page))
        .fetch_all(self.db.pool())
        .await?;

        Ok(self.to_page(rows, page))
    }

    /// All posts regardless of the follow graph, same ordering contract.
    pub async fn explore_posts(&self, page: u32) -> Result<Page<Post>> {
        let page = page.max(1);
        let rows = sqlx::query(
            "SELECT p.id, p.author_id, u.username AS author_username, p.body, p.created_at \
             FROM posts p \
             JOIN users u ON u.id = p.author_id \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT ? OFFSET ?",
        )
        .bind(self.limit_plus_one())
        .bind(self.offset(page))
        .fetch_all(self.db.pool())
        .await?;

        Ok(self.to_page(rows, page))
    }

    /// Posts authored by a single user, for the profile page.
    pub async fn user_posts(&self, user_id: i64, page: u32) -> Result<Page<Post>> {
        let page = page.max(1);
        let rows = sqlx::query(
            "SELECT p.id, p.author_id, u.username AS author_username, p.body, p.created_at \
             FROM posts p \
             JOIN users u ON u.id = p.author_id \
             WHERE p.author_id = ? \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(self.limit_plus_one())
        .bind(self.offset(page))
        .fetch_all(self.db.pool())
        .await?;

        Ok(self.to_page(rows, page))
    }

    // Fetching one row past the page size tells us whether a next page exists
    // without a separate COUNT query.
    fn limit_plus_one(&self) -> i64 {
        self.posts_per_page as i64 + 1
    }

    fn offset(&self, page: u32) -> i64 {
        (page as i64 - 1) * self.posts_per_page as i64
    }

    fn to_page(&self, rows: Vec<SqliteRow>, page: u32) -> Page<Post> {
        let mut items: Vec<Post> = rows.iter().map(row_to_post).collect();
        let has_next = items.len() > self.posts_per_page as usize;
        if has_next {
            items.truncate(self.posts_per_page as usize);
        }

        Page {
            items,
            page,
            has_next,
            has_prev: page > 1,
        }
    }
}

fn row_to_post(row: &SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        author_username: Some(row.get("author_username")),
        body: row.get("body"),
        created_at: row.get("created_at"),
    }
}
