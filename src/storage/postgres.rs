// src/storage/postgres.rs
use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::error::Result;
use crate::ingest::types::{FeedRecord, FeedStore, InsertOutcome, NewPost};
use crate::storage::{FeedFollowView, FeedListing, Post, User};

const POSTS_URL_KEY: &str = "posts_url_key";

const SELECT_FEED: &str = r#"
    SELECT f.id, f.name, f.url, f.user_id, f.created_at, f.updated_at, f.last_fetched_at
    FROM feeds f
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and bring the schema up to date.
    pub async fn connect(db_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(sqlx::Error::from)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---- users ----

    pub async fn create_user(&self, name: &str) -> Result<User> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, created_at, updated_at, name)
            VALUES ($1, $2, $2, $3)
            RETURNING id, created_at, updated_at, name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user(&self, name: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, created_at, updated_at, name FROM users WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, created_at, updated_at, name FROM users ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Deletes every user; feeds, follows and posts go with them.
    pub async fn delete_all_users(&self) -> Result<u64> {
        let res = sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(res.rows_affected())
    }

    // ---- feeds ----

    pub async fn create_feed(&self, name: &str, url: &str, user_id: Uuid) -> Result<FeedRecord> {
        let now = Utc::now();
        let feed = sqlx::query_as::<_, FeedRecord>(
            r#"
            INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
            VALUES ($1, $2, $2, $3, $4, $5)
            RETURNING id, name, url, user_id, created_at, updated_at, last_fetched_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(name)
        .bind(url)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(feed)
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<FeedRecord>> {
        let query = format!("{} WHERE f.url = $1", SELECT_FEED);
        let feed = sqlx::query_as::<_, FeedRecord>(&query)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    pub async fn list_feeds(&self) -> Result<Vec<FeedListing>> {
        let feeds = sqlx::query_as::<_, FeedListing>(
            r#"
            SELECT f.id, f.name, f.url, f.created_at, f.updated_at, f.last_fetched_at,
                   u.name AS user_name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    // ---- follows ----

    pub async fn create_feed_follow(&self, user_id: Uuid, feed_id: Uuid) -> Result<FeedFollowView> {
        let now = Utc::now();
        let follow = sqlx::query_as::<_, FeedFollowView>(
            r#"
            WITH inserted AS (
                INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
                VALUES ($1, $2, $2, $3, $4)
                RETURNING id, user_id, feed_id
            )
            SELECT i.id, i.feed_id, f.name AS feed_name, u.name AS user_name
            FROM inserted i
            JOIN feeds f ON f.id = i.feed_id
            JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(user_id)
        .bind(feed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(follow)
    }

    pub async fn list_follows_for_user(&self, user_id: Uuid) -> Result<Vec<FeedFollowView>> {
        let follows = sqlx::query_as::<_, FeedFollowView>(
            r#"
            SELECT ff.id, ff.feed_id, f.name AS feed_name, u.name AS user_name
            FROM feed_follows ff
            JOIN feeds f ON f.id = ff.feed_id
            JOIN users u ON u.id = ff.user_id
            WHERE ff.user_id = $1
            ORDER BY f.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(follows)
    }

    /// Returns how many follows were removed (0 or 1).
    pub async fn delete_feed_follow(&self, user_id: Uuid, url: &str) -> Result<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM feed_follows ff
            USING feeds f
            WHERE ff.feed_id = f.id AND ff.user_id = $1 AND f.url = $2
            "#,
        )
        .bind(user_id)
        .bind(url)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    // ---- posts ----

    /// Newest posts from the feeds `user_id` follows. Undated posts sort last.
    pub async fn posts_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Post>> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.id, p.created_at, p.updated_at, p.title, p.url, p.description,
                   p.published_at, p.feed_id
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = $1
            ORDER BY p.published_at DESC NULLS LAST
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }
}

#[async_trait]
impl FeedStore for PgStore {
    async fn select_next_feed_to_fetch(&self, user_id: Uuid) -> Result<Option<FeedRecord>> {
        let query = format!(
            "{} JOIN feed_follows ff ON ff.feed_id = f.id \
             WHERE ff.user_id = $1 \
             ORDER BY f.last_fetched_at ASC NULLS FIRST, f.created_at ASC \
             LIMIT 1",
            SELECT_FEED
        );
        let feed = sqlx::query_as::<_, FeedRecord>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<()> {
        // GREATEST skips NULL, and keeps the timestamp from moving backwards.
        let res = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = GREATEST(last_fetched_at, $2), updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(feed_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound.into());
        }
        Ok(())
    }

    async fn insert_post(&self, post: NewPost) -> Result<InsertOutcome> {
        let now = Utc::now();
        let res = sqlx::query(
            r#"
            INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
            VALUES ($1, $2, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(post.feed_id)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_url(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_duplicate_url(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint().map_or(true, |c| c == POSTS_URL_KEY)
        }
        _ => false,
    }
}
