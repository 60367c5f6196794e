// src/ingest/types.rs
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;

/// A subscribed feed as stored in the `feeds` table.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct FeedRecord {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_fetched_at: Option<DateTime<Utc>>, // None = never fetched
}

/// Payload for a single post insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub feed_id: Uuid,
}

/// Result of a post insert. A URL that already exists is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Decoded RSS channel. Lives only for the duration of one ingestion step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    pub description: String,
    pub link: String,
    pub items: Vec<ParsedItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedItem {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub pub_date: String, // raw; normalized per item during ingestion
}

/// What the ingestion step needs from persistence.
#[async_trait::async_trait]
pub trait FeedStore: Send + Sync {
    /// Feed followed by `user_id` with the oldest `last_fetched_at`, never-fetched first.
    async fn select_next_feed_to_fetch(&self, user_id: Uuid) -> Result<Option<FeedRecord>>;
    async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<()>;
    async fn insert_post(&self, post: NewPost) -> Result<InsertOutcome>;
}

/// What the ingestion step needs from the network.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
    fn name(&self) -> &'static str;
}
