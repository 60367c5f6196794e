// src/storage/memory.rs
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{GatorError, Result};
use crate::ingest::types::{FeedRecord, FeedStore, InsertOutcome, NewPost};
use crate::storage::Post;

/// In-process [`FeedStore`] with the same ordering and uniqueness rules as
/// the Postgres schema. Failures can be injected per operation.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    feeds: Vec<FeedRecord>,
    follows: HashSet<(Uuid, Uuid)>, // (user_id, feed_id)
    posts: Vec<Post>,
    post_urls: HashMap<String, Uuid>,
    fail_select: bool,
    fail_mark: bool,
    fail_insert_urls: HashSet<String>,
    insert_attempts: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Add a feed owned and followed by `user_id`.
    pub fn add_feed(&self, name: &str, url: &str, user_id: Uuid) -> FeedRecord {
        let now = Utc::now();
        let feed = FeedRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            url: url.to_string(),
            user_id,
            created_at: now,
            updated_at: now,
            last_fetched_at: None,
        };
        let mut st = self.state();
        st.feeds.push(feed.clone());
        st.follows.insert((user_id, feed.id));
        feed
    }

    pub fn follow(&self, user_id: Uuid, feed_id: Uuid) {
        self.state().follows.insert((user_id, feed_id));
    }

    pub fn set_last_fetched(&self, feed_id: Uuid, at: Option<DateTime<Utc>>) {
        if let Some(f) = self.state().feeds.iter_mut().find(|f| f.id == feed_id) {
            f.last_fetched_at = at;
        }
    }

    pub fn feed(&self, feed_id: Uuid) -> Option<FeedRecord> {
        self.state().feeds.iter().find(|f| f.id == feed_id).cloned()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.state().posts.clone()
    }

    pub fn post_urls(&self) -> Vec<String> {
        self.state().posts.iter().map(|p| p.url.clone()).collect()
    }

    /// Number of `insert_post` calls, successful or not.
    pub fn insert_attempts(&self) -> usize {
        self.state().insert_attempts
    }

    pub fn fail_select(&self, fail: bool) {
        self.state().fail_select = fail;
    }

    pub fn fail_mark_fetched(&self, fail: bool) {
        self.state().fail_mark = fail;
    }

    /// Make inserting a post with `url` fail with a storage error.
    pub fn fail_insert_for(&self, url: &str) {
        self.state().fail_insert_urls.insert(url.to_string());
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn select_next_feed_to_fetch(&self, user_id: Uuid) -> Result<Option<FeedRecord>> {
        let st = self.state();
        if st.fail_select {
            return Err(GatorError::StorageUnavailable("select failed".into()));
        }
        // None < Some(_), so never-fetched feeds come first.
        Ok(st
            .feeds
            .iter()
            .filter(|f| st.follows.contains(&(user_id, f.id)))
            .min_by_key(|f| (f.last_fetched_at, f.created_at))
            .cloned())
    }

    async fn mark_feed_fetched(&self, feed_id: Uuid) -> Result<()> {
        let mut st = self.state();
        if st.fail_mark {
            return Err(GatorError::StorageUnavailable("mark failed".into()));
        }
        let feed = st
            .feeds
            .iter_mut()
            .find(|f| f.id == feed_id)
            .ok_or_else(|| GatorError::StorageUnavailable(format!("feed {feed_id} not found")))?;
        let now = Utc::now();
        feed.last_fetched_at = Some(feed.last_fetched_at.map_or(now, |prev| prev.max(now)));
        feed.updated_at = now;
        Ok(())
    }

    async fn insert_post(&self, post: NewPost) -> Result<InsertOutcome> {
        let mut st = self.state();
        st.insert_attempts += 1;
        if st.fail_insert_urls.contains(&post.url) {
            return Err(GatorError::StorageUnavailable(format!(
                "insert failed for {}",
                post.url
            )));
        }
        if st.post_urls.contains_key(&post.url) {
            return Ok(InsertOutcome::Duplicate);
        }
        let now = Utc::now();
        let id = Uuid::new_v4();
        st.post_urls.insert(post.url.clone(), id);
        st.posts.push(Post {
            id,
            created_at: now,
            updated_at: now,
            title: post.title,
            url: post.url,
            description: post.description,
            published_at: post.published_at,
            feed_id: post.feed_id,
        });
        Ok(InsertOutcome::Inserted)
    }
}
