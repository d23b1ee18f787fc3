//! Seams between the ingestion engine and its collaborators.
//!
//! The scheduler and ingestor only see these traits. [`Database`] implements
//! the store traits and [`RssFetcher`](super::fetcher::RssFetcher) implements
//! [`FeedSource`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::repository::{FeedRepository, PostRepository};
use super::types::{Feed, FetchedFeed, NewPost, Post};
use crate::db::Database;
use crate::error::FetchError;
use crate::Result;

/// Feed bookkeeping used by the scheduler.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// The feed fetched least recently, never-fetched feeds first.
    async fn select_next_due_feed(&self) -> Result<Option<Feed>>;

    /// Record that `feed_id` was fetched at `at`.
    async fn mark_feed_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Look up a feed by its source URL.
    async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>>;
}

/// Post persistence used by the ingestor.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Insert a post.
    ///
    /// Fails with [`GatorError::DuplicateKey`](crate::GatorError::DuplicateKey)
    /// when the feed already has a post with the same link.
    async fn create_post(&self, post: &NewPost) -> Result<Post>;
}

/// Where feed documents come from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedFeed, FetchError>;
}

#[async_trait]
impl FeedStore for Database {
    async fn select_next_due_feed(&self) -> Result<Option<Feed>> {
        FeedRepository::new(self.pool()).next_to_fetch().await
    }

    async fn mark_feed_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        FeedRepository::new(self.pool())
            .mark_fetched(feed_id, at)
            .await
    }

    async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        FeedRepository::new(self.pool()).get_by_url(url).await
    }
}

#[async_trait]
impl PostStore for Database {
    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        PostRepository::new(self.pool()).create(post).await
    }
}
