//! Post ingestion.
//!
//! Turns the items of a fetched document into posts. Each item yields an
//! [`ItemOutcome`]; outcomes are folded into an [`IngestReport`]. Items with
//! an unrecognized date and items whose link is already stored for the feed
//! are counted and skipped. Any other storage error aborts the batch.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use super::date::normalize_pub_date;
use super::traits::PostStore;
use super::types::{FetchedFeed, FetchedItem, NewPost, Post};
use crate::error::DateParseError;
use crate::{GatorError, Result};

/// What happened to a single item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A new post was stored.
    Created(Post),
    /// The feed already has a post with this link.
    Duplicate,
    /// The publication date could not be parsed; nothing was stored.
    Skipped(DateParseError),
}

/// Counters for one ingested document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Number of items in the document.
    pub item_count: usize,
    pub created: usize,
    pub duplicates: usize,
    pub parse_errors: usize,
    /// Posts stored by this run, in document order.
    pub new_posts: Vec<Post>,
}

impl IngestReport {
    /// Fold one item outcome into the counters.
    pub fn record(&mut self, outcome: ItemOutcome) {
        self.item_count += 1;
        match outcome {
            ItemOutcome::Created(post) => {
                self.created += 1;
                self.new_posts.push(post);
            }
            ItemOutcome::Duplicate => self.duplicates += 1,
            ItemOutcome::Skipped(_) => self.parse_errors += 1,
        }
    }
}

/// Persists fetched items as posts.
#[derive(Clone)]
pub struct PostIngestor {
    posts: Arc<dyn PostStore>,
}

impl PostIngestor {
    pub fn new(posts: Arc<dyn PostStore>) -> Self {
        Self { posts }
    }

    /// Ingest every item of `document` for `feed_id`, in document order.
    pub async fn ingest(&self, feed_id: Uuid, document: &FetchedFeed) -> Result<IngestReport> {
        let mut report = IngestReport::default();
        for (index, item) in document.items.iter().enumerate() {
            let outcome = self.ingest_item(feed_id, item).await?;
            if let ItemOutcome::Skipped(ref err) = outcome {
                warn!(
                    "[{}] Could not parse date '{}' for: {}",
                    index + 1,
                    err.raw,
                    item.title
                );
            }
            report.record(outcome);
        }
        Ok(report)
    }

    /// Ingest a single item.
    ///
    /// Returns `Err` only for storage failures other than a duplicate link.
    pub async fn ingest_item(&self, feed_id: Uuid, item: &FetchedItem) -> Result<ItemOutcome> {
        let published_at = match normalize_pub_date(&item.pub_date) {
            Ok(published_at) => published_at,
            Err(err) => return Ok(ItemOutcome::Skipped(err)),
        };

        let mut new_post = NewPost::new(feed_id, &item.title, &item.link, published_at);
        new_post.description = item.description.clone();

        match self.posts.create_post(&new_post).await {
            Ok(post) => Ok(ItemOutcome::Created(post)),
            Err(GatorError::DuplicateKey(_)) => {
                debug!("Skipping already stored post {}", item.link);
                Ok(ItemOutcome::Duplicate)
            }
            Err(e) => Err(e),
        }
    }
}
