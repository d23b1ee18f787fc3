//! RSS ingestion for gator.
//!
//! Feeds are fetched over HTTP, parsed as RSS 2.0 and their items stored as
//! posts. The [`Scheduler`] rotates through registered feeds, the
//! [`PostIngestor`] turns items into posts.

pub mod date;
pub mod fetcher;
pub mod ingestor;
pub mod repository;
pub mod scheduler;
pub mod traits;
pub mod types;

pub use date::{normalize_pub_date, DateFormat};
pub use fetcher::{parse_feed, validate_url, RssFetcher};
pub use ingestor::{IngestReport, ItemOutcome, PostIngestor};
pub use repository::{FeedRepository, PostRepository};
pub use scheduler::{CycleOutcome, CyclePhase, OnceSummary, Scheduler, SchedulerDeps};
pub use traits::{FeedSource, FeedStore, PostStore};
pub use types::{
    Feed, FeedWithOwner, FetchedFeed, FetchedItem, NewFeed, NewPost, Post, PostWithFeed,
    DEFAULT_BROWSE_LIMIT, MAX_FEED_NAME_LENGTH,
};
