//! Feed scheduler.
//!
//! Drives fetch cycles in two modes:
//!
//! - **Continuous** ([`Scheduler::run_continuous`]): on every tick, pick the
//!   feed fetched least recently, fetch it and ingest its items. A fatal
//!   fetch or storage error ends the loop.
//! - **One-shot** ([`Scheduler::run_once`]): one cycle against a named feed,
//!   returning a detailed summary.
//!
//! # Rotation policy
//!
//! A feed is marked fetched *before* its fetch starts. Its place in the
//! rotation therefore advances whether the fetch succeeds or fails, so a slow
//! or broken feed can never be picked twice in a row while others wait.
//! Failing feeds get no backoff: they rotate exactly like healthy ones.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, trace};

use super::ingestor::{IngestReport, PostIngestor};
use super::traits::{FeedSource, FeedStore, PostStore};
use super::types::Feed;
use crate::datetime;
use crate::db::Database;
use crate::{GatorError, Result};

/// Phases of one continuous-mode cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Selecting,
    MarkFetched,
    Fetching,
    Ingesting,
    Reporting,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Selecting => "selecting",
            CyclePhase::MarkFetched => "marking fetched",
            CyclePhase::Fetching => "fetching",
            CyclePhase::Ingesting => "ingesting",
            CyclePhase::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

/// Result of a single continuous-mode cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A feed was fetched and ingested.
    Collected { feed: Feed, report: IngestReport },
    /// There are no feeds to collect.
    NoFeeds,
    /// Shutdown was requested while fetching.
    Cancelled,
}

/// Summary of a one-shot run.
#[derive(Debug, Clone)]
pub struct OnceSummary {
    pub feed: Feed,
    /// Channel title of the fetched document.
    pub channel_title: String,
    pub report: IngestReport,
}

/// Collaborators of the scheduler.
#[derive(Clone)]
pub struct SchedulerDeps {
    pub feeds: Arc<dyn FeedStore>,
    pub posts: Arc<dyn PostStore>,
    pub source: Arc<dyn FeedSource>,
}

impl SchedulerDeps {
    /// Use `db` for both feed and post storage.
    pub fn with_database(db: Database, source: Arc<dyn FeedSource>) -> Self {
        let db = Arc::new(db);
        Self {
            feeds: db.clone(),
            posts: db,
            source,
        }
    }
}

/// Fetch-cycle driver. One feed is processed at a time.
pub struct Scheduler {
    feeds: Arc<dyn FeedStore>,
    source: Arc<dyn FeedSource>,
    ingestor: PostIngestor,
}

impl Scheduler {
    pub fn new(deps: SchedulerDeps) -> Self {
        Self {
            feeds: deps.feeds,
            source: deps.source,
            ingestor: PostIngestor::new(deps.posts),
        }
    }

    /// Run fetch cycles every `interval` until shutdown or a fatal error.
    ///
    /// The first cycle starts immediately. `shutdown` is observed while
    /// waiting for the next tick and while a fetch is in flight; setting it
    /// to `true` (or dropping its sender) returns `Ok(())`. Posts stored
    /// before shutdown stay stored.
    pub async fn run_continuous(
        &self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        if interval.is_zero() {
            return Err(GatorError::Validation(
                "collection interval must be greater than zero".into(),
            ));
        }

        info!(
            "Collecting feeds every {}",
            datetime::format_duration(interval)
        );

        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            trace!(phase = %CyclePhase::Idle);
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                _ = timer.tick() => {}
            }

            if let CycleOutcome::Cancelled = self.run_cycle(&mut shutdown).await? {
                break;
            }
        }

        info!("Feed collection stopped");
        Ok(())
    }

    /// Run one continuous-mode cycle against the next due feed.
    pub async fn run_cycle(&self, shutdown: &mut watch::Receiver<bool>) -> Result<CycleOutcome> {
        trace!(phase = %CyclePhase::Selecting);
        let Some(feed) = self.feeds.select_next_due_feed().await? else {
            info!("No feeds to collect");
            return Ok(CycleOutcome::NoFeeds);
        };

        trace!(phase = %CyclePhase::MarkFetched, feed = %feed.name);
        self.feeds
            .mark_feed_fetched(feed.id, datetime::now())
            .await
            .map_err(|e| failed(&feed, CyclePhase::MarkFetched, e))?;

        trace!(phase = %CyclePhase::Fetching, feed = %feed.name);
        let document = tokio::select! {
            biased;
            _ = shutdown_requested(shutdown) => {
                info!("Fetch of feed {} cancelled", feed.name);
                return Ok(CycleOutcome::Cancelled);
            }
            result = self.source.fetch(&feed.url) => {
                result.map_err(|e| failed(&feed, CyclePhase::Fetching, e.into()))?
            }
        };

        trace!(phase = %CyclePhase::Ingesting, feed = %feed.name);
        let report = self
            .ingestor
            .ingest(feed.id, &document)
            .await
            .map_err(|e| failed(&feed, CyclePhase::Ingesting, e))?;

        trace!(phase = %CyclePhase::Reporting, feed = %feed.name);
        info!(
            "Feed {} collected, {} new posts found",
            feed.name, report.created
        );

        Ok(CycleOutcome::Collected { feed, report })
    }

    /// Fetch and ingest the feed registered under `url` once.
    ///
    /// The feed is marked fetched before the fetch, as in continuous mode.
    /// Unknown URLs and fetch failures are errors; per-item problems only
    /// show up in the report.
    pub async fn run_once(&self, url: &str) -> Result<OnceSummary> {
        let feed = self
            .feeds
            .get_feed_by_url(url)
            .await?
            .ok_or_else(|| GatorError::NotFound(format!("feed with URL {url}")))?;

        info!("Fetching feed {} ({})", feed.name, feed.url);
        self.feeds.mark_feed_fetched(feed.id, datetime::now()).await?;

        let document = self.source.fetch(&feed.url).await?;
        let report = self.ingestor.ingest(feed.id, &document).await?;

        Ok(OnceSummary {
            feed,
            channel_title: document.title,
            report,
        })
    }
}

fn failed(feed: &Feed, phase: CyclePhase, source: GatorError) -> GatorError {
    GatorError::Cycle {
        feed: feed.name.clone(),
        phase,
        source: Box::new(source),
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::error::FetchError;
    use crate::rss::repository::{FeedRepository, PostRepository};
    use crate::rss::types::{FetchedFeed, FetchedItem, NewFeed, NewPost};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::timeout;

    const GOOD_DATE: &str = "Mon, 02 Jan 2006 15:04:05 -0700";
    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// In-memory feed source. Unknown URLs fail to decode.
    #[derive(Default)]
    struct StubSource {
        documents: HashMap<String, FetchedFeed>,
        hang: bool,
        calls: Mutex<Vec<String>>,
    }

    impl StubSource {
        fn with(mut self, url: &str, document: FetchedFeed) -> Self {
            self.documents.insert(url.to_string(), document);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FeedSource for StubSource {
        async fn fetch(&self, url: &str) -> std::result::Result<FetchedFeed, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.documents
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Decode(format!("no document for {url}")))
        }
    }

    async fn setup() -> (Database, uuid::Uuid) {
        let db = Database::open_in_memory().await.unwrap();
        let user = UserRepository::new(db.pool())
            .create(&NewUser::new("owner"))
            .await
            .unwrap();
        (db, user.id)
    }

    async fn add_feed(db: &Database, owner: uuid::Uuid, name: &str, url: &str) -> Feed {
        FeedRepository::new(db.pool())
            .create(&NewFeed::new(name, url, owner))
            .await
            .unwrap()
    }

    fn document(items: Vec<FetchedItem>) -> FetchedFeed {
        FetchedFeed {
            title: "Channel".to_string(),
            description: "About".to_string(),
            items,
        }
    }

    fn item(link: &str, pub_date: &str) -> FetchedItem {
        FetchedItem::new(format!("Post {link}"), link, pub_date)
    }

    fn scheduler(db: &Database, source: Arc<StubSource>) -> Scheduler {
        Scheduler::new(SchedulerDeps::with_database(db.clone(), source))
    }

    #[test]
    fn test_cycle_phase_display() {
        assert_eq!(CyclePhase::Fetching.to_string(), "fetching");
        assert_eq!(CyclePhase::MarkFetched.to_string(), "marking fetched");
    }

    #[tokio::test]
    async fn test_run_once_summary_counts() {
        let (db, owner) = setup().await;
        let feed = add_feed(&db, owner, "Example", "https://example.com/rss").await;

        let posts = PostRepository::new(db.pool());
        for link in ["https://example.com/2", "https://example.com/4"] {
            posts
                .create(&NewPost::new(
                    feed.id,
                    "seen",
                    link,
                    crate::rss::date::normalize_pub_date(GOOD_DATE).unwrap(),
                ))
                .await
                .unwrap();
        }

        let source = Arc::new(StubSource::default().with(
            "https://example.com/rss",
            document(vec![
                item("https://example.com/1", GOOD_DATE),
                item("https://example.com/2", GOOD_DATE),
                item("https://example.com/3", "not a date"),
                item("https://example.com/4", GOOD_DATE),
                item("https://example.com/5", "2006-01-02T15:04:05Z"),
            ]),
        ));

        let summary = scheduler(&db, source)
            .run_once("https://example.com/rss")
            .await
            .unwrap();

        assert_eq!(summary.channel_title, "Channel");
        assert_eq!(summary.feed.id, feed.id);
        assert_eq!(summary.report.item_count, 5);
        assert_eq!(summary.report.created, 2);
        assert_eq!(summary.report.duplicates, 2);
        assert_eq!(summary.report.parse_errors, 1);

        let reloaded = FeedRepository::new(db.pool())
            .get_by_id(feed.id)
            .await
            .unwrap()
            .unwrap();
        assert!(reloaded.last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_run_once_unknown_feed() {
        let (db, _) = setup().await;
        let source = Arc::new(StubSource::default());

        let result = scheduler(&db, source.clone())
            .run_once("https://missing.example/rss")
            .await;

        assert!(matches!(result, Err(GatorError::NotFound(_))));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_once_fetch_failure_still_marks_fetched() {
        let (db, owner) = setup().await;
        let feed = add_feed(&db, owner, "Broken", "https://broken.example/rss").await;
        let source = Arc::new(StubSource::default());

        let result = scheduler(&db, source)
            .run_once("https://broken.example/rss")
            .await;

        assert!(matches!(result, Err(GatorError::Fetch(FetchError::Decode(_)))));
        let reloaded = FeedRepository::new(db.pool())
            .get_by_id(feed.id)
            .await
            .unwrap()
            .unwrap();
        assert!(reloaded.last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_run_cycle_without_feeds() {
        let (db, _) = setup().await;
        let (_tx, mut rx) = watch::channel(false);

        let outcome = scheduler(&db, Arc::new(StubSource::default()))
            .run_cycle(&mut rx)
            .await
            .unwrap();

        assert!(matches!(outcome, CycleOutcome::NoFeeds));
    }

    #[tokio::test]
    async fn test_run_cycle_picks_never_fetched_feed() {
        let (db, owner) = setup().await;
        let old = add_feed(&db, owner, "Old", "https://old.example/rss").await;
        let new = add_feed(&db, owner, "New", "https://new.example/rss").await;
        FeedRepository::new(db.pool())
            .mark_fetched(old.id, datetime::now())
            .await
            .unwrap();

        let source = Arc::new(
            StubSource::default()
                .with(&old.url, document(vec![]))
                .with(&new.url, document(vec![item("https://new.example/1", GOOD_DATE)])),
        );
        let (_tx, mut rx) = watch::channel(false);

        let outcome = scheduler(&db, source.clone())
            .run_cycle(&mut rx)
            .await
            .unwrap();

        let CycleOutcome::Collected { feed, report } = outcome else {
            panic!("expected a collected feed");
        };
        assert_eq!(feed.id, new.id);
        assert_eq!(report.created, 1);
        assert_eq!(source.calls(), vec![new.url.clone()]);
    }

    #[tokio::test]
    async fn test_continuous_rotates_feeds() {
        let (db, owner) = setup().await;
        let a = add_feed(&db, owner, "A", "https://a.example/rss").await;
        let b = add_feed(&db, owner, "B", "https://b.example/rss").await;
        let source = Arc::new(
            StubSource::default()
                .with(&a.url, document(vec![item("https://a.example/1", GOOD_DATE)]))
                .with(&b.url, document(vec![item("https://b.example/1", GOOD_DATE)])),
        );
        let sched = scheduler(&db, source.clone());
        let (tx, rx) = watch::channel(false);

        let stop = async {
            while source.calls().len() < 3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tx.send(true).unwrap();
        };
        let (result, ()) = timeout(
            TEST_TIMEOUT,
            async { tokio::join!(sched.run_continuous(Duration::from_millis(10), rx), stop) },
        )
        .await
        .unwrap();

        assert!(result.is_ok());
        let calls = source.calls();
        assert_eq!(&calls[..3], &[a.url.clone(), b.url.clone(), a.url.clone()]);
    }

    #[tokio::test]
    async fn test_continuous_fetch_error_is_fatal() {
        let (db, owner) = setup().await;
        let feed = add_feed(&db, owner, "Broken", "https://broken.example/rss").await;
        let source = Arc::new(StubSource::default());
        let (_tx, rx) = watch::channel(false);

        let result = timeout(
            TEST_TIMEOUT,
            scheduler(&db, source.clone()).run_continuous(Duration::from_millis(10), rx),
        )
        .await
        .unwrap();

        match result {
            Err(GatorError::Cycle { phase, feed: name, .. }) => {
                assert_eq!(phase, CyclePhase::Fetching);
                assert_eq!(name, "Broken");
            }
            other => panic!("expected a fetching failure, got {other:?}"),
        }
        assert_eq!(source.calls().len(), 1);

        let reloaded = FeedRepository::new(db.pool())
            .get_by_id(feed.id)
            .await
            .unwrap()
            .unwrap();
        assert!(reloaded.last_fetched_at.is_some());
        assert_eq!(
            PostRepository::new(db.pool())
                .count_by_feed(feed.id)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_continuous_stops_while_waiting() {
        let (db, _) = setup().await;
        let sched = scheduler(&db, Arc::new(StubSource::default()));
        let (tx, rx) = watch::channel(false);

        let stop = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.send(true).unwrap();
        };
        let (result, ()) = timeout(
            TEST_TIMEOUT,
            async { tokio::join!(sched.run_continuous(Duration::from_secs(3600), rx), stop) },
        )
        .await
        .unwrap();

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_continuous_stops_mid_fetch() {
        let (db, owner) = setup().await;
        let feed = add_feed(&db, owner, "Slow", "https://slow.example/rss").await;
        let source = Arc::new(StubSource {
            hang: true,
            ..StubSource::default()
        });
        let sched = scheduler(&db, source.clone());
        let (tx, rx) = watch::channel(false);

        let stop = async {
            while source.calls().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tx.send(true).unwrap();
        };
        let (result, ()) = timeout(
            TEST_TIMEOUT,
            async { tokio::join!(sched.run_continuous(Duration::from_secs(3600), rx), stop) },
        )
        .await
        .unwrap();

        assert!(result.is_ok());
        let reloaded = FeedRepository::new(db.pool())
            .get_by_id(feed.id)
            .await
            .unwrap()
            .unwrap();
        assert!(reloaded.last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_continuous_stops_when_sender_dropped() {
        let (db, _) = setup().await;
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let result = timeout(
            TEST_TIMEOUT,
            scheduler(&db, Arc::new(StubSource::default()))
                .run_continuous(Duration::from_secs(3600), rx),
        )
        .await
        .unwrap();

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_continuous_rejects_zero_interval() {
        let (db, _) = setup().await;
        let (_tx, rx) = watch::channel(false);

        let result = scheduler(&db, Arc::new(StubSource::default()))
            .run_continuous(Duration::ZERO, rx)
            .await;

        assert!(matches!(result, Err(GatorError::Validation(_))));
    }
}
