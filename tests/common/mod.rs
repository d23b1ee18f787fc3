//! Test helpers for integration tests.
//!
//! Provides an in-memory database with seeded users and feeds, and RSS
//! documents served from a wiremock server.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gator::config::FetcherConfig;
use gator::rss::{Feed, FeedRepository, NewFeed, RssFetcher, Scheduler, SchedulerDeps};
use gator::{Database, NewUser, User, UserRepository};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A publication date every parser accepts.
pub const GOOD_DATE: &str = "Mon, 02 Jan 2006 15:04:05 -0700";

/// An item of a served RSS document.
pub struct TestItem {
    pub title: String,
    pub link: String,
    pub pub_date: String,
}

impl TestItem {
    pub fn new(title: &str, link: &str, pub_date: &str) -> Self {
        Self {
            title: title.to_string(),
            link: link.to_string(),
            pub_date: pub_date.to_string(),
        }
    }
}

/// Render an RSS 2.0 document.
pub fn rss_document(title: &str, items: &[TestItem]) -> String {
    let mut body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <rss version=\"2.0\"><channel>\
         <title>{title}</title>\
         <link>https://example.com/</link>\
         <description>Test channel</description>"
    );
    for item in items {
        body.push_str(&format!(
            "<item><title>{}</title><link>{}</link>\
             <description>About {}</description><pubDate>{}</pubDate></item>",
            item.title, item.link, item.title, item.pub_date
        ));
    }
    body.push_str("</channel></rss>");
    body
}

/// Serve `body` at `route` on `server`.
pub async fn serve_rss(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

/// URL on a loopback port nothing listens on.
pub fn closed_port_url(route: &str) -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to read local address");
    drop(listener);
    format!("http://{addr}{route}")
}

/// Create an in-memory database.
pub async fn setup_db() -> Database {
    Database::open_in_memory()
        .await
        .expect("Failed to open in-memory database")
}

/// Register a user.
pub async fn create_user(db: &Database, name: &str) -> User {
    UserRepository::new(db.pool())
        .create(&NewUser::new(name))
        .await
        .expect("Failed to create user")
}

/// Register a feed owned by `owner`.
pub async fn create_feed(db: &Database, owner: &User, name: &str, url: &str) -> Feed {
    FeedRepository::new(db.pool())
        .create(&NewFeed::new(name, url, owner.id))
        .await
        .expect("Failed to create feed")
}

/// Fetcher configuration with short timeouts.
pub fn fetcher_config() -> FetcherConfig {
    FetcherConfig {
        user_agent: "gator-test".to_string(),
        connect_timeout_secs: 2,
        total_timeout_secs: 5,
        max_redirects: 2,
        max_feed_size_bytes: 1024 * 1024,
    }
}

/// Scheduler wired to `db` and a real HTTP fetcher.
pub fn http_scheduler(db: &Database) -> Scheduler {
    let fetcher = RssFetcher::new(&fetcher_config()).expect("Failed to build fetcher");
    Scheduler::new(SchedulerDeps::with_database(db.clone(), Arc::new(fetcher)))
}
