//! RSS types for gator.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Maximum feed name length in characters.
pub const MAX_FEED_NAME_LENGTH: usize = 128;

/// Default number of posts shown by `browse`.
pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

/// A registered feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: Uuid,
    pub name: String,
    /// Source URL, unique across all feeds.
    pub url: String,
    /// Owning user.
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `None` until the scheduler first picks the feed.
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// New feed for registration.
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
}

impl NewFeed {
    /// Create a new feed request.
    pub fn new(name: impl Into<String>, url: impl Into<String>, user_id: Uuid) -> Self {
        Self {
            name: name.into().trim().to_string(),
            url: url.into().trim().to_string(),
            user_id,
        }
    }

    /// Check the name is present and the URL is an absolute http(s) URL.
    pub fn validate(&self) -> crate::Result<()> {
        if self.name.is_empty() {
            return Err(crate::GatorError::Validation("feed name is empty".into()));
        }
        if self.name.chars().count() > MAX_FEED_NAME_LENGTH {
            return Err(crate::GatorError::Validation(format!(
                "feed name is longer than {MAX_FEED_NAME_LENGTH} characters"
            )));
        }
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| crate::GatorError::Validation(format!("invalid feed URL: {e}")))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(crate::GatorError::Validation(format!(
                "unsupported URL scheme: {scheme}"
            ))),
        }
    }
}

/// A feed together with the name of its owner, as listed by `feeds`.
#[derive(Debug, Clone)]
pub struct FeedWithOwner {
    pub feed: Feed,
    pub user_name: String,
}

/// A post collected from a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub title: String,
    /// Link URL, unique per feed.
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New post for creation.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub feed_id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl NewPost {
    /// Create a new post without description.
    pub fn new(
        feed_id: Uuid,
        title: impl Into<String>,
        url: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            feed_id,
            title: title.into(),
            url: url.into(),
            description: None,
            published_at,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A post together with the name of its feed, as listed by `browse`.
#[derive(Debug, Clone)]
pub struct PostWithFeed {
    pub post: Post,
    pub feed_name: String,
}

/// A decoded RSS document.
///
/// Lives for one fetch cycle only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedFeed {
    pub title: String,
    pub description: String,
    /// Items in document order.
    pub items: Vec<FetchedItem>,
}

/// An item of a decoded RSS document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedItem {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    /// Raw `pubDate` text, empty when the element is missing.
    pub pub_date: String,
}

impl FetchedItem {
    /// Create an item without description.
    pub fn new(
        title: impl Into<String>,
        link: impl Into<String>,
        pub_date: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            description: None,
            pub_date: pub_date.into(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
