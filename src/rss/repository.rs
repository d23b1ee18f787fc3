//! Feed and post repositories for gator.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{Feed, FeedWithOwner, NewFeed, NewPost, Post, PostWithFeed};
use crate::datetime;
use crate::db::{parse_id, parse_timestamp, DbPool};
use crate::{GatorError, Result};

/// Row type for feed from database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: String,
    name: String,
    url: String,
    user_id: String,
    created_at: String,
    updated_at: String,
    last_fetched_at: Option<String>,
}

impl TryFrom<FeedRow> for Feed {
    type Error = GatorError;

    fn try_from(row: FeedRow) -> Result<Self> {
        Ok(Feed {
            id: parse_id(&row.id)?,
            name: row.name,
            url: row.url,
            user_id: parse_id(&row.user_id)?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            last_fetched_at: row
                .last_fetched_at
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
        })
    }
}

/// Row type for feed joined with its owner's name.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedWithOwnerRow {
    #[sqlx(flatten)]
    feed: FeedRow,
    user_name: String,
}

/// Row type for post from database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostRow {
    id: String,
    feed_id: String,
    title: String,
    url: String,
    description: Option<String>,
    published_at: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<PostRow> for Post {
    type Error = GatorError;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(Post {
            id: parse_id(&row.id)?,
            feed_id: parse_id(&row.feed_id)?,
            title: row.title,
            url: row.url,
            description: row.description,
            published_at: parse_timestamp(&row.published_at)?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

/// Row type for post joined with its feed's name.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostWithFeedRow {
    #[sqlx(flatten)]
    post: PostRow,
    feed_name: String,
}

const FEED_COLUMNS: &str = "f.id, f.name, f.url, f.user_id, f.created_at, f.updated_at, f.last_fetched_at";

const POST_COLUMNS: &str =
    "p.id, p.feed_id, p.title, p.url, p.description, p.published_at, p.created_at, p.updated_at";

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Register a new feed.
    ///
    /// Fails with [`GatorError::DuplicateKey`] if the URL is already registered.
    pub async fn create(&self, new_feed: &NewFeed) -> Result<Feed> {
        new_feed.validate()?;

        let now = datetime::now();
        let feed = Feed {
            id: Uuid::new_v4(),
            name: new_feed.name.clone(),
            url: new_feed.url.clone(),
            user_id: new_feed.user_id,
            created_at: now,
            updated_at: now,
            last_fetched_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO feeds (id, name, url, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(feed.id.to_string())
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(feed.user_id.to_string())
        .bind(datetime::to_storage(&feed.created_at))
        .bind(datetime::to_storage(&feed.updated_at))
        .execute(self.pool)
        .await?;

        Ok(feed)
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds f WHERE f.id = $1");
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(id.to_string())
            .fetch_optional(self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// Get a feed by its source URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let query = format!("SELECT {FEED_COLUMNS} FROM feeds f WHERE f.url = $1");
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .bind(url)
            .fetch_optional(self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// List all feeds with their owner names, in registration order.
    pub async fn list_with_owner(&self) -> Result<Vec<FeedWithOwner>> {
        let query = format!(
            r#"
            SELECT {FEED_COLUMNS}, u.name AS user_name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.created_at ASC, f.id ASC
            "#
        );
        let rows = sqlx::query_as::<_, FeedWithOwnerRow>(&query)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(FeedWithOwner {
                    feed: Feed::try_from(row.feed)?,
                    user_name: row.user_name,
                })
            })
            .collect()
    }

    /// The feed fetched least recently.
    ///
    /// Feeds that were never fetched come first; ties are broken by
    /// registration order.
    pub async fn next_to_fetch(&self) -> Result<Option<Feed>> {
        let query = format!(
            r#"
            SELECT {FEED_COLUMNS}
            FROM feeds f
            ORDER BY f.last_fetched_at ASC NULLS FIRST, f.created_at ASC, f.id ASC
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, FeedRow>(&query)
            .fetch_optional(self.pool)
            .await?;

        row.map(Feed::try_from).transpose()
    }

    /// Set `last_fetched_at` (and `updated_at`) to `at`.
    pub async fn mark_fetched(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let stamp = datetime::to_storage(&at);
        let result = sqlx::query(
            "UPDATE feeds SET last_fetched_at = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(&stamp)
        .bind(&stamp)
        .bind(id.to_string())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(GatorError::NotFound(format!("feed {id}")));
        }
        Ok(())
    }
}

/// Repository for post operations.
pub struct PostRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> PostRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a post with a fresh ID and the current time as created/updated.
    ///
    /// Fails with [`GatorError::DuplicateKey`] when the feed already has a
    /// post with the same link.
    pub async fn create(&self, new_post: &NewPost) -> Result<Post> {
        let now = datetime::now();
        let post = Post {
            id: Uuid::new_v4(),
            feed_id: new_post.feed_id,
            title: new_post.title.clone(),
            url: new_post.url.clone(),
            description: new_post.description.clone(),
            published_at: datetime::at_storage_precision(new_post.published_at),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO posts (id, feed_id, title, url, description, published_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(post.id.to_string())
        .bind(post.feed_id.to_string())
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(datetime::to_storage(&post.published_at))
        .bind(datetime::to_storage(&post.created_at))
        .bind(datetime::to_storage(&post.updated_at))
        .execute(self.pool)
        .await?;

        Ok(post)
    }

    /// List posts of one feed, newest publication first.
    pub async fn list_by_feed(&self, feed_id: Uuid, limit: i64) -> Result<Vec<Post>> {
        let query = format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts p
            WHERE p.feed_id = $1
            ORDER BY p.published_at DESC, p.created_at DESC
            LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, PostRow>(&query)
            .bind(feed_id.to_string())
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Post::try_from).collect()
    }

    /// List the most recently published posts across all feeds.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<PostWithFeed>> {
        let query = format!(
            r#"
            SELECT {POST_COLUMNS}, f.name AS feed_name
            FROM posts p
            JOIN feeds f ON f.id = p.feed_id
            ORDER BY p.published_at DESC, p.created_at DESC
            LIMIT $1
            "#
        );
        let rows = sqlx::query_as::<_, PostWithFeedRow>(&query)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PostWithFeed {
                    post: Post::try_from(row.post)?,
                    feed_name: row.feed_name,
                })
            })
            .collect()
    }

    /// Count the posts of one feed.
    pub async fn count_by_feed(&self, feed_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE feed_id = $1")
            .bind(feed_id.to_string())
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
