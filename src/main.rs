use std::fmt::Write as _;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

use gator::rss::{
    FeedRepository, NewFeed, OnceSummary, PostRepository, RssFetcher, Scheduler, SchedulerDeps,
    DEFAULT_BROWSE_LIMIT,
};
use gator::{datetime, Config, Database, GatorError, NewUser, Result, User, UserRepository};

/// Number of created posts listed by `aggone`.
const PREVIEW_POSTS: usize = 3;

#[derive(Debug, Parser)]
#[command(name = "gator", version, about = "RSS feed aggregator")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "gator.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a user.
    Register { name: String },
    /// List users, marking the configured current user.
    Users,
    /// Delete all users together with their feeds and posts.
    Reset,
    /// Register a feed.
    Addfeed {
        name: String,
        url: String,
        /// Owner of the feed. Defaults to `current_user` from the config.
        #[arg(short, long)]
        user: Option<String>,
    },
    /// List registered feeds.
    Feeds,
    /// Collect feeds continuously until interrupted.
    Agg {
        /// Time between fetches, e.g. `30s`, `5m` or `1h30m`.
        interval: Option<String>,
    },
    /// Fetch a single feed once and print a summary.
    Aggone { url: String },
    /// Show the most recent posts.
    Browse {
        #[arg(default_value_t = DEFAULT_BROWSE_LIMIT)]
        limit: i64,
        /// Only show posts of the feed with this URL.
        #[arg(short, long)]
        feed: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load_with_env(&cli.config).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = gator::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        gator::logging::init_console_only(&config.logging.level);
    }

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &Config) -> Result<()> {
    let db = Database::open(&config.database.url, config.database.max_connections).await?;

    match command {
        Command::Register { name } => register(&db, &name).await,
        Command::Users => list_users(&db, config.current_user.as_deref()).await,
        Command::Reset => reset(&db).await,
        Command::Addfeed { name, url, user } => {
            let owner = user.or_else(|| config.current_user.clone()).ok_or_else(|| {
                GatorError::Validation("no user given and no current_user configured".into())
            })?;
            add_feed(&db, &name, &url, &owner).await
        }
        Command::Feeds => list_feeds(&db).await,
        Command::Agg { interval } => {
            let interval = match interval {
                Some(s) => datetime::parse_duration(&s)?,
                None => Duration::from_secs(config.scheduler.interval_secs),
            };
            aggregate(db, config, interval).await
        }
        Command::Aggone { url } => aggregate_once(db, config, &url).await,
        Command::Browse { limit, feed } => browse(&db, limit, feed.as_deref()).await,
    }
}

async fn register(db: &Database, name: &str) -> Result<()> {
    let user = UserRepository::new(db.pool())
        .create(&NewUser::new(name))
        .await?;
    info!("Registered user {}", user.name);
    println!("User {} registered (id {})", user.name, user.id);
    Ok(())
}

async fn list_users(db: &Database, current: Option<&str>) -> Result<()> {
    let users = UserRepository::new(db.pool()).list_all().await?;
    if users.is_empty() {
        println!("No users registered.");
        return Ok(());
    }
    print!("{}", render_users(&users, current));
    Ok(())
}

fn render_users(users: &[User], current: Option<&str>) -> String {
    let mut out = String::new();
    for user in users {
        let marker = match current {
            Some(name) if name.eq_ignore_ascii_case(&user.name) => " (current)",
            _ => "",
        };
        let _ = writeln!(out, "* {}{marker}", user.name);
    }
    out
}

async fn reset(db: &Database) -> Result<()> {
    let removed = UserRepository::new(db.pool()).delete_all().await?;
    info!("Deleted {} users", removed);
    println!("All users have been cleared from the database ({removed} removed)");
    Ok(())
}

async fn add_feed(db: &Database, name: &str, url: &str, owner: &str) -> Result<()> {
    let user = UserRepository::new(db.pool())
        .get_by_name(owner)
        .await?
        .ok_or_else(|| GatorError::NotFound(format!("user {owner}")))?;

    let feed = FeedRepository::new(db.pool())
        .create(&NewFeed::new(name, url, user.id))
        .await?;
    info!("Added feed {} for {}", feed.name, user.name);
    println!("Feed {} added", feed.name);
    println!("  url:  {}", feed.url);
    println!("  id:   {}", feed.id);
    Ok(())
}

async fn list_feeds(db: &Database) -> Result<()> {
    let feeds = FeedRepository::new(db.pool()).list_with_owner().await?;
    if feeds.is_empty() {
        println!("No feeds registered.");
        return Ok(());
    }
    for entry in feeds {
        let last = entry
            .feed
            .last_fetched_at
            .map(|at| datetime::format_display(&at))
            .unwrap_or_else(|| "never".to_string());
        println!("{}", entry.feed.name);
        println!("  url:          {}", entry.feed.url);
        println!("  user:         {}", entry.user_name);
        println!("  last fetched: {last}");
    }
    Ok(())
}

fn scheduler(db: Database, config: &Config) -> Result<Scheduler> {
    let fetcher = RssFetcher::new(&config.fetcher)?;
    Ok(Scheduler::new(SchedulerDeps::with_database(
        db,
        Arc::new(fetcher),
    )))
}

/// Request shutdown once `signal` fires.
///
/// If the signal cannot be listened for, the sender is kept alive so the
/// scheduler keeps running.
async fn forward_interrupt<F>(signal: F, shutdown: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Shutdown requested");
            let _ = shutdown.send(true);
        }
        Err(e) => {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

async fn aggregate(db: Database, config: &Config, interval: Duration) -> Result<()> {
    let scheduler = scheduler(db, config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(forward_interrupt(tokio::signal::ctrl_c(), shutdown_tx));

    scheduler.run_continuous(interval, shutdown_rx).await
}

async fn aggregate_once(db: Database, config: &Config, url: &str) -> Result<()> {
    let summary = scheduler(db, config)?.run_once(url).await?;
    print!("{}", render_summary(&summary));
    Ok(())
}

fn render_summary(summary: &OnceSummary) -> String {
    let feed = &summary.feed;
    let report = &summary.report;
    let mut out = String::new();

    let _ = writeln!(out, "Fetching feed: {}", feed.name);
    let _ = writeln!(out, "URL: {}", feed.url);
    let _ = writeln!(out, "Feed ID: {}", feed.id);
    let _ = writeln!(out);
    let _ = writeln!(out, "Fetched RSS Feed: {}", summary.channel_title);
    let _ = writeln!(out, "Number of items: {}", report.item_count);
    let _ = writeln!(out);
    for post in report.new_posts.iter().take(PREVIEW_POSTS) {
        let _ = writeln!(
            out,
            "✓ Created: {} (published: {})",
            post.title,
            post.published_at.format("%Y-%m-%d")
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "=== Summary ===");
    let _ = writeln!(out, "Feed: {}", feed.name);
    let _ = writeln!(out, "Total items: {}", report.item_count);
    let _ = writeln!(out, "New posts: {}", report.created);
    let _ = writeln!(out, "Duplicates: {}", report.duplicates);
    let _ = writeln!(out, "Parse errors: {}", report.parse_errors);
    out
}

async fn browse(db: &Database, limit: i64, feed_url: Option<&str>) -> Result<()> {
    if limit <= 0 {
        return Err(GatorError::Validation("limit must be positive".into()));
    }
    let posts = PostRepository::new(db.pool());

    let entries: Vec<(String, gator::rss::Post)> = match feed_url {
        Some(url) => {
            let feed = FeedRepository::new(db.pool())
                .get_by_url(url)
                .await?
                .ok_or_else(|| GatorError::NotFound(format!("feed with URL {url}")))?;
            posts
                .list_by_feed(feed.id, limit)
                .await?
                .into_iter()
                .map(|post| (feed.name.clone(), post))
                .collect()
        }
        None => posts
            .list_recent(limit)
            .await?
            .into_iter()
            .map(|entry| (entry.feed_name, entry.post))
            .collect(),
    };

    if entries.is_empty() {
        println!("No posts yet.");
        return Ok(());
    }
    for (feed_name, post) in entries {
        println!("Feed: {feed_name}");
        println!("Title: {}", post.title);
        println!("URL: {}", post.url);
        if let Some(description) = &post.description {
            println!("Description: {description}");
        }
        println!("Published: {}", datetime::format_display(&post.published_at));
        println!();
    }
    Ok(())
}
