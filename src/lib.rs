//! gator - RSS feed aggregator
//!
//! Registered feeds are fetched on a fixed interval and their items stored
//! as posts in a SQL database.

pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod logging;
pub mod rss;

pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository};
pub use error::{DateParseError, FetchError, GatorError, Result};
