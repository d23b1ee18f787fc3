//! RSS feed fetcher.
//!
//! Fetches a feed over HTTP, decodes the RSS 2.0 envelope and unescapes HTML
//! entities left in text fields. A fetch either yields a complete
//! [`FetchedFeed`] or a [`FetchError`].

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use tracing::debug;

use crate::config::FetcherConfig;
use crate::error::FetchError;
use crate::rss::traits::FeedSource;
use crate::rss::types::{FetchedFeed, FetchedItem};

/// HTTP feed fetcher.
#[derive(Debug, Clone)]
pub struct RssFetcher {
    client: Client,
    max_feed_size: u64,
}

impl RssFetcher {
    /// Create a fetcher from configuration.
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
        })
    }

    /// Fetch and decode the feed at `url`.
    ///
    /// The whole body is read before decoding. Dropping the returned future
    /// aborts the request.
    pub async fn fetch(&self, url: &str) -> Result<FetchedFeed, FetchError> {
        validate_url(url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::Request)?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(FetchError::TooLarge {
                    size: content_length,
                    max: self.max_feed_size,
                });
            }
        }

        let bytes = response.bytes().await.map_err(FetchError::Body)?;

        if bytes.len() as u64 > self.max_feed_size {
            return Err(FetchError::TooLarge {
                size: bytes.len() as u64,
                max: self.max_feed_size,
            });
        }

        debug!("Fetched {} bytes from {}", bytes.len(), url);
        parse_feed(&bytes)
    }
}

#[async_trait]
impl FeedSource for RssFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed, FetchError> {
        RssFetcher::fetch(self, url).await
    }
}

/// Check that `url` is an absolute http(s) URL.
pub fn validate_url(url: &str) -> Result<(), FetchError> {
    let parsed = url::Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(FetchError::InvalidUrl(format!(
            "unsupported URL scheme: {scheme}"
        ))),
    }
}

/// Decode an RSS 2.0 document.
///
/// The root element must be `rss`. Channel title/description and item
/// title/description are unescaped once. An item without description keeps
/// `None`.
pub fn parse_feed(bytes: &[u8]) -> Result<FetchedFeed, FetchError> {
    let root = root_element(bytes)?;
    if root != b"rss" {
        return Err(FetchError::Decode(format!(
            "unsupported root element <{}>",
            String::from_utf8_lossy(&root)
        )));
    }

    let channel =
        ::rss::Channel::read_from(bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

    let items = channel
        .items()
        .iter()
        .map(|item| FetchedItem {
            title: item.title().map(unescape).unwrap_or_default(),
            link: item.link().unwrap_or_default().to_string(),
            description: item.description().map(unescape),
            pub_date: item.pub_date().unwrap_or_default().to_string(),
        })
        .collect();

    Ok(FetchedFeed {
        title: unescape(channel.title()),
        description: unescape(channel.description()),
        items,
    })
}

/// Name of the first element in the document, skipping the prolog.
fn root_element(bytes: &[u8]) -> Result<Vec<u8>, FetchError> {
    let mut reader = Reader::from_reader(bytes);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => return Ok(e.name().as_ref().to_vec()),
            Ok(Event::Eof) => {
                return Err(FetchError::Decode("document has no root element".into()))
            }
            Ok(_) => {}
            Err(e) => return Err(FetchError::Decode(e.to_string())),
        }
    }
}

fn unescape(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}
