//! RSS feed fetching and parsing.
//!
//! Pulls RSS 2.0 feeds over HTTP and extracts `<item>` entries into
//! [`Article`]s. The parser is tolerant: unknown elements are skipped,
//! items without a link are dropped (the link is the dedup key), and a
//! malformed `pubDate` simply leaves `published_at` unset.

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;

use causeway_core::models::Article;

use crate::config::FeedsConfig;

/// Fetch one feed URL and parse its items.
pub async fn fetch_feed(client: &reqwest::Client, url: &str) -> Result<Vec<Article>> {
    let body = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch feed: {}", url))?
        .error_for_status()
        .with_context(|| format!("Feed returned an error status: {}", url))?
        .text()
        .await?;

    parse_rss(&body).with_context(|| format!("Failed to parse feed: {}", url))
}

/// Fetch all configured feeds, skipping (and reporting) ones that fail.
pub async fn fetch_all(config: &FeedsConfig) -> Result<Vec<Article>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let mut articles = Vec::new();
    for url in &config.urls {
        match fetch_feed(&client, url).await {
            Ok(mut items) => articles.append(&mut items),
            Err(e) => println!("  feed error ({}): {:#}", url, e),
        }
    }
    Ok(articles)
}

/// Parse an RSS 2.0 document into articles.
pub fn parse_rss(xml: &str) -> Result<Vec<Article>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut articles = Vec::new();

    #[derive(Clone, Copy, PartialEq)]
    enum Field {
        Title,
        Link,
        Description,
        PubDate,
    }

    fn append_field(
        f: Field,
        text: &str,
        title: &mut String,
        link: &mut String,
        description: &mut String,
        pub_date: &mut String,
    ) {
        let target = match f {
            Field::Title => title,
            Field::Link => link,
            Field::Description => description,
            Field::PubDate => pub_date,
        };
        target.push_str(text);
    }

    let mut in_item = false;
    let mut field: Option<Field> = None;
    let mut title = String::new();
    let mut link = String::new();
    let mut description = String::new();
    let mut pub_date = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"item" => {
                        in_item = true;
                        title.clear();
                        link.clear();
                        description.clear();
                        pub_date.clear();
                    }
                    b"title" if in_item => field = Some(Field::Title),
                    b"link" if in_item => field = Some(Field::Link),
                    b"description" if in_item => field = Some(Field::Description),
                    b"pubDate" if in_item => field = Some(Field::PubDate),
                    _ => field = None,
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"item" {
                    in_item = false;
                    if !link.is_empty() {
                        articles.push(Article {
                            title: title.trim().to_string(),
                            description: description.trim().to_string(),
                            link: link.trim().to_string(),
                            published_at: parse_pub_date(&pub_date),
                        });
                    }
                }
                field = None;
            }
            Event::Text(e) => {
                if let Some(f) = field {
                    let text = e.unescape().unwrap_or_default();
                    append_field(f, &text, &mut title, &mut link, &mut description, &mut pub_date);
                }
            }
            Event::CData(e) => {
                if let Some(f) = field {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    append_field(f, &text, &mut title, &mut link, &mut description, &mut pub_date);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(articles)
}

/// Parse an RFC 2822 `pubDate` into a Unix timestamp.
fn parse_pub_date(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    chrono::DateTime::parse_from_rfc2822(trimmed)
        .ok()
        .map(|dt| dt.timestamp())
}
