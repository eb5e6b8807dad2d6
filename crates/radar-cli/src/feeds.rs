//! RSS and Atom feeds as a source of fetch jobs.

use crate::fetch::FetchJob;
use anyhow::{Context, Result, bail};
use reqwest::Url;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const UNKNOWN_CATEGORY: &str = "unknown_category";

const FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// The YAML feeds file: `feeds: [<url>, ...]`.
#[derive(Debug, Default, Deserialize)]
struct FeedList {
    #[serde(default)]
    feeds: Vec<String>,
}

/// Read the feed URLs listed in a YAML file. An empty list is an error.
pub async fn load_feed_list(path: &Path) -> Result<Vec<String>> {
    tracing::info!("Loading feeds from {}", path.display());
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let list: FeedList = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    if list.feeds.is_empty() {
        bail!("no feeds listed in {}", path.display());
    }
    Ok(list.feeds)
}

/// Category for articles of a feed, taken from the part of its path after
/// `/feed/`. `/feed/tag/rust` gives `tag_rust`.
pub fn category_from_feed(feed: &Url) -> String {
    let path = feed.path();
    let Some(pos) = path.rfind("/feed/") else {
        return UNKNOWN_CATEGORY.to_string();
    };
    let suffix = &path[pos + "/feed/".len()..];
    let category = if suffix.starts_with("tag/") {
        suffix.trim_end_matches('/').replace('/', "_")
    } else {
        suffix.trim_matches('/').to_string()
    };
    if category.is_empty() {
        UNKNOWN_CATEGORY.to_string()
    } else {
        category
    }
}

/// Turn a downloaded feed document into at most `limit` fetch jobs.
///
/// Entries without a usable link are skipped. `limit` of `None` or 0 keeps
/// every entry.
pub fn jobs_from_feed(body: &[u8], category: &str, limit: Option<usize>) -> Result<Vec<FetchJob>> {
    let feed = feed_rs::parser::parse(body).context("Failed to parse feed")?;
    let limit = match limit {
        Some(n) if n > 0 => n,
        _ => usize::MAX,
    };

    let mut jobs = Vec::new();
    for entry in feed.entries {
        if jobs.len() >= limit {
            tracing::info!("Reached the limit of {limit} article(s) for this feed");
            break;
        }
        let Some(url) = entry.links.iter().find_map(|link| Url::parse(&link.href).ok()) else {
            tracing::warn!("Skipping feed entry '{}' without a link", entry.id);
            continue;
        };
        let job = match entry.title {
            Some(title) if !title.content.trim().is_empty() => {
                FetchJob::titled(url, title.content.trim(), category)
            }
            _ => FetchJob::new(url, category),
        };
        tracing::debug!("Queued feed item {}: {}", jobs.len() + 1, job.title);
        jobs.push(job);
    }
    Ok(jobs)
}

/// Download every feed and collect its jobs. Feeds that cannot be fetched
/// or parsed are logged and skipped.
pub async fn collect_jobs(feeds: &[String], limit: Option<usize>) -> Result<Vec<FetchJob>> {
    let client = reqwest::Client::builder()
        .timeout(FEED_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")?;

    let mut jobs = Vec::new();
    for raw in feeds {
        match feed_jobs(&client, raw, limit).await {
            Ok(found) if found.is_empty() => tracing::warn!("Feed {raw} has no entries"),
            Ok(found) => {
                tracing::info!("Feed {raw}: {} article(s)", found.len());
                jobs.extend(found);
            }
            Err(e) => tracing::error!("Skipping feed {raw}: {e:#}"),
        }
    }
    Ok(jobs)
}

async fn feed_jobs(client: &reqwest::Client, raw: &str, limit: Option<usize>) -> Result<Vec<FetchJob>> {
    let url = Url::parse(raw).with_context(|| format!("Invalid feed URL: {raw}"))?;
    let category = category_from_feed(&url);
    let body = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .context("Failed to download feed")?
        .bytes()
        .await
        .context("Failed to read feed body")?;
    jobs_from_feed(&body, &category, limit)
}
