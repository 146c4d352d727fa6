//! Item source: the `tweets.js` file from an X/Twitter data export.
//!
//! The file is a JavaScript assignment, `window.YTD.tweets.part0 = [...]`,
//! wrapping a JSON array of `{"tweet": {...}}` objects. Parsing yields work
//! items deduplicated by id and sorted oldest-first (ascending snowflake id).

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::Value;

use crate::error::SweepError;
use crate::state_machine::WorkItem;
use crate::x_api::Tweet;

pub const ARCHIVE_PREFIX: &str = "window.YTD.tweets.part0 = ";

/// `created_at` as found in official exports: `Mon Apr 06 22:19:45 +0000 2009`.
const ARCHIVE_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Parse an export into work items, timestamps shifted to `tz`.
pub fn parse_archive(bytes: &[u8], tz: FixedOffset) -> Result<Vec<WorkItem>, SweepError> {
    let text = String::from_utf8_lossy(bytes);
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix(ARCHIVE_PREFIX) {
        body = rest;
    }
    let start = body
        .find(['[', '{'])
        .ok_or_else(|| SweepError::Archive("no JSON array found".into()))?;
    let body = body[start..].trim_end().trim_end_matches(';');

    let entries: Value = serde_json::from_str(body)?;
    let Value::Array(entries) = entries else {
        return Err(SweepError::Archive("expected a JSON array of tweets".into()));
    };

    let mut seen = HashSet::new();
    let mut items: Vec<WorkItem> = entries
        .iter()
        .filter_map(|entry| entry.get("tweet"))
        .filter_map(|tweet| item_from_tweet(tweet, tz))
        .filter(|item| seen.insert(item.id.clone()))
        .collect();
    items.sort_by(|a, b| compare_ids(&a.id, &b.id));
    Ok(items)
}

fn item_from_tweet(tweet: &Value, tz: FixedOffset) -> Option<WorkItem> {
    let id = match tweet.get("id_str").or_else(|| tweet.get("id"))? {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let text = tweet
        .get("full_text")
        .or_else(|| tweet.get("text"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let source_timestamp = tweet
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| parse_created_at(s, tz));
    Some(WorkItem {
        source_timestamp,
        ..WorkItem::new(id, text)
    })
}

/// Accepts both the export format and RFC 3339 (API v2).
pub fn parse_created_at(raw: &str, tz: FixedOffset) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw, ARCHIVE_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&tz))
}

/// Snowflake ids grow with time; compare numerically, falling back to text.
pub fn compare_ids(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
    }
}

#[derive(Serialize)]
struct ArchiveEntry<'a> {
    tweet: ArchiveTweet<'a>,
}

#[derive(Serialize)]
struct ArchiveTweet<'a> {
    id_str: &'a str,
    id: &'a str,
    full_text: &'a str,
    text: &'a str,
    created_at: Option<&'a str>,
    lang: Option<&'a str>,
    source: &'a str,
    retweet_count: String,
    favorite_count: String,
    entities: Value,
}

/// Render posts in the export format so `parse_archive` can read them back.
pub fn write_archive(tweets: &[Tweet]) -> Result<Vec<u8>, SweepError> {
    let entries: Vec<ArchiveEntry<'_>> = tweets
        .iter()
        .map(|t| {
            let metrics = t.public_metrics.unwrap_or_default();
            ArchiveEntry {
                tweet: ArchiveTweet {
                    id_str: &t.id,
                    id: &t.id,
                    full_text: &t.text,
                    text: &t.text,
                    created_at: t.created_at.as_deref(),
                    lang: t.lang.as_deref(),
                    source: t.source.as_deref().unwrap_or_default(),
                    retweet_count: metrics.retweet_count.to_string(),
                    favorite_count: metrics.like_count.to_string(),
                    entities: t
                        .entities
                        .clone()
                        .unwrap_or_else(|| Value::Object(Default::default())),
                },
            }
        })
        .collect();

    let mut out = ARCHIVE_PREFIX.as_bytes().to_vec();
    serde_json::to_writer(&mut out, &entries)?;
    out.extend_from_slice(b";\n");
    Ok(out)
}
