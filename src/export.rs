//! Timeline export: pages through a user's posts and produces the list that
//! [`crate::archive::write_archive`] turns into a `tweets.js` item source.

use std::time::Duration;

use tracing::{info, warn};

use crate::archive::compare_ids;
use crate::error::SweepError;
use crate::x_api::{ApiError, TimelineOptions, TimelinePage, Tweet, XClient};

/// Consecutive 429/503 answers tolerated before giving up.
pub const MAX_THROTTLED: u32 = 5;

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub username: String,
    /// Upper bound on the number of posts returned.
    pub count: usize,
    pub options: TimelineOptions,
    /// Pause between two pages.
    pub page_delay: Duration,
    /// Consecutive throttled answers waited out before failing.
    pub max_throttled: u32,
}

/// Fetch up to `count` posts, oldest first.
pub async fn export_timeline(client: &XClient, request: &ExportRequest) -> Result<Vec<Tweet>, SweepError> {
    let user = client.user_by_username(&request.username).await?;
    info!(user_id = %user.id, username = %user.username, "exporting timeline");

    let mut tweets: Vec<Tweet> = Vec::new();
    let mut next_token: Option<String> = None;
    let mut throttled = 0;

    while tweets.len() < request.count {
        let raw = client
            .user_tweets(&user.id, request.options, next_token.as_deref())
            .await?;
        let now = chrono::Utc::now().timestamp();

        if raw.status == 429 || raw.status == 503 {
            throttled += 1;
            // A 503 carries no window; treat it like a refused request.
            let wait = raw.rate_limit.wait_hint(429, now).unwrap_or_default();
            if throttled > request.max_throttled {
                return Err(ApiError::RateLimited { retry_after: wait }.into());
            }
            warn!(status = raw.status, ?wait, "timeline throttled");
            tokio::time::sleep(wait).await;
            continue;
        }
        throttled = 0;

        let raw = raw.checked()?;
        let page: TimelinePage = raw.json()?;
        if page.data.is_empty() {
            break;
        }
        let page_count = page.meta.result_count;
        tweets.extend(page.data);
        info!(page_count, fetched = tweets.len(), "timeline page");

        next_token = page.meta.next_token;
        tokio::time::sleep(request.page_delay).await;
        if let Some(wait) = raw.rate_limit.wait_hint(raw.status, now) {
            tokio::time::sleep(wait).await;
        }
        if next_token.is_none() {
            break;
        }
    }

    tweets.truncate(request.count);
    tweets.sort_by(|a, b| compare_ids(&a.id, &b.id));
    Ok(tweets)
}
