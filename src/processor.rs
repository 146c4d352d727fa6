//! The per-item operation plugged into the engine.
//!
//! [`ItemProcessor`] is the seam between the generic job engine and the
//! X API. [`DeleteProcessor`] removes one post per item on a fixed cadence;
//! [`LookupProcessor`] re-fetches one post per item and paces itself from the
//! rate-limit headers.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::warn;

use crate::error::ProcessError;
use crate::state_machine::{ItemStatus, WorkItem};
use crate::x_api::{Deleted, Envelope, RawResponse, Tweet, XClient};

/// What a single processor call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Remote side answered with a non-success status. Never retried.
    Failure(u16),
    /// Server asked us to back off; the engine waits and calls again for the
    /// same item without counting or logging the attempt.
    RateLimited(Duration),
}

impl Outcome {
    /// The countable status, or `None` for a rate-limited attempt.
    pub fn status(self) -> Option<ItemStatus> {
        match self {
            Outcome::Success => Some(ItemStatus::Ok),
            Outcome::Failure(code) => Some(ItemStatus::Ng(code)),
            Outcome::RateLimited(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemReport {
    pub outcome: Outcome,
    /// Replaces the fixed inter-item interval for this item only.
    pub wait_override: Option<Duration>,
}

impl ItemReport {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            wait_override: None,
        }
    }

    pub fn with_wait(mut self, wait: Option<Duration>) -> Self {
        self.wait_override = wait;
        self
    }
}

/// Performs exactly one external operation for one item.
///
/// `Err` means the response could not be classified at all; the engine
/// treats it as fatal for the whole job.
pub trait ItemProcessor: Send + Sync + 'static {
    fn process(&self, item: &WorkItem) -> impl Future<Output = Result<ItemReport, ProcessError>> + Send;
}

fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

fn rate_limited(raw: &RawResponse, fallback: Duration) -> ItemReport {
    let wait = raw.rate_limit.wait_hint(raw.status, now_epoch()).unwrap_or(fallback);
    ItemReport::new(Outcome::RateLimited(wait))
}

/// Deletes one post per item via `DELETE /tweets/{id}`.
pub struct DeleteProcessor {
    client: XClient,
    /// Back-off used when a 429 carries no usable reset header.
    fallback_wait: Duration,
}

impl DeleteProcessor {
    pub fn new(client: XClient, fallback_wait: Duration) -> Self {
        Self {
            client,
            fallback_wait,
        }
    }

    fn classify(&self, item: &WorkItem, raw: &RawResponse) -> Result<ItemReport, ProcessError> {
        if raw.status == 429 {
            return Ok(rate_limited(raw, self.fallback_wait));
        }
        if !raw.is_success() {
            return Ok(ItemReport::new(Outcome::Failure(raw.status)));
        }
        let body: Envelope<Deleted> = raw.json().map_err(|e| ProcessError::Malformed {
            item_id: item.id.clone(),
            detail: e.to_string(),
        })?;
        if body.data.deleted {
            Ok(ItemReport::new(Outcome::Success))
        } else {
            warn!(item_id = %item.id, "delete acknowledged but not applied");
            Ok(ItemReport::new(Outcome::Failure(raw.status)))
        }
    }
}

impl ItemProcessor for DeleteProcessor {
    async fn process(&self, item: &WorkItem) -> Result<ItemReport, ProcessError> {
        let raw = self.client.delete_tweet(&item.id).await?;
        self.classify(item, &raw)
    }
}

#[derive(Debug, Deserialize)]
struct LookupBody {
    #[serde(default)]
    data: Option<Tweet>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

/// Fetches one post per item via `GET /tweets/{id}` and keeps what it found.
pub struct LookupProcessor {
    client: XClient,
    fallback_wait: Duration,
    found: Mutex<Vec<Tweet>>,
}

impl LookupProcessor {
    pub fn new(client: XClient, fallback_wait: Duration) -> Self {
        Self {
            client,
            fallback_wait,
            found: Mutex::new(Vec::new()),
        }
    }

    /// Posts fetched so far, in processing order.
    pub fn found(&self) -> Vec<Tweet> {
        self.found.lock().clone()
    }

    fn classify(&self, item: &WorkItem, raw: &RawResponse) -> Result<ItemReport, ProcessError> {
        if raw.status == 429 {
            return Ok(rate_limited(raw, self.fallback_wait));
        }
        // Pace from the headers: only stretch the wait once the window is used up.
        let wait = raw.rate_limit.wait_hint(raw.status, now_epoch());
        if !raw.is_success() {
            return Ok(ItemReport::new(Outcome::Failure(raw.status)).with_wait(wait));
        }

        let body: LookupBody = raw.json().map_err(|e| ProcessError::Malformed {
            item_id: item.id.clone(),
            detail: e.to_string(),
        })?;
        match body.data {
            Some(tweet) => {
                self.found.lock().push(tweet);
                Ok(ItemReport::new(Outcome::Success).with_wait(wait))
            }
            // v2 reports missing posts as 200 + `errors`.
            None if !body.errors.is_empty() => {
                Ok(ItemReport::new(Outcome::Failure(404)).with_wait(wait))
            }
            None => Err(ProcessError::Malformed {
                item_id: item.id.clone(),
                detail: "neither data nor errors in lookup response".into(),
            }),
        }
    }
}

impl ItemProcessor for LookupProcessor {
    async fn process(&self, item: &WorkItem) -> Result<ItemReport, ProcessError> {
        let raw = self.client.lookup_tweet(&item.id).await?;
        self.classify(item, &raw)
    }
}
