use std::time::Duration;

use reqwest::header::HeaderMap;

/// Slack added on top of the advertised reset time.
pub const RESET_MARGIN: Duration = Duration::from_secs(2);

/// Rate-limit window as advertised by `x-rate-limit-*` headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub remaining: Option<i64>,
    /// Window reset, in Unix seconds.
    pub reset: Option<i64>,
}

impl RateLimit {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let parse = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok())
        };
        Self {
            remaining: parse("x-rate-limit-remaining"),
            reset: parse("x-rate-limit-reset"),
        }
    }

    pub fn exhausted(&self) -> bool {
        self.remaining.is_some_and(|r| r <= 0)
    }

    /// How long to hold off before the next call, if at all.
    ///
    /// Only when the server refused (429) or the window is used up:
    /// `max(0, reset - now) + RESET_MARGIN`.
    pub fn wait_hint(&self, status: u16, now_epoch: i64) -> Option<Duration> {
        if status != 429 && !self.exhausted() {
            return None;
        }
        let until_reset = self.reset.map_or(0, |reset| (reset - now_epoch).max(0));
        Some(Duration::from_secs(until_reset as u64) + RESET_MARGIN)
    }
}
