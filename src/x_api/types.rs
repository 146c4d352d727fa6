//! Request/response shapes for the X API v2 endpoints xsweep talks to.
//!
//! Only the fields the tool reads are modelled; everything else in the
//! payloads is ignored by serde.

use serde::{Deserialize, Serialize};

/// The `{"data": ...}` wrapper every v2 endpoint uses.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// An account, as returned by `/users/me` and `/users/by/username/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
}

/// A post with the fields requested through `tweet.fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    #[serde(default)]
    pub text: String,
    /// RFC 3339, e.g. `2023-01-01T00:00:00.000Z`.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub public_metrics: Option<PublicMetrics>,
    #[serde(default)]
    pub entities: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub like_count: u64,
}

/// One page of `/users/{id}/tweets`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelinePage {
    #[serde(default)]
    pub data: Vec<Tweet>,
    #[serde(default)]
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub next_token: Option<String>,
    #[serde(default)]
    pub result_count: u64,
}

/// Body of `DELETE /tweets/{id}`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Deleted {
    pub deleted: bool,
}

/// Filters for timeline exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineOptions {
    pub include_retweets: bool,
    pub exclude_replies: bool,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            include_retweets: true,
            exclude_replies: false,
        }
    }
}

impl TimelineOptions {
    /// Value of the `exclude` query parameter, if any.
    pub fn exclude_param(&self) -> Option<String> {
        let mut excludes = Vec::new();
        if !self.include_retweets {
            excludes.push("retweets");
        }
        if self.exclude_replies {
            excludes.push("replies");
        }
        (!excludes.is_empty()).then(|| excludes.join(","))
    }
}

pub const TWEET_FIELDS: &str = "created_at,lang,public_metrics,entities,source";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_deserialize_from_api_format() {
        let json = r#"{"data":{"id":"2244994945","name":"X Dev","username":"XDevelopers"}}"#;
        let user: Envelope<User> = serde_json::from_str(json).unwrap();
        assert_eq!(user.data.username, "XDevelopers");
    }

    #[test]
    fn timeline_page_with_missing_data() {
        let json = r#"{"meta":{"result_count":0}}"#;
        let page: TimelinePage = serde_json::from_str(json).unwrap();
        assert!(page.data.is_empty());
        assert!(page.meta.next_token.is_none());
    }

    #[test]
    fn tweet_tolerates_sparse_fields() {
        let json = r#"{
            "data": [{"id":"1","text":"hi","created_at":"2023-01-01T00:00:00.000Z",
                      "public_metrics":{"retweet_count":2,"like_count":5,"reply_count":0}}],
            "meta": {"next_token":"abc","result_count":1}
        }"#;
        let page: TimelinePage = serde_json::from_str(json).unwrap();
        assert_eq!(page.data[0].public_metrics.unwrap().like_count, 5);
        assert!(page.data[0].lang.is_none());
        assert_eq!(page.meta.next_token.as_deref(), Some("abc"));
    }

    #[test]
    fn exclude_param_combinations() {
        assert_eq!(TimelineOptions::default().exclude_param(), None);
        let opts = TimelineOptions {
            include_retweets: false,
            exclude_replies: true,
        };
        assert_eq!(opts.exclude_param().as_deref(), Some("retweets,replies"));
    }
}
