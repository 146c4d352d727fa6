use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ApiError;
use super::rate_limit::RateLimit;
use super::types::{Envelope, TWEET_FIELDS, TimelineOptions, User};

pub const API_BASE: &str = "https://api.x.com/2";

const ERROR_BODY_CHARS: usize = 300;

/// Status, rate-limit headers and body of a finished request.
///
/// Processors classify these themselves; the typed helpers below turn
/// anything non-2xx into an [`ApiError`].
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub rate_limit: RateLimit,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Malformed(e.to_string()))
    }

    /// Pass 2xx through; map 429 and other statuses to errors.
    pub fn checked(self) -> Result<Self, ApiError> {
        if self.status == 429 {
            let retry_after = self
                .rate_limit
                .wait_hint(self.status, chrono::Utc::now().timestamp())
                .unwrap_or(Duration::from_secs(1));
            return Err(ApiError::RateLimited { retry_after });
        }
        if !self.is_success() {
            return Err(ApiError::Status {
                status: self.status,
                message: self.body.chars().take(ERROR_BODY_CHARS).collect(),
            });
        }
        Ok(self)
    }
}

pub struct XClient {
    token: String,
    client: Client,
    base_url: String,
}

impl XClient {
    /// Create a client for `base_url`, normally [`API_BASE`].
    pub fn with_base_url(token: String, base_url: String, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            token,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<RawResponse, ApiError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status().as_u16();
        let rate_limit = RateLimit::from_headers(response.headers());
        let body = response.text().await?;
        debug!(status, ?rate_limit, "x api response");
        Ok(RawResponse {
            status,
            rate_limit,
            body,
        })
    }

    /// The account the token belongs to.
    pub async fn me(&self) -> Result<User, ApiError> {
        let raw = self.send(self.client.get(self.url("/users/me"))).await?.checked()?;
        Ok(raw.json::<Envelope<User>>()?.data)
    }

    pub async fn user_by_username(&self, username: &str) -> Result<User, ApiError> {
        let url = self.url(&format!("/users/by/username/{username}"));
        let raw = self.send(self.client.get(url)).await?.checked()?;
        Ok(raw.json::<Envelope<User>>()?.data)
    }

    /// `DELETE /tweets/{id}`, unclassified.
    pub async fn delete_tweet(&self, id: &str) -> Result<RawResponse, ApiError> {
        let url = self.url(&format!("/tweets/{id}"));
        self.send(self.client.delete(url)).await
    }

    /// `GET /tweets/{id}`, unclassified.
    pub async fn lookup_tweet(&self, id: &str) -> Result<RawResponse, ApiError> {
        let url = self.url(&format!("/tweets/{id}"));
        self.send(self.client.get(url).query(&[("tweet.fields", TWEET_FIELDS)]))
            .await
    }

    /// One page of a user's timeline, unclassified.
    pub async fn user_tweets(
        &self,
        user_id: &str,
        options: TimelineOptions,
        pagination_token: Option<&str>,
    ) -> Result<RawResponse, ApiError> {
        let url = self.url(&format!("/users/{user_id}/tweets"));
        let mut query: Vec<(&str, String)> = vec![
            ("max_results", "100".to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
        ];
        if let Some(exclude) = options.exclude_param() {
            query.push(("exclude", exclude));
        }
        if let Some(token) = pagination_token {
            query.push(("pagination_token", token.to_string()));
        }
        self.send(self.client.get(url).query(&query)).await
    }
}
