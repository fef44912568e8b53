use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, InvalidHeaderValue, USER_AGENT};
use thiserror::Error;
use tracing::instrument;

use super::Snapshot;
use crate::store::SnapshotCache;
use crate::util::clock::Clock;

pub const DEFAULT_BASE_URL: &str = "https://adventofcode.com";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection details for a single private leaderboard
#[derive(Debug, Clone)]
pub struct LeaderboardSource {
    pub base_url: String,
    pub year: i32,
    pub leaderboard_id: String,
    pub session_token: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl LeaderboardSource {
    pub fn url(&self) -> String {
        format!(
            "{}/{}/leaderboard/private/view/{}.json",
            self.base_url.trim_end_matches('/'),
            self.year,
            self.leaderboard_id
        )
    }

    fn headers(&self) -> FetchResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("session={}", self.session_token))?,
        );
        headers.insert(USER_AGENT, HeaderValue::from_str(&self.user_agent)?);

        Ok(headers)
    }
}

/// Fetches the leaderboard, reading through the snapshot cache unless told otherwise
#[derive(Debug, Clone)]
pub struct LeaderboardClient {
    http: reqwest::Client,
    url: String,
    cache: SnapshotCache,
    clock: Arc<dyn Clock>,
}

impl LeaderboardClient {
    pub fn new(
        source: &LeaderboardSource,
        cache: SnapshotCache,
        clock: Arc<dyn Clock>,
    ) -> FetchResult<Self> {
        let http = reqwest::Client::builder()
            .default_headers(source.headers()?)
            .timeout(source.timeout)
            .build()?;

        Ok(Self {
            http,
            url: source.url(),
            cache,
            clock,
        })
    }

    /// Returns a fresh cached snapshot when allowed to, otherwise makes exactly one request.
    ///
    /// Only a successfully parsed `200/OK` body is written back to the cache. Failures are
    /// returned for the caller to log; nothing here retries.
    #[instrument(skip(self))]
    pub async fn fetch(&self, force_fresh: bool) -> FetchResult<Snapshot> {
        if !force_fresh && let Some(snapshot) = self.cache.read().await {
            return Ok(snapshot);
        }

        let res = self.http.get(&self.url).send().await?;
        let status = res.status();
        if status != StatusCode::OK {
            tracing::error!(code = %status, "non-200/OK response from leaderboard");
            return Err(FetchErr::Status(status));
        }

        let body = res.bytes().await?;
        let mut snapshot: Snapshot = serde_json::from_slice(&body)?;
        snapshot.fetched_at = self.clock.timestamp();

        if let Err(e) = self.cache.write(&snapshot).await {
            tracing::warn!(error = ?e, "unable to update snapshot cache");
        }

        tracing::info!(members = snapshot.members.len(), "fetched fresh leaderboard");
        Ok(snapshot)
    }
}

pub type FetchResult<T> = core::result::Result<T, FetchErr>;

#[derive(Debug, Error)]
pub enum FetchErr {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("leaderboard responded with {0}")]
    Status(StatusCode),

    #[error("unable to parse leaderboard body: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("while creating a HeaderValue ({0})")]
    Header(#[from] InvalidHeaderValue),
}
