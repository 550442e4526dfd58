//! Bulk snapshot fetch with bounded retries.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use blockworld_protocol::{RateLimited, WorldSnapshot};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;

use crate::config::RetryPolicy;

#[derive(Debug)]
pub enum FetchError {
    /// The server asked us to come back later.
    RateLimited { retry_after: Duration },
    Status(u16),
    Transport(reqwest::Error),
    Decode(serde_json::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::RateLimited { retry_after } => {
                write!(f, "rate limited, retry after {} ms", retry_after.as_millis())
            }
            FetchError::Status(code) => write!(f, "unexpected HTTP status {code}"),
            FetchError::Transport(e) => write!(f, "transport error: {e}"),
            FetchError::Decode(e) => write!(f, "invalid snapshot: {e}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Transport(e) => Some(e),
            FetchError::Decode(e) => Some(e),
            _ => None,
        }
    }
}

/// Where the authoritative snapshot comes from.
pub trait SnapshotSource {
    fn fetch(&self) -> impl Future<Output = Result<WorldSnapshot, FetchError>> + Send;
}

/// `GET /api/world-state` over HTTP.
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSnapshotSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Result<WorldSnapshot, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let header_wait = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body_wait = response
                .json::<RateLimited>()
                .await
                .ok()
                .map(|body| Duration::from_millis(body.retry_after_ms));
            return Err(FetchError::RateLimited {
                retry_after: body_wait.or(header_wait).unwrap_or_default(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(FetchError::Transport)?;
        WorldSnapshot::decode(&body).map_err(FetchError::Decode)
    }
}

/// Fetch the snapshot, backing off exponentially between attempts. A rate
/// limit rejection waits at least as long as the server asked. `None` once
/// every attempt has failed.
pub async fn fetch_with_retry<S: SnapshotSource>(
    source: &S,
    policy: &RetryPolicy,
) -> Option<WorldSnapshot> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 0..attempts {
        let err = match source.fetch().await {
            Ok(snapshot) => return Some(snapshot),
            Err(e) => e,
        };
        if attempt + 1 == attempts {
            tracing::warn!("Snapshot fetch failed after {} attempts: {}", attempts, err);
            break;
        }

        let mut wait = policy.delay(attempt);
        if let FetchError::RateLimited { retry_after } = &err {
            wait = wait.max(*retry_after);
        }
        tracing::warn!(
            "Snapshot fetch attempt {}/{} failed: {}; retrying in {} ms",
            attempt + 1,
            attempts,
            err,
            wait.as_millis()
        );
        tokio::time::sleep(wait).await;
    }
    None
}
