//! Authoritative-state pull: the REST side of the sync loop.
//!
//! Push messages only say "something changed"; consumers then re-pull the
//! actual records through an [`ActivityStore`].

use async_trait::async_trait;
use campus_core::{ActiveEnvelope, ActivityRecord};
use tracing::debug;

use crate::errors::Result;

/// Source of the authoritative active-records list.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Fetch the current set of active records.
    async fn fetch_active(&self) -> Result<Vec<ActivityRecord>>;
}

/// [`ActivityStore`] over the backend's REST endpoint.
pub struct RestActivityStore {
    client: reqwest::Client,
    url: String,
}

impl RestActivityStore {
    /// Create a store pulling from `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Create a store with a shared HTTP client.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ActivityStore for RestActivityStore {
    async fn fetch_active(&self) -> Result<Vec<ActivityRecord>> {
        let envelope: ActiveEnvelope = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(count = envelope.results.len(), "fetched active records");
        Ok(envelope.results)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
