//! Live consumer of active-activity state ("something changed" → fresh
//! records, without duplicate work).
//!
//! An [`ActivityFeed`] is created when a view mounts and dropped when it
//! unmounts. It pulls once at creation, then re-pulls whenever a relevant
//! push message arrives — coalescing bursts so that any number of triggers
//! landing during one in-flight fetch cost exactly one request.
//!
//! The coalescing policy is *drop*: a trigger that lands mid-flight is
//! discarded rather than queued for a trailing refetch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use campus_core::{ActivityRecord, PlanStatus, SyncMessage};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::broadcaster::{Broadcaster, Subscription};
use crate::datasource::ActivityStore;

/// State cells shared between the feed, its subscriber callback, and any
/// in-flight refresh task. A refresh that outlives the feed writes into
/// these cells and the result is simply never read.
#[derive(Default)]
struct FeedShared {
    records: RwLock<Vec<ActivityRecord>>,
    error: RwLock<Option<String>>,
    /// True exactly while a refresh started by this feed is in flight.
    refreshing: AtomicBool,
}

/// Releases the coalescing flag on every exit path, fetch errors included.
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A live, self-refreshing view of the active lesson activities.
pub struct ActivityFeed {
    broadcaster: Broadcaster,
    store: Arc<dyn ActivityStore>,
    shared: Arc<FeedShared>,
    /// Dropping this token detaches the feed from the broadcaster.
    _subscription: Subscription,
}

impl ActivityFeed {
    /// Create a feed: fetch once unconditionally (so state is correct even
    /// if no push arrives before first render), then subscribe for
    /// `schedule_update` / `activity_status_change` messages.
    pub async fn new(broadcaster: Broadcaster, store: Arc<dyn ActivityStore>) -> Self {
        let shared = Arc::new(FeedShared::default());
        run_refresh(Arc::clone(&store), Arc::clone(&shared)).await;

        let cb_store = Arc::clone(&store);
        let cb_shared = Arc::clone(&shared);
        let subscription = broadcaster.subscribe(move |message| {
            let relevant = matches!(
                message,
                SyncMessage::ScheduleUpdate { .. } | SyncMessage::ActivityStatusChange { .. }
            );
            if relevant {
                let store = Arc::clone(&cb_store);
                let shared = Arc::clone(&cb_shared);
                drop(tokio::spawn(run_refresh(store, shared)));
            }
        });

        Self {
            broadcaster,
            store,
            shared,
            _subscription: subscription,
        }
    }

    /// Current records (last successful fetch).
    pub fn records(&self) -> Vec<ActivityRecord> {
        self.shared.records.read().clone()
    }

    /// Display string of the last fetch failure, if the most recent fetch
    /// failed. Cleared by the next successful fetch.
    pub fn last_error(&self) -> Option<String> {
        self.shared.error.read().clone()
    }

    /// Whether a refresh is in flight right now.
    pub fn is_refreshing(&self) -> bool {
        self.shared.refreshing.load(Ordering::Acquire)
    }

    /// Re-pull on demand (pull-to-refresh). Coalesced with push-triggered
    /// refreshes: a no-op if one is already in flight.
    pub async fn refresh(&self) {
        run_refresh(Arc::clone(&self.store), Arc::clone(&self.shared)).await;
    }

    /// Announce a status change for an activity, fire-and-forget.
    ///
    /// Deliberately no optimistic local mutation: the authoritative update
    /// comes back through the push channel like everyone else's.
    pub fn send_status(&self, schedule_id: i64, status: PlanStatus) {
        self.broadcaster.send(&SyncMessage::ActivityStatusChange {
            schedule_id,
            plan_status: status,
            message: None,
        });
    }
}

/// The guarded refresh routine.
///
/// The compare-exchange is the coalescing gate: whichever trigger flips the
/// flag does the fetch, every other concurrent trigger returns immediately.
async fn run_refresh(store: Arc<dyn ActivityStore>, shared: Arc<FeedShared>) {
    if shared
        .refreshing
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!("refresh already in flight, dropping trigger");
        return;
    }
    let _guard = RefreshGuard(&shared.refreshing);

    match store.fetch_active().await {
        Ok(records) => {
            debug!(count = records.len(), "refresh complete");
            *shared.records.write() = records;
            *shared.error.write() = None;
        }
        Err(e) => {
            // Keep the stale records visible; last-known-good beats empty.
            warn!(error = %e, "refresh failed, keeping previous records");
            *shared.error.write() = Some(e.to_string());
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
