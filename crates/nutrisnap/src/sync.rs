//! Push and pull of the food log against the backend.
//!
//! Sync is a last-write-wins full overwrite: a push replaces everything the
//! backend holds for the user, and a pull replaces local goals and history.
//! Failures are logged and the local state is kept; nothing is retried until
//! the next tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::Backend;
use crate::dates::{now_millis, today};
use crate::error::Result;
use crate::storage::keys;
use crate::tracker::Tracker;

/// Stand-in deadline for periods too long to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A tracker shared between the sync loop and its callers.
pub type SharedTracker = Arc<Mutex<Tracker>>;

/// Fetch the backend's state for `token` and apply it to `tracker`.
///
/// # Errors
///
/// Returns the backend error if the fetch fails. The tracker is left as it
/// was in that case.
pub async fn pull(tracker: &mut Tracker, backend: &dyn Backend, token: &str) -> Result<()> {
    match backend.get_nutrition(token).await {
        Ok(remote) => {
            tracker.apply_remote(remote)?;
            info!("Pulled remote state");
            Ok(())
        }
        Err(e) => {
            warn!("Pull failed, keeping local state: {}", e);
            Err(e)
        }
    }
}

/// Send `tracker`'s full state to the backend.
///
/// On success the push time is recorded under [`keys::LAST_SYNC`] and the
/// tracker is marked clean.
///
/// # Errors
///
/// Returns the backend error if the push fails, or a storage error if the
/// push time cannot be recorded.
pub async fn push(tracker: &mut Tracker, backend: &dyn Backend, token: &str) -> Result<()> {
    let snapshot = tracker.snapshot();
    debug!("Pushing {} days of history", snapshot.history.len());
    if let Err(e) = backend.sync_nutrition(token, &snapshot).await {
        error!("Push failed: {}", e);
        return Err(e);
    }

    tracker
        .storage()
        .set_item(keys::LAST_SYNC, &now_millis().to_string())?;
    tracker.mark_synced();
    info!("Pushed local state");
    Ok(())
}

/// Time of the last successful push, in milliseconds since the epoch.
///
/// # Errors
///
/// Returns an error if the local store cannot be read.
pub fn last_sync(tracker: &Tracker) -> Result<Option<i64>> {
    Ok(tracker
        .storage()
        .get_item(keys::LAST_SYNC)?
        .and_then(|value| value.parse().ok()))
}

/// Whether a push is due: the state changed, or `interval` has passed since
/// the last push.
#[must_use]
pub fn push_due(dirty: bool, last_sync_ms: Option<i64>, now_ms: i64, interval: Duration) -> bool {
    if dirty {
        return true;
    }
    let interval_ms = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX);
    last_sync_ms.map_or(true, |last| now_ms.saturating_sub(last) >= interval_ms)
}

/// A handle to stop a running [`SyncScheduler`].
///
/// This is a lightweight, cloneable handle that can be used from any task.
#[derive(Debug, Clone, Default)]
pub struct SyncHandle {
    stop_signal: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl SyncHandle {
    /// Create a new handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the loop to stop.
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }

    async fn stopped(&self) {
        self.wake.notified().await;
    }
}

/// Counters from one run of the sync loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Successful pushes.
    pub pushes: u64,
    /// Failed pushes.
    pub failures: u64,
    /// Calendar day changes handled.
    pub day_changes: u64,
}

/// Periodic push and day-change loop.
pub struct SyncScheduler {
    tracker: SharedTracker,
    backend: Arc<dyn Backend>,
    token: Option<String>,
    sync_interval: Duration,
    day_check_interval: Duration,
    handle: SyncHandle,
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("authenticated", &self.token.is_some())
            .field("sync_interval", &self.sync_interval)
            .field("day_check_interval", &self.day_check_interval)
            .finish_non_exhaustive()
    }
}

impl SyncScheduler {
    /// Create a scheduler. Without a `token` only day changes are handled.
    #[must_use]
    pub fn new(
        tracker: SharedTracker,
        backend: Arc<dyn Backend>,
        token: Option<String>,
        sync_interval: Duration,
        day_check_interval: Duration,
    ) -> Self {
        Self {
            tracker,
            backend,
            token,
            sync_interval,
            day_check_interval,
            handle: SyncHandle::new(),
        }
    }

    /// A handle that stops [`run`](Self::run).
    #[must_use]
    pub fn handle(&self) -> SyncHandle {
        self.handle.clone()
    }

    /// Run until the handle is stopped.
    ///
    /// When signed in, the remote state is pulled once before the first tick.
    /// Push failures are logged and counted; the loop keeps going.
    ///
    /// # Errors
    ///
    /// Returns an error only if the local store fails during a day change.
    pub async fn run(&self) -> Result<SyncStats> {
        let mut stats = SyncStats::default();

        if let Some(token) = &self.token {
            let mut tracker = self.tracker.lock().await;
            // A failed pull keeps the local state.
            let _ = pull(&mut tracker, self.backend.as_ref(), token).await;
        }

        let start = Instant::now();
        let mut sync_tick = interval_at(first_tick(start, self.sync_interval), self.sync_interval);
        sync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut day_tick = interval_at(
            first_tick(start, self.day_check_interval),
            self.day_check_interval,
        );
        day_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Sync loop started (push every {:?}, day check every {:?})",
            self.sync_interval, self.day_check_interval
        );

        while !self.handle.should_stop() {
            tokio::select! {
                () = self.handle.stopped() => {}
                _ = sync_tick.tick() => self.sync_tick(&mut stats).await?,
                _ = day_tick.tick() => {
                    if self.tracker.lock().await.check_day_change(today())? {
                        stats.day_changes += 1;
                    }
                }
            }
        }

        info!(
            "Sync loop stopped ({} pushes, {} failures)",
            stats.pushes, stats.failures
        );
        Ok(stats)
    }

    async fn sync_tick(&self, stats: &mut SyncStats) -> Result<()> {
        let Some(token) = &self.token else {
            return Ok(());
        };

        let mut tracker = self.tracker.lock().await;
        if !push_due(
            tracker.is_dirty(),
            last_sync(&tracker)?,
            now_millis(),
            self.sync_interval,
        ) {
            debug!("Nothing to push");
            return Ok(());
        }

        match push(&mut tracker, self.backend.as_ref(), token).await {
            Ok(()) => stats.pushes += 1,
            Err(_) => stats.failures += 1,
        }
        Ok(())
    }
}

/// First deadline of an interval starting at `start`, pushed out to
/// [`FAR_FUTURE`] when `period` would overflow the clock.
fn first_tick(start: Instant, period: Duration) -> Instant {
    start
        .checked_add(period)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::FakeBackend;
    use crate::auth::AuthSession;
    use crate::model::{FoodItem, NutritionGoals};
    use crate::storage::Storage;

    fn food(id: &str, calories: f64) -> FoodItem {
        FoodItem {
            id: id.to_string(),
            name: format!("Food {id}"),
            calories,
            protein: 1.0,
            timestamp: 1,
            quantity: None,
        }
    }

    fn tracker() -> Tracker {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        Tracker::load(storage, NutritionGoals::default(), today()).unwrap()
    }

    async fn signed_in(backend: &FakeBackend) -> String {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let mut session = AuthSession::new(storage);
        session
            .signup(backend, "sam@example.com", "secret1", "Sam")
            .await
            .unwrap();
        session.token().unwrap().to_string()
    }

    #[test]
    fn test_push_due() {
        let minute = Duration::from_secs(60);
        assert!(push_due(true, Some(1_000), 1_000, minute));
        assert!(push_due(false, None, 1_000, minute));
        assert!(!push_due(false, Some(1_000), 30_000, minute));
        assert!(push_due(false, Some(1_000), 61_000, minute));
    }

    #[test]
    fn test_sync_handle() {
        let handle = SyncHandle::new();
        let clone = handle.clone();
        assert!(!handle.should_stop());
        clone.stop();
        assert!(handle.should_stop());
        assert!(clone.should_stop());
    }

    #[test]
    fn test_first_tick_saturates() {
        let start = Instant::now();
        assert_eq!(
            first_tick(start, Duration::from_secs(5)),
            start + Duration::from_secs(5)
        );
        assert_eq!(first_tick(start, Duration::MAX), start + FAR_FUTURE);
    }

    #[tokio::test]
    async fn test_push_records_last_sync() {
        let backend = FakeBackend::default();
        let token = signed_in(&backend).await;
        let mut tracker = tracker();
        tracker.add_food(food("a", 300.0)).unwrap();

        push(&mut tracker, &backend, &token).await.unwrap();
        assert!(!tracker.is_dirty());
        assert!(last_sync(&tracker).unwrap().is_some());
        assert_eq!(*backend.sync_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_push_failure_keeps_dirty() {
        let backend = FakeBackend::default();
        let mut tracker = tracker();
        tracker.add_food(food("a", 300.0)).unwrap();

        let err = push(&mut tracker, &backend, "token_unknown")
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert!(tracker.is_dirty());
        assert!(last_sync(&tracker).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_push_then_pull_on_other_device() {
        let backend = FakeBackend::default();
        let token = signed_in(&backend).await;

        let mut phone = tracker();
        phone.add_food(food("a", 300.0)).unwrap();
        phone
            .update_goals(NutritionGoals::new(1700.0, 95.0))
            .unwrap();
        push(&mut phone, &backend, &token).await.unwrap();

        let mut tablet = tracker();
        pull(&mut tablet, &backend, &token).await.unwrap();
        assert_eq!(tablet.goals(), NutritionGoals::new(1700.0, 95.0));
        assert_eq!(tablet.today_foods().len(), 1);
        assert!(!tablet.is_dirty());
    }

    #[tokio::test]
    async fn test_pull_failure_keeps_local_state() {
        let backend = FakeBackend::default();
        let token = signed_in(&backend).await;
        *backend.offline.lock().unwrap() = true;

        let mut tracker = tracker();
        tracker.add_food(food("a", 300.0)).unwrap();
        assert!(pull(&mut tracker, &backend, &token).await.is_err());
        assert_eq!(tracker.today_foods().len(), 1);
    }

    #[tokio::test]
    async fn test_pull_with_nothing_stored_uses_defaults() {
        let backend = FakeBackend::default();
        let token = signed_in(&backend).await;

        let mut tracker = tracker();
        tracker
            .update_goals(NutritionGoals::new(1500.0, 80.0))
            .unwrap();
        pull(&mut tracker, &backend, &token).await.unwrap();
        assert_eq!(tracker.goals(), NutritionGoals::default());
    }

    #[tokio::test]
    async fn test_scheduler_pushes_dirty_state_and_stops() {
        let backend = Arc::new(FakeBackend::default());
        let token = signed_in(&backend).await;
        let shared: SharedTracker = Arc::new(Mutex::new(tracker()));

        let scheduler = SyncScheduler::new(
            shared.clone(),
            backend.clone(),
            Some(token),
            Duration::from_millis(20),
            Duration::from_secs(60),
        );
        let handle = scheduler.handle();
        let task = tokio::spawn(async move { scheduler.run().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        shared.lock().await.add_food(food("a", 300.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();

        let stats = task.await.unwrap().unwrap();
        assert!(stats.pushes >= 1);
        assert_eq!(stats.failures, 0);
        assert!(!shared.lock().await.is_dirty());
    }

    #[tokio::test]
    async fn test_scheduler_counts_failures_and_continues() {
        let backend = Arc::new(FakeBackend::default());
        let shared: SharedTracker = Arc::new(Mutex::new(tracker()));
        shared.lock().await.add_food(food("a", 300.0)).unwrap();

        let scheduler = SyncScheduler::new(
            shared.clone(),
            backend,
            Some("token_unknown".to_string()),
            Duration::from_millis(10),
            Duration::from_secs(60),
        );
        let handle = scheduler.handle();
        let task = tokio::spawn(async move { scheduler.run().await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();

        let stats = task.await.unwrap().unwrap();
        assert!(stats.failures >= 2);
        assert_eq!(stats.pushes, 0);
        assert!(shared.lock().await.is_dirty());
    }

    #[tokio::test]
    async fn test_scheduler_signed_out_never_pushes() {
        let backend = Arc::new(FakeBackend::default());
        let shared: SharedTracker = Arc::new(Mutex::new(tracker()));
        shared.lock().await.add_food(food("a", 300.0)).unwrap();

        let scheduler = SyncScheduler::new(
            shared,
            backend.clone(),
            None,
            Duration::from_millis(10),
            Duration::from_millis(10),
        );
        let handle = scheduler.handle();
        let task = tokio::spawn(async move { scheduler.run().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();

        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats, SyncStats::default());
        assert_eq!(*backend.sync_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scheduler_with_huge_intervals_stops_cleanly() {
        let backend = Arc::new(FakeBackend::default());
        let token = signed_in(&backend).await;
        let shared: SharedTracker = Arc::new(Mutex::new(tracker()));

        let scheduler = SyncScheduler::new(
            shared,
            backend.clone(),
            Some(token),
            Duration::MAX,
            Duration::from_secs(u64::MAX),
        );
        let handle = scheduler.handle();
        let task = tokio::spawn(async move { scheduler.run().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop();

        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats, SyncStats::default());
    }
}
