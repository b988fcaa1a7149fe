//! Sync orchestration: triggers, single-flight runs and session lifecycle.
//!
//! One orchestrator instance lives for the whole app session. Runs are
//! serialized by an atomic guard; a trigger arriving while a run is in
//! flight is dropped, not queued, since the running pass already covers the
//! same work. Connectivity transitions, foreground events and a jittered
//! interval feed a background task; login and manual refresh run the full
//! bidirectional pass inline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rand::Rng;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

use crate::errors::{Error, Result};
use crate::store::{MetaKey, RecordStore, UserRecords};
use crate::sync::{
    AuthSession, PushReport, QueuedWrite, Reconciler, RemoteStore, RetryQueue, SessionGuard,
    SessionHandle, SyncOutcome, SyncRunReport, SyncStatus, SyncTrigger,
    SYNC_INTERVAL_JITTER_SECS, SYNC_INTERVAL_SECS,
};

/// Idle background passes tolerated before the loop parks itself.
const MAX_IDLE_RUNS: u32 = 5;

/// Releases the single-flight guard when a run ends, by any path.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Entry point for the sync subsystem.
pub struct SyncOrchestrator {
    records: UserRecords,
    reconciler: Reconciler,
    queue: RetryQueue,
    remote: Arc<dyn RemoteStore>,
    session: SessionHandle,
    in_progress: AtomicBool,
    connectivity: watch::Sender<bool>,
    foreground: Notify,
    background: Mutex<Option<JoinHandle<()>>>,
}

impl SyncOrchestrator {
    pub fn new(store: Arc<dyn RecordStore>, remote: Arc<dyn RemoteStore>) -> Arc<Self> {
        let (connectivity, _) = watch::channel(true);
        Arc::new(Self {
            records: UserRecords::new(store.clone()),
            reconciler: Reconciler::new(store.clone(), remote.clone()),
            queue: RetryQueue::new(store),
            remote,
            session: SessionHandle::new(),
            in_progress: AtomicBool::new(false),
            connectivity,
            foreground: Notify::new(),
            background: Mutex::new(None),
        })
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    // ── lifecycle ───────────────────────────────────────────────────────────

    /// Install the authenticated session, start the background loop and run
    /// the initial full sync.
    pub async fn sign_in(self: &Arc<Self>, auth: AuthSession) -> Result<SyncRunReport> {
        info!("[Sync] Session opened for user {}", auth.user_id);
        self.session.sign_in(auth);
        self.start().await;
        self.sync(SyncTrigger::Login).await
    }

    /// Stop the background loop, drop the session and wipe the signed-out
    /// user's namespace. Other users' data on the device is untouched.
    pub async fn sign_out(&self) -> Result<()> {
        self.stop().await;
        if let Some(auth) = self.session.sign_out() {
            self.records.clear_namespace(&auth.user_id).await?;
            info!("[Sync] Session closed; local data cleared for user {}", auth.user_id);
        }
        Ok(())
    }

    /// Spawn the background trigger loop; a no-op when one is already live.
    pub async fn start(self: &Arc<Self>) {
        let mut slot = self.background.lock().await;
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let engine = Arc::clone(self);
        *slot = Some(tokio::spawn(async move {
            engine.background_loop().await;
        }));
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.background.lock().await.take() {
            handle.abort();
            debug!("[Sync] Background loop stopped");
        }
    }

    // ── triggers ────────────────────────────────────────────────────────────

    /// Record a connectivity transition. Coming back online wakes the
    /// background loop for a catch-up pass; reporting the current state
    /// again is a no-op so platforms that re-emit "connected" on every
    /// probe do not fire spurious runs.
    pub fn set_connected(&self, online: bool) {
        let changed = self.connectivity.send_if_modified(|state| {
            if *state == online {
                false
            } else {
                *state = online;
                true
            }
        });
        if changed && online {
            debug!("[Sync] Connectivity restored");
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connectivity.borrow()
    }

    /// Signal that the app returned to the foreground.
    pub fn notify_foreground(&self) {
        self.foreground.notify_one();
    }

    /// User-initiated full refresh.
    pub async fn trigger_manual_sync(&self) -> Result<SyncRunReport> {
        self.sync(SyncTrigger::Manual).await
    }

    /// Full bidirectional pass, same body as a manual trigger.
    pub async fn sync_full(&self) -> Result<SyncRunReport> {
        self.sync(SyncTrigger::Manual).await
    }

    /// One-way push of every local collection. Shares the single-flight
    /// guard with triggered runs.
    pub async fn sync_to_cloud(&self) -> Result<PushReport> {
        let auth = self.session.current().ok_or(Error::NoSession)?;
        let _flight = self.begin_flight()?;
        let guard = self.session.guard(&auth.user_id);
        let result = self.reconciler.push_all(&guard).await;
        self.surface(&auth.user_id, result).await
    }

    /// One-way pull of every remote collection, overwriting local copies.
    pub async fn sync_from_cloud(&self) -> Result<usize> {
        let auth = self.session.current().ok_or(Error::NoSession)?;
        let _flight = self.begin_flight()?;
        let guard = self.session.guard(&auth.user_id);
        let result = self.reconciler.pull_all(&guard).await;
        self.surface(&auth.user_id, result).await
    }

    /// Tear the session down before surfacing an auth rejection.
    async fn surface<T>(&self, user_id: &str, result: Result<T>) -> Result<T> {
        match result {
            Err(err) if err.requires_sign_out() => {
                warn!("[Sync] Backend rejected credentials: {err}");
                self.teardown(user_id).await?;
                Err(err)
            }
            other => other,
        }
    }

    /// Persist the user's sync preference. Local reads and writes are never
    /// affected; only the remote reconciliation pauses.
    pub async fn set_sync_enabled(&self, enabled: bool) -> Result<()> {
        let user_id = self.session.user_id().ok_or(Error::NoSession)?;
        self.records
            .set_meta(&user_id, MetaKey::SyncEnabled, enabled.to_string())
            .await?;
        info!("[Sync] Sync {} for user {user_id}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    async fn sync_enabled(&self, user_id: &str) -> Result<bool> {
        Ok(self
            .records
            .meta(user_id, MetaKey::SyncEnabled)
            .await?
            .map(|raw| raw != "false")
            .unwrap_or(true))
    }

    /// Defer a remote write into the durable retry queue.
    pub async fn enqueue_write(&self, write: QueuedWrite) -> Result<()> {
        let user_id = self.session.user_id().ok_or(Error::NoSession)?;
        self.queue.enqueue(&user_id, write).await
    }

    /// Current sync state for the signed-in user.
    pub async fn status(&self) -> Result<SyncStatus> {
        let user_id = self.session.user_id().ok_or(Error::NoSession)?;
        let last_sync_time = self
            .records
            .meta(&user_id, MetaKey::LastSyncTime)
            .await?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Ok(SyncStatus {
            last_sync_time,
            pending_count: self.queue.len(&user_id).await?,
            dead_letter_count: self.queue.dead_letter_count(&user_id).await?,
            in_progress: self.in_progress.load(Ordering::SeqCst),
        })
    }

    // ── runs ────────────────────────────────────────────────────────────────

    /// Run one sync pass for the given trigger.
    ///
    /// At most one pass runs at a time; a trigger that loses the race is
    /// reported as [`SyncOutcome::AlreadyRunning`] and dropped.
    pub async fn sync(&self, trigger: SyncTrigger) -> Result<SyncRunReport> {
        let Ok(_flight) = self.begin_flight() else {
            debug!("[Sync] Dropping {trigger:?} trigger, a run is already in flight");
            return Ok(SyncRunReport::skipped(trigger, SyncOutcome::AlreadyRunning));
        };
        self.run(trigger).await
    }

    fn begin_flight(&self) -> Result<FlightGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::SyncInProgress)?;
        Ok(FlightGuard(&self.in_progress))
    }

    async fn run(&self, trigger: SyncTrigger) -> Result<SyncRunReport> {
        if !self.is_connected() {
            return Ok(SyncRunReport::skipped(trigger, SyncOutcome::Offline));
        }
        let Some(auth) = self.session.current() else {
            return Ok(SyncRunReport::skipped(trigger, SyncOutcome::NoSession));
        };
        if !self.sync_enabled(&auth.user_id).await? {
            return Ok(SyncRunReport::skipped(trigger, SyncOutcome::Disabled));
        }

        let started = Utc::now();
        let guard = self.session.guard(&auth.user_id);
        match self.run_phases(trigger, &guard).await {
            Ok(mut report) => {
                report.duration_ms = (Utc::now() - started).num_milliseconds();
                info!(
                    "[Sync] {:?} run finished in {}ms: {} created, {} updated, {} delivered, {} pulled, {} failed",
                    trigger, report.duration_ms, report.created, report.updated,
                    report.delivered, report.pulled, report.failed
                );
                Ok(report)
            }
            Err(Error::SessionChanged { user_id }) => {
                info!("[Sync] Abandoning run, user {user_id} is no longer signed in");
                Ok(SyncRunReport::skipped(trigger, SyncOutcome::SessionChanged))
            }
            Err(err) if err.requires_sign_out() => {
                warn!("[Sync] Backend rejected credentials: {err}");
                self.teardown(&auth.user_id).await?;
                Ok(SyncRunReport::skipped(trigger, SyncOutcome::AuthRequired))
            }
            Err(err) => Err(err),
        }
    }

    /// Queue drain, then reconciliation. Background triggers push the
    /// journal-side entities only; login and manual refresh run the full
    /// bidirectional pass including chat history.
    async fn run_phases(
        &self,
        trigger: SyncTrigger,
        guard: &SessionGuard,
    ) -> Result<SyncRunReport> {
        let drain = self.queue.drain(guard, self.remote.as_ref()).await?;
        let mut report = SyncRunReport::skipped(trigger, SyncOutcome::Completed);
        report.delivered = drain.delivered;

        match trigger {
            SyncTrigger::Login | SyncTrigger::Manual => {
                let push = self.reconciler.push_all(guard).await?;
                report.created = push.created;
                report.updated = push.updated;
                report.failed = push.failed;
                report.pulled = self.reconciler.pull_all(guard).await?;
            }
            SyncTrigger::Connectivity | SyncTrigger::Foreground | SyncTrigger::Interval => {
                let mut push = self.reconciler.push_checkins(guard).await?;
                push.absorb(self.reconciler.push_journals(guard).await?);
                report.created = push.created;
                report.updated = push.updated;
                report.failed = push.failed;
            }
        }

        guard.ensure_current()?;
        self.records
            .set_meta(guard.user_id(), MetaKey::LastSyncTime, Utc::now().to_rfc3339())
            .await?;
        Ok(report)
    }

    /// Local sign-out forced by an auth rejection. Same cleanup as a user
    /// sign-out; the caller surfaces [`SyncOutcome::AuthRequired`] so the UI
    /// can prompt for credentials.
    async fn teardown(&self, user_id: &str) -> Result<()> {
        self.session.sign_out();
        self.records.clear_namespace(user_id).await?;
        Ok(())
    }

    // ── background loop ─────────────────────────────────────────────────────

    async fn background_loop(&self) {
        let mut connectivity = self.connectivity.subscribe();
        let mut idle_runs = 0u32;
        info!("[Sync] Background loop started");

        loop {
            let jitter = rand::thread_rng().gen_range(0..=SYNC_INTERVAL_JITTER_SECS);
            let interval = Duration::from_secs(SYNC_INTERVAL_SECS + jitter);
            let trigger = tokio::select! {
                _ = tokio::time::sleep(interval) => SyncTrigger::Interval,
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if !*connectivity.borrow_and_update() {
                        continue;
                    }
                    SyncTrigger::Connectivity
                }
                _ = self.foreground.notified() => SyncTrigger::Foreground,
            };

            match self.sync(trigger).await {
                Ok(report) if report.outcome == SyncOutcome::NoSession => {
                    idle_runs += 1;
                    if idle_runs >= MAX_IDLE_RUNS {
                        info!("[Sync] No session for {idle_runs} passes, parking background loop");
                        break;
                    }
                }
                Ok(_) => idle_runs = 0,
                Err(err) => {
                    error!("[Sync] Background run failed: {err}");
                    idle_runs = 0;
                }
            }
        }
    }
}
