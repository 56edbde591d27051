//! Background remote synchronization.
//!
//! Remote calls run as tokio tasks owned by a [`SyncQueue`]. Tasks never touch
//! engine state: they update the shared [`SyncTracker`] and post
//! [`SyncEvent`]s that the engine applies on its own thread.

use chrono::Utc;
use compass_core::{Achievement, Reflection, ReflectionId, RemoteError, SyncStatus, Timestamp, UserProfile};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Result of a background remote call that the engine must apply.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The remote store confirmed creation of a local reflection, possibly
    /// under a different id.
    ReflectionCreated {
        local_id: ReflectionId,
        remote: Reflection,
    },
    /// Remote creation of a local reflection failed; it stays local-only.
    CreateFailed { local_id: ReflectionId },
    /// A full push of progress and answers landed. `generation` orders it
    /// against failed writes to the same reflection.
    ReflectionPushed { id: ReflectionId, generation: u64 },
    /// A write of progress or answers failed.
    PushFailed { id: ReflectionId, generation: u64 },
    /// Full history fetched for the signed-in user, requested at
    /// `requested_at`.
    HistoryLoaded {
        reflections: Vec<Reflection>,
        achievements: Vec<Achievement>,
        requested_at: Timestamp,
    },
    /// Profile row as stored after an update.
    ProfileUpdated(UserProfile),
}

/// Observable sync state shared with background tasks.
///
/// The last call to complete decides between `idle` and `error`.
#[derive(Debug, Default)]
pub struct SyncTracker {
    in_flight: AtomicUsize,
    failed: AtomicBool,
    last_synced_at: Mutex<Option<Timestamp>>,
}

impl SyncTracker {
    pub fn status(&self) -> SyncStatus {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            SyncStatus::Syncing
        } else if self.failed.load(Ordering::SeqCst) {
            SyncStatus::Error
        } else {
            SyncStatus::Idle
        }
    }

    pub fn last_synced_at(&self) -> Option<Timestamp> {
        *self
            .last_synced_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn begin(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn finish(&self, ok: bool) {
        self.failed.store(!ok, Ordering::SeqCst);
        if ok {
            *self
                .last_synced_at
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Record a failure that never became a task.
    pub(crate) fn record_failure(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }
}

/// Owner of in-flight remote tasks and the event channel they report on.
#[derive(Debug)]
pub struct SyncQueue {
    tracker: Arc<SyncTracker>,
    tasks: JoinSet<()>,
    events_tx: mpsc::UnboundedSender<SyncEvent>,
    events_rx: mpsc::UnboundedReceiver<SyncEvent>,
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncQueue {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            tracker: Arc::new(SyncTracker::default()),
            tasks: JoinSet::new(),
            events_tx,
            events_rx,
        }
    }

    pub fn tracker(&self) -> &Arc<SyncTracker> {
        &self.tracker
    }

    /// Run `work` in the background. Failures are logged and recorded on the
    /// tracker; a successful result may carry an event for the engine.
    ///
    /// Without a tokio runtime the work is dropped and the tracker records an
    /// error. Local state is unaffected either way.
    pub fn spawn<F>(&mut self, operation: &'static str, work: F)
    where
        F: Future<Output = Result<Option<SyncEvent>, RemoteError>> + Send + 'static,
    {
        self.spawn_inner(operation, work, None);
    }

    /// Like [`Self::spawn`], but posts `on_failure` when the work fails or
    /// cannot run.
    pub fn spawn_or_report<F>(&mut self, operation: &'static str, work: F, on_failure: SyncEvent)
    where
        F: Future<Output = Result<Option<SyncEvent>, RemoteError>> + Send + 'static,
    {
        self.spawn_inner(operation, work, Some(on_failure));
    }

    fn spawn_inner<F>(&mut self, operation: &'static str, work: F, on_failure: Option<SyncEvent>)
    where
        F: Future<Output = Result<Option<SyncEvent>, RemoteError>> + Send + 'static,
    {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(operation, error = %RemoteError::NoRuntime, "Skipping remote sync");
                self.tracker.record_failure();
                if let Some(event) = on_failure {
                    let _ = self.events_tx.send(event);
                }
                return;
            }
        };

        let tracker = Arc::clone(&self.tracker);
        let events = self.events_tx.clone();
        tracker.begin();
        self.tasks.spawn_on(
            async move {
                match work.await {
                    Ok(event) => {
                        if let Some(event) = event {
                            // The receiver lives as long as the queue.
                            let _ = events.send(event);
                        }
                        tracker.finish(true);
                    }
                    Err(e) => {
                        tracing::warn!(operation, error = %e, "Remote sync failed");
                        if let Some(event) = on_failure {
                            let _ = events.send(event);
                        }
                        tracker.finish(false);
                    }
                }
            },
            &handle,
        );
    }

    /// Events posted so far, in completion order.
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        while self.tasks.try_join_next().is_some() {}
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Wait for every in-flight task.
    pub async fn wait_idle(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Remote sync task panicked");
                self.tracker.record_failure();
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }
}
