//! Session runner: wires the countdown engine to the wall clock.
//!
//! The engine itself is pure; the runner owns everything around it:
//!
//! - the single ticker task that feeds the engine wall-clock time once per
//!   second (re-armed on start, aborted on pause/stop),
//! - the harvest increment when a work period completes,
//! - the one pending deadline notification, swapped on every transition,
//! - an event channel the front end renders from.
//!
//! Phase-complete side effects run synchronously in the tick that produced
//! them, while the engine lock is still held, so a flip and its side effects
//! cannot be split by a racing command or by the ticker being torn down the
//! next instant.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use crate::error::StoreError;
use crate::events::Event;
use crate::notify::{NotificationId, NotificationMessage, NotificationScheduler};
use crate::storage::{today, HarvestStore};
use crate::timer::engine::{CountdownEngine, Phase};

/// Cadence of the repeating tick.
pub const TICK_INTERVAL: Duration = Duration::from_millis(1_000);

/// Drives one countdown session.
///
/// Cheap to clone the pieces of; methods take `&self` and are safe to call
/// from any task. All methods are no-ops (returning `None`) when the engine
/// rejects the transition.
pub struct SessionRunner {
    engine: Arc<Mutex<CountdownEngine>>,
    store: Arc<StdMutex<HarvestStore>>,
    scheduler: Arc<dyn NotificationScheduler>,
    events: mpsc::UnboundedSender<Event>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    pending: Arc<StdMutex<Option<NotificationId>>>,
}

impl SessionRunner {
    /// Build a runner and the event stream it feeds.
    pub fn new(
        engine: CountdownEngine,
        store: HarvestStore,
        scheduler: Arc<dyn NotificationScheduler>,
    ) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let runner = Self {
            engine: Arc::new(Mutex::new(engine)),
            store: Arc::new(StdMutex::new(store)),
            scheduler,
            events,
            ticker: Arc::new(Mutex::new(None)),
            pending: Arc::new(StdMutex::new(None)),
        };
        (runner, receiver)
    }

    /// Start, resume, or skip the break; arms the ticker and the deadline
    /// notification for the new work period.
    pub async fn start(&self) -> Option<Event> {
        let event = {
            let mut engine = self.engine.lock().await;
            engine.start(now_ms())
        }?;

        if let Some(ends_at) = work_deadline(&event) {
            swap_notification(
                self.scheduler.as_ref(),
                &self.pending,
                ends_at,
                NotificationMessage::work_complete(),
            );
        }
        let _ = self.events.send(event.clone());
        self.spawn_ticker().await;
        Some(event)
    }

    /// Freeze the countdown: tear down the ticker and the pending
    /// notification. The engine keeps its anchors for the later resume.
    pub async fn pause(&self) -> Option<Event> {
        let event = {
            let mut engine = self.engine.lock().await;
            engine.pause(now_ms())
        }?;

        self.cancel_ticker().await;
        clear_notification(self.scheduler.as_ref(), &self.pending);
        let _ = self.events.send(event.clone());
        Some(event)
    }

    /// Abandon the countdown entirely.
    pub async fn stop(&self) -> Option<Event> {
        let event = {
            let mut engine = self.engine.lock().await;
            engine.stop(now_ms())
        }?;

        self.cancel_ticker().await;
        clear_notification(self.scheduler.as_ref(), &self.pending);
        let _ = self.events.send(event.clone());
        Some(event)
    }

    /// Current state, on demand.
    pub async fn snapshot(&self) -> Event {
        self.engine.lock().await.snapshot(now_ms())
    }

    /// Today's completed-session count.
    pub fn harvested_today(&self) -> Result<u32, StoreError> {
        match self.store.lock() {
            Ok(store) => store.count(today()),
            Err(_) => Err(StoreError::QueryFailed(
                "harvest store lock poisoned".into(),
            )),
        }
    }

    /// Tear down the ticker and any pending notification. Called on exit;
    /// the in-memory countdown dies with the process.
    pub async fn shutdown(&self) {
        self.cancel_ticker().await;
        clear_notification(self.scheduler.as_ref(), &self.pending);
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let engine = self.engine.clone();
        let store = self.store.clone();
        let scheduler = self.scheduler.clone();
        let pending = self.pending.clone();
        let events = self.events.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;

                let now = now_ms();
                // The engine lock is held, with no awaits, to the end of the
                // iteration: a flip and its side effects land as one unit
                // even if a command races this tick or the task is aborted
                // right after.
                let mut engine = engine.lock().await;
                match engine.tick(now) {
                    Some(Event::WorkCompleted { break_ends_at, at }) => {
                        record_harvest(&store);
                        swap_notification(
                            scheduler.as_ref(),
                            &pending,
                            break_ends_at,
                            NotificationMessage::break_over(),
                        );
                        let _ = events.send(Event::WorkCompleted { break_ends_at, at });
                    }
                    Some(Event::BreakCompleted { work_ends_at, at }) => {
                        swap_notification(
                            scheduler.as_ref(),
                            &pending,
                            work_ends_at,
                            NotificationMessage::work_complete(),
                        );
                        let _ = events.send(Event::BreakCompleted { work_ends_at, at });
                    }
                    Some(other) => {
                        let _ = events.send(other);
                    }
                    None => match engine.phase() {
                        Phase::Active | Phase::Break => {
                            let _ = events.send(engine.snapshot(now));
                        }
                        // Paused or stopped under us; nothing left to drive.
                        _ => break,
                    },
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }
}

/// The work-period deadline carried by start-shaped events.
fn work_deadline(event: &Event) -> Option<DateTime<Utc>> {
    match event {
        Event::Started { ends_at, .. } | Event::Resumed { ends_at, .. } => Some(*ends_at),
        Event::BreakSkipped { work_ends_at, .. } => Some(*work_ends_at),
        _ => None,
    }
}

/// Schedule the next deadline notification and cancel whichever one it
/// replaces. A scheduling failure is logged; the countdown never stops over
/// a notification.
fn swap_notification(
    scheduler: &dyn NotificationScheduler,
    pending: &StdMutex<Option<NotificationId>>,
    at: DateTime<Utc>,
    message: NotificationMessage,
) {
    let next = match scheduler.schedule(at, message) {
        Ok(id) => Some(id),
        Err(err) => {
            tracing::warn!(%err, "could not schedule notification");
            None
        }
    };
    let prior = match pending.lock() {
        Ok(mut slot) => std::mem::replace(&mut *slot, next),
        Err(_) => None,
    };
    if let Some(id) = prior {
        scheduler.cancel(id);
    }
}

fn clear_notification(
    scheduler: &dyn NotificationScheduler,
    pending: &StdMutex<Option<NotificationId>>,
) {
    if let Ok(mut slot) = pending.lock() {
        if let Some(id) = slot.take() {
            scheduler.cancel(id);
        }
    }
}

fn record_harvest(store: &StdMutex<HarvestStore>) {
    let result = match store.lock() {
        Ok(store) => store.increment(today()),
        Err(_) => {
            tracing::error!("harvest store lock poisoned; completed session not recorded");
            return;
        }
    };
    match result {
        Ok(count) => tracing::debug!(count, "harvest recorded"),
        Err(err) => tracing::error!(%err, "failed to record harvest"),
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingScheduler {
        scheduled: StdMutex<Vec<(DateTime<Utc>, NotificationMessage, NotificationId)>>,
        cancelled: StdMutex<Vec<NotificationId>>,
    }

    impl NotificationScheduler for RecordingScheduler {
        fn schedule(
            &self,
            at: DateTime<Utc>,
            message: NotificationMessage,
        ) -> Result<NotificationId, crate::error::NotifyError> {
            let id = NotificationId::new();
            self.scheduled.lock().unwrap().push((at, message, id));
            Ok(id)
        }

        fn cancel(&self, id: NotificationId) {
            self.cancelled.lock().unwrap().push(id);
        }
    }

    fn runner_with(
        work_minutes: f64,
        break_minutes: f64,
    ) -> (
        SessionRunner,
        mpsc::UnboundedReceiver<Event>,
        Arc<RecordingScheduler>,
    ) {
        let scheduler = Arc::new(RecordingScheduler::default());
        let (runner, events) = SessionRunner::new(
            CountdownEngine::new(work_minutes, break_minutes),
            HarvestStore::open_in_memory().unwrap(),
            scheduler.clone(),
        );
        (runner, events, scheduler)
    }

    #[tokio::test]
    async fn start_schedules_notification_and_pause_cancels_it() {
        let (runner, mut events, scheduler) = runner_with(20.0, 5.0);

        let started = runner.start().await;
        assert!(matches!(started, Some(Event::Started { .. })));
        assert!(matches!(
            events.recv().await,
            Some(Event::Started { .. })
        ));
        {
            let scheduled = scheduler.scheduled.lock().unwrap();
            assert_eq!(scheduled.len(), 1);
            assert_eq!(scheduled[0].1, NotificationMessage::work_complete());
        }

        assert!(matches!(runner.pause().await, Some(Event::Paused { .. })));
        {
            let scheduled = scheduler.scheduled.lock().unwrap();
            let cancelled = scheduler.cancelled.lock().unwrap();
            assert_eq!(cancelled.as_slice(), &[scheduled[0].2]);
        }

        // Pausing twice is a no-op.
        assert!(runner.pause().await.is_none());
        runner.shutdown().await;
    }

    #[tokio::test]
    async fn stop_cancels_notification_and_returns_to_idle() {
        let (runner, _events, scheduler) = runner_with(20.0, 5.0);

        runner.start().await;
        assert!(matches!(runner.stop().await, Some(Event::Stopped { .. })));
        assert_eq!(scheduler.cancelled.lock().unwrap().len(), 1);
        assert!(matches!(
            runner.snapshot().await,
            Event::Snapshot {
                phase: Phase::Idle,
                ..
            }
        ));
        assert_eq!(runner.harvested_today().unwrap(), 0);
        runner.shutdown().await;
    }

    #[tokio::test]
    async fn completed_work_records_harvest_and_swaps_notification() {
        // 1.2 s work period; the flip lands on the second or third tick.
        let (runner, mut events, scheduler) = runner_with(0.02, 0.02);

        runner.start().await;
        let deadline = time::Instant::now() + Duration::from_secs(6);
        loop {
            let event = time::timeout_at(deadline, events.recv())
                .await
                .expect("work period did not complete in time")
                .expect("event channel closed");
            if matches!(event, Event::WorkCompleted { .. }) {
                break;
            }
        }

        assert_eq!(runner.harvested_today().unwrap(), 1);
        {
            let scheduled = scheduler.scheduled.lock().unwrap();
            assert_eq!(scheduled.len(), 2);
            assert_eq!(scheduled[1].1, NotificationMessage::break_over());
        }
        runner.shutdown().await;
        // Shutdown swept the pending break notification.
        assert_eq!(scheduler.cancelled.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn natural_break_expiry_does_not_harvest_again() {
        let (runner, mut events, _scheduler) = runner_with(0.02, 0.02);

        runner.start().await;
        let deadline = time::Instant::now() + Duration::from_secs(12);
        let mut work_completed = false;
        loop {
            let event = time::timeout_at(deadline, events.recv())
                .await
                .expect("phases did not complete in time")
                .expect("event channel closed");
            match event {
                Event::WorkCompleted { .. } => work_completed = true,
                Event::BreakCompleted { .. } => break,
                _ => {}
            }
        }

        // Only the completed work period counts; the break running out and
        // re-arming work adds nothing.
        assert!(work_completed);
        assert_eq!(runner.harvested_today().unwrap(), 1);
        runner.shutdown().await;
    }

    #[tokio::test]
    async fn skip_behind_a_fresh_flip_leaves_work_notification_pending() {
        let (runner, mut events, scheduler) = runner_with(0.02, 5.0);

        runner.start().await;
        let deadline = time::Instant::now() + Duration::from_secs(6);
        loop {
            let event = time::timeout_at(deadline, events.recv())
                .await
                .expect("work period did not complete in time")
                .expect("event channel closed");
            if matches!(event, Event::WorkCompleted { .. }) {
                break;
            }
        }

        // Skip the break right behind the flip; the live notification must
        // track the phase the engine actually ended up in.
        assert!(matches!(
            runner.start().await,
            Some(Event::BreakSkipped { .. })
        ));
        {
            let scheduled = scheduler.scheduled.lock().unwrap();
            let cancelled = scheduler.cancelled.lock().unwrap();
            assert_eq!(scheduled.len(), 3);
            assert_eq!(scheduled[2].1, NotificationMessage::work_complete());
            assert_eq!(cancelled.as_slice(), &[scheduled[0].2, scheduled[1].2]);
        }
        assert_eq!(runner.harvested_today().unwrap(), 1);
        runner.shutdown().await;
    }

    #[tokio::test]
    async fn resume_keeps_the_store_untouched() {
        let (runner, _events, _scheduler) = runner_with(20.0, 5.0);

        runner.start().await;
        runner.pause().await;
        assert!(matches!(runner.start().await, Some(Event::Resumed { .. })));
        assert_eq!(runner.harvested_today().unwrap(), 0);
        runner.shutdown().await;
    }
}
