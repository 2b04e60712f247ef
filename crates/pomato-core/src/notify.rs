//! Local notification scheduling.
//!
//! Phase transitions want a notification delivered at an absolute future
//! instant (the phase deadline), cancellable if the user pauses or stops
//! first. The `NotificationScheduler` trait is that seam; the session runner
//! only ever holds one pending id at a time and swaps it on every transition.
//!
//! `DesktopScheduler` delivers through the desktop notification daemon.
//! Delivery is best effort: a failed notification is logged and the countdown
//! goes on without it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NotifyError;

/// Opaque handle for a scheduled notification, used only to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(Uuid);

impl NotificationId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// What a delivered notification says.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title: String,
    pub body: String,
}

impl NotificationMessage {
    /// Announces the end of a work period.
    pub fn work_complete() -> Self {
        Self {
            title: "Pomodoro complete!".into(),
            body: "Break time...".into(),
        }
    }

    /// Announces the end of a break.
    pub fn break_over() -> Self {
        Self {
            title: "Break is over!".into(),
            body: "Ready to start another Pomodoro?".into(),
        }
    }
}

/// Scheduler seam between the session runner and the platform.
pub trait NotificationScheduler: Send + Sync {
    /// Schedule `message` for delivery at the absolute instant `at`.
    /// An `at` already in the past delivers immediately.
    fn schedule(
        &self,
        at: DateTime<Utc>,
        message: NotificationMessage,
    ) -> Result<NotificationId, NotifyError>;

    /// Cancel a previously scheduled notification. Cancelling an id that was
    /// already delivered, or never existed, is a no-op.
    fn cancel(&self, id: NotificationId);
}

/// Delivers through the desktop notification daemon, waiting out the delay
/// on a tokio task. Must be used from within a tokio runtime.
#[derive(Default)]
pub struct DesktopScheduler {
    pending: Mutex<HashMap<NotificationId, tokio::task::JoinHandle<()>>>,
}

impl DesktopScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotificationScheduler for DesktopScheduler {
    fn schedule(
        &self,
        at: DateTime<Utc>,
        message: NotificationMessage,
    ) -> Result<NotificationId, NotifyError> {
        let id = NotificationId::new();
        let delay = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let result = notify_rust::Notification::new()
                .summary(&message.title)
                .body(&message.body)
                .appname("pomato")
                .show();
            match result {
                Ok(_) => tracing::debug!(title = %message.title, "notification delivered"),
                Err(err) => tracing::warn!(%err, "failed to show desktop notification"),
            }
        });

        let mut pending = self
            .pending
            .lock()
            .map_err(|_| NotifyError::ScheduleFailed("scheduler lock poisoned".into()))?;
        pending.retain(|_, task| !task.is_finished());
        pending.insert(id, handle);
        Ok(id)
    }

    fn cancel(&self, id: NotificationId) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(task) = pending.remove(&id) {
                task.abort();
            }
        }
    }
}

/// Scheduler that schedules nothing. Used when notifications are disabled.
pub struct NullScheduler;

impl NotificationScheduler for NullScheduler {
    fn schedule(
        &self,
        _at: DateTime<Utc>,
        _message: NotificationMessage,
    ) -> Result<NotificationId, NotifyError> {
        Ok(NotificationId::new())
    }

    fn cancel(&self, _id: NotificationId) {}
}
