//! Fire-and-forget notification hook.

use crate::model::actor::{PersonId, SnapshotId};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

/// Engine events delivered to the subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// A finalization produced a new decision snapshot.
    Finalized {
        snapshot_id: SnapshotId,
        record_count: usize,
    },
    /// The subject acknowledged a decision snapshot.
    Acknowledged { snapshot_id: SnapshotId },
}

impl NotificationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Finalized { .. } => "finalized",
            Self::Acknowledged { .. } => "acknowledged",
        }
    }

    pub fn snapshot_id(&self) -> SnapshotId {
        match self {
            Self::Finalized { snapshot_id, .. } | Self::Acknowledged { snapshot_id } => {
                *snapshot_id
            }
        }
    }
}

/// Delivery failure reported by a dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError(pub String);

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification delivery failed: {}", self.0)
    }
}

impl Error for NotifyError {}

/// Outbound notification channel (chat, webhook, email...).
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, subject_id: PersonId, event: &NotificationEvent) -> Result<(), NotifyError>;
}

/// Dispatcher that only writes a log line per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationDispatcher;

impl NotificationDispatcher for LogNotificationDispatcher {
    fn notify(&self, subject_id: PersonId, event: &NotificationEvent) -> Result<(), NotifyError> {
        info!(
            "event=notification module=collab status=ok kind={} subject_id={} snapshot_id={}",
            event.name(),
            subject_id,
            event.snapshot_id()
        );
        Ok(())
    }
}

/// Dispatcher that keeps delivered events in memory.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    events: Mutex<Vec<(PersonId, NotificationEvent)>>,
    fail: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher that records every event and then reports a failure.
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<(PersonId, NotificationEvent)> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn notify(&self, subject_id: PersonId, event: &NotificationEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((subject_id, event.clone()));
        if self.fail {
            return Err(NotifyError("dispatcher unavailable".to_string()));
        }
        Ok(())
    }
}

/// Delivers one event and logs, but never propagates, delivery failures.
pub(crate) fn dispatch_best_effort(
    dispatcher: &dyn NotificationDispatcher,
    subject_id: PersonId,
    event: &NotificationEvent,
) {
    if let Err(err) = dispatcher.notify(subject_id, event) {
        warn!(
            "event=notification module=collab status=error kind={} subject_id={} snapshot_id={} error={}",
            event.name(),
            subject_id,
            event.snapshot_id(),
            err
        );
    }
}
