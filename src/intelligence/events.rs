//! Panel event notifications.
//!
//! Everything the panel does is also published here so renderers and
//! tests can observe it, including discarded stale results which are
//! never shown to the user.

use tokio::sync::broadcast;

use super::analysis::{RequestId, StaleReason};
use super::draft::DraftRequestId;
use super::error::{AnalysisFailure, DraftGenerationFailure};
use super::selection::Generation;
use crate::domain::{AttachmentId, EntityId, TaskId, ThreadId};
use crate::services::{AnalysisKind, Tone};

#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    SelectionChanged {
        generation: Generation,
        primary_id: Option<ThreadId>,
        secondary_id: Option<AttachmentId>,
    },
    AnalysisRequested {
        request_id: RequestId,
        entity_id: EntityId,
        kind: AnalysisKind,
        generation: Generation,
    },
    AnalysisApplied {
        entity_id: EntityId,
        kind: AnalysisKind,
        generation: Generation,
        /// Served from the response cache.
        cached: bool,
    },
    AnalysisFailed {
        entity_id: EntityId,
        kind: AnalysisKind,
        failure: AnalysisFailure,
    },
    /// A completion arrived for a selection that is no longer current.
    StaleResultDiscarded {
        entity_id: EntityId,
        kind: AnalysisKind,
        generation: Generation,
        reason: StaleReason,
    },
    DraftRequested {
        request_id: DraftRequestId,
        tone: Tone,
    },
    DraftReady {
        request_id: DraftRequestId,
    },
    DraftFailed {
        request_id: DraftRequestId,
        failure: DraftGenerationFailure,
    },
    DraftDiscarded {
        request_id: DraftRequestId,
        reason: StaleReason,
    },
    /// A suggestion was handed to the task sink.
    TaskQueued {
        title: String,
        thread_id: ThreadId,
    },
    TaskCreated {
        task_id: TaskId,
        title: String,
    },
    TaskFailed {
        title: String,
        error: String,
    },
}

/// Broadcast channel of [`PanelEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PanelEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event. Having no subscribers is fine.
    pub fn publish(&self, event: PanelEvent) {
        tracing::trace!(?event, "panel event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.publish(PanelEvent::DraftReady {
            request_id: DraftRequestId::default(),
        });
    }

    #[tokio::test]
    async fn subscribers_see_events_in_order() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();

        bus.publish(PanelEvent::TaskQueued {
            title: "Reply to sender".into(),
            thread_id: ThreadId::from("t1"),
        });
        bus.publish(PanelEvent::TaskFailed {
            title: "Reply to sender".into(),
            error: "offline".into(),
        });

        assert!(matches!(rx.recv().await.unwrap(), PanelEvent::TaskQueued { .. }));
        assert!(matches!(rx.recv().await.unwrap(), PanelEvent::TaskFailed { .. }));
    }
}
