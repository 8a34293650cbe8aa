//! Shared fakes for integration tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::oneshot;

use heap_intel::domain::{Attachment, EntityId, Mailbox, ThreadSnapshot};
use heap_intel::services::{AnalysisKind, AnalysisResponse, AnalysisService};

type Gate = oneshot::Sender<Result<AnalysisResponse>>;

/// Analysis service whose calls finish only when the test says so.
#[derive(Default)]
pub struct ScriptedAnalysis {
    gates: Mutex<HashMap<EntityId, VecDeque<Gate>>>,
    calls: Mutex<Vec<(EntityId, AnalysisKind)>>,
}

impl ScriptedAnalysis {
    /// Finishes the oldest outstanding call for `entity_id`.
    pub async fn resolve(&self, entity_id: impl Into<EntityId>, summary: &str) {
        let entity_id = entity_id.into();
        for _ in 0..1000 {
            let gate = self
                .gates
                .lock()
                .unwrap()
                .get_mut(&entity_id)
                .and_then(VecDeque::pop_front);
            if let Some(gate) = gate {
                let _ = gate.send(Ok(AnalysisResponse::summary(summary)));
                tokio::task::yield_now().await;
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("no call for {entity_id} reached the service");
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<(EntityId, AnalysisKind)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisService for ScriptedAnalysis {
    async fn analyze(&self, entity_id: &EntityId, kind: AnalysisKind) -> Result<AnalysisResponse> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push((entity_id.clone(), kind));
        self.gates
            .lock()
            .unwrap()
            .entry(entity_id.clone())
            .or_default()
            .push_back(tx);
        rx.await.map_err(|_| anyhow!("gate dropped"))?
    }
}

/// Thread A with attachment X, thread B with attachment Y.
pub fn mailbox() -> Mailbox {
    Mailbox::new()
        .with_thread(
            ThreadSnapshot::new("A", "Q3 Budget Review", "Sarah Chen", "See attached report.")
                .with_attachment(Attachment::new("X", "report.pdf", "application/pdf", 2048)),
        )
        .with_thread(
            ThreadSnapshot::new("B", "Homepage mockups", "Mike Ross", "Feedback by Friday.")
                .with_attachment(Attachment::new("Y", "hero.png", "image/png", 4096)),
        )
}
