//! Fakes that let tests decide when and in which order calls finish.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::domain::EntityId;
use crate::services::{
    AnalysisKind, AnalysisResponse, AnalysisService, DraftResponse, DraftService, ThreadContext,
    Tone,
};

/// Yields to spawned tasks until `ready` holds.
async fn wait_until(mut ready: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if ready() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("call never reached the fake service");
}

type AnalysisGate = oneshot::Sender<Result<AnalysisResponse>>;

/// Analysis service whose calls block until the test resolves them.
#[derive(Default)]
pub(crate) struct GatedAnalysis {
    gates: Mutex<HashMap<(EntityId, AnalysisKind), VecDeque<AnalysisGate>>>,
}

impl GatedAnalysis {
    /// Finishes the oldest outstanding call for the entity and kind.
    pub(crate) async fn resolve(
        &self,
        entity_id: impl Into<EntityId>,
        kind: AnalysisKind,
        outcome: Result<AnalysisResponse>,
    ) {
        let key = (entity_id.into(), kind);
        wait_until(|| {
            self.gates
                .lock()
                .unwrap()
                .get(&key)
                .is_some_and(|q| !q.is_empty())
        })
        .await;

        let gate = self
            .gates
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap();
        let _ = gate.send(outcome);
        // Let the call task post its completion.
        tokio::task::yield_now().await;
    }

    /// Number of calls waiting to be resolved.
    pub(crate) fn outstanding(&self) -> usize {
        self.gates.lock().unwrap().values().map(VecDeque::len).sum()
    }
}

#[async_trait]
impl AnalysisService for GatedAnalysis {
    async fn analyze(&self, entity_id: &EntityId, kind: AnalysisKind) -> Result<AnalysisResponse> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .unwrap()
            .entry((entity_id.clone(), kind))
            .or_default()
            .push_back(tx);
        rx.await.map_err(|_| anyhow!("gate dropped"))?
    }
}

type DraftGate = oneshot::Sender<Result<DraftResponse>>;

/// Draft service whose calls block until the test resolves them.
#[derive(Default)]
pub(crate) struct GatedDrafts {
    gates: Mutex<VecDeque<(Tone, ThreadContext, DraftGate)>>,
}

impl GatedDrafts {
    /// Finishes the oldest outstanding draft call and returns its inputs.
    pub(crate) async fn resolve(&self, outcome: Result<DraftResponse>) -> (Tone, ThreadContext) {
        wait_until(|| !self.gates.lock().unwrap().is_empty()).await;

        let (tone, context, gate) = self.gates.lock().unwrap().pop_front().unwrap();
        let _ = gate.send(outcome);
        tokio::task::yield_now().await;
        (tone, context)
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.gates.lock().unwrap().len()
    }
}

#[async_trait]
impl DraftService for GatedDrafts {
    async fn draft(&self, tone: Tone, context: &ThreadContext) -> Result<DraftResponse> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .unwrap()
            .push_back((tone, context.clone(), tx));
        rx.await.map_err(|_| anyhow!("gate dropped"))?
    }
}
