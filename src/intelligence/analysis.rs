//! Analysis requests and generation fencing.
//!
//! Every request captures the generation (and, for attachment summaries,
//! the selected attachment) at issue time. The call itself runs in a
//! spawned task and posts an [`AnalysisCompletion`] back to the manager's
//! channel; nothing is applied until the owner hands the completion to
//! [`AnalysisRequestManager::complete`], which re-checks the fence against
//! the selection as it is *then*.
//!
//! Cancellation is soft: a superseded call keeps running and its result is
//! simply discarded when it arrives.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::error::AnalysisFailure;
use super::selection::{Generation, SelectionState};
use crate::config::CacheSettings;
use crate::domain::{AttachmentId, EntityId};
use crate::services::{
    AnalysisKind, AnalysisResponse, AnalysisService, EntityHighlight, Importance,
};

/// Sequence number of an issued request, unique per manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Lifecycle of an analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisStatus {
    Pending,
    Resolved,
    /// The selection moved on; any result is discarded.
    Stale,
    Errored(AnalysisFailure),
}

impl AnalysisStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, AnalysisStatus::Pending)
    }
}

/// An issued analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub id: RequestId,
    pub entity_id: EntityId,
    pub kind: AnalysisKind,
    pub generation: Generation,
    /// Attachment selected when the request was issued.
    pub secondary_id: Option<AttachmentId>,
    pub status: AnalysisStatus,
}

impl AnalysisRequest {
    /// Whether the request still belongs to the current selection.
    fn is_current(&self, selection: &SelectionState) -> bool {
        fence(self.kind, self.generation, self.secondary_id.as_ref(), selection).is_none()
    }
}

/// A generation-valid analysis result. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub entity_id: EntityId,
    pub kind: AnalysisKind,
    pub summary_text: String,
    pub key_points: Vec<String>,
    pub document_type: Option<String>,
    pub importance: Importance,
    pub suggested_actions: Vec<String>,
    pub entities: Vec<EntityHighlight>,
    pub generation: Generation,
}

impl AnalysisResult {
    fn new(request: &AnalysisRequest, response: AnalysisResponse) -> Self {
        Self {
            entity_id: request.entity_id.clone(),
            kind: request.kind,
            summary_text: response.summary_text,
            key_points: response.key_points,
            document_type: response.document_type,
            importance: response.importance,
            suggested_actions: response.suggested_actions,
            entities: response.entities,
            generation: request.generation,
        }
    }

    /// Length of the summary in characters.
    pub fn summary_len(&self) -> usize {
        self.summary_text.chars().count()
    }
}

/// Message posted by a finished analysis call.
#[derive(Debug)]
pub struct AnalysisCompletion {
    pub request_id: RequestId,
    pub entity_id: EntityId,
    pub kind: AnalysisKind,
    pub generation: Generation,
    pub secondary_id: Option<AttachmentId>,
    pub outcome: std::result::Result<AnalysisResponse, AnalysisFailure>,
    /// Served from the response cache rather than the service.
    pub cached: bool,
}

/// Why a completion was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// The selected thread changed.
    GenerationChanged,
    /// The selected attachment changed within the same thread.
    SelectionChanged,
    /// A newer request for the same kind was issued.
    Superseded,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StaleReason::GenerationChanged => "generation changed",
            StaleReason::SelectionChanged => "selection changed",
            StaleReason::Superseded => "superseded",
        })
    }
}

/// What applying a completion did.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The result is now displayed.
    Applied(Arc<AnalysisResult>),
    /// The call failed while still current.
    Errored {
        entity_id: EntityId,
        kind: AnalysisKind,
        failure: AnalysisFailure,
    },
    /// The completion was fenced off. No state changed.
    Stale {
        entity_id: EntityId,
        kind: AnalysisKind,
        generation: Generation,
        reason: StaleReason,
    },
}

/// Returns why work issued under the given context is no longer current.
fn fence(
    kind: AnalysisKind,
    generation: Generation,
    secondary_id: Option<&AttachmentId>,
    selection: &SelectionState,
) -> Option<StaleReason> {
    if generation != selection.current_generation() {
        return Some(StaleReason::GenerationChanged);
    }
    if kind == AnalysisKind::AttachmentSummary && secondary_id != selection.secondary_id() {
        return Some(StaleReason::SelectionChanged);
    }
    None
}

struct CachedResponse {
    stored_at: Instant,
    response: AnalysisResponse,
}

/// LRU cache of analysis responses with a freshness window.
struct ResponseCache {
    entries: LruCache<(EntityId, AnalysisKind), CachedResponse>,
    stale_after: Duration,
}

impl ResponseCache {
    fn new(settings: &CacheSettings) -> Option<Self> {
        if !settings.enabled {
            return None;
        }
        let capacity = NonZeroUsize::new(settings.capacity)?;
        Some(Self {
            entries: LruCache::new(capacity),
            stale_after: settings.stale_after(),
        })
    }

    fn get(&mut self, entity_id: &EntityId, kind: AnalysisKind) -> Option<AnalysisResponse> {
        let key = (entity_id.clone(), kind);
        let stale_after = self.stale_after;
        let fresh = self
            .entries
            .get(&key)
            .map(|entry| entry.stored_at.elapsed() <= stale_after)?;

        if !fresh {
            self.entries.pop(&key);
            return None;
        }
        self.entries.peek(&key).map(|entry| entry.response.clone())
    }

    fn insert(&mut self, entity_id: EntityId, kind: AnalysisKind, response: AnalysisResponse) {
        self.entries.put(
            (entity_id, kind),
            CachedResponse {
                stored_at: Instant::now(),
                response,
            },
        );
    }
}

/// Issues analysis calls and applies their results under generation fencing.
pub struct AnalysisRequestManager {
    service: Arc<dyn AnalysisService>,
    timeout: Duration,
    cache: Option<ResponseCache>,
    next_id: u64,
    /// The one meaningful request per kind.
    requests: HashMap<AnalysisKind, AnalysisRequest>,
    /// Results currently displayed, per kind.
    results: HashMap<AnalysisKind, Arc<AnalysisResult>>,
    completions_tx: mpsc::UnboundedSender<AnalysisCompletion>,
    completions_rx: mpsc::UnboundedReceiver<AnalysisCompletion>,
}

impl AnalysisRequestManager {
    /// Creates a manager. Calls exceeding `timeout` fail as timed out.
    pub fn new(service: Arc<dyn AnalysisService>, timeout: Duration, cache: &CacheSettings) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            service,
            timeout,
            cache: ResponseCache::new(cache),
            next_id: 0,
            requests: HashMap::new(),
            results: HashMap::new(),
            completions_tx,
            completions_rx,
        }
    }

    /// Issues an analysis request for the current selection.
    ///
    /// A fresh cached response is delivered through the completion channel
    /// like any other, so it is fenced the same way. Must be called from
    /// within a tokio runtime.
    pub fn request(
        &mut self,
        selection: &SelectionState,
        entity_id: EntityId,
        kind: AnalysisKind,
    ) -> RequestId {
        self.issue(selection, entity_id, kind, true)
    }

    /// Like [`request`](Self::request) but always calls the service.
    pub fn request_uncached(
        &mut self,
        selection: &SelectionState,
        entity_id: EntityId,
        kind: AnalysisKind,
    ) -> RequestId {
        self.issue(selection, entity_id, kind, false)
    }

    fn issue(
        &mut self,
        selection: &SelectionState,
        entity_id: EntityId,
        kind: AnalysisKind,
        use_cache: bool,
    ) -> RequestId {
        self.next_id += 1;
        let id = RequestId(self.next_id);
        let generation = selection.current_generation();
        let secondary_id = selection.secondary_id().cloned();

        let request = AnalysisRequest {
            id,
            entity_id: entity_id.clone(),
            kind,
            generation,
            secondary_id: secondary_id.clone(),
            status: AnalysisStatus::Pending,
        };
        if let Some(previous) = self.requests.insert(kind, request) {
            if previous.status.is_pending() {
                tracing::debug!(
                    request = %previous.id,
                    entity = %previous.entity_id,
                    %kind,
                    "pending analysis superseded"
                );
            }
        }
        self.results.remove(&kind);

        tracing::debug!(request = %id, entity = %entity_id, %kind, %generation, "analysis requested");

        let cached = if use_cache {
            self.cache.as_mut().and_then(|c| c.get(&entity_id, kind))
        } else {
            None
        };
        if let Some(response) = cached {
            // The receiver lives in `self`, so this cannot fail.
            let _ = self.completions_tx.send(AnalysisCompletion {
                request_id: id,
                entity_id,
                kind,
                generation,
                secondary_id,
                outcome: Ok(response),
                cached: true,
            });
            return id;
        }

        let service = Arc::clone(&self.service);
        let tx = self.completions_tx.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, service.analyze(&entity_id, kind)).await
            {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(err)) => Err(AnalysisFailure::Service(format!("{err:#}"))),
                Err(_) => Err(AnalysisFailure::TimedOut(timeout)),
            };
            // A closed channel means the panel is gone.
            let _ = tx.send(AnalysisCompletion {
                request_id: id,
                entity_id,
                kind,
                generation,
                secondary_id,
                outcome,
                cached: false,
            });
        });

        id
    }

    /// Waits for the next finished call.
    pub async fn next_completion(&mut self) -> Option<AnalysisCompletion> {
        self.completions_rx.recv().await
    }

    /// Returns a finished call if one is already queued.
    pub fn try_next_completion(&mut self) -> Option<AnalysisCompletion> {
        self.completions_rx.try_recv().ok()
    }

    /// Applies a finished call if it is still current.
    pub fn complete(
        &mut self,
        selection: &SelectionState,
        completion: AnalysisCompletion,
    ) -> Resolution {
        let kind = completion.kind;
        let is_latest = self
            .requests
            .get(&kind)
            .is_some_and(|r| r.id == completion.request_id && r.status.is_pending());

        let stale_reason = fence(
            kind,
            completion.generation,
            completion.secondary_id.as_ref(),
            selection,
        )
        .or(if is_latest {
            None
        } else {
            Some(StaleReason::Superseded)
        });

        if let Some(reason) = stale_reason {
            if is_latest {
                if let Some(request) = self.requests.get_mut(&kind) {
                    request.status = AnalysisStatus::Stale;
                }
            }
            tracing::debug!(
                request = %completion.request_id,
                entity = %completion.entity_id,
                %kind,
                generation = %completion.generation,
                %reason,
                "stale analysis result discarded"
            );
            return Resolution::Stale {
                entity_id: completion.entity_id,
                kind,
                generation: completion.generation,
                reason,
            };
        }

        match completion.outcome {
            Ok(response) => {
                if !completion.cached {
                    if let Some(cache) = self.cache.as_mut() {
                        cache.insert(completion.entity_id.clone(), kind, response.clone());
                    }
                }

                let Some(request) = self.requests.get_mut(&kind) else {
                    return Resolution::Stale {
                        entity_id: completion.entity_id,
                        kind,
                        generation: completion.generation,
                        reason: StaleReason::Superseded,
                    };
                };
                request.status = AnalysisStatus::Resolved;
                let result = Arc::new(AnalysisResult::new(request, response));
                self.results.insert(kind, Arc::clone(&result));

                tracing::info!(
                    entity = %result.entity_id,
                    %kind,
                    generation = %result.generation,
                    cached = completion.cached,
                    "analysis applied"
                );
                Resolution::Applied(result)
            }
            Err(failure) => {
                if let Some(request) = self.requests.get_mut(&kind) {
                    request.status = AnalysisStatus::Errored(failure.clone());
                }
                tracing::warn!(
                    entity = %completion.entity_id,
                    %kind,
                    error = %failure,
                    "analysis failed"
                );
                Resolution::Errored {
                    entity_id: completion.entity_id,
                    kind,
                    failure,
                }
            }
        }
    }

    /// Marks requests and results that no longer match the selection as
    /// stale and drops them from display. Called on every selection change.
    pub fn invalidate(&mut self, selection: &SelectionState) {
        for request in self.requests.values_mut() {
            if request.status.is_pending() && !request.is_current(selection) {
                tracing::debug!(
                    request = %request.id,
                    entity = %request.entity_id,
                    kind = %request.kind,
                    "pending analysis marked stale"
                );
                request.status = AnalysisStatus::Stale;
            }
        }

        let current = selection.current_generation();
        let secondary = selection.secondary_id().cloned().map(EntityId::from);
        self.results.retain(|kind, result| {
            result.generation == current
                && (*kind != AnalysisKind::AttachmentSummary
                    || Some(&result.entity_id) == secondary.as_ref())
        });
    }

    /// Displayed result for a kind.
    pub fn result(&self, kind: AnalysisKind) -> Option<&Arc<AnalysisResult>> {
        self.results.get(&kind)
    }

    /// Latest request for a kind.
    pub fn request_for(&self, kind: AnalysisKind) -> Option<&AnalysisRequest> {
        self.requests.get(&kind)
    }

    /// Whether the latest request for a kind is still in flight.
    pub fn is_pending(&self, kind: AnalysisKind) -> bool {
        self.requests
            .get(&kind)
            .is_some_and(|r| r.status.is_pending())
    }
}
