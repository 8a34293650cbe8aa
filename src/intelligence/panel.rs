//! The intelligence panel: single owner of selection, analysis, reveal and
//! draft state.
//!
//! Every mutation happens through `&mut self`. Collaborator calls run on
//! spawned tasks and only post completions; the panel applies them in
//! [`IntelligencePanel::process_next`] after re-checking their fences.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use super::analysis::{
    AnalysisCompletion, AnalysisRequestManager, AnalysisResult, AnalysisStatus, RequestId,
    Resolution,
};
use super::draft::{
    DraftCompletion, DraftOrchestrator, DraftRequest, DraftRequestId, DraftResolution, DraftStatus,
};
use super::error::{IntelligenceError, Result};
use super::events::{EventBus, PanelEvent};
use super::reveal::{RevealSequencer, RevealState};
use super::selection::{ActiveTab, Generation, PrimaryChange, Selection, SelectionState};
use crate::config::PanelConfig;
use crate::domain::{AttachmentId, EntityId, ThreadId, ThreadLookup, ThreadSnapshot};
use crate::services::{AnalysisKind, AnalysisService, DraftService, NewTask, TaskSink, Tone};

/// Collaborators the panel talks to.
#[derive(Clone)]
pub struct PanelServices {
    pub analysis: Arc<dyn AnalysisService>,
    pub drafts: Arc<dyn DraftService>,
    pub tasks: Arc<dyn TaskSink>,
    pub threads: Arc<dyn ThreadLookup>,
}

enum Inbound {
    Analysis(AnalysisCompletion),
    Draft(DraftCompletion),
}

pub struct IntelligencePanel {
    selection: SelectionState,
    analysis: AnalysisRequestManager,
    reveal: RevealSequencer,
    drafts: DraftOrchestrator,
    tasks: Arc<dyn TaskSink>,
    threads: Arc<dyn ThreadLookup>,
    events: EventBus,
    default_tone: Tone,
}

impl IntelligencePanel {
    pub fn new(config: &PanelConfig, services: PanelServices) -> Self {
        let timeout = config.request_timeout();
        Self {
            selection: SelectionState::new(),
            analysis: AnalysisRequestManager::new(services.analysis, timeout, &config.cache),
            reveal: RevealSequencer::new(config.reveal.clone()),
            drafts: DraftOrchestrator::new(services.drafts, timeout),
            tasks: services.tasks,
            threads: services.threads,
            events: EventBus::new(config.event_capacity),
            default_tone: config.default_tone,
        }
    }

    // -- selection --

    /// Selects a thread and requests its analyses.
    ///
    /// Re-selecting the current thread changes nothing. Otherwise the
    /// generation moves on, everything shown for the previous thread is
    /// dropped, and summaries are requested for the thread and its first
    /// attachment.
    pub fn select_primary(&mut self, thread_id: &ThreadId) -> Result<Generation> {
        let thread = self
            .threads
            .thread(thread_id)
            .ok_or_else(|| IntelligenceError::UnknownThread(thread_id.clone()))?;

        let (generation, secondary_id) = match self.selection.select_primary(thread) {
            PrimaryChange::Unchanged => return Ok(self.selection.current_generation()),
            PrimaryChange::Changed {
                generation,
                secondary_id,
            } => (generation, secondary_id),
        };

        self.reveal.clear();
        self.analysis.invalidate(&self.selection);
        self.drafts.clear();
        self.publish_selection();

        tracing::info!(thread = %thread_id, %generation, "thread selected");

        self.request(AnalysisKind::ThreadSummary, true)?;
        if secondary_id.is_some() {
            self.request(AnalysisKind::AttachmentSummary, true)?;
        }
        Ok(generation)
    }

    /// Selects an attachment of the current thread and requests its summary.
    pub fn select_secondary(&mut self, attachment_id: &AttachmentId) -> Result<()> {
        if !self.selection.select_secondary(attachment_id.clone())? {
            return Ok(());
        }

        self.analysis.invalidate(&self.selection);
        self.drafts.clear();
        self.publish_selection();

        tracing::debug!(attachment = %attachment_id, "attachment selected");
        self.request(AnalysisKind::AttachmentSummary, true)?;
        Ok(())
    }

    pub fn set_active_tab(&mut self, tab: ActiveTab) {
        self.selection.set_active_tab(tab);
    }

    /// Closes the panel. Anything still in flight resolves as stale.
    pub fn close(&mut self) {
        self.reveal.clear();
        self.selection.clear();
        self.analysis.invalidate(&self.selection);
        self.drafts.clear();
        self.publish_selection();
        tracing::debug!(generation = %self.selection.current_generation(), "panel closed");
    }

    // -- analysis --

    /// Re-issues the analysis of a kind for the current selection,
    /// bypassing the response cache.
    pub fn retry(&mut self, kind: AnalysisKind) -> Result<RequestId> {
        self.request(kind, false)
    }

    fn request(&mut self, kind: AnalysisKind, use_cache: bool) -> Result<RequestId> {
        let entity_id: EntityId = match kind {
            AnalysisKind::ThreadSummary => self.selection.primary_id().cloned().map(EntityId::from),
            AnalysisKind::AttachmentSummary => {
                self.selection.secondary_id().cloned().map(EntityId::from)
            }
        }
        .ok_or(IntelligenceError::NoSelection)?;

        // Issuing drops the displayed result of this kind, so its reveal goes too.
        if self.reveal.state().result.is_some_and(|r| r.kind == kind) {
            self.reveal.clear();
        }

        let request_id = if use_cache {
            self.analysis
                .request(&self.selection, entity_id.clone(), kind)
        } else {
            self.analysis
                .request_uncached(&self.selection, entity_id.clone(), kind)
        };
        self.events.publish(PanelEvent::AnalysisRequested {
            request_id,
            entity_id,
            kind,
            generation: self.selection.current_generation(),
        });
        Ok(request_id)
    }

    // -- drafts --

    /// Generates a reply draft and switches to the draft tab.
    ///
    /// The displayed attachment summary, if any, is passed along as context.
    pub fn generate_draft(
        &mut self,
        tone: Tone,
        instructions: Option<String>,
    ) -> Result<DraftRequestId> {
        let attachment_summary = self.attachment_context();
        let request_id =
            self.drafts
                .generate(&self.selection, tone, instructions, attachment_summary)?;
        self.selection.set_active_tab(ActiveTab::Draft);
        self.events
            .publish(PanelEvent::DraftRequested { request_id, tone });
        Ok(request_id)
    }

    /// Generates the draft again in the same tone, dropping edits.
    pub fn regenerate_draft(&mut self) -> Result<DraftRequestId> {
        let attachment_summary = self.attachment_context();
        let request_id = self.drafts.regenerate(&self.selection, attachment_summary)?;
        if let Some(draft) = self.drafts.draft() {
            self.events.publish(PanelEvent::DraftRequested {
                request_id,
                tone: draft.tone,
            });
        }
        Ok(request_id)
    }

    pub fn edit_draft(&mut self, text: impl Into<String>) -> Result<()> {
        self.drafts.edit(text)
    }

    fn attachment_context(&self) -> Option<String> {
        self.analysis
            .result(AnalysisKind::AttachmentSummary)
            .map(|r| r.summary_text.clone())
    }

    // -- tasks --

    /// Turns a suggested action of the thread summary into a task.
    ///
    /// The task sink is called in the background; the outcome is published
    /// as `TaskCreated` or `TaskFailed`. Every call creates a new task.
    pub fn accept_suggestion(&mut self, index: usize) -> Result<()> {
        let thread_id = self
            .selection
            .primary_id()
            .cloned()
            .ok_or(IntelligenceError::NoSelection)?;
        let suggestions = self
            .analysis
            .result(AnalysisKind::ThreadSummary)
            .map(|r| r.suggested_actions.as_slice())
            .unwrap_or_default();
        let title = suggestions
            .get(index)
            .cloned()
            .ok_or(IntelligenceError::SuggestionOutOfRange {
                index,
                len: suggestions.len(),
            })?;

        self.events.publish(PanelEvent::TaskQueued {
            title: title.clone(),
            thread_id: thread_id.clone(),
        });

        let tasks = Arc::clone(&self.tasks);
        let events = self.events.clone();
        tokio::spawn(async move {
            let task = NewTask {
                title: title.clone(),
                source_thread_id: thread_id.clone(),
                is_ai_generated: true,
            };
            match tasks.add_task(task).await {
                Ok(task_id) => {
                    tracing::info!(task = %task_id, thread = %thread_id, %title, "task created");
                    events.publish(PanelEvent::TaskCreated { task_id, title });
                }
                Err(err) => {
                    tracing::warn!(
                        thread = %thread_id,
                        %title,
                        error = %err,
                        "failed to create task"
                    );
                    events.publish(PanelEvent::TaskFailed {
                        title,
                        error: format!("{err:#}"),
                    });
                }
            }
        });
        Ok(())
    }

    // -- completions --

    /// Waits for the next finished call and applies it.
    pub async fn process_next(&mut self) -> Option<PanelEvent> {
        let inbound = tokio::select! {
            Some(completion) = self.analysis.next_completion() => Inbound::Analysis(completion),
            Some(completion) = self.drafts.next_completion() => Inbound::Draft(completion),
            else => return None,
        };
        Some(self.apply(inbound))
    }

    /// Applies every call that has already finished, without waiting.
    pub fn process_pending(&mut self) -> Vec<PanelEvent> {
        let mut applied = Vec::new();
        while let Some(completion) = self.analysis.try_next_completion() {
            applied.push(self.apply(Inbound::Analysis(completion)));
        }
        while let Some(completion) = self.drafts.try_next_completion() {
            applied.push(self.apply(Inbound::Draft(completion)));
        }
        applied
    }

    fn apply(&mut self, inbound: Inbound) -> PanelEvent {
        let event = match inbound {
            Inbound::Analysis(completion) => self.apply_analysis(completion),
            Inbound::Draft(completion) => self.apply_draft(completion),
        };
        self.events.publish(event.clone());
        event
    }

    fn apply_analysis(&mut self, completion: AnalysisCompletion) -> PanelEvent {
        let cached = completion.cached;
        match self.analysis.complete(&self.selection, completion) {
            Resolution::Applied(result) => {
                let event = PanelEvent::AnalysisApplied {
                    entity_id: result.entity_id.clone(),
                    kind: result.kind,
                    generation: result.generation,
                    cached,
                };
                if self.reveal.is_running() {
                    self.reveal.supersede(result);
                } else {
                    self.reveal.start(result);
                }
                event
            }
            Resolution::Errored {
                entity_id,
                kind,
                failure,
            } => PanelEvent::AnalysisFailed {
                entity_id,
                kind,
                failure,
            },
            Resolution::Stale {
                entity_id,
                kind,
                generation,
                reason,
            } => PanelEvent::StaleResultDiscarded {
                entity_id,
                kind,
                generation,
                reason,
            },
        }
    }

    fn apply_draft(&mut self, completion: DraftCompletion) -> PanelEvent {
        match self.drafts.complete(&self.selection, completion) {
            DraftResolution::Ready(request_id) => PanelEvent::DraftReady { request_id },
            DraftResolution::Errored {
                request_id,
                failure,
            } => PanelEvent::DraftFailed {
                request_id,
                failure,
            },
            DraftResolution::Discarded { request_id, reason } => {
                PanelEvent::DraftDiscarded { request_id, reason }
            }
        }
    }

    fn publish_selection(&self) {
        self.events.publish(PanelEvent::SelectionChanged {
            generation: self.selection.current_generation(),
            primary_id: self.selection.primary_id().cloned(),
            secondary_id: self.selection.secondary_id().cloned(),
        });
    }

    // -- read side --

    /// Summary text as it should be rendered now: the revealed prefix while
    /// the result is being revealed, the whole text otherwise.
    pub fn visible_summary(&self, kind: AnalysisKind) -> Option<String> {
        let result = self.analysis.result(kind)?;
        let reveal = self.reveal.state();
        if reveal.is_revealing(result) {
            Some(reveal.visible_text())
        } else {
            Some(result.summary_text.clone())
        }
    }

    /// Displayed result for a kind.
    pub fn result(&self, kind: AnalysisKind) -> Option<Arc<AnalysisResult>> {
        self.analysis.result(kind).cloned()
    }

    pub fn analysis_status(&self, kind: AnalysisKind) -> Option<AnalysisStatus> {
        self.analysis.request_for(kind).map(|r| r.status.clone())
    }

    /// Whether the current selection is waiting on an analysis of `kind`.
    pub fn is_analyzing(&self, kind: AnalysisKind) -> bool {
        self.analysis.is_pending(kind)
    }

    pub fn is_drafting(&self) -> bool {
        self.drafts.is_generating()
    }

    pub fn draft(&self) -> Option<&DraftRequest> {
        self.drafts.draft()
    }

    pub fn draft_status(&self) -> DraftStatus {
        self.drafts.status()
    }

    pub fn reveal_state(&self) -> RevealState {
        self.reveal.state()
    }

    pub fn subscribe_reveal(&self) -> watch::Receiver<RevealState> {
        self.reveal.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    pub fn current_generation(&self) -> Generation {
        self.selection.current_generation()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection.selection()
    }

    pub fn thread(&self) -> Option<&ThreadSnapshot> {
        self.selection.thread()
    }

    pub fn default_tone(&self) -> Tone {
        self.default_tone
    }
}
