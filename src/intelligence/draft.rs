//! Reply draft generation.
//!
//! At most one draft is live. Generating again replaces it whatever its
//! status; the replaced call keeps running and its result is discarded.
//! A completion applies only if it belongs to the live draft and the
//! selection is still the thread and attachment it was issued for.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::analysis::StaleReason;
use super::error::{DraftGenerationFailure, IntelligenceError, Result};
use super::selection::{Generation, SelectionState};
use crate::domain::{AttachmentId, ThreadId};
use crate::services::{DraftResponse, DraftService, Placeholder, ThreadContext, Tone};

/// Sequence number of a draft request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DraftRequestId(u64);

impl fmt::Display for DraftRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "draft-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DraftStatus {
    #[default]
    Idle,
    Generating,
    Ready,
    /// The user changed the generated text.
    Editing,
    Errored(DraftGenerationFailure),
}

impl DraftStatus {
    pub fn name(&self) -> &'static str {
        match self {
            DraftStatus::Idle => "idle",
            DraftStatus::Generating => "generating",
            DraftStatus::Ready => "ready",
            DraftStatus::Editing => "editing",
            DraftStatus::Errored(_) => "errored",
        }
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// User actions on an existing draft. Generating is valid from every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DraftAction {
    Regenerate,
    Edit,
}

impl DraftAction {
    fn name(self) -> &'static str {
        match self {
            DraftAction::Regenerate => "regenerate",
            DraftAction::Edit => "edit",
        }
    }
}

fn allowed(from: &DraftStatus, action: DraftAction) -> bool {
    use DraftStatus::*;
    match action {
        DraftAction::Regenerate => matches!(from, Ready | Editing | Errored(_)),
        DraftAction::Edit => matches!(from, Ready | Editing),
    }
}

fn validate_transition(from: &DraftStatus, action: DraftAction) -> Result<()> {
    if allowed(from, action) {
        Ok(())
    } else {
        Err(IntelligenceError::InvalidDraftTransition {
            from: from.name(),
            action: action.name(),
        })
    }
}

/// The live reply draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRequest {
    pub id: DraftRequestId,
    pub tone: Tone,
    pub instructions: Option<String>,
    pub status: DraftStatus,
    /// Generated text, once ready.
    pub content: Option<String>,
    pub placeholders: Vec<Placeholder>,
    /// The user's version of the text, once edited.
    pub edited_content: Option<String>,
    pub generation: Generation,
    pub thread_id: ThreadId,
    /// Attachment selected when the draft was requested.
    pub secondary_id: Option<AttachmentId>,
}

impl DraftRequest {
    /// The text to show or send: the edit if there is one, else the
    /// generated content.
    pub fn text(&self) -> Option<&str> {
        self.edited_content
            .as_deref()
            .or(self.content.as_deref())
    }

    /// Whether any placeholder marker like `[MEETING_TIME]` is still in the text.
    pub fn has_unresolved_placeholders(&self) -> bool {
        let Some(text) = self.text() else {
            return false;
        };
        self.placeholders
            .iter()
            .any(|p| text.contains(&format!("[{}]", p.key)))
    }
}

/// Message posted by a finished draft call.
#[derive(Debug)]
pub struct DraftCompletion {
    pub request_id: DraftRequestId,
    pub generation: Generation,
    pub thread_id: ThreadId,
    pub secondary_id: Option<AttachmentId>,
    pub outcome: std::result::Result<DraftResponse, DraftGenerationFailure>,
}

/// What applying a draft completion did.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftResolution {
    Ready(DraftRequestId),
    Errored {
        request_id: DraftRequestId,
        failure: DraftGenerationFailure,
    },
    /// The completion was fenced off. No state changed.
    Discarded {
        request_id: DraftRequestId,
        reason: StaleReason,
    },
}

/// Runs draft generation for the current selection.
pub struct DraftOrchestrator {
    service: Arc<dyn DraftService>,
    timeout: Duration,
    next_id: u64,
    draft: Option<DraftRequest>,
    completions_tx: mpsc::UnboundedSender<DraftCompletion>,
    completions_rx: mpsc::UnboundedReceiver<DraftCompletion>,
}

impl DraftOrchestrator {
    pub fn new(service: Arc<dyn DraftService>, timeout: Duration) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            service,
            timeout,
            next_id: 0,
            draft: None,
            completions_tx,
            completions_rx,
        }
    }

    /// Starts generating a draft for the selected thread, replacing any
    /// existing draft.
    ///
    /// `attachment_summary` is the summary of the selected attachment when
    /// one is displayed. Must be called from within a tokio runtime.
    pub fn generate(
        &mut self,
        selection: &SelectionState,
        tone: Tone,
        instructions: Option<String>,
        attachment_summary: Option<String>,
    ) -> Result<DraftRequestId> {
        let thread = selection.thread().ok_or(IntelligenceError::NoSelection)?;

        if let Some(previous) = self.draft.as_ref() {
            if previous.status == DraftStatus::Generating {
                tracing::debug!(draft = %previous.id, "pending draft superseded");
            }
        }

        self.next_id += 1;
        let id = DraftRequestId(self.next_id);
        let generation = selection.current_generation();
        let thread_id = thread.id.clone();
        let secondary_id = selection.secondary_id().cloned();

        let context = ThreadContext {
            thread_id: thread_id.clone(),
            subject: thread.subject.clone(),
            sender: thread.sender.clone(),
            body: thread.body.clone(),
            attachment_summary,
            instructions: instructions.clone(),
        };

        self.draft = Some(DraftRequest {
            id,
            tone,
            instructions,
            status: DraftStatus::Generating,
            content: None,
            placeholders: Vec::new(),
            edited_content: None,
            generation,
            thread_id: thread_id.clone(),
            secondary_id: secondary_id.clone(),
        });
        tracing::debug!(draft = %id, thread = %thread_id, %tone, %generation, "draft requested");

        let service = Arc::clone(&self.service);
        let tx = self.completions_tx.clone();
        let timeout = self.timeout;
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, service.draft(tone, &context)).await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(err)) => Err(DraftGenerationFailure::Service(format!("{err:#}"))),
                Err(_) => Err(DraftGenerationFailure::TimedOut(timeout)),
            };
            let _ = tx.send(DraftCompletion {
                request_id: id,
                generation,
                thread_id,
                secondary_id,
                outcome,
            });
        });

        Ok(id)
    }

    /// Generates again with the live draft's tone and instructions,
    /// dropping any edits.
    pub fn regenerate(
        &mut self,
        selection: &SelectionState,
        attachment_summary: Option<String>,
    ) -> Result<DraftRequestId> {
        validate_transition(&self.status(), DraftAction::Regenerate)?;
        let (tone, instructions) = match self.draft.as_ref() {
            Some(draft) => (draft.tone, draft.instructions.clone()),
            None => {
                return Err(IntelligenceError::InvalidDraftTransition {
                    from: DraftStatus::Idle.name(),
                    action: DraftAction::Regenerate.name(),
                })
            }
        };
        self.generate(selection, tone, instructions, attachment_summary)
    }

    /// Records the user's edit. The generated content is kept.
    pub fn edit(&mut self, text: impl Into<String>) -> Result<()> {
        validate_transition(&self.status(), DraftAction::Edit)?;
        if let Some(draft) = self.draft.as_mut() {
            draft.edited_content = Some(text.into());
            draft.status = DraftStatus::Editing;
        }
        Ok(())
    }

    pub async fn next_completion(&mut self) -> Option<DraftCompletion> {
        self.completions_rx.recv().await
    }

    pub fn try_next_completion(&mut self) -> Option<DraftCompletion> {
        self.completions_rx.try_recv().ok()
    }

    /// Applies a finished call if it still belongs to the live draft and
    /// the current selection.
    pub fn complete(
        &mut self,
        selection: &SelectionState,
        completion: DraftCompletion,
    ) -> DraftResolution {
        let request_id = completion.request_id;
        let reason = if completion.generation != selection.current_generation()
            || selection.primary_id() != Some(&completion.thread_id)
        {
            Some(StaleReason::GenerationChanged)
        } else if selection.secondary_id() != completion.secondary_id.as_ref() {
            Some(StaleReason::SelectionChanged)
        } else if !self
            .draft
            .as_ref()
            .is_some_and(|d| d.id == request_id && d.status == DraftStatus::Generating)
        {
            Some(StaleReason::Superseded)
        } else {
            None
        };

        let draft = match (reason, self.draft.as_mut()) {
            (None, Some(draft)) => draft,
            (reason, _) => {
                let reason = reason.unwrap_or(StaleReason::Superseded);
                tracing::debug!(draft = %request_id, %reason, "stale draft discarded");
                return DraftResolution::Discarded { request_id, reason };
            }
        };

        match completion.outcome {
            Ok(response) => {
                draft.content = Some(response.content);
                draft.placeholders = response.placeholders;
                draft.status = DraftStatus::Ready;
                tracing::info!(draft = %request_id, tone = %draft.tone, "draft ready");
                DraftResolution::Ready(request_id)
            }
            Err(failure) => {
                draft.status = DraftStatus::Errored(failure.clone());
                tracing::warn!(draft = %request_id, error = %failure, "draft generation failed");
                DraftResolution::Errored {
                    request_id,
                    failure,
                }
            }
        }
    }

    /// Drops the live draft. Its pending call, if any, resolves as stale.
    pub fn clear(&mut self) {
        if let Some(draft) = self.draft.take() {
            tracing::debug!(draft = %draft.id, status = %draft.status, "draft cleared");
        }
    }

    pub fn draft(&self) -> Option<&DraftRequest> {
        self.draft.as_ref()
    }

    pub fn status(&self) -> DraftStatus {
        self.draft
            .as_ref()
            .map(|d| d.status.clone())
            .unwrap_or_default()
    }

    pub fn is_generating(&self) -> bool {
        self.draft
            .as_ref()
            .is_some_and(|d| d.status == DraftStatus::Generating)
    }
}
