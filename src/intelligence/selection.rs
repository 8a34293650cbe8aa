//! Selection tracking and the generation counter used to fence results.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{IntelligenceError, Result};
use crate::domain::{AttachmentId, ThreadId, ThreadSnapshot};

/// Epoch of the primary selection.
///
/// Bumped exactly once every time the selected thread changes. Async work
/// captures the value when it is issued and is discarded if the value has
/// moved on by the time it completes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Generation(u64);

impl Generation {
    /// Returns the raw counter value.
    pub fn value(self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Panel tab currently shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveTab {
    /// Thread briefing and attachment intelligence.
    #[default]
    Brief,
    /// Draft copilot.
    Draft,
}

/// What the user is currently inspecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub primary_id: ThreadId,
    /// Always an attachment of `primary_id` when set.
    pub secondary_id: Option<AttachmentId>,
    pub active_tab: ActiveTab,
}

/// Outcome of [`SelectionState::select_primary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryChange {
    /// The thread was already selected; nothing changed.
    Unchanged,
    /// A new thread is selected under a new generation.
    Changed {
        generation: Generation,
        /// Attachment auto-selected from the new thread, if it has any.
        secondary_id: Option<AttachmentId>,
    },
}

/// Owner of the selection and its generation counter.
#[derive(Debug, Default)]
pub struct SelectionState {
    thread: Option<ThreadSnapshot>,
    secondary_id: Option<AttachmentId>,
    active_tab: ActiveTab,
    generation: Generation,
}

impl SelectionState {
    /// Creates an empty selection at generation zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects a thread.
    ///
    /// A different thread bumps the generation, resets the tab and
    /// auto-selects the first attachment. Re-selecting the current thread is
    /// a no-op.
    pub fn select_primary(&mut self, thread: ThreadSnapshot) -> PrimaryChange {
        if self.primary_id() == Some(&thread.id) {
            return PrimaryChange::Unchanged;
        }

        self.generation = self.generation.next();
        self.secondary_id = thread.attachments.first().map(|a| a.id.clone());
        self.active_tab = ActiveTab::Brief;
        self.thread = Some(thread);

        tracing::debug!(
            generation = %self.generation,
            thread = ?self.primary_id(),
            secondary = ?self.secondary_id,
            "primary selection changed"
        );

        PrimaryChange::Changed {
            generation: self.generation,
            secondary_id: self.secondary_id.clone(),
        }
    }

    /// Selects an attachment of the current thread.
    ///
    /// Returns `Ok(true)` when the secondary selection changed and
    /// `Ok(false)` when the attachment was already selected. The generation
    /// is left alone either way.
    pub fn select_secondary(&mut self, attachment_id: AttachmentId) -> Result<bool> {
        let thread = self.thread.as_ref().ok_or(IntelligenceError::NoSelection)?;

        if !thread.has_attachment(&attachment_id) {
            return Err(IntelligenceError::InvalidSelection {
                attachment_id,
                thread_id: thread.id.clone(),
            });
        }

        if self.secondary_id.as_ref() == Some(&attachment_id) {
            return Ok(false);
        }

        self.secondary_id = Some(attachment_id);
        Ok(true)
    }

    /// Clears the selection. Counts as a primary change.
    pub fn clear(&mut self) -> Generation {
        if self.thread.take().is_some() {
            self.generation = self.generation.next();
        }
        self.secondary_id = None;
        self.active_tab = ActiveTab::Brief;
        self.generation
    }

    /// Current generation, read by everything that fences results.
    pub fn current_generation(&self) -> Generation {
        self.generation
    }

    /// Returns the current selection, if a thread is selected.
    pub fn selection(&self) -> Option<Selection> {
        self.thread.as_ref().map(|t| Selection {
            primary_id: t.id.clone(),
            secondary_id: self.secondary_id.clone(),
            active_tab: self.active_tab,
        })
    }

    /// Selected thread.
    pub fn thread(&self) -> Option<&ThreadSnapshot> {
        self.thread.as_ref()
    }

    pub fn primary_id(&self) -> Option<&ThreadId> {
        self.thread.as_ref().map(|t| &t.id)
    }

    pub fn secondary_id(&self) -> Option<&AttachmentId> {
        self.secondary_id.as_ref()
    }

    pub fn active_tab(&self) -> ActiveTab {
        self.active_tab
    }

    /// Switches tabs. Ignored when nothing is selected.
    pub fn set_active_tab(&mut self, tab: ActiveTab) {
        if self.thread.is_some() {
            self.active_tab = tab;
        }
    }
}
