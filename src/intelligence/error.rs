//! Error taxonomy for the intelligence pipeline.
//!
//! Caller mistakes are rejected synchronously with [`IntelligenceError`].
//! Failures of the external collaborators never surface as `Err`; they are
//! recorded as [`AnalysisFailure`] / [`DraftGenerationFailure`] on the
//! request they belong to, and only when that request is still current.

use std::time::Duration;

use thiserror::Error;

use crate::domain::{AttachmentId, ThreadId};

/// Result alias for synchronous panel operations.
pub type Result<T> = std::result::Result<T, IntelligenceError>;

/// Synchronous errors raised by panel operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntelligenceError {
    /// The attachment does not belong to the selected thread.
    #[error("attachment {attachment_id} does not belong to thread {thread_id}")]
    InvalidSelection {
        attachment_id: AttachmentId,
        thread_id: ThreadId,
    },

    /// The thread is not known to the panel's lookup.
    #[error("unknown thread {0}")]
    UnknownThread(ThreadId),

    /// The operation needs a selected thread.
    #[error("no thread is selected")]
    NoSelection,

    /// The draft state machine does not allow this action from its state.
    #[error("cannot {action} a draft that is {from}")]
    InvalidDraftTransition {
        from: &'static str,
        action: &'static str,
    },

    /// A suggested action index past the end of the list.
    #[error("suggestion {index} is out of range ({len} available)")]
    SuggestionOutOfRange { index: usize, len: usize },
}

/// Failure of an analysis call that was still current when it finished.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisFailure {
    /// The analysis service rejected the call.
    #[error("analysis failed: {0}")]
    Service(String),
    /// The call did not finish within the configured ceiling.
    #[error("analysis timed out after {0:?}")]
    TimedOut(Duration),
}

/// Failure of a draft generation call that was still current when it finished.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftGenerationFailure {
    /// The draft service rejected the call.
    #[error("draft generation failed: {0}")]
    Service(String),
    /// The call did not finish within the configured ceiling.
    #[error("draft generation timed out after {0:?}")]
    TimedOut(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_selection_message_names_both_ids() {
        let err = IntelligenceError::InvalidSelection {
            attachment_id: AttachmentId::from("a9"),
            thread_id: ThreadId::from("t1"),
        };
        assert_eq!(
            err.to_string(),
            "attachment a9 does not belong to thread t1"
        );
    }

    #[test]
    fn transition_message() {
        let err = IntelligenceError::InvalidDraftTransition {
            from: "idle",
            action: "edit",
        };
        assert_eq!(err.to_string(), "cannot edit a draft that is idle");
    }
}
