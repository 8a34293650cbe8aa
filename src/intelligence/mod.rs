//! Selection-scoped intelligence pipeline.
//!
//! - `selection`: what the user is looking at, and the generation counter
//! - `analysis`: summary requests, fenced by generation and attachment
//! - `reveal`: progressive display of the shown summary
//! - `draft`: reply draft state machine
//! - `panel`: the single owner that wires the above together
//! - `events`: broadcast notifications of everything the panel does

pub mod analysis;
pub mod draft;
pub mod error;
pub mod events;
pub mod panel;
pub mod reveal;
pub mod selection;

#[cfg(test)]
pub(crate) mod test_support;

pub use analysis::{
    AnalysisRequest, AnalysisRequestManager, AnalysisResult, AnalysisStatus, RequestId,
    Resolution, StaleReason,
};
pub use draft::{DraftOrchestrator, DraftRequest, DraftRequestId, DraftResolution, DraftStatus};
pub use error::{AnalysisFailure, DraftGenerationFailure, IntelligenceError, Result};
pub use events::{EventBus, PanelEvent};
pub use panel::{IntelligencePanel, PanelServices};
pub use reveal::{RevealSequencer, RevealState};
pub use selection::{ActiveTab, Generation, PrimaryChange, Selection, SelectionState};
