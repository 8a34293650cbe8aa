//! Headless intelligence panel for the heap email client.
//!
//! Summarizes the selected thread and attachment, reveals summaries
//! progressively, drafts replies and turns suggested actions into tasks,
//! while guaranteeing that results computed for an earlier selection are
//! never shown.

pub mod app;
pub mod config;
pub mod domain;
pub mod intelligence;
pub mod services;
