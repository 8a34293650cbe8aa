//! Core domain types shared across the intelligence pipeline.
//!
//! Identifiers are opaque string newtypes so that a thread id can never be
//! passed where an attachment id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of an email thread.
    ThreadId
);
string_id!(
    /// Identifier of an attachment within a thread.
    AttachmentId
);
string_id!(
    /// Identifier of a task created from an accepted suggestion.
    TaskId
);

/// Any entity the analysis service can summarize.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntityId {
    /// A whole thread.
    Thread(ThreadId),
    /// A single attachment.
    Attachment(AttachmentId),
}

impl EntityId {
    /// Returns the raw id string.
    pub fn as_str(&self) -> &str {
        match self {
            EntityId::Thread(id) => id.as_str(),
            EntityId::Attachment(id) => id.as_str(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Thread(id) => write!(f, "thread:{id}"),
            EntityId::Attachment(id) => write!(f, "attachment:{id}"),
        }
    }
}

impl From<ThreadId> for EntityId {
    fn from(value: ThreadId) -> Self {
        EntityId::Thread(value)
    }
}

impl From<AttachmentId> for EntityId {
    fn from(value: AttachmentId) -> Self {
        EntityId::Attachment(value)
    }
}

/// Attachment metadata needed to drive attachment intelligence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl Attachment {
    /// Creates attachment metadata.
    pub fn new(
        id: impl Into<AttachmentId>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            size_bytes,
        }
    }
}

/// Thread content handed to the panel when a thread is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub id: ThreadId,
    pub subject: String,
    pub sender: String,
    pub body: String,
    /// Attachments in display order. The first is auto-selected.
    pub attachments: Vec<Attachment>,
}

impl ThreadSnapshot {
    /// Creates a thread snapshot without attachments.
    pub fn new(
        id: impl Into<ThreadId>,
        subject: impl Into<String>,
        sender: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            sender: sender.into(),
            body: body.into(),
            attachments: Vec::new(),
        }
    }

    /// Adds an attachment.
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Returns whether the attachment belongs to this thread.
    pub fn has_attachment(&self, id: &AttachmentId) -> bool {
        self.attachments.iter().any(|a| &a.id == id)
    }

    /// Looks up an attachment by id.
    pub fn attachment(&self, id: &AttachmentId) -> Option<&Attachment> {
        self.attachments.iter().find(|a| &a.id == id)
    }

    /// First name of the sender, used for greetings.
    pub fn sender_first_name(&self) -> &str {
        self.sender.split_whitespace().next().unwrap_or("there")
    }
}

/// Source of thread snapshots for the panel.
pub trait ThreadLookup: Send + Sync {
    /// Returns the thread if it is known.
    fn thread(&self, id: &ThreadId) -> Option<ThreadSnapshot>;
}

/// Simple in-memory thread lookup.
#[derive(Debug, Clone, Default)]
pub struct Mailbox {
    threads: Vec<ThreadSnapshot>,
}

impl Mailbox {
    /// Creates an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a thread.
    pub fn with_thread(mut self, thread: ThreadSnapshot) -> Self {
        self.threads.push(thread);
        self
    }

    /// Returns all thread ids in insertion order.
    pub fn thread_ids(&self) -> Vec<ThreadId> {
        self.threads.iter().map(|t| t.id.clone()).collect()
    }

    /// Finds an attachment in any thread.
    pub fn attachment(&self, id: &AttachmentId) -> Option<&Attachment> {
        self.threads.iter().find_map(|t| t.attachment(id))
    }
}

impl ThreadLookup for Mailbox {
    fn thread(&self, id: &ThreadId) -> Option<ThreadSnapshot> {
        self.threads.iter().find(|t| &t.id == id).cloned()
    }
}
