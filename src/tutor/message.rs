//! Chat entries and the message store
//!
//! The store is the flat, ordered log the chat view renders from. It only
//! grows during a session and is replaced wholesale when a new problem image
//! starts a fresh one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The student
    User,
    /// The tutoring model
    Assistant,
}

/// Payload kind of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Plain text
    Text,
    /// Uploaded image
    Image,
}

/// Entry payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryContent {
    /// Text typed by the user or returned by the assistant
    Text {
        /// Message text
        text: String,
    },
    /// Image uploaded by the user
    Image {
        /// Where the image came from (the selected file path)
        reference: String,
        /// Declared media type, e.g. `image/png`
        media_type: String,
    },
}

/// One immutable chat log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    /// Unique identifier
    pub id: String,
    /// Producer of the entry
    pub sender: Sender,
    /// Payload
    pub content: EntryContent,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl ChatEntry {
    fn new(sender: Sender, content: EntryContent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            content,
            created_at: Utc::now(),
        }
    }

    /// Creates a user text entry
    ///
    /// # Examples
    ///
    /// ```
    /// use mathtutor::tutor::message::{ChatEntry, EntryKind, Sender};
    ///
    /// let entry = ChatEntry::user_text("x = 3");
    /// assert_eq!(entry.sender, Sender::User);
    /// assert_eq!(entry.kind(), EntryKind::Text);
    /// assert_eq!(entry.payload(), "x = 3");
    /// ```
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Sender::User, EntryContent::Text { text: text.into() })
    }

    /// Creates a user image entry
    pub fn user_image(reference: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self::new(
            Sender::User,
            EntryContent::Image {
                reference: reference.into(),
                media_type: media_type.into(),
            },
        )
    }

    /// Creates an assistant text entry
    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, EntryContent::Text { text: text.into() })
    }

    /// Payload kind
    pub fn kind(&self) -> EntryKind {
        match self.content {
            EntryContent::Text { .. } => EntryKind::Text,
            EntryContent::Image { .. } => EntryKind::Image,
        }
    }

    /// Text content, or the image reference for image entries
    pub fn payload(&self) -> &str {
        match &self.content {
            EntryContent::Text { text } => text,
            EntryContent::Image { reference, .. } => reference,
        }
    }

    /// Media type, present for image entries only
    pub fn media_type(&self) -> Option<&str> {
        match &self.content {
            EntryContent::Text { .. } => None,
            EntryContent::Image { media_type, .. } => Some(media_type),
        }
    }
}

/// Ordered log of chat entries
///
/// `revision` changes on every mutation and `generation` on every reset, so a
/// renderer can tell whether to append new entries or redraw from scratch.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    entries: Vec<ChatEntry>,
    revision: u64,
    generation: u64,
}

impl MessageStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every entry
    pub fn reset(&mut self, entries: Vec<ChatEntry>) {
        self.entries = entries;
        self.generation += 1;
        self.revision += 1;
        tracing::trace!(
            generation = self.generation,
            len = self.entries.len(),
            "Message store reset"
        );
    }

    /// Removes every entry
    pub fn clear(&mut self) {
        self.reset(Vec::new());
    }

    /// Appends one entry at the end
    pub fn append(&mut self, entry: ChatEntry) {
        self.entries.push(entry);
        self.revision += 1;
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    /// Entries after the first `seen`
    ///
    /// # Examples
    ///
    /// ```
    /// use mathtutor::tutor::message::{ChatEntry, MessageStore};
    ///
    /// let mut store = MessageStore::new();
    /// store.append(ChatEntry::user_text("a"));
    /// store.append(ChatEntry::assistant_text("b"));
    /// assert_eq!(store.entries_since(1).len(), 1);
    /// assert!(store.entries_since(10).is_empty());
    /// ```
    pub fn entries_since(&self, seen: usize) -> &[ChatEntry] {
        &self.entries[seen.min(self.entries.len())..]
    }

    /// Most recent entry
    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mutation counter
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Reset counter
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
