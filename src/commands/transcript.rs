//! Transcript rendering for the terminal
//!
//! [`TranscriptView`] remembers how much of the message store has already been
//! printed, so the chat loop can print only new entries after each action and
//! start over when the store is replaced by a new upload.

use colored::Colorize;
use serde::Serialize;

use crate::tutor::controller::UiFlags;
use crate::tutor::message::{ChatEntry, EntryContent, MessageStore, Sender};

/// Plain-text form of one entry
///
/// # Examples
///
/// ```
/// use mathtutor::commands::transcript::format_entry;
/// use mathtutor::tutor::ChatEntry;
///
/// assert_eq!(format_entry(&ChatEntry::user_text("x = 4")), "You: x = 4");
/// assert_eq!(
///     format_entry(&ChatEntry::user_image("q1.png", "image/png")),
///     "You: [image q1.png (image/png)]"
/// );
/// ```
pub fn format_entry(entry: &ChatEntry) -> String {
    let speaker = match entry.sender {
        Sender::User => "You",
        Sender::Assistant => "Tutor",
    };
    match &entry.content {
        EntryContent::Text { text } => format!("{}: {}", speaker, text),
        EntryContent::Image {
            reference,
            media_type,
        } => format!("{}: [image {} ({})]", speaker, reference, media_type),
    }
}

/// Plain-text transcript, one entry per paragraph
pub fn format_transcript(entries: &[ChatEntry]) -> String {
    entries
        .iter()
        .map(format_entry)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// JSON document printed by `solve --json`
#[derive(Debug, Serialize)]
pub struct TranscriptDocument<'a> {
    /// Model the session ran on
    pub model: &'a str,
    /// Entries, oldest first
    pub entries: &'a [ChatEntry],
    /// Error of the last failed action, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

fn print_entry(entry: &ChatEntry) {
    match (&entry.sender, &entry.content) {
        (Sender::User, EntryContent::Image { .. }) => println!("{}", format_entry(entry).cyan()),
        (Sender::User, EntryContent::Text { .. }) => println!("{}", format_entry(entry).dimmed()),
        (Sender::Assistant, EntryContent::Text { text }) => {
            println!("{} {}\n", "Tutor:".green().bold(), text)
        }
        (Sender::Assistant, EntryContent::Image { .. }) => println!("{}", format_entry(entry)),
    }
}

/// Incremental renderer over a [`MessageStore`]
#[derive(Debug, Default)]
pub struct TranscriptView {
    generation: u64,
    shown: usize,
}

impl TranscriptView {
    /// Creates a view that has shown nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries not yet shown, noting whether the store was replaced
    ///
    /// Marks the returned entries as shown.
    pub fn take_unseen<'a>(&mut self, store: &'a MessageStore) -> (bool, &'a [ChatEntry]) {
        let replaced = store.generation() != self.generation;
        if replaced {
            self.generation = store.generation();
            self.shown = 0;
        }
        let unseen = store.entries_since(self.shown);
        self.shown = store.len();
        (replaced, unseen)
    }

    /// Prints new entries and the current flags
    pub fn render(&mut self, store: &MessageStore, flags: &UiFlags, follow_up_prompt: &str) {
        let (replaced, unseen) = self.take_unseen(store);
        if replaced && !unseen.is_empty() {
            println!("{}", "── new problem ──".bright_black());
        }
        for entry in unseen {
            print_entry(entry);
        }
        if let Some(error) = &flags.error {
            eprintln!("{}", format!("Error: {}", error).red());
        }
        if flags.show_follow_up {
            println!(
                "{}",
                format!("(type /why to ask \"{}\")", follow_up_prompt).bright_black()
            );
        }
    }
}
