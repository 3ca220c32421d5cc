//! Tutoring core
//!
//! Chat log types, image encoding and the session controller.

pub mod controller;
pub mod encoder;
pub mod message;

pub use controller::{
    Begin, CompletedReply, Controller, PendingReply, Phase, ReplyOutcome, RequestKind,
    SessionId, Ticket, TutorSettings, UiFlags,
};
pub use encoder::{encode_image, EncodeError, EncodedImage};
pub use message::{ChatEntry, EntryContent, EntryKind, MessageStore, Sender};
