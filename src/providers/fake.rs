//! In-process scripted session client for tests
//!
//! [`ScriptedClient`] replaces the network-backed Gemini client so the
//! controller can be driven deterministically. Replies are queued up front and
//! consumed in order by whichever session sends next; every created session
//! and every sent turn is recorded for later assertions.
//!
//! Deferred replies ([`ScriptedClient::defer`]) hold a send open until the test
//! releases it, which is how late replies from a replaced session are staged.
//!
//! # Example
//!
//! ```
//! use mathtutor::providers::fake::ScriptedClient;
//! use mathtutor::providers::{ModelConfig, SessionClient, Turn};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let client = ScriptedClient::new();
//! client.reply("What do you notice about the equation?");
//!
//! let session = client
//!     .create_session("tutor", &ModelConfig::new("fake", None))
//!     .unwrap();
//! let reply = session.send(Turn::text("hi")).await.unwrap();
//! assert_eq!(reply, "What do you notice about the equation?");
//! assert_eq!(client.sent_turns().len(), 1);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::{Result, TutorError};
use crate::providers::{ChatSession, ModelConfig, SessionClient, Turn};

type DeferredOutcome = std::result::Result<String, String>;

enum Scripted {
    Reply(String),
    Fail(String),
    Deferred(oneshot::Receiver<DeferredOutcome>),
}

/// A session creation observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    /// Zero-based creation order
    pub index: usize,
    /// System instruction passed at creation
    pub system_instruction: String,
    /// Model configuration passed at creation
    pub config: ModelConfig,
}

/// A turn sent through one of the fake's sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTurn {
    /// Index of the session that sent the turn
    pub session: usize,
    /// The turn itself
    pub turn: Turn,
}

#[derive(Default)]
struct Shared {
    script: VecDeque<Scripted>,
    created: Vec<CreatedSession>,
    sent: Vec<SentTurn>,
    fail_create: Option<String>,
}

/// Scripted [`SessionClient`] for tests
#[derive(Clone, Default)]
pub struct ScriptedClient {
    shared: Arc<Mutex<Shared>>,
}

/// Handle that completes a deferred reply
pub struct ReplyGate {
    sender: oneshot::Sender<DeferredOutcome>,
}

impl ReplyGate {
    /// Completes the pending send with reply text
    pub fn release(self, text: impl Into<String>) {
        // The session may already have been dropped; nothing to deliver then.
        let _ = self.sender.send(Ok(text.into()));
    }

    /// Completes the pending send with a failure message
    pub fn fail(self, message: impl Into<String>) {
        let _ = self.sender.send(Err(message.into()));
    }
}

impl ScriptedClient {
    /// Create a client with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    fn with_shared<T>(&self, f: impl FnOnce(&mut Shared) -> T) -> T {
        let mut guard = self
            .shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    /// Queues a successful reply
    pub fn reply(&self, text: impl Into<String>) -> &Self {
        let text = text.into();
        self.with_shared(|s| s.script.push_back(Scripted::Reply(text)));
        self
    }

    /// Queues a failed send
    pub fn fail(&self, message: impl Into<String>) -> &Self {
        let message = message.into();
        self.with_shared(|s| s.script.push_back(Scripted::Fail(message)));
        self
    }

    /// Queues a reply that stays pending until the returned gate is used
    pub fn defer(&self) -> ReplyGate {
        let (sender, receiver) = oneshot::channel();
        self.with_shared(|s| s.script.push_back(Scripted::Deferred(receiver)));
        ReplyGate { sender }
    }

    /// Makes the next `create_session` call fail
    pub fn fail_next_create(&self, message: impl Into<String>) {
        let message = message.into();
        self.with_shared(|s| s.fail_create = Some(message));
    }

    /// Sessions created so far
    pub fn created_sessions(&self) -> Vec<CreatedSession> {
        self.with_shared(|s| s.created.clone())
    }

    /// Number of sessions created so far
    pub fn sessions_created(&self) -> usize {
        self.with_shared(|s| s.created.len())
    }

    /// Turns sent so far, across all sessions, in send order
    pub fn sent_turns(&self) -> Vec<SentTurn> {
        self.with_shared(|s| s.sent.clone())
    }

    /// Scripted outcomes not yet consumed
    pub fn remaining(&self) -> usize {
        self.with_shared(|s| s.script.len())
    }
}

impl SessionClient for ScriptedClient {
    fn create_session(
        &self,
        system_instruction: &str,
        config: &ModelConfig,
    ) -> Result<Arc<dyn ChatSession>> {
        let index = self.with_shared(|s| {
            if let Some(message) = s.fail_create.take() {
                return Err(TutorError::Provider(message));
            }
            let index = s.created.len();
            s.created.push(CreatedSession {
                index,
                system_instruction: system_instruction.to_string(),
                config: config.clone(),
            });
            Ok(index)
        })?;

        Ok(Arc::new(ScriptedSession {
            index,
            shared: Arc::clone(&self.shared),
            history: AtomicUsize::new(0),
        }))
    }
}

struct ScriptedSession {
    index: usize,
    shared: Arc<Mutex<Shared>>,
    history: AtomicUsize,
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn send(&self, turn: Turn) -> Result<String> {
        let next = {
            let mut shared = self
                .shared
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            shared.sent.push(SentTurn {
                session: self.index,
                turn,
            });
            shared.script.pop_front()
        };

        let outcome = match next {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(message)) => Err(message),
            Some(Scripted::Deferred(receiver)) => receiver
                .await
                .unwrap_or_else(|_| Err("deferred reply was dropped".to_string())),
            None => Err("no scripted reply left".to_string()),
        };

        match outcome {
            Ok(text) => {
                self.history.fetch_add(2, Ordering::SeqCst);
                Ok(text)
            }
            Err(message) => Err(TutorError::Provider(message).into()),
        }
    }

    fn history_len(&self) -> usize {
        self.history.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ModelConfig {
        ModelConfig::new("fake-model", Some(0))
    }

    #[tokio::test]
    async fn test_replies_are_consumed_in_order() {
        let client = ScriptedClient::new();
        client.reply("first").reply("second");

        let session = client.create_session("tutor", &config()).unwrap();
        assert_eq!(session.send(Turn::text("a")).await.unwrap(), "first");
        assert_eq!(session.send(Turn::text("b")).await.unwrap(), "second");
        assert_eq!(session.history_len(), 4);
        assert_eq!(client.remaining(), 0);
    }

    #[tokio::test]
    async fn test_failures_surface_as_provider_errors() {
        let client = ScriptedClient::new();
        client.fail("quota exceeded");

        let session = client.create_session("tutor", &config()).unwrap();
        let err = session.send(Turn::text("a")).await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(session.history_len(), 0);
    }

    #[tokio::test]
    async fn test_empty_script_fails() {
        let client = ScriptedClient::new();
        let session = client.create_session("tutor", &config()).unwrap();
        assert!(session.send(Turn::text("a")).await.is_err());
    }

    #[tokio::test]
    async fn test_deferred_reply_waits_for_release() {
        let client = ScriptedClient::new();
        let gate = client.defer();
        let session = client.create_session("tutor", &config()).unwrap();

        let pending = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.send(Turn::text("a")).await }
        });

        tokio::task::yield_now().await;
        gate.release("late");
        assert_eq!(pending.await.unwrap().unwrap(), "late");
    }

    #[test]
    fn test_records_sessions_and_create_failure() {
        let client = ScriptedClient::new();
        client.create_session("first", &config()).unwrap();
        client.fail_next_create("boom");
        assert!(client.create_session("second", &config()).is_err());
        client.create_session("third", &config()).unwrap();

        let created = client.created_sessions();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].system_instruction, "first");
        assert_eq!(created[1].index, 1);
        assert_eq!(created[1].system_instruction, "third");
    }
}
