//! Tutoring session controller
//!
//! The controller owns the message store and the single live chat session.
//! Every user action goes through a named transition. Transitions that talk to
//! the model are split in three so the network call never borrows the
//! controller:
//!
//! 1. a `begin_*` method validates input, mutates the store and flags, and
//!    hands back a [`PendingReply`];
//! 2. [`PendingReply::resolve`] performs the send (inline or on a spawned
//!    task);
//! 3. [`Controller::complete`] applies the reply, dropping it if a newer
//!    upload or reset has replaced the session in the meantime.
//!
//! The `*_and_wait` methods chain all three for callers that do not need to
//! stay responsive while a reply is pending.
//!
//! A [`PendingReply`] or [`CompletedReply`] that is dropped without reaching
//! `complete` (an aborted task, a panic, a caller that gives up) releases its
//! request: the next transition records an error and accepts input again.
//! [`Controller::abandon`] does the same eagerly.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, Weak};

use crate::config::Config;
use crate::error::{Result, TutorError};
use crate::providers::{ChatSession, ModelConfig, SessionClient, Turn};
use crate::tutor::encoder::encode_image;
use crate::tutor::message::{ChatEntry, MessageStore};

/// Identity of one created chat session
pub type SessionId = u64;

/// Lifecycle phase of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session; waiting for a problem image
    Idle,
    /// Image sent on a fresh session, first reply pending
    AwaitingFirstResponse,
    /// Session active, waiting for the user
    Ready,
    /// Text sent, reply pending
    AwaitingResponse,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Idle => "idle",
            Phase::AwaitingFirstResponse => "awaiting first response",
            Phase::Ready => "ready",
            Phase::AwaitingResponse => "awaiting response",
        };
        f.write_str(label)
    }
}

/// Transient flags the chat view renders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiFlags {
    /// A reply is pending
    pub loading: bool,
    /// Message of the last failed action
    pub error: Option<String>,
    /// The "Why did we do that?" prompt is offered
    pub show_follow_up: bool,
}

/// Identifies which request a reply answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    /// Session the request was sent on
    pub session: SessionId,
    /// Request sequence number, unique across sessions
    pub sequence: u64,
}

/// What kind of request is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Problem image sent as the first turn of a new session
    FirstImage,
    /// Text turn on an existing session
    Text,
}

/// A send that has been issued but not yet performed
pub struct PendingReply {
    ticket: Ticket,
    kind: RequestKind,
    session: Arc<dyn ChatSession>,
    turn: Turn,
    live: Arc<()>,
}

impl fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingReply")
            .field("ticket", &self.ticket)
            .field("kind", &self.kind)
            .field("turn", &self.turn.describe())
            .finish()
    }
}

impl PendingReply {
    /// Ticket of this request
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Kind of this request
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Sends the turn and waits for the reply
    pub async fn resolve(self) -> CompletedReply {
        tracing::debug!(
            session = self.ticket.session,
            sequence = self.ticket.sequence,
            "Sending {}",
            self.turn.describe()
        );
        let result = self.session.send(self.turn).await;
        CompletedReply {
            ticket: self.ticket,
            kind: self.kind,
            result,
            live: self.live,
        }
    }
}

/// The result of a resolved send, ready to be applied
#[derive(Debug)]
pub struct CompletedReply {
    /// Ticket of the request this answers
    pub ticket: Ticket,
    /// Kind of the request
    pub kind: RequestKind,
    /// Reply text or the send failure
    pub result: Result<String>,
    live: Arc<()>,
}

/// Result of a transition
#[derive(Debug)]
pub enum ReplyOutcome {
    /// Input was blank, or there was no session to send on
    Ignored,
    /// A reply is already pending on the active session
    Busy,
    /// The selected file could not be used; session and store were reset
    Rejected(TutorError),
    /// The assistant reply was appended
    Appended,
    /// The send failed
    Failed(TutorError),
    /// The reply belonged to a replaced session or superseded request
    Stale,
}

impl ReplyOutcome {
    /// Whether a reply was appended
    pub fn is_appended(&self) -> bool {
        matches!(self, ReplyOutcome::Appended)
    }

    /// Converts the outcome into a `Result`, treating `Busy`, `Rejected` and
    /// `Failed` as errors
    ///
    /// # Errors
    ///
    /// Returns the error carried by the outcome
    pub fn into_result(self) -> Result<ReplyOutcome> {
        match self {
            ReplyOutcome::Busy => Err(TutorError::Busy.into()),
            ReplyOutcome::Rejected(err) | ReplyOutcome::Failed(err) => Err(err.into()),
            other => Ok(other),
        }
    }
}

/// Outcome of a `begin_*` call
#[derive(Debug)]
pub enum Begin {
    /// A send must be resolved and passed to [`Controller::complete`]
    Pending(PendingReply),
    /// The transition finished without a send
    Finished(ReplyOutcome),
}

/// Fixed inputs of every session the controller creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorSettings {
    /// Instruction the session is created with
    pub system_instruction: String,
    /// Model and thinking budget
    pub model: ModelConfig,
    /// Text sent by the follow-up prompt
    pub follow_up_prompt: String,
    /// Largest accepted image file
    pub max_image_bytes: u64,
}

impl TutorSettings {
    /// Builds settings from loaded configuration
    ///
    /// # Examples
    ///
    /// ```
    /// use mathtutor::config::Config;
    /// use mathtutor::tutor::TutorSettings;
    ///
    /// let settings = TutorSettings::from_config(&Config::default());
    /// assert_eq!(settings.follow_up_prompt, "Why did we do that?");
    /// ```
    pub fn from_config(config: &Config) -> Self {
        Self {
            system_instruction: config.tutor.system_instruction(),
            model: ModelConfig::from(&config.provider.gemini),
            follow_up_prompt: config.tutor.follow_up_prompt.clone(),
            max_image_bytes: config.tutor.max_image_bytes,
        }
    }
}

impl Default for TutorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

struct InFlight {
    ticket: Ticket,
    kind: RequestKind,
    live: Weak<()>,
}

impl InFlight {
    fn is_abandoned(&self) -> bool {
        self.live.strong_count() == 0
    }
}

struct ActiveSession {
    id: SessionId,
    handle: Arc<dyn ChatSession>,
    in_flight: Option<InFlight>,
}

/// Drives one tutoring conversation at a time
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use mathtutor::providers::fake::ScriptedClient;
/// use mathtutor::tutor::{Controller, Phase, TutorSettings};
///
/// let client = ScriptedClient::new();
/// let controller = Controller::new(Arc::new(client), TutorSettings::default());
/// assert_eq!(controller.phase(), Phase::Idle);
/// assert!(controller.store().is_empty());
/// ```
pub struct Controller {
    client: Arc<dyn SessionClient>,
    settings: TutorSettings,
    store: MessageStore,
    flags: UiFlags,
    session: Option<ActiveSession>,
    problem: Option<String>,
    sessions_created: SessionId,
    next_sequence: u64,
}

impl Controller {
    /// Creates an idle controller
    pub fn new(client: Arc<dyn SessionClient>, settings: TutorSettings) -> Self {
        Self {
            client,
            settings,
            store: MessageStore::new(),
            flags: UiFlags::default(),
            session: None,
            problem: None,
            sessions_created: 0,
            next_sequence: 0,
        }
    }

    /// The chat log
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Current UI flags
    pub fn flags(&self) -> &UiFlags {
        &self.flags
    }

    /// Session settings
    pub fn settings(&self) -> &TutorSettings {
        &self.settings
    }

    /// Whether a session is active
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Identity of the active session
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Description of the image the active problem was started from
    pub fn problem(&self) -> Option<&str> {
        self.problem.as_deref()
    }

    /// Turns recorded by the active session
    pub fn session_history_len(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.handle.history_len())
            .unwrap_or(0)
    }

    /// Current lifecycle phase
    ///
    /// A request whose reply was dropped no longer counts as pending.
    pub fn phase(&self) -> Phase {
        match &self.session {
            None => Phase::Idle,
            Some(active) => match &active.in_flight {
                Some(req) if !req.is_abandoned() => match req.kind {
                    RequestKind::FirstImage => Phase::AwaitingFirstResponse,
                    RequestKind::Text => Phase::AwaitingResponse,
                },
                _ => Phase::Ready,
            },
        }
    }

    fn issue(&mut self, kind: RequestKind, turn: Turn) -> Option<PendingReply> {
        let active = self.session.as_mut()?;
        self.next_sequence += 1;
        let ticket = Ticket {
            session: active.id,
            sequence: self.next_sequence,
        };
        let live = Arc::new(());
        active.in_flight = Some(InFlight {
            ticket,
            kind,
            live: Arc::downgrade(&live),
        });
        self.flags.loading = true;
        Some(PendingReply {
            ticket,
            kind,
            session: Arc::clone(&active.handle),
            turn,
            live,
        })
    }

    /// Gives up on the request identified by `ticket`
    ///
    /// Clears the pending state and records an error. A first image that is
    /// abandoned ends the session like any other first-image failure. Returns
    /// `false` when `ticket` is not the request in flight.
    pub fn abandon(&mut self, ticket: Ticket) -> bool {
        let kind = match self.session.as_mut() {
            Some(active) => match &active.in_flight {
                Some(req) if req.ticket == ticket => {
                    let kind = req.kind;
                    active.in_flight = None;
                    kind
                }
                _ => return false,
            },
            None => return false,
        };

        tracing::warn!(
            session = ticket.session,
            sequence = ticket.sequence,
            "Request abandoned before a reply arrived"
        );
        let err = TutorError::Provider("The request ended before a reply arrived".to_string());
        match kind {
            RequestKind::FirstImage => self.fail_first_image(&err),
            RequestKind::Text => {
                self.flags.loading = false;
                self.flags.error = Some(err.to_string());
            }
        }
        true
    }

    fn reap_abandoned(&mut self) {
        let ticket = self
            .session
            .as_ref()
            .and_then(|active| active.in_flight.as_ref())
            .filter(|req| req.is_abandoned())
            .map(|req| req.ticket);
        if let Some(ticket) = ticket {
            self.abandon(ticket);
        }
    }

    fn fail_first_image(&mut self, err: &TutorError) {
        tracing::error!("Could not start tutoring session: {}", err);
        self.flags.error = Some(err.to_string());
        self.flags.loading = false;
        self.store.clear();
        self.session = None;
        self.problem = None;
    }

    /// Starts a new problem from an image file
    ///
    /// Any previous session is dropped, even one with a reply still pending;
    /// that reply will be reported as stale.
    ///
    /// # Arguments
    ///
    /// * `path` - The selected image file
    ///
    /// # Returns
    ///
    /// `Begin::Pending` with the first send, or `Begin::Finished` when the
    /// selection was empty, the file was rejected, or the session could not be
    /// created
    pub async fn begin_image_upload(&mut self, path: &Path) -> Begin {
        if path.as_os_str().is_empty() {
            return Begin::Finished(ReplyOutcome::Ignored);
        }

        self.flags.error = None;
        self.flags.show_follow_up = false;
        self.session = None;
        self.problem = None;
        self.flags.loading = true;

        tracing::info!("Uploading problem image {}", path.display());
        let image = match encode_image(path, self.settings.max_image_bytes).await {
            Ok(image) => image,
            Err(err) => {
                let err = TutorError::from(err);
                self.fail_first_image(&err);
                return Begin::Finished(ReplyOutcome::Rejected(err));
            }
        };

        tracing::debug!(
            file = %image.file_name,
            bytes = image.byte_len,
            media_type = %image.media_type,
            "Encoded problem image"
        );
        self.problem = Some(image.describe());
        self.store.reset(vec![ChatEntry::user_image(
            path.display().to_string(),
            image.media_type.clone(),
        )]);

        let handle = match self
            .client
            .create_session(&self.settings.system_instruction, &self.settings.model)
        {
            Ok(handle) => handle,
            Err(err) => {
                let err = into_tutor_error(err);
                self.fail_first_image(&err);
                return Begin::Finished(ReplyOutcome::Failed(err));
            }
        };

        self.sessions_created += 1;
        self.session = Some(ActiveSession {
            id: self.sessions_created,
            handle,
            in_flight: None,
        });
        tracing::debug!(session = self.sessions_created, "Created tutoring session");

        match self.issue(RequestKind::FirstImage, image.to_turn()) {
            Some(pending) => Begin::Pending(pending),
            None => Begin::Finished(ReplyOutcome::Ignored),
        }
    }

    /// Sends a text turn on the active session
    ///
    /// Blank input, or input without an active session, is ignored without
    /// touching the store.
    pub fn begin_text_submit(&mut self, input: &str) -> Begin {
        let text = input.trim();
        if text.is_empty() {
            return Begin::Finished(ReplyOutcome::Ignored);
        }
        self.reap_abandoned();
        let Some(active) = &self.session else {
            tracing::debug!("Ignoring text without an active session");
            return Begin::Finished(ReplyOutcome::Ignored);
        };
        if active.in_flight.is_some() {
            tracing::debug!("Rejecting text while a reply is pending");
            return Begin::Finished(ReplyOutcome::Busy);
        }

        self.store.append(ChatEntry::user_text(text));
        self.flags.error = None;
        self.flags.show_follow_up = false;

        match self.issue(RequestKind::Text, Turn::text(text)) {
            Some(pending) => Begin::Pending(pending),
            None => Begin::Finished(ReplyOutcome::Ignored),
        }
    }

    /// Sends the configured follow-up question
    pub fn begin_follow_up(&mut self) -> Begin {
        let prompt = self.settings.follow_up_prompt.clone();
        self.begin_text_submit(&prompt)
    }

    /// Applies a resolved reply
    ///
    /// Replies whose ticket does not match the request currently in flight on
    /// the active session are dropped and leave store and flags untouched.
    pub fn complete(&mut self, reply: CompletedReply) -> ReplyOutcome {
        let current = self
            .session
            .as_ref()
            .and_then(|active| active.in_flight.as_ref())
            .filter(|req| req.ticket == reply.ticket)
            .map(|req| req.kind);

        let Some(kind) = current else {
            tracing::debug!(
                session = reply.ticket.session,
                sequence = reply.ticket.sequence,
                "Dropping stale reply"
            );
            return ReplyOutcome::Stale;
        };

        if let Some(active) = self.session.as_mut() {
            active.in_flight = None;
        }
        self.flags.loading = false;

        match reply.result {
            Ok(text) => {
                self.store.append(ChatEntry::assistant_text(text));
                self.flags.show_follow_up = true;
                ReplyOutcome::Appended
            }
            Err(err) => {
                let err = into_tutor_error(err);
                match kind {
                    RequestKind::FirstImage => {
                        self.fail_first_image(&err);
                        ReplyOutcome::Failed(err)
                    }
                    RequestKind::Text => {
                        tracing::error!("Tutor reply failed: {}", err);
                        self.flags.error = Some(err.to_string());
                        ReplyOutcome::Failed(err)
                    }
                }
            }
        }
    }

    /// Uploads an image and waits for the first reply
    pub async fn upload_image_and_wait(&mut self, path: &Path) -> ReplyOutcome {
        match self.begin_image_upload(path).await {
            Begin::Pending(pending) => {
                let reply = pending.resolve().await;
                self.complete(reply)
            }
            Begin::Finished(outcome) => outcome,
        }
    }

    /// Submits text and waits for the reply
    pub async fn submit_text_and_wait(&mut self, input: &str) -> ReplyOutcome {
        match self.begin_text_submit(input) {
            Begin::Pending(pending) => {
                let reply = pending.resolve().await;
                self.complete(reply)
            }
            Begin::Finished(outcome) => outcome,
        }
    }

    /// Sends the follow-up question and waits for the reply
    pub async fn follow_up_and_wait(&mut self) -> ReplyOutcome {
        let prompt = self.settings.follow_up_prompt.clone();
        self.submit_text_and_wait(&prompt).await
    }

    /// Drops the session and clears the store and flags
    pub fn reset(&mut self) {
        if let Some(active) = self.session.take() {
            tracing::info!(session = active.id, "Discarding tutoring session");
        }
        self.problem = None;
        self.store.clear();
        self.flags = UiFlags::default();
    }
}

/// Recovers the typed error from an `anyhow` chain
fn into_tutor_error(err: anyhow::Error) -> TutorError {
    match err.downcast::<TutorError>() {
        Ok(err) => err,
        Err(other) => TutorError::Provider(format!("{:#}", other)),
    }
}
