//! `ConversationEngine` owns the session and drives every exchange.
//!
//! Every operation follows the same shape:
//!
//! ```text
//! validate locally ──▶ serializer.try_admit ──▶ client call (await)
//!        │                    │                        │
//!   InvalidDocument /       Busy          settle: lock session, staleness check,
//!   EmptyMessage / ...                    build next snapshot, swap, persist,
//!                                         release slot, emit events
//! ```
//!
//! The session lock is never held across an `.await`; the swap happens in
//! one critical section after the exchange has fully settled.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::{AudioSource, CaptureError, CaptureEvent, CaptureHandle};
use crate::config::AppConfig;
use crate::orchestrator::{
    DisbursementReceipt, DocumentPayload, OrchestratorClient, OrchestratorError,
    OrchestratorRequest, OrchestratorResponse, SanctionLetterDetails,
};
use crate::session::{
    merge_state, ConversationSession, Decision, Language, Message, PersistedRecord, Preferences,
    SessionStore, UiMode, GREETING_TEXT, VOICE_PLACEHOLDER, VOICE_TRANSCRIPT_FALLBACK,
};

use super::projector::{reply_message, side_panels, EngineEvent};
use super::serializer::{Busy, InFlightGuard, RequestKind, RequestSerializer};
use super::text::{normalize_text, text_request, wants_processing_steps, ProcessingStep};
use super::upload::{read_document, validate, DocumentError, UploadTask};
use super::voice::{CaptureState, VoiceCapture, VoiceError};

// ---------------------------------------------------------------------------
// EngineError / TurnOutcome
// ---------------------------------------------------------------------------

/// Failures reported to the caller of an engine operation.
///
/// None of these leave a partial change in the session.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("please wait: {0}")]
    Busy(#[from] Busy),

    #[error("message is empty")]
    EmptyMessage,

    #[error("invalid document: {0}")]
    InvalidDocument(#[from] DocumentError),

    #[error("voice capture unavailable: {0}")]
    CaptureUnavailable(#[from] CaptureError),

    #[error("not recording")]
    NotRecording,

    #[error("recording too short ({secs:.1}s)")]
    RecordingTooShort { secs: f32 },

    #[error("the decision is pending review")]
    AmbiguousDecision,

    #[error("sanction unavailable: {0}")]
    SanctionUnavailable(String),

    #[error("orchestrator unavailable: {0}")]
    OrchestratorUnavailable(#[from] OrchestratorError),
}

impl From<VoiceError> for EngineError {
    fn from(e: VoiceError) -> Self {
        match e {
            VoiceError::Capture(e) => EngineError::CaptureUnavailable(e),
            VoiceError::NotRecording => EngineError::NotRecording,
            VoiceError::TooShort { secs } => EngineError::RecordingTooShort { secs },
        }
    }
}

/// How a conversational turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The response was merged into the session.
    Applied,
    /// The exchange failed; an apology was appended and state is unchanged.
    Apologized,
    /// The session was reset while the exchange was in flight; result dropped.
    Stale,
    /// Nothing to do (already bootstrapped, or automated calls are closed).
    Skipped,
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Apology {
    General,
    UploadFollowUp,
}

/// One admitted conversational exchange.
struct Turn {
    session_id: String,
    request: OrchestratorRequest,
    /// Committed together with the settled result.
    user_message: Option<Message>,
    apology: Apology,
    bootstrap: bool,
    /// The user message is a voice placeholder awaiting its transcript.
    voice: bool,
}

impl Turn {
    fn new(session_id: &str, request: OrchestratorRequest) -> Self {
        Self {
            session_id: session_id.to_string(),
            request,
            user_message: None,
            apology: Apology::General,
            bootstrap: false,
            voice: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ConversationEngine
// ---------------------------------------------------------------------------

/// The conversation client engine.
///
/// Share it as `Arc<ConversationEngine>`; every operation takes `&self`.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use loan_chat_client::audio::CpalAudioSource;
/// use loan_chat_client::config::AppConfig;
/// use loan_chat_client::engine::ConversationEngine;
/// use loan_chat_client::orchestrator::HttpOrchestrator;
/// use loan_chat_client::session::MemorySessionStore;
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let engine = ConversationEngine::new(
///     Arc::new(HttpOrchestrator::from_config(&config.orchestrator)),
///     Arc::new(MemorySessionStore::new()),
///     Arc::new(CpalAudioSource::new()),
///     config,
/// );
/// engine.bootstrap().await.unwrap();
/// engine.send_text("I need a loan of 500000").await.unwrap();
/// println!("{}", engine.mode().label());
/// # }
/// ```
pub struct ConversationEngine {
    client: Arc<dyn OrchestratorClient>,
    store: Arc<dyn SessionStore>,
    config: AppConfig,
    serializer: Mutex<RequestSerializer>,
    session: Mutex<ConversationSession>,
    preferences: Mutex<Preferences>,
    voice: Mutex<VoiceCapture>,
    upload: Mutex<Option<UploadTask>>,
    events: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl ConversationEngine {
    /// Create an engine, restoring the persisted session when there is a
    /// readable one and starting fresh otherwise.
    pub fn new(
        client: Arc<dyn OrchestratorClient>,
        store: Arc<dyn SessionStore>,
        audio: Arc<dyn AudioSource>,
        config: AppConfig,
    ) -> Self {
        let (session, preferences) = match store.load() {
            Some(record) => {
                log::info!(
                    "engine: restored session {} ({} messages, {})",
                    record.session.id,
                    record.session.transcript.len(),
                    record.session.mode.label()
                );
                (record.session, record.preferences)
            }
            None => {
                let session = ConversationSession::new();
                log::info!("engine: starting new session {}", session.id);
                (session, Preferences::default())
            }
        };

        Self {
            client,
            store,
            voice: Mutex::new(VoiceCapture::new(audio, config.audio.clone())),
            config,
            serializer: Mutex::new(RequestSerializer::new()),
            session: Mutex::new(session),
            preferences: Mutex::new(preferences),
            upload: Mutex::new(None),
            events: None,
        }
    }

    /// Deliver [`EngineEvent`]s to `tx` as they happen.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    /// Snapshot of the current session.
    pub fn session(&self) -> ConversationSession {
        self.session.lock().unwrap().clone()
    }

    pub fn mode(&self) -> UiMode {
        self.session.lock().unwrap().mode
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences.lock().unwrap().clone()
    }

    /// `true` while an exchange holds the in-flight slot.
    pub fn is_busy(&self) -> bool {
        self.serializer().is_busy()
    }

    pub fn voice_state(&self) -> CaptureState {
        self.voice.lock().unwrap().state()
    }

    /// The most recent document upload, if any.
    pub fn upload_task(&self) -> Option<UploadTask> {
        self.upload.lock().unwrap().clone()
    }

    // -----------------------------------------------------------------------
    // Preferences / reset
    // -----------------------------------------------------------------------

    /// Replace the preferences and persist them with the session.
    ///
    /// The save happens under the session lock, so it cannot overwrite a
    /// snapshot committed concurrently with an older one.
    pub fn set_preferences(&self, preferences: Preferences) {
        let session = self.session.lock().unwrap();
        *self.preferences.lock().unwrap() = preferences;
        self.persist(&session);
    }

    pub fn set_language(&self, language: Language) {
        let mut prefs = self.preferences();
        prefs.language = language;
        self.set_preferences(prefs);
    }

    /// Throw the conversation away and start a brand-new session.
    ///
    /// Exchanges still in flight settle against the old identifier and are
    /// discarded.  Returns the new session id.
    pub fn reset(&self) -> String {
        self.cancel_voice();

        let fresh = ConversationSession::new();
        let id = fresh.id.clone();
        let greeting = fresh.transcript.clone();

        *self.serializer.lock().unwrap() = RequestSerializer::new();
        *self.upload.lock().unwrap() = None;
        let old = {
            let mut session = self.session.lock().unwrap();
            if let Err(e) = self.store.clear() {
                log::warn!("engine: could not clear stored session: {e}");
            }
            std::mem::replace(&mut *session, fresh)
        };
        log::info!("engine: session {} reset, new session {id}", old.id);

        self.emit(EngineEvent::SessionReset {
            session_id: id.clone(),
        });
        for message in greeting {
            self.emit(EngineEvent::MessageAppended(message));
        }
        id
    }

    // -----------------------------------------------------------------------
    // Conversational turns
    // -----------------------------------------------------------------------

    /// Fetch the opening greeting.
    ///
    /// Skipped once a bootstrap response has been merged, and in final modes.
    pub async fn bootstrap(&self) -> Result<TurnOutcome, EngineError> {
        let snapshot = self.session();
        if snapshot.bootstrapped || !snapshot.mode.allows_automated_calls() {
            return Ok(TurnOutcome::Skipped);
        }

        let guard = self
            .serializer()
            .try_admit(RequestKind::Bootstrap, &snapshot.id)?;
        let mut turn = Turn::new(&snapshot.id, OrchestratorRequest::Bootstrap);
        turn.bootstrap = true;
        self.run_turn(guard, turn).await
    }

    /// Send a typed message.
    pub async fn send_text(&self, input: &str) -> Result<TurnOutcome, EngineError> {
        let text = normalize_text(input).ok_or(EngineError::EmptyMessage)?;
        let snapshot = self.session();
        let guard = self.serializer().try_admit(RequestKind::Text, &snapshot.id)?;

        let user = Message::user(&text);
        self.emit(EngineEvent::MessageAppended(user.clone()));

        if self.config.ui.simulate_processing && wants_processing_steps(&text) {
            self.play_processing_steps().await;
        }

        let mut turn = Turn::new(&snapshot.id, text_request(&snapshot, &text));
        turn.user_message = Some(user);
        self.run_turn(guard, turn).await
    }

    // -----------------------------------------------------------------------
    // Document upload
    // -----------------------------------------------------------------------

    /// Validate and read `path`, then upload it.
    pub async fn upload_document(&self, path: &Path) -> Result<TurnOutcome, EngineError> {
        let payload = read_document(path, &self.config.upload).await?;
        self.submit_document(payload).await
    }

    /// Upload a document that is already in memory.
    ///
    /// The transfer and the `document_uploaded` follow-up are two separate
    /// exchanges.  The slot is handed from one to the other without being
    /// freed, so no other request can slip in between.
    pub async fn submit_document(
        &self,
        payload: DocumentPayload,
    ) -> Result<TurnOutcome, EngineError> {
        let cfg = &self.config.upload;
        validate(&payload.content_type, payload.bytes.len() as u64, cfg)?;

        let snapshot = self.session();
        let guard = self
            .serializer()
            .try_admit(RequestKind::DocumentTransfer, &snapshot.id)?;

        let mut task = UploadTask::new(&payload, &cfg.document_type);
        task.begin();
        self.track_upload(&task);

        let mut transfer = self.client.upload_document(snapshot.wire_id(), &payload);
        let period = Duration::from_millis(cfg.progress_tick_ms.max(1));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let result = loop {
            tokio::select! {
                res = &mut transfer => break res,
                _ = ticker.tick() => {
                    task.tick(cfg.progress_step, cfg.progress_ceiling);
                    self.track_upload(&task);
                }
            }
        };
        drop(transfer);

        let result = match result {
            Ok(receipt) if !receipt.success => Err(OrchestratorError::Rejected(
                receipt
                    .message
                    .unwrap_or_else(|| "document was not accepted".into()),
            )),
            other => other,
        };

        match result {
            Err(e) => {
                log::warn!("engine: upload of {} failed: {e}", payload.file_name);
                task.fail();
                self.track_upload(&task);
                let apology = self.language().apology();
                let committed = self.commit(&snapshot.id, guard, |current, events| {
                    let mut next = current.clone();
                    let msg = Message::assistant(apology);
                    next.transcript.push(msg.clone());
                    events.push(EngineEvent::MessageAppended(msg));
                    next
                });
                return Ok(if committed {
                    TurnOutcome::Apologized
                } else {
                    TurnOutcome::Stale
                });
            }
            Ok(receipt) => {
                log::info!(
                    "engine: uploaded {} ({} bytes, id {:?})",
                    payload.file_name,
                    payload.bytes.len(),
                    receipt.document_id
                );
                task.succeed();
                self.track_upload(&task);
                let note = Message::user(format!("Uploaded {}", payload.file_name));
                let swapped = self.swap_in(&snapshot.id, guard.kind(), |current, events| {
                    let mut next = current.clone();
                    next.transcript.push(note.clone());
                    events.push(EngineEvent::MessageAppended(note));
                    next
                });
                let Some((current, events)) = swapped else {
                    return Ok(TurnOutcome::Stale);
                };

                if !current.mode.allows_automated_calls() {
                    guard.release();
                    self.emit_all(events);
                    return Ok(TurnOutcome::Applied);
                }

                // Second exchange: tell the orchestrator the document is there.
                let guard = guard.handoff(RequestKind::DocumentEvent);
                self.emit_all(events);
                let request = OrchestratorRequest::DocumentUploaded {
                    document_type: cfg.document_type.clone(),
                    state: current.state.for_request(current.wire_id()),
                };
                let mut turn = Turn::new(&current.id, request);
                turn.apology = Apology::UploadFollowUp;
                self.run_turn(guard, turn).await
            }
        }
    }

    // -----------------------------------------------------------------------
    // Voice
    // -----------------------------------------------------------------------

    /// Start recording.  A no-op while already recording.
    pub fn start_voice(&self) -> Result<(), EngineError> {
        let started = self.voice.lock().unwrap().start();
        if started? {
            self.emit(EngineEvent::Voice(CaptureState::Recording));
        }
        Ok(())
    }

    /// Drain captured audio; call periodically while recording.
    ///
    /// A device failure discards the recording without sending anything.
    pub fn poll_voice(&self) -> Result<(), EngineError> {
        let pumped = self.voice.lock().unwrap().pump();
        if let Err(e) = pumped {
            self.emit(EngineEvent::Voice(CaptureState::Idle));
            self.emit(EngineEvent::Notice(format!("Recording discarded: {e}")));
            return Err(e.into());
        }
        Ok(())
    }

    /// Abandon the recording.  Returns `true` if one was running.
    pub fn cancel_voice(&self) -> bool {
        let cancelled = self.voice.lock().unwrap().cancel();
        if cancelled {
            self.emit(EngineEvent::Voice(CaptureState::Idle));
        }
        cancelled
    }

    /// Stop recording and send the audio as a voice turn.
    ///
    /// If another exchange is in flight the recording is discarded and
    /// [`EngineError::Busy`] returned.
    pub async fn stop_voice(&self) -> Result<TurnOutcome, EngineError> {
        let recording = self.voice.lock().unwrap().is_recording();
        if !recording {
            return Err(EngineError::NotRecording);
        }

        let snapshot = self.session();
        let guard = match self.serializer().try_admit(RequestKind::Voice, &snapshot.id) {
            Ok(guard) => guard,
            Err(busy) => {
                self.cancel_voice();
                return Err(busy.into());
            }
        };

        // The capture thread is joined off the lock and off the runtime.
        let stopping = self.voice.lock().unwrap().begin_stop();
        let stopped = match stopping {
            Ok(handle) => {
                let tail = stop_capture(handle).await;
                self.voice.lock().unwrap().finish_stop(tail)
            }
            Err(e) => Err(e),
        };
        let audio = match stopped {
            Ok(audio) => audio,
            Err(e) => {
                self.emit(EngineEvent::Voice(CaptureState::Idle));
                return Err(e.into());
            }
        };
        self.emit(EngineEvent::Voice(CaptureState::Sent));

        let placeholder = Message::user(VOICE_PLACEHOLDER);
        self.emit(EngineEvent::MessageAppended(placeholder.clone()));

        let request = OrchestratorRequest::Voice {
            conversation_id: Some(snapshot.wire_id().to_string()),
            audio,
        };
        let mut turn = Turn::new(&snapshot.id, request);
        turn.user_message = Some(placeholder);
        turn.voice = true;

        let outcome = self.run_turn(guard, turn).await;
        self.voice.lock().unwrap().settle();
        self.emit(EngineEvent::Voice(CaptureState::Idle));
        outcome
    }

    // -----------------------------------------------------------------------
    // Sanction
    // -----------------------------------------------------------------------

    /// Ask for the sanction letter.  Only available once approved.
    pub async fn generate_sanction_letter(&self) -> Result<SanctionLetterDetails, EngineError> {
        let snapshot = self.session();
        match snapshot.mode {
            UiMode::Terminal(Decision::Approved) => {}
            UiMode::Terminal(Decision::PendingReview) => return Err(EngineError::AmbiguousDecision),
            other => {
                return Err(EngineError::SanctionUnavailable(format!(
                    "the application is not approved ({})",
                    other.label()
                )))
            }
        }

        let guard = self
            .serializer()
            .try_admit(RequestKind::SanctionGenerate, &snapshot.id)?;
        let letter = self.client.generate_sanction(snapshot.wire_id()).await?;

        let stored = letter.clone();
        let committed = self.commit(&snapshot.id, guard, move |current, events| {
            let mut next = current.clone();
            next.sanction_letter = Some(stored.clone());
            events.push(EngineEvent::SanctionLetter(stored));
            next
        });
        if !committed {
            return Err(EngineError::SanctionUnavailable("the session was reset".into()));
        }
        log::info!("engine: sanction letter {} issued", letter.sanction_number);
        Ok(letter)
    }

    /// Accept the generated sanction letter and trigger disbursement.
    pub async fn accept_sanction(&self) -> Result<DisbursementReceipt, EngineError> {
        let snapshot = self.session();
        if snapshot.sanction_letter.is_none() {
            return Err(EngineError::SanctionUnavailable(
                "no sanction letter has been generated".into(),
            ));
        }
        if snapshot.disbursement.is_some() {
            return Err(EngineError::SanctionUnavailable(
                "the sanction letter was already accepted".into(),
            ));
        }

        let guard = self
            .serializer()
            .try_admit(RequestKind::SanctionAccept, &snapshot.id)?;
        let receipt = self.client.accept_sanction(snapshot.wire_id()).await?;

        let stored = receipt.clone();
        let committed = self.commit(&snapshot.id, guard, move |current, events| {
            let mut next = current.clone();
            if !stored.message.trim().is_empty() {
                let msg = Message::assistant(stored.message.trim());
                next.transcript.push(msg.clone());
                events.push(EngineEvent::MessageAppended(msg));
            }
            next.disbursement = Some(stored.clone());
            events.push(EngineEvent::Disbursed(stored));
            next
        });
        if !committed {
            return Err(EngineError::SanctionUnavailable("the session was reset".into()));
        }
        log::info!("engine: disbursement {} ({})", receipt.transaction_id, receipt.status);
        Ok(receipt)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn serializer(&self) -> RequestSerializer {
        self.serializer.lock().unwrap().clone()
    }

    fn language(&self) -> Language {
        self.preferences.lock().unwrap().language
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.events {
            // A closed receiver only means nobody is rendering.
            let _ = tx.send(event);
        }
    }

    fn emit_all(&self, events: Vec<EngineEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Save `session` with the current preferences.  Callers hold the
    /// session lock.
    fn persist(&self, session: &ConversationSession) {
        let record = PersistedRecord::new(session.clone(), self.preferences());
        if let Err(e) = self.store.save(&record) {
            log::warn!("engine: could not persist session {}: {e}", session.id);
        }
    }

    fn track_upload(&self, task: &UploadTask) {
        *self.upload.lock().unwrap() = Some(task.clone());
        self.emit(EngineEvent::UploadProgress {
            file_name: task.file_name.clone(),
            state: task.state,
            progress: task.progress,
        });
    }

    async fn play_processing_steps(&self) {
        let pause = Duration::from_millis(self.config.ui.processing_step_ms);
        for step in ProcessingStep::SEQUENCE {
            self.emit(EngineEvent::Processing(step));
            tokio::time::sleep(pause).await;
        }
    }

    /// Swap in and persist the snapshot built by `build`, returning it with
    /// the events `build` produced.  The slot is left alone.
    ///
    /// Returns `None` (and changes nothing) when the session was replaced
    /// since `session_id` was admitted.
    fn swap_in<F>(
        &self,
        session_id: &str,
        kind: RequestKind,
        build: F,
    ) -> Option<(ConversationSession, Vec<EngineEvent>)>
    where
        F: FnOnce(&ConversationSession, &mut Vec<EngineEvent>) -> ConversationSession,
    {
        let mut session = self.session.lock().unwrap();
        if session.id != session_id {
            log::warn!("engine: discarding {kind:?} result for stale session {session_id}");
            return None;
        }
        let mut events = Vec::new();
        let next = build(&session, &mut events);
        *session = next.clone();
        self.persist(&next);
        Some((next, events))
    }

    /// [`swap_in`](Self::swap_in), then free the slot and emit the events.
    fn commit<F>(&self, session_id: &str, guard: InFlightGuard, build: F) -> bool
    where
        F: FnOnce(&ConversationSession, &mut Vec<EngineEvent>) -> ConversationSession,
    {
        let swapped = self.swap_in(session_id, guard.kind(), build);
        guard.release();
        match swapped {
            Some((_, events)) => {
                self.emit_all(events);
                true
            }
            None => false,
        }
    }

    async fn run_turn(&self, guard: InFlightGuard, turn: Turn) -> Result<TurnOutcome, EngineError> {
        log::debug!("engine: sending {:?} for {}", guard.kind(), turn.session_id);
        let result = self.client.send(&turn.request).await;

        let apology = match turn.apology {
            Apology::General => self.language().apology(),
            Apology::UploadFollowUp => self.language().upload_follow_up_apology(),
        };
        if let Err(e) = &result {
            log::warn!("engine: {:?} failed: {e}", guard.kind());
        }

        let committed = self.commit(&turn.session_id, guard, |current, events| match &result {
            Ok(response) => apply_response(current, response, &turn, events),
            Err(_) => apply_failure(current, &turn, apology, events),
        });

        Ok(match (committed, result.is_ok()) {
            (false, _) => TurnOutcome::Stale,
            (true, true) => TurnOutcome::Applied,
            (true, false) => TurnOutcome::Apologized,
        })
    }
}

/// Stop the device on a blocking thread and collect its last events.
async fn stop_capture(handle: Option<CaptureHandle>) -> Vec<CaptureEvent> {
    let Some(handle) = handle else {
        return Vec::new();
    };
    match tokio::task::spawn_blocking(move || handle.stop()).await {
        Ok(tail) => tail,
        Err(e) => {
            log::warn!("engine: capture shutdown failed: {e}");
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot builders
// ---------------------------------------------------------------------------

fn apply_response(
    current: &ConversationSession,
    response: &OrchestratorResponse,
    turn: &Turn,
    events: &mut Vec<EngineEvent>,
) -> ConversationSession {
    let mut next = current.clone();

    let server_id = response.conversation_id.as_deref().or_else(|| {
        response
            .state_updates
            .get("conversation_id")
            .and_then(Value::as_str)
    });
    if next.adopt_conversation_id(server_id) {
        log::info!(
            "engine: session {} adopted conversation id {}",
            next.id,
            next.wire_id()
        );
    }

    next.state = merge_state(
        &current.state,
        &response.state_updates,
        Some(response.stage.as_str()),
    );
    next.mode = current.mode.next(response.next_action, response.decision());

    if let Some(mut user) = turn.user_message.clone() {
        if turn.voice {
            user.content = response
                .user_transcript()
                .unwrap_or(VOICE_TRANSCRIPT_FALLBACK)
                .to_string();
            events.push(EngineEvent::MessageUpdated(user.clone()));
        }
        next.transcript.push(user);
    }

    if let Some(mut reply) = reply_message(response) {
        if turn.bootstrap && shows_only_greeting(&next) {
            reply.id = next.transcript[0].id.clone();
            next.transcript[0] = reply.clone();
            events.push(EngineEvent::MessageUpdated(reply));
        } else {
            next.transcript.push(reply.clone());
            events.push(EngineEvent::MessageAppended(reply));
        }
    }
    if turn.bootstrap {
        next.bootstrapped = true;
    }

    if next.mode != current.mode {
        log::info!(
            "engine: mode {} -> {}",
            current.mode.label(),
            next.mode.label()
        );
        events.push(EngineEvent::ModeChanged {
            from: current.mode,
            to: next.mode,
        });
    }
    events.extend(side_panels(response));
    next
}

fn apply_failure(
    current: &ConversationSession,
    turn: &Turn,
    apology: &str,
    events: &mut Vec<EngineEvent>,
) -> ConversationSession {
    let mut next = current.clone();
    if let Some(user) = &turn.user_message {
        next.transcript.push(user.clone());
    }
    let msg = Message::assistant(apology);
    next.transcript.push(msg.clone());
    events.push(EngineEvent::MessageAppended(msg));
    next
}

fn shows_only_greeting(session: &ConversationSession) -> bool {
    matches!(session.transcript.as_slice(), [only] if only.content == GREETING_TEXT)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
