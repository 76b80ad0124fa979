//! Conversation session: model, state merge, UI mode machine, persistence.
//!
//! This module provides:
//! * [`ConversationSession`] / [`Message`] — the snapshot the engine owns.
//! * [`merge_state`] — folds `state_updates` into [`OrchestratorState`].
//! * [`UiMode`] — `(action, decision)` → mode transitions.
//! * [`SessionStore`] with [`JsonFileStore`] and [`MemorySessionStore`].
//!
//! [`OrchestratorState`]: crate::orchestrator::OrchestratorState

pub mod merge;
pub mod mode;
pub mod model;
pub mod store;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use merge::merge_state;
pub use mode::{Decision, UiMode};
pub use model::{
    ConversationSession, Language, Message, Preferences, Sender, Sentiment, StatusTag,
    APOLOGY_TEXT, GREETING_TEXT, UPLOAD_FOLLOW_UP_APOLOGY, VOICE_PLACEHOLDER,
    VOICE_TRANSCRIPT_FALLBACK,
};
pub use store::{
    JsonFileStore, MemorySessionStore, PersistedRecord, SessionStore, StoreError, RECORD_VERSION,
};
