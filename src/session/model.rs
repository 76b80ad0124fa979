//! Conversation session model: the single source of truth the engine owns.
//!
//! [`ConversationSession`] is a plain value.  The engine keeps the current
//! one behind a lock and replaces it wholesale after every settled exchange;
//! nothing else mutates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::orchestrator::{DisbursementReceipt, OrchestratorState, SanctionLetterDetails};

use super::mode::UiMode;

/// Shown until the bootstrap response arrives so the transcript is never blank.
pub const GREETING_TEXT: &str =
    "Hello! I'm your loan assistant. Tell me what you need and I'll guide you through the application.";

/// Appended when an exchange with the orchestrator fails.
pub const APOLOGY_TEXT: &str =
    "I apologize, but I'm experiencing technical difficulties. Please try again.";
const APOLOGY_TEXT_TA: &str =
    "மன்னிக்கவும், தொழில்நுட்ப சிக்கல்கள் உள்ளன. மீண்டும் முயற்சிக்கவும்.";

/// Appended when a document transferred but the follow-up turn failed.
pub const UPLOAD_FOLLOW_UP_APOLOGY: &str =
    "Upload received but processing failed. Please try again.";
const UPLOAD_FOLLOW_UP_APOLOGY_TA: &str =
    "பதிவேற்றம் பெறப்பட்டது ஆனால் செயலாக்கம் தோல்வியடைந்தது. மீண்டும் முயற்சிக்கவும்.";

/// Optimistic content of a voice message until its transcript is known.
pub const VOICE_PLACEHOLDER: &str = "[Voice message sent]";

/// Used when a voice response carries no transcript.
pub const VOICE_TRANSCRIPT_FALLBACK: &str = "Transcribed audio";

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Assistant,
}

/// Decision/status badge attached to an assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTag {
    Approved,
    Rejected,
    PendingDocuments,
    Processing,
}

/// Customer sentiment the orchestrator detected on the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Neutral,
    Hesitation,
    Confusion,
    Negative,
}

impl Sentiment {
    /// Map the orchestrator's `emotion.primary` label.
    ///
    /// `joy` and unknown labels carry no sentiment worth surfacing.
    pub fn from_emotion(primary: &str) -> Option<Self> {
        match primary.to_ascii_lowercase().as_str() {
            "neutral" => Some(Sentiment::Neutral),
            "anxiety" | "hesitation" => Some(Sentiment::Hesitation),
            "confusion" => Some(Sentiment::Confusion),
            "anger" | "sadness" | "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

/// One entry of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    /// Worker/agent that produced an assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, content)
    }

    fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: format!("msg_{}", Uuid::new_v4().simple()),
            sender,
            content: content.into(),
            timestamp: Utc::now(),
            status: None,
            sentiment: None,
            agent: None,
        }
    }

    pub fn with_status(mut self, status: Option<StatusTag>) -> Self {
        self.status = status;
        self
    }

    pub fn with_sentiment(mut self, sentiment: Option<Sentiment>) -> Self {
        self.sentiment = sentiment;
        self
    }

    pub fn with_agent(mut self, agent: Option<String>) -> Self {
        self.agent = agent;
        self
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    En,
    Ta,
}

impl Language {
    /// Parse a language code such as `en` or `TA`.
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Language::En),
            "ta" => Some(Language::Ta),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ta => "ta",
        }
    }

    /// Apology shown when an exchange fails.
    pub fn apology(self) -> &'static str {
        match self {
            Language::En => APOLOGY_TEXT,
            Language::Ta => APOLOGY_TEXT_TA,
        }
    }

    /// Apology shown when a document was stored but the follow-up turn failed.
    pub fn upload_follow_up_apology(self) -> &'static str {
        match self {
            Language::En => UPLOAD_FOLLOW_UP_APOLOGY,
            Language::Ta => UPLOAD_FOLLOW_UP_APOLOGY_TA,
        }
    }
}

/// Simple user preferences persisted alongside the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub language: Language,
    pub dark_mode: bool,
}

// ---------------------------------------------------------------------------
// ConversationSession
// ---------------------------------------------------------------------------

/// Everything known about one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    /// Client-generated identifier (`sess_…`), fixed for the life of the session.
    pub id: String,
    /// Identifier issued by the orchestrator; adopted once, never replaced.
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub transcript: Vec<Message>,
    #[serde(default)]
    pub state: OrchestratorState,
    #[serde(default)]
    pub mode: UiMode,
    /// `true` once a bootstrap response has been merged.
    #[serde(default)]
    pub bootstrapped: bool,
    #[serde(default)]
    pub sanction_letter: Option<SanctionLetterDetails>,
    #[serde(default)]
    pub disbursement: Option<DisbursementReceipt>,
}

impl ConversationSession {
    /// A brand-new session seeded with the synthetic greeting.
    pub fn new() -> Self {
        Self {
            id: format!("sess_{}", Uuid::new_v4().simple()),
            conversation_id: None,
            created_at: Utc::now(),
            transcript: vec![Message::assistant(GREETING_TEXT)],
            state: OrchestratorState::new(),
            mode: UiMode::Conversing,
            bootstrapped: false,
            sanction_letter: None,
            disbursement: None,
        }
    }

    /// Identifier sent on the wire: the server's when known, ours otherwise.
    pub fn wire_id(&self) -> &str {
        self.conversation_id.as_deref().unwrap_or(&self.id)
    }

    /// Adopt the server's identifier the first time one is seen.
    ///
    /// Returns `true` if the identifier was adopted by this call.
    pub fn adopt_conversation_id(&mut self, server_id: Option<&str>) -> bool {
        match server_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) if self.conversation_id.is_none() => {
                self.conversation_id = Some(id.to_string());
                true
            }
            _ => false,
        }
    }

    /// The stage currently recorded in the merged state.
    pub fn stage(&self) -> Option<&str> {
        self.state.stage()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.transcript.last()
    }

    /// Position of the message with `id`.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.transcript.iter().position(|m| m.id == id)
    }
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_seeded_with_greeting() {
        let session = ConversationSession::new();
        assert!(session.id.starts_with("sess_"));
        assert_eq!(session.transcript.len(), 1);
        assert_eq!(session.transcript[0].sender, Sender::Assistant);
        assert_eq!(session.transcript[0].content, GREETING_TEXT);
        assert_eq!(session.mode, UiMode::Conversing);
        assert!(!session.bootstrapped);
    }

    #[test]
    fn sessions_get_distinct_ids() {
        assert_ne!(ConversationSession::new().id, ConversationSession::new().id);
    }

    #[test]
    fn server_id_is_adopted_once() {
        let mut session = ConversationSession::new();
        assert_eq!(session.wire_id(), session.id);

        assert!(session.adopt_conversation_id(Some("conv_1")));
        assert_eq!(session.wire_id(), "conv_1");

        assert!(!session.adopt_conversation_id(Some("conv_2")));
        assert_eq!(session.conversation_id.as_deref(), Some("conv_1"));
    }

    #[test]
    fn blank_server_id_is_ignored() {
        let mut session = ConversationSession::new();
        assert!(!session.adopt_conversation_id(Some("  ")));
        assert!(!session.adopt_conversation_id(None));
        assert!(session.conversation_id.is_none());
    }

    #[test]
    fn sentiment_maps_emotion_labels() {
        assert_eq!(Sentiment::from_emotion("anxiety"), Some(Sentiment::Hesitation));
        assert_eq!(Sentiment::from_emotion("Confusion"), Some(Sentiment::Confusion));
        assert_eq!(Sentiment::from_emotion("anger"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::from_emotion("sadness"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::from_emotion("neutral"), Some(Sentiment::Neutral));
        assert_eq!(Sentiment::from_emotion("joy"), None);
    }

    #[test]
    fn language_codes() {
        assert_eq!(Language::parse("TA"), Some(Language::Ta));
        assert_eq!(Language::parse(" en "), Some(Language::En));
        assert_eq!(Language::parse("fr"), None);
        assert_eq!(Language::Ta.code(), "ta");
        assert_eq!(Language::En.apology(), APOLOGY_TEXT);
        assert_ne!(Language::Ta.apology(), APOLOGY_TEXT);
        assert_eq!(Language::En.upload_follow_up_apology(), UPLOAD_FOLLOW_UP_APOLOGY);
    }

    #[test]
    fn message_builder_sets_optional_tags() {
        let msg = Message::assistant("Approved!")
            .with_status(Some(StatusTag::Approved))
            .with_agent(Some("underwriting".into()));
        assert_eq!(msg.status, Some(StatusTag::Approved));
        assert_eq!(msg.agent.as_deref(), Some("underwriting"));
        assert!(msg.sentiment.is_none());
        assert!(msg.id.starts_with("msg_"));
    }

    #[test]
    fn message_json_omits_absent_tags() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json["sender"], "user");
        assert!(json.get("status").is_none());
        assert!(json.get("agent").is_none());
    }
}
