//! Wire types exchanged with the orchestrator service.
//!
//! The service is loose about its payloads: `state_updates` is an open map,
//! the next action arrives as either `next_action` or `action`, and most
//! fields may be missing.  Everything here therefore deserialises leniently
//! (`#[serde(default)]`) and keeps unknown structure as `serde_json::Value`
//! instead of failing the whole exchange.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// OrchestratorState
// ---------------------------------------------------------------------------

/// Accumulated conversation state reported by the orchestrator.
///
/// An open mapping of named fields (stage, loan terms, KYC and credit flags,
/// explainability, sanction data, gamification).  A missing field means
/// "not yet known"; accessors return `None` rather than a zero value.
///
/// The client never edits this map directly: new snapshots are only produced
/// by [`crate::session::merge_state`] from server updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrchestratorState(Map<String, Value>);

impl OrchestratorState {
    /// An empty state: nothing known yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a raw JSON object.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub(crate) fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of this state carrying `conversation_id`, as sent with a turn so
    /// that a stateless backend can hydrate the conversation.
    pub fn for_request(&self, conversation_id: &str) -> Self {
        let mut map = self.0.clone();
        map.insert(
            "conversation_id".into(),
            Value::String(conversation_id.to_string()),
        );
        Self(map)
    }

    // -----------------------------------------------------------------------
    // Typed accessors
    // -----------------------------------------------------------------------

    pub fn stage(&self) -> Option<&str> {
        self.str_at(&["stage"])
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.str_at(&["conversation_id"])
    }

    /// Sanctioned/offered amount (`loan_amount`, or `offer.amount`).
    pub fn loan_amount(&self) -> Option<f64> {
        self.f64_at(&["loan_amount"])
            .or_else(|| self.f64_at(&["offer", "amount"]))
    }

    /// Tenure in months (`tenure`, or `offer.tenure`).
    pub fn tenure_months(&self) -> Option<u64> {
        self.at(&["tenure"])
            .or_else(|| self.at(&["offer", "tenure"]))
            .and_then(Value::as_u64)
    }

    pub fn personalized_rate(&self) -> Option<f64> {
        self.f64_at(&["personalized_rate"])
            .or_else(|| self.f64_at(&["offer", "personalized_rate"]))
    }

    pub fn emi(&self) -> Option<f64> {
        self.f64_at(&["emi"]).or_else(|| self.f64_at(&["offer", "emi"]))
    }

    /// KYC verification flag (`kyc_verified`, or `kyc.verified`).
    pub fn kyc_verified(&self) -> Option<bool> {
        self.at(&["kyc_verified"])
            .or_else(|| self.at(&["kyc", "verified"]))
            .and_then(Value::as_bool)
    }

    pub fn credit_score(&self) -> Option<f64> {
        self.f64_at(&["credit_score"])
            .or_else(|| self.f64_at(&["explainability", "credit_score"]))
    }

    /// Walk nested objects along `path`.
    pub fn at(&self, path: &[&str]) -> Option<&Value> {
        value_at(&self.0, path)
    }

    fn str_at(&self, path: &[&str]) -> Option<&str> {
        self.at(path).and_then(Value::as_str)
    }

    fn f64_at(&self, path: &[&str]) -> Option<f64> {
        self.at(path).and_then(Value::as_f64)
    }
}

impl From<Map<String, Value>> for OrchestratorState {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Walk `path` through nested JSON objects starting at `map`.
pub(crate) fn value_at<'a>(map: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = map.get(*first)?;
    for key in rest {
        current = current.as_object()?.get(*key)?;
    }
    Some(current)
}

// ---------------------------------------------------------------------------
// NextAction
// ---------------------------------------------------------------------------

/// The orchestrator's directive for what the client should do next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    #[default]
    Continue,
    RequestUpload,
    ProcessSalarySlip,
    RequestOtp,
    ManualReview,
    HumanHandoff,
    End,
    /// Any action this client does not know about.
    #[serde(other)]
    Unrecognized,
}

impl NextAction {
    /// `true` for the actions that ask the user for a document.
    pub fn wants_upload(self) -> bool {
        matches!(self, NextAction::RequestUpload | NextAction::ProcessSalarySlip)
    }
}

// ---------------------------------------------------------------------------
// OrchestratorResponse
// ---------------------------------------------------------------------------

/// One settled turn as returned by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorResponse {
    /// Server-issued conversation identifier, when the service assigns one.
    pub conversation_id: Option<String>,
    /// Stage tag at the top level of the response.
    pub stage: String,
    /// Text to render as the assistant's reply.
    pub message_to_user: String,
    /// Opaque worker invocation payload (carries `user_transcript` on voice turns).
    pub invoke_worker: Map<String, Value>,
    /// Legacy name of the worker that produced the reply.
    pub worker_called: Option<String>,
    /// Partial state to fold into the session's [`OrchestratorState`].
    pub state_updates: Map<String, Value>,
    #[serde(alias = "action")]
    pub next_action: NextAction,
    pub explainability: Option<Value>,
    pub audit_entry: Option<Value>,
    pub fallback_needed: bool,
    pub model_version: Option<String>,
}

impl OrchestratorResponse {
    /// The stage this response moves the conversation to.
    ///
    /// `state_updates.stage` wins over the top-level `stage` because the
    /// backend places the field inconsistently and the nested one is the more
    /// specific source.
    pub fn authoritative_stage(&self) -> Option<&str> {
        self.state_updates
            .get("stage")
            .and_then(Value::as_str)
            .or_else(|| Some(self.stage.as_str()).filter(|s| !s.is_empty()))
    }

    /// `state_updates.explainability.decision`, falling back to the
    /// top-level `explainability.decision`.
    pub fn decision(&self) -> Option<&str> {
        value_at(&self.state_updates, &["explainability", "decision"])
            .or_else(|| self.explainability.as_ref()?.get("decision"))
            .and_then(Value::as_str)
    }

    /// Transcript of the user's speech on a voice turn.
    pub fn user_transcript(&self) -> Option<&str> {
        self.invoke_worker
            .get("user_transcript")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Name of the agent/worker that produced this turn.
    pub fn agent_label(&self) -> Option<&str> {
        self.invoke_worker
            .get("name")
            .and_then(Value::as_str)
            .or(self.worker_called.as_deref())
            .filter(|s| !s.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A document read from disk and ready for transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPayload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A finalised voice recording.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPayload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub duration_secs: f32,
}

// ---------------------------------------------------------------------------
// OrchestratorRequest
// ---------------------------------------------------------------------------

/// A conversational turn sent through [`super::OrchestratorClient::send`].
#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorRequest {
    /// Empty user message used to fetch the opening greeting.
    Bootstrap,
    /// A typed message, carrying the last known state.
    Text {
        user_message: String,
        state: OrchestratorState,
    },
    /// Event announcing that a document was transferred successfully.
    DocumentUploaded {
        document_type: String,
        state: OrchestratorState,
    },
    /// A recorded voice message.
    Voice {
        conversation_id: Option<String>,
        audio: AudioPayload,
    },
}

impl OrchestratorRequest {
    /// JSON body for the turns that travel as JSON; `None` for voice.
    pub fn turn_body(&self) -> Option<TurnBody> {
        match self {
            OrchestratorRequest::Bootstrap => Some(TurnBody {
                user_message: Some(String::new()),
                state: OrchestratorState::new(),
                event: None,
                uploaded_document_type: None,
            }),
            OrchestratorRequest::Text {
                user_message,
                state,
            } => Some(TurnBody {
                user_message: Some(user_message.clone()),
                state: state.clone(),
                event: None,
                uploaded_document_type: None,
            }),
            OrchestratorRequest::DocumentUploaded {
                document_type,
                state,
            } => Some(TurnBody {
                user_message: None,
                state: state.clone(),
                event: Some(DOCUMENT_UPLOADED_EVENT.into()),
                uploaded_document_type: Some(document_type.clone()),
            }),
            OrchestratorRequest::Voice { .. } => None,
        }
    }
}

/// Event name announcing a completed document transfer.
pub const DOCUMENT_UPLOADED_EVENT: &str = "document_uploaded";

/// JSON body of a text, bootstrap, or document-event turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    pub state: OrchestratorState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_document_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Result of a document transfer.
///
/// Older deployments answer `{success, message, documentId}`; newer ones
/// answer with a full turn.  Only the fields below are read, and a body
/// without `success` counts as accepted (the HTTP status already said so).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "documentId", alias = "file_id")]
    pub document_id: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Sanction letter issued after an approved decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionLetterDetails {
    pub sanction_number: String,
    pub amount: f64,
    pub tenure_months: u32,
    pub rate_percent: f64,
    pub emi: f64,
    pub pdf_url: String,
    pub valid_until: String,
}

/// Outcome of accepting a sanction letter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisbursementReceipt {
    pub status: String,
    pub transaction_id: String,
    pub gross_amount: f64,
    pub processing_fee: f64,
    pub net_disbursed: f64,
    pub disbursed_at: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
