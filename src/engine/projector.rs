//! Turns settled orchestrator responses into transcript messages and the
//! [`EngineEvent`]s a front end renders.

use serde_json::{Map, Value};

use crate::orchestrator::types::value_at;
use crate::orchestrator::{
    DisbursementReceipt, NextAction, OrchestratorResponse, SanctionLetterDetails,
};
use crate::session::{Decision, Message, Sentiment, StatusTag, UiMode};

use super::text::ProcessingStep;
use super::upload::UploadState;
use super::voice::CaptureState;

// ---------------------------------------------------------------------------
// EngineEvent
// ---------------------------------------------------------------------------

/// Everything a front end needs to redraw, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    MessageAppended(Message),
    /// A message already shown changed in place (same id).
    MessageUpdated(Message),
    ModeChanged { from: UiMode, to: UiMode },
    UploadProgress {
        file_name: String,
        state: UploadState,
        progress: f32,
    },
    Processing(ProcessingStep),
    Explainability(ExplainabilityPanel),
    SanctionReference(String),
    SanctionLetter(SanctionLetterDetails),
    Disbursed(DisbursementReceipt),
    Voice(CaptureState),
    /// Local, non-transcript feedback ("please wait", validation errors).
    Notice(String),
    SessionReset { session_id: String },
}

// ---------------------------------------------------------------------------
// ExplainabilityPanel
// ---------------------------------------------------------------------------

/// Why the orchestrator decided what it did, in displayable form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExplainabilityPanel {
    pub decision: Option<String>,
    pub credit_score: Option<f64>,
    /// `"name: status (reason)"` per factor, or the summary.
    pub reasoning: Vec<String>,
}

impl ExplainabilityPanel {
    /// Build from `state_updates.explainability`, falling back to the
    /// top-level `explainability`.  `None` when neither is an object.
    pub fn from_response(response: &OrchestratorResponse) -> Option<Self> {
        let explain = response
            .state_updates
            .get("explainability")
            .and_then(Value::as_object)
            .or_else(|| response.explainability.as_ref().and_then(Value::as_object))?;

        let reasoning = match explain.get("factors").and_then(Value::as_array) {
            Some(factors) => factors.iter().filter_map(factor_line).collect(),
            None => explain
                .get("summary")
                .and_then(Value::as_str)
                .map(|s| vec![s.to_string()])
                .unwrap_or_default(),
        };

        Some(Self {
            decision: explain
                .get("decision")
                .and_then(Value::as_str)
                .map(String::from),
            credit_score: explain
                .get("credit_score")
                .and_then(Value::as_f64)
                .or_else(|| response.state_updates.get("credit_score").and_then(Value::as_f64)),
            reasoning,
        })
    }
}

fn factor_line(factor: &Value) -> Option<String> {
    let factor = factor.as_object()?;
    let field = |key: &str| -> String {
        match factor.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    };
    let name = field("name");
    if name.is_empty() {
        return None;
    }
    Some(format!("{}: {} ({})", name, field("status"), field("reason")))
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Status badge for the assistant reply.
pub fn status_tag(response: &OrchestratorResponse) -> Option<StatusTag> {
    match response.next_action {
        NextAction::End => match Decision::resolve(response.decision()) {
            Decision::Approved => Some(StatusTag::Approved),
            Decision::Rejected => Some(StatusTag::Rejected),
            Decision::PendingReview => None,
        },
        action if action.wants_upload() => Some(StatusTag::PendingDocuments),
        _ => response
            .authoritative_stage()
            .filter(|s| s.eq_ignore_ascii_case("UNDERWRITING"))
            .map(|_| StatusTag::Processing),
    }
}

/// Sentiment from `state_updates.emotion.primary`.
pub fn sentiment(response: &OrchestratorResponse) -> Option<Sentiment> {
    nested_str(&response.state_updates, &["emotion", "primary"]).and_then(Sentiment::from_emotion)
}

/// Sanction number from `sanction_data` or `sanction` in the updates.
pub fn sanction_reference(response: &OrchestratorResponse) -> Option<String> {
    nested_str(&response.state_updates, &["sanction_data", "sanction_number"])
        .or_else(|| nested_str(&response.state_updates, &["sanction", "sanction_number"]))
        .map(String::from)
}

/// The assistant message for `response`, or `None` if it has nothing to say.
pub fn reply_message(response: &OrchestratorResponse) -> Option<Message> {
    let text = response.message_to_user.trim();
    if text.is_empty() {
        return None;
    }
    Some(
        Message::assistant(text)
            .with_status(status_tag(response))
            .with_sentiment(sentiment(response))
            .with_agent(response.agent_label().map(String::from)),
    )
}

/// Side-panel events for `response` (explainability, sanction reference).
pub fn side_panels(response: &OrchestratorResponse) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    if let Some(panel) = ExplainabilityPanel::from_response(response) {
        events.push(EngineEvent::Explainability(panel));
    }
    if let Some(reference) = sanction_reference(response) {
        events.push(EngineEvent::SanctionReference(reference));
    }
    events
}

fn nested_str<'a>(map: &'a Map<String, Value>, path: &[&str]) -> Option<&'a str> {
    value_at(map, path).and_then(Value::as_str)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
