//! Typed-text turns and the optional cosmetic "processing" steps.

use crate::orchestrator::OrchestratorRequest;
use crate::session::ConversationSession;

/// Trim `input`; `None` if nothing is left.
pub fn normalize_text(input: &str) -> Option<String> {
    let trimmed = input.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Build the text turn for `message`, carrying the session's last known state
/// and identifier so a stateless backend can resume the conversation.
pub fn text_request(session: &ConversationSession, message: &str) -> OrchestratorRequest {
    OrchestratorRequest::Text {
        user_message: message.to_string(),
        state: session.state.for_request(session.wire_id()),
    }
}

// ---------------------------------------------------------------------------
// ProcessingStep
// ---------------------------------------------------------------------------

/// Cosmetic status shown before a loan-related turn is sent.
///
/// These steps are pure UI polish; they do not mirror anything the
/// orchestrator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStep {
    Analyzing,
    Verifying,
    Underwriting,
    Complete,
}

impl ProcessingStep {
    pub const SEQUENCE: [ProcessingStep; 4] = [
        ProcessingStep::Analyzing,
        ProcessingStep::Verifying,
        ProcessingStep::Underwriting,
        ProcessingStep::Complete,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ProcessingStep::Analyzing => "Analyzing your request",
            ProcessingStep::Verifying => "Verifying details",
            ProcessingStep::Underwriting => "Running underwriting checks",
            ProcessingStep::Complete => "Done",
        }
    }
}

/// Whether a message looks like it starts loan processing: it mentions a
/// loan or verification, or contains a 10-digit number (a phone number).
pub fn wants_processing_steps(message: &str) -> bool {
    let lower = message.to_lowercase();
    if lower.contains("loan") || lower.contains("verify") {
        return true;
    }

    let mut run = 0;
    for c in message.chars() {
        if c.is_ascii_digit() {
            run += 1;
            if run == 10 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_trims_and_rejects_blank() {
        assert_eq!(normalize_text("  hi there \n").as_deref(), Some("hi there"));
        assert_eq!(normalize_text("   \t\n"), None);
        assert_eq!(normalize_text(""), None);
    }

    #[test]
    fn text_request_carries_state_and_id() {
        let mut session = ConversationSession::new();
        session.conversation_id = Some("conv_7".into());
        session.state = crate::orchestrator::OrchestratorState::from_map(
            json!({ "stage": "SALES" }).as_object().unwrap().clone(),
        );

        match text_request(&session, "hello") {
            OrchestratorRequest::Text {
                user_message,
                state,
            } => {
                assert_eq!(user_message, "hello");
                assert_eq!(state.stage(), Some("SALES"));
                assert_eq!(state.conversation_id(), Some("conv_7"));
            }
            other => panic!("unexpected request {other:?}"),
        }
        // The session's own snapshot is not touched.
        assert!(session.state.conversation_id().is_none());
    }

    #[test]
    fn processing_trigger_words() {
        assert!(wants_processing_steps("I need a LOAN"));
        assert!(wants_processing_steps("please verify me"));
        assert!(wants_processing_steps("my number is 9876543210"));
        assert!(!wants_processing_steps("98765 43210"));
        assert!(!wants_processing_steps("hello"));
    }

    #[test]
    fn sequence_ends_with_complete() {
        assert_eq!(ProcessingStep::SEQUENCE.last(), Some(&ProcessingStep::Complete));
    }
}
