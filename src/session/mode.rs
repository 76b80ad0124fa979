//! UI mode state machine driven by the orchestrator's next action.
//!
//! ```text
//! Conversing / AwaitingUpload
//!   ──request_upload | process_salary_slip──▶ AwaitingUpload
//!   ──end──────────────────────────────────▶ Terminal(decision)
//!   ──human_handoff────────────────────────▶ HandoffRequested
//!   ──continue | anything else─────────────▶ Conversing
//!
//! Terminal(_) / HandoffRequested ── any action ──▶ (unchanged)
//! ```
//!
//! The two end states have no exit.  Only a brand-new session returns to
//! `Conversing`.

use serde::{Deserialize, Serialize};

use crate::orchestrator::NextAction;

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Outcome attached to a terminal conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
    /// The conversation ended without a decision the client can read.
    PendingReview,
}

impl Decision {
    /// Resolve the `explainability.decision` label.
    ///
    /// Anything other than a recognisable approval or rejection is
    /// [`Decision::PendingReview`]; the client never guesses.
    pub fn resolve(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
            Some("approved") | Some("approve") => Decision::Approved,
            Some("rejected") | Some("reject") | Some("declined") => Decision::Rejected,
            _ => Decision::PendingReview,
        }
    }
}

// ---------------------------------------------------------------------------
// UiMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiMode {
    #[default]
    Conversing,
    AwaitingUpload,
    Terminal(Decision),
    HandoffRequested,
}

impl UiMode {
    /// Mode after a response carrying `action` (and, for `end`, `decision`).
    ///
    /// ```
    /// use loan_chat_client::orchestrator::NextAction;
    /// use loan_chat_client::session::{Decision, UiMode};
    ///
    /// let mode = UiMode::Conversing.next(NextAction::End, Some("approved"));
    /// assert_eq!(mode, UiMode::Terminal(Decision::Approved));
    /// assert_eq!(mode.next(NextAction::Continue, None), mode);
    /// ```
    pub fn next(self, action: NextAction, decision: Option<&str>) -> UiMode {
        if self.is_final() {
            return self;
        }
        match action {
            a if a.wants_upload() => UiMode::AwaitingUpload,
            NextAction::End => UiMode::Terminal(Decision::resolve(decision)),
            NextAction::HumanHandoff => UiMode::HandoffRequested,
            _ => UiMode::Conversing,
        }
    }

    /// `true` for `Terminal(_)` and `HandoffRequested`.
    pub fn is_final(&self) -> bool {
        matches!(self, UiMode::Terminal(_) | UiMode::HandoffRequested)
    }

    /// Whether the engine may issue calls the user did not ask for
    /// (bootstrap, synthesized follow-ups).
    pub fn allows_automated_calls(&self) -> bool {
        !self.is_final()
    }

    pub fn decision(&self) -> Option<Decision> {
        match self {
            UiMode::Terminal(d) => Some(*d),
            _ => None,
        }
    }

    /// A short human-readable label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            UiMode::Conversing => "Conversing",
            UiMode::AwaitingUpload => "Awaiting upload",
            UiMode::Terminal(Decision::Approved) => "Approved",
            UiMode::Terminal(Decision::Rejected) => "Rejected",
            UiMode::Terminal(Decision::PendingReview) => "Pending review",
            UiMode::HandoffRequested => "Handed off",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
