//! At-most-one in-flight orchestrator exchange per conversation.
//!
//! [`RequestSerializer::try_admit`] either hands out an [`InFlightGuard`] or
//! rejects immediately with [`Busy`]; nothing is queued.  The guard clears
//! the slot when released or dropped.  A holder that must chain a follow-up
//! exchange (document transfer, then the document event) relabels its guard
//! with [`InFlightGuard::handoff`] instead, so the slot is never free in
//! between.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// Modality / RequestKind
// ---------------------------------------------------------------------------

/// Input channel that produced a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Upload,
    Voice,
    /// Requests the engine issues on its own or for post-decision actions.
    System,
}

impl Modality {
    pub fn label(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Upload => "upload",
            Modality::Voice => "voice",
            Modality::System => "system",
        }
    }
}

/// What exactly is being exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Bootstrap,
    Text,
    DocumentTransfer,
    DocumentEvent,
    Voice,
    SanctionGenerate,
    SanctionAccept,
}

impl RequestKind {
    pub fn modality(&self) -> Modality {
        match self {
            RequestKind::Text => Modality::Text,
            RequestKind::DocumentTransfer | RequestKind::DocumentEvent => Modality::Upload,
            RequestKind::Voice => Modality::Voice,
            RequestKind::Bootstrap
            | RequestKind::SanctionGenerate
            | RequestKind::SanctionAccept => Modality::System,
        }
    }
}

// ---------------------------------------------------------------------------
// PendingRequest / Busy
// ---------------------------------------------------------------------------

/// The exchange currently holding the slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub kind: RequestKind,
    pub issued_at: DateTime<Utc>,
    /// Client session id the request was issued for.
    pub session_id: String,
}

impl PendingRequest {
    pub fn modality(&self) -> Modality {
        self.kind.modality()
    }
}

/// Rejection returned while another exchange is outstanding.
#[derive(Debug, Clone, PartialEq)]
pub struct Busy {
    pub holder: RequestKind,
}

impl fmt::Display for Busy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "a {} request is already in flight",
            self.holder.modality().label()
        )
    }
}

impl std::error::Error for Busy {}

// ---------------------------------------------------------------------------
// RequestSerializer
// ---------------------------------------------------------------------------

/// Guards the single in-flight slot.
///
/// Cheap to clone; clones share the slot.
#[derive(Clone, Default)]
pub struct RequestSerializer {
    slot: Arc<Mutex<Option<PendingRequest>>>,
}

impl RequestSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `kind`, or fail with [`Busy`] if it is taken.
    ///
    /// ```
    /// use loan_chat_client::engine::{RequestKind, RequestSerializer};
    ///
    /// let serializer = RequestSerializer::new();
    /// let guard = serializer.try_admit(RequestKind::Text, "sess_1").unwrap();
    /// assert!(serializer.try_admit(RequestKind::Voice, "sess_1").is_err());
    /// drop(guard);
    /// assert!(serializer.try_admit(RequestKind::Voice, "sess_1").is_ok());
    /// ```
    pub fn try_admit(&self, kind: RequestKind, session_id: &str) -> Result<InFlightGuard, Busy> {
        let mut slot = self.slot.lock().unwrap();
        if let Some(pending) = slot.as_ref() {
            log::debug!(
                "serializer: rejecting {:?}, {:?} still in flight",
                kind,
                pending.kind
            );
            return Err(Busy {
                holder: pending.kind,
            });
        }

        *slot = Some(PendingRequest {
            kind,
            issued_at: Utc::now(),
            session_id: session_id.to_string(),
        });
        log::debug!("serializer: admitted {:?} for {session_id}", kind);

        Ok(InFlightGuard {
            slot: Arc::clone(&self.slot),
            kind,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }

    pub fn pending(&self) -> Option<PendingRequest> {
        self.slot.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// InFlightGuard
// ---------------------------------------------------------------------------

/// Holds the slot until released or dropped.
#[must_use = "dropping the guard immediately frees the in-flight slot"]
pub struct InFlightGuard {
    slot: Arc<Mutex<Option<PendingRequest>>>,
    kind: RequestKind,
}

impl InFlightGuard {
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Free the slot now.
    pub fn release(self) {
        drop(self);
    }

    /// Keep the slot and relabel it as `kind`.
    pub fn handoff(mut self, kind: RequestKind) -> InFlightGuard {
        if let Ok(mut slot) = self.slot.lock() {
            if let Some(pending) = slot.as_mut() {
                log::debug!("serializer: handing {:?} over to {:?}", pending.kind, kind);
                pending.kind = kind;
                pending.issued_at = Utc::now();
            }
        }
        self.kind = kind;
        self
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_admission_is_rejected_while_first_is_held() {
        let serializer = RequestSerializer::new();
        let guard = serializer.try_admit(RequestKind::Text, "s").unwrap();

        let err = serializer
            .try_admit(RequestKind::DocumentTransfer, "s")
            .err()
            .expect("busy");
        assert_eq!(err.holder, RequestKind::Text);
        assert_eq!(err.to_string(), "a text request is already in flight");
        assert!(serializer.is_busy());

        guard.release();
        assert!(!serializer.is_busy());
    }

    #[test]
    fn release_allows_immediate_follow_up() {
        let serializer = RequestSerializer::new();
        let transfer = serializer
            .try_admit(RequestKind::DocumentTransfer, "s")
            .unwrap();
        transfer.release();

        let event = serializer.try_admit(RequestKind::DocumentEvent, "s").unwrap();
        assert_eq!(event.kind(), RequestKind::DocumentEvent);
    }

    #[test]
    fn handoff_keeps_the_slot_and_relabels_it() {
        let serializer = RequestSerializer::new();
        let transfer = serializer
            .try_admit(RequestKind::DocumentTransfer, "s")
            .unwrap();

        let event = transfer.handoff(RequestKind::DocumentEvent);
        assert_eq!(event.kind(), RequestKind::DocumentEvent);
        let pending = serializer.pending().expect("still held");
        assert_eq!(pending.kind, RequestKind::DocumentEvent);
        assert_eq!(pending.session_id, "s");

        let err = serializer.try_admit(RequestKind::Text, "s").err().expect("busy");
        assert_eq!(err.holder, RequestKind::DocumentEvent);

        drop(event);
        assert!(!serializer.is_busy());
    }

    #[test]
    fn pending_describes_holder() {
        let serializer = RequestSerializer::new();
        assert!(serializer.pending().is_none());

        let _guard = serializer.try_admit(RequestKind::Voice, "sess_9").unwrap();
        let pending = serializer.pending().unwrap();
        assert_eq!(pending.modality(), Modality::Voice);
        assert_eq!(pending.session_id, "sess_9");
    }

    #[test]
    fn clones_share_the_slot() {
        let a = RequestSerializer::new();
        let b = a.clone();
        let _guard = a.try_admit(RequestKind::Bootstrap, "s").unwrap();
        assert!(b.try_admit(RequestKind::Text, "s").is_err());
    }

    #[test]
    fn guard_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<InFlightGuard>();
    }

    #[test]
    fn request_kinds_map_to_modalities() {
        assert_eq!(RequestKind::DocumentEvent.modality(), Modality::Upload);
        assert_eq!(RequestKind::SanctionAccept.modality(), Modality::System);
        assert_eq!(RequestKind::Text.modality(), Modality::Text);
    }
}
