//! Core `OrchestratorClient` trait and its error type.
//!
//! The client is the only network boundary of the crate.  It performs one
//! exchange per call, never retries, and never touches session state; the
//! engine decides what a settled exchange means.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{
    DisbursementReceipt, DocumentPayload, OrchestratorRequest, OrchestratorResponse,
    SanctionLetterDetails, UploadReceipt,
};

// ---------------------------------------------------------------------------
// OrchestratorError
// ---------------------------------------------------------------------------

/// Why an exchange with the orchestrator did not produce a usable answer.
///
/// Every variant means "orchestrator unavailable" to the engine; the split
/// only exists for logging.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// Connection refused, DNS failure, TLS error, ...
    #[error("orchestrator request failed: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("orchestrator request timed out")]
    Timeout,

    /// Non-success HTTP status.
    #[error("orchestrator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body could not be decoded into the expected shape.
    #[error("malformed orchestrator response: {0}")]
    Decode(String),

    /// The service answered but refused the request (`success: false`).
    #[error("orchestrator rejected the request: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            OrchestratorError::Timeout
        } else if e.is_decode() {
            OrchestratorError::Decode(e.to_string())
        } else {
            OrchestratorError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// OrchestratorClient trait
// ---------------------------------------------------------------------------

/// Typed request/response boundary to the remote decisioning service.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn OrchestratorClient>`.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// Run one conversational turn (bootstrap, text, document event, voice).
    async fn send(
        &self,
        request: &OrchestratorRequest,
    ) -> Result<OrchestratorResponse, OrchestratorError>;

    /// Transfer a document for `conversation_id`.
    async fn upload_document(
        &self,
        conversation_id: &str,
        document: &DocumentPayload,
    ) -> Result<UploadReceipt, OrchestratorError>;

    /// Ask the service to issue the sanction letter.
    async fn generate_sanction(
        &self,
        conversation_id: &str,
    ) -> Result<SanctionLetterDetails, OrchestratorError>;

    /// Accept the issued sanction letter and trigger disbursement.
    async fn accept_sanction(
        &self,
        conversation_id: &str,
    ) -> Result<DisbursementReceipt, OrchestratorError>;
}

// Compile-time assertion: Box<dyn OrchestratorClient> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn OrchestratorClient>) {}
};

// ---------------------------------------------------------------------------
// ScriptedOrchestrator (test double)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub use scripted::ScriptedOrchestrator;

#[cfg(test)]
mod scripted {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::Semaphore;

    use super::*;

    /// Replays canned answers in order and records every call.
    ///
    /// When built with [`gated`](Self::gated), each call waits for a permit
    /// from [`release`](Self::release) before answering, which keeps an
    /// exchange in flight for as long as a test needs.
    pub struct ScriptedOrchestrator {
        turns: Mutex<VecDeque<Result<OrchestratorResponse, OrchestratorError>>>,
        uploads: Mutex<VecDeque<Result<UploadReceipt, OrchestratorError>>>,
        sanctions: Mutex<VecDeque<Result<SanctionLetterDetails, OrchestratorError>>>,
        accepts: Mutex<VecDeque<Result<DisbursementReceipt, OrchestratorError>>>,
        requests: Mutex<Vec<OrchestratorRequest>>,
        calls: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
    }

    impl ScriptedOrchestrator {
        pub fn new() -> Self {
            Self {
                turns: Mutex::new(VecDeque::new()),
                uploads: Mutex::new(VecDeque::new()),
                sanctions: Mutex::new(VecDeque::new()),
                accepts: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        pub fn gated() -> Self {
            Self {
                gate: Some(Arc::new(Semaphore::new(0))),
                ..Self::new()
            }
        }

        /// Let one waiting (or future) call proceed.
        pub fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        /// Queue a turn response given as JSON.
        pub fn push_turn(&self, body: Value) -> &Self {
            let resp = serde_json::from_value(body).expect("valid response json");
            self.turns.lock().unwrap().push_back(Ok(resp));
            self
        }

        pub fn push_turn_error(&self, err: OrchestratorError) -> &Self {
            self.turns.lock().unwrap().push_back(Err(err));
            self
        }

        pub fn push_upload(&self, receipt: Result<UploadReceipt, OrchestratorError>) -> &Self {
            self.uploads.lock().unwrap().push_back(receipt);
            self
        }

        pub fn push_sanction(&self, letter: SanctionLetterDetails) -> &Self {
            self.sanctions.lock().unwrap().push_back(Ok(letter));
            self
        }

        pub fn push_accept(&self, receipt: DisbursementReceipt) -> &Self {
            self.accepts.lock().unwrap().push_back(Ok(receipt));
            self
        }

        /// Total number of network calls of any kind.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Turn requests seen so far, in order.
        pub fn requests(&self) -> Vec<OrchestratorRequest> {
            self.requests.lock().unwrap().clone()
        }

        async fn enter(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire().await.expect("gate open").forget();
            }
        }

        fn exhausted() -> OrchestratorError {
            OrchestratorError::Transport("script exhausted".into())
        }
    }

    #[async_trait]
    impl OrchestratorClient for ScriptedOrchestrator {
        async fn send(
            &self,
            request: &OrchestratorRequest,
        ) -> Result<OrchestratorResponse, OrchestratorError> {
            self.requests.lock().unwrap().push(request.clone());
            self.enter().await;
            self.turns
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Self::exhausted()))
        }

        async fn upload_document(
            &self,
            _conversation_id: &str,
            _document: &DocumentPayload,
        ) -> Result<UploadReceipt, OrchestratorError> {
            self.enter().await;
            self.uploads
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Self::exhausted()))
        }

        async fn generate_sanction(
            &self,
            _conversation_id: &str,
        ) -> Result<SanctionLetterDetails, OrchestratorError> {
            self.enter().await;
            self.sanctions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Self::exhausted()))
        }

        async fn accept_sanction(
            &self,
            _conversation_id: &str,
        ) -> Result<DisbursementReceipt, OrchestratorError> {
            self.enter().await;
            self.accepts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Self::exhausted()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
