//! Conversation engine for the loan-application chat client.
//!
//! This module turns user intents (typed text, a document, a recording,
//! sanction actions) into orchestrator exchanges and folds every settled
//! result back into the session.
//!
//! # Architecture
//!
//! ```text
//! send_text / upload_document / stop_voice / generate_sanction_letter ...
//!        │
//!        ├─ local validation (normalize_text, upload::validate, VoiceCapture)
//!        │
//!        ├─ RequestSerializer::try_admit   ── Busy ──▶ caller
//!        │
//!        ├─ OrchestratorClient (await)     ← only suspension point
//!        │
//!        └─ settle
//!              ├─ staleness check (session id captured at admission)
//!              ├─ merge_state + UiMode::next + projector
//!              ├─ swap session snapshot, SessionStore::save
//!              ├─ release slot (or hand it to the document event)
//!              └─ EngineEvent (mpsc) ───▶ front end
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//! use loan_chat_client::audio::CpalAudioSource;
//! use loan_chat_client::config::AppConfig;
//! use loan_chat_client::engine::{ConversationEngine, EngineEvent};
//! use loan_chat_client::orchestrator::HttpOrchestrator;
//! use loan_chat_client::session::MemorySessionStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     let engine = Arc::new(
//!         ConversationEngine::new(
//!             Arc::new(HttpOrchestrator::from_config(&config.orchestrator)),
//!             Arc::new(MemorySessionStore::new()),
//!             Arc::new(CpalAudioSource::new()),
//!             config,
//!         )
//!         .with_events(tx),
//!     );
//!
//!     tokio::spawn(async move {
//!         while let Some(event) = rx.recv().await {
//!             if let EngineEvent::MessageAppended(m) = event {
//!                 println!("{}", m.content);
//!             }
//!         }
//!     });
//!
//!     engine.bootstrap().await.unwrap();
//! }
//! ```

pub mod projector;
pub mod runner;
pub mod serializer;
pub mod text;
pub mod upload;
pub mod voice;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use projector::{EngineEvent, ExplainabilityPanel};
pub use runner::{ConversationEngine, EngineError, TurnOutcome};
pub use serializer::{Busy, InFlightGuard, Modality, RequestKind, RequestSerializer};
pub use text::ProcessingStep;
pub use upload::{DocumentError, UploadState, UploadTask};
pub use voice::{CaptureState, VoiceCapture, VoiceError};
