//! Orchestrator service boundary.
//!
//! This module provides:
//! * [`OrchestratorClient`] — async trait for the remote decisioning service.
//! * [`HttpOrchestrator`] — `reqwest` implementation of the trait.
//! * [`OrchestratorState`] / [`OrchestratorResponse`] / [`OrchestratorRequest`]
//!   — the wire contract.
//! * [`OrchestratorError`] — everything that makes the service "unavailable".
//!
//! # Quick start
//!
//! ```rust,no_run
//! use loan_chat_client::config::AppConfig;
//! use loan_chat_client::orchestrator::{HttpOrchestrator, OrchestratorClient, OrchestratorRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let client = HttpOrchestrator::from_config(&config.orchestrator);
//!
//!     let greeting = client.send(&OrchestratorRequest::Bootstrap).await.unwrap();
//!     println!("{}", greeting.message_to_user);
//! }
//! ```

pub mod client;
pub mod http;
pub mod types;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{OrchestratorClient, OrchestratorError};
pub use http::HttpOrchestrator;
pub use types::{
    AudioPayload, DisbursementReceipt, DocumentPayload, NextAction, OrchestratorRequest,
    OrchestratorResponse, OrchestratorState, SanctionLetterDetails, TurnBody, UploadReceipt,
    DOCUMENT_UPLOADED_EVENT,
};

#[cfg(test)]
pub use client::ScriptedOrchestrator;
