//! Client engine for a conversational loan-application assistant.
//!
//! * [`config`] — TOML settings and platform paths.
//! * [`orchestrator`] — wire contract and HTTP client for the decisioning service.
//! * [`session`] — session model, state merge, UI mode machine, persistence.
//! * [`audio`] — microphone capture, buffering and WAV encoding.
//! * [`engine`] — [`engine::ConversationEngine`], which ties it all together.

pub mod audio;
pub mod config;
pub mod engine;
pub mod orchestrator;
pub mod session;
