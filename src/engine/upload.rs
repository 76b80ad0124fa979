//! Document upload: local validation, task lifecycle and simulated progress.
//!
//! ```text
//! Selected ──admit──▶ Uploading ──transfer ok──▶ Succeeded
//!                              ──transfer err─▶ Failed
//! ```
//!
//! Validation runs before the request serializer is ever asked for the slot,
//! so a rejected file can never reach the network.

use std::path::Path;

use thiserror::Error;

use crate::config::UploadConfig;
use crate::orchestrator::DocumentPayload;

// ---------------------------------------------------------------------------
// DocumentError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    #[error("unsupported document type {found}; expected {expected}")]
    WrongType { found: String, expected: String },

    #[error("document is {size} bytes; the limit is {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("document is empty")]
    Empty,

    #[error("could not read document: {0}")]
    Unreadable(String),
}

/// Guess a content type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Check the declared type and size against `config`.
pub fn validate(content_type: &str, size: u64, config: &UploadConfig) -> Result<(), DocumentError> {
    if !content_type.eq_ignore_ascii_case(&config.accepted_content_type) {
        return Err(DocumentError::WrongType {
            found: content_type.to_string(),
            expected: config.accepted_content_type.clone(),
        });
    }
    if size == 0 {
        return Err(DocumentError::Empty);
    }
    if size > config.max_bytes {
        return Err(DocumentError::TooLarge {
            size,
            max: config.max_bytes,
        });
    }
    Ok(())
}

/// Validate `path` from its metadata, then read it.
///
/// Type and size are checked before the file body is read, so an oversized
/// file is rejected without loading it.
pub async fn read_document(path: &Path, config: &UploadConfig) -> Result<DocumentPayload, DocumentError> {
    let content_type = content_type_for(path);
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| DocumentError::Unreadable(e.to_string()))?;
    if !meta.is_file() {
        return Err(DocumentError::Unreadable(format!(
            "{} is not a file",
            path.display()
        )));
    }
    validate(content_type, meta.len(), config)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DocumentError::Unreadable(e.to_string()))?;
    // The file may have changed between the two calls.
    validate(content_type, bytes.len() as u64, config)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".into());

    Ok(DocumentPayload {
        file_name,
        content_type: content_type.to_string(),
        bytes,
    })
}

// ---------------------------------------------------------------------------
// UploadTask
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Selected,
    Uploading,
    Succeeded,
    Failed,
}

/// One document on its way to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTask {
    pub file_name: String,
    /// Declared document type, e.g. `salary_slip`.
    pub document_type: String,
    pub size: u64,
    pub state: UploadState,
    /// Fraction in `[0.0, 1.0]`.  Simulated while uploading.
    pub progress: f32,
}

impl UploadTask {
    pub fn new(payload: &DocumentPayload, document_type: &str) -> Self {
        Self {
            file_name: payload.file_name.clone(),
            document_type: document_type.to_string(),
            size: payload.bytes.len() as u64,
            state: UploadState::Selected,
            progress: 0.0,
        }
    }

    pub fn begin(&mut self) {
        self.state = UploadState::Uploading;
        self.progress = 0.0;
    }

    /// Advance simulated progress by `step`, never past `ceiling`.
    ///
    /// Only moves while uploading.  Returns the new progress.
    pub fn tick(&mut self, step: f32, ceiling: f32) -> f32 {
        if self.state == UploadState::Uploading {
            self.progress = (self.progress + step).min(ceiling).max(self.progress);
        }
        self.progress
    }

    pub fn succeed(&mut self) {
        self.state = UploadState::Succeeded;
        self.progress = 1.0;
    }

    pub fn fail(&mut self) {
        self.state = UploadState::Failed;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
