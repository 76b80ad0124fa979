//! `HttpOrchestrator`: the production [`OrchestratorClient`] over HTTP.
//!
//! All connection details come from [`OrchestratorConfig`]; nothing is
//! hardcoded.  JSON turns go to `orchestrate_path`; voice recordings and
//! documents travel as `multipart/form-data` with the conversation id in the
//! query string, which is what the service's file endpoints expect.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;

use crate::config::OrchestratorConfig;

use super::client::{OrchestratorClient, OrchestratorError};
use super::types::{
    AudioPayload, DisbursementReceipt, DocumentPayload, OrchestratorRequest,
    OrchestratorResponse, SanctionLetterDetails, UploadReceipt,
};

/// Longest error body kept in [`OrchestratorError::Status`].
const MAX_ERROR_BODY: usize = 512;

// ---------------------------------------------------------------------------
// HttpOrchestrator
// ---------------------------------------------------------------------------

/// Talks to the orchestrator service with a shared `reqwest::Client`.
pub struct HttpOrchestrator {
    client: reqwest::Client,
    config: OrchestratorConfig,
}

impl HttpOrchestrator {
    /// Build a client from config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default client is used if the builder fails.
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        self.config.endpoint(path)
    }

    async fn post_voice(
        &self,
        conversation_id: Option<&str>,
        audio: &AudioPayload,
    ) -> Result<OrchestratorResponse, OrchestratorError> {
        let part = Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name.clone())
            .mime_str(&audio.content_type)
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);

        let mut req = self.client.post(self.url(&self.config.voice_path));
        if let Some(id) = conversation_id {
            req = req.query(&[("conversation_id", id)]);
        }

        decode(req.multipart(form).send().await?).await
    }
}

/// Turn a raw response into `T`, mapping non-2xx statuses to
/// [`OrchestratorError::Status`].
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, OrchestratorError> {
    let status = response.status();
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(OrchestratorError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| OrchestratorError::Decode(e.to_string()))
}

#[async_trait]
impl OrchestratorClient for HttpOrchestrator {
    async fn send(
        &self,
        request: &OrchestratorRequest,
    ) -> Result<OrchestratorResponse, OrchestratorError> {
        if let OrchestratorRequest::Voice {
            conversation_id,
            audio,
        } = request
        {
            log::debug!(
                "orchestrator: voice turn ({} bytes, {:.1}s)",
                audio.bytes.len(),
                audio.duration_secs
            );
            return self.post_voice(conversation_id.as_deref(), audio).await;
        }

        let body = request
            .turn_body()
            .ok_or_else(|| OrchestratorError::Transport("request has no JSON body".into()))?;

        let response = self
            .client
            .post(self.url(&self.config.orchestrate_path))
            .json(&body)
            .send()
            .await?;

        decode(response).await
    }

    async fn upload_document(
        &self,
        conversation_id: &str,
        document: &DocumentPayload,
    ) -> Result<UploadReceipt, OrchestratorError> {
        let part = Part::bytes(document.bytes.clone())
            .file_name(document.file_name.clone())
            .mime_str(&document.content_type)
            .map_err(|e| OrchestratorError::Transport(e.to_string()))?;
        let form = Form::new()
            .text("session_id", conversation_id.to_string())
            .part("file", part);

        let response = self
            .client
            .post(self.url(&self.config.upload_path))
            .query(&[("conversation_id", conversation_id)])
            .multipart(form)
            .send()
            .await?;

        decode(response).await
    }

    async fn generate_sanction(
        &self,
        conversation_id: &str,
    ) -> Result<SanctionLetterDetails, OrchestratorError> {
        let response = self
            .client
            .post(self.url(&self.config.sanction_generate_path))
            .query(&[("conversation_id", conversation_id)])
            .send()
            .await?;

        decode(response).await
    }

    async fn accept_sanction(
        &self,
        conversation_id: &str,
    ) -> Result<DisbursementReceipt, OrchestratorError> {
        let response = self
            .client
            .post(self.url(&self.config.sanction_accept_path))
            .query(&[("conversation_id", conversation_id)])
            .send()
            .await?;

        decode(response).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
