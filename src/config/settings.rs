//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every section is `#[serde(default)]`, so a hand-edited `settings.toml`
//! only needs the keys it wants to change.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Environment variable that overrides [`OrchestratorConfig::base_url`].
pub const API_URL_ENV: &str = "LOAN_CHAT_API_URL";

// ---------------------------------------------------------------------------
// OrchestratorConfig
// ---------------------------------------------------------------------------

/// Connection settings for the remote decisioning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Scheme + host + port of the service, without a trailing slash.
    pub base_url: String,
    /// Versioned API prefix prepended to every endpoint path.
    pub api_prefix: String,
    /// Maximum seconds to wait for any single exchange.
    pub timeout_secs: u64,
    /// Text / bootstrap / document-event turns (JSON).
    pub orchestrate_path: String,
    /// Voice turns (multipart audio).
    pub voice_path: String,
    /// Document transfer (multipart PDF).
    pub upload_path: String,
    /// Sanction letter generation.
    pub sanction_generate_path: String,
    /// Sanction acceptance and disbursement.
    pub sanction_accept_path: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            api_prefix: "/api/v1".into(),
            timeout_secs: 30,
            orchestrate_path: "/chat/orchestrate".into(),
            voice_path: "/chat/voice".into(),
            upload_path: "/upload/salary-slip".into(),
            sanction_generate_path: "/sanction/generate".into(),
            sanction_accept_path: "/sanction/accept".into(),
        }
    }
}

impl OrchestratorConfig {
    /// Join `base_url`, `api_prefix` and `path` into a full endpoint URL.
    ///
    /// ```
    /// use loan_chat_client::config::OrchestratorConfig;
    ///
    /// let cfg = OrchestratorConfig::default();
    /// assert_eq!(
    ///     cfg.endpoint(&cfg.orchestrate_path),
    ///     "http://localhost:8000/api/v1/chat/orchestrate"
    /// );
    /// ```
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_end_matches('/'),
            path
        )
    }
}

// ---------------------------------------------------------------------------
// UploadConfig
// ---------------------------------------------------------------------------

/// Local validation and progress-simulation settings for document uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Largest accepted document in bytes.
    pub max_bytes: u64,
    /// The only content type accepted for the salary slip.
    pub accepted_content_type: String,
    /// Value sent as `uploaded_document_type` in the follow-up event.
    pub document_type: String,
    /// Interval between simulated progress ticks while the transfer runs.
    pub progress_tick_ms: u64,
    /// Progress added per tick (ratio, 0.0 – 1.0).
    pub progress_step: f32,
    /// Simulated progress never passes this value before the transfer settles.
    pub progress_ceiling: f32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            accepted_content_type: "application/pdf".into(),
            document_type: "salary_slip".into(),
            progress_tick_ms: 200,
            progress_step: 0.1,
            progress_ceiling: 0.9,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for voice capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the uploaded voice payload in Hz.
    pub sample_rate: u32,
    /// Recording stops accepting samples after this many seconds.
    pub max_recording_secs: f32,
    /// Recordings shorter than this are discarded instead of sent.
    pub min_recording_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            max_recording_secs: 60.0,
            min_recording_secs: 0.3,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Front-end embellishments layered on top of the request/response cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Emit the cosmetic "analyzing → verifying → underwriting" status steps
    /// before loan-related text turns.
    pub simulate_processing: bool,
    /// Pause between two cosmetic status steps.
    pub processing_step_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            simulate_processing: false,
            processing_step_ms: 800,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Where the conversation snapshot is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// File name of the snapshot inside [`AppPaths::data_dir`].
    pub file_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file_name: "session.json".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use loan_chat_client::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub orchestrator: OrchestratorConfig,
    pub upload: UploadConfig,
    pub audio: AudioConfig,
    pub ui: UiConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment overrides ([`API_URL_ENV`]).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.orchestrator.base_url = url.trim_end_matches('/').to_string();
            }
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.orchestrator.base_url, loaded.orchestrator.base_url);
        assert_eq!(original.orchestrator.api_prefix, loaded.orchestrator.api_prefix);
        assert_eq!(
            original.orchestrator.timeout_secs,
            loaded.orchestrator.timeout_secs
        );
        assert_eq!(original.upload.max_bytes, loaded.upload.max_bytes);
        assert_eq!(
            original.upload.accepted_content_type,
            loaded.upload.accepted_content_type
        );
        assert_eq!(original.audio.sample_rate, loaded.audio.sample_rate);
        assert_eq!(original.ui.simulate_processing, loaded.ui.simulate_processing);
        assert_eq!(original.session.file_name, loaded.session.file_name);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.orchestrator.base_url, "http://localhost:8000");
        assert_eq!(config.upload.max_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[orchestrator]\nbase_url = \"https://loans.example.com\"\n\n[ui]\nsimulate_processing = true\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).expect("load");
        assert_eq!(config.orchestrator.base_url, "https://loans.example.com");
        assert_eq!(config.orchestrator.api_prefix, "/api/v1");
        assert!(config.ui.simulate_processing);
        assert_eq!(config.ui.processing_step_ms, 800);
        assert_eq!(config.upload.accepted_content_type, "application/pdf");
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.orchestrator.timeout_secs, 30);
        assert_eq!(cfg.upload.document_type, "salary_slip");
        assert_eq!(cfg.upload.progress_tick_ms, 200);
        assert!((cfg.upload.progress_ceiling - 0.9).abs() < f32::EPSILON);
        assert_eq!(cfg.audio.sample_rate, 16_000);
        assert!(!cfg.ui.simulate_processing);
        assert_eq!(cfg.session.file_name, "session.json");
    }

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let cfg = OrchestratorConfig {
            base_url: "http://host:9000/".into(),
            api_prefix: "/api/v2/".into(),
            ..OrchestratorConfig::default()
        };
        assert_eq!(
            cfg.endpoint("/sanction/accept"),
            "http://host:9000/api/v2/sanction/accept"
        );
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.orchestrator.base_url = "https://api.bank.example".into();
        cfg.orchestrator.timeout_secs = 5;
        cfg.upload.max_bytes = 1024;
        cfg.audio.max_recording_secs = 10.0;
        cfg.ui.simulate_processing = true;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.orchestrator.base_url, "https://api.bank.example");
        assert_eq!(loaded.orchestrator.timeout_secs, 5);
        assert_eq!(loaded.upload.max_bytes, 1024);
        assert!((loaded.audio.max_recording_secs - 10.0).abs() < f32::EPSILON);
        assert!(loaded.ui.simulate_processing);
    }
}
