//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\loan-chat\
//!   macOS:   ~/Library/Application Support/loan-chat/
//!   Linux:   ~/.config/loan-chat/
//!
//! Data dir (persisted conversation):
//!   Windows: %LOCALAPPDATA%\loan-chat\
//!   macOS:   ~/Library/Application Support/loan-chat/
//!   Linux:   ~/.local/share/loan-chat/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory holding the persisted conversation snapshot.
    pub data_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "loan-chat";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");

        Self {
            config_dir,
            settings_file,
            data_dir,
        }
    }

    /// Full path of the persisted session record named `file_name`.
    pub fn session_file(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
