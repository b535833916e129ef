//! Desk configuration loaded via OrthoConfig.
//!
//! Values come from `DIVEDESK_*` environment variables and configuration
//! files. Command-line flags belong to the CLI and are not read here.

use std::ffi::OsString;
use std::str::FromStr;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

use crate::domain::DEFAULT_AUDIT_LIMIT;
use crate::outbound::postgrest::PostgrestSettings;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Which storage adapter backs the desk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-process tables seeded with demo data.
    Memory,
    /// A PostgREST endpoint.
    Postgrest,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "demo" => Ok(Self::Memory),
            "postgrest" => Ok(Self::Postgrest),
            other => Err(ConfigError::UnknownBackend(other.to_owned())),
        }
    }
}

/// Configuration problems detected after loading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `backend` named an adapter that does not exist.
    #[error("unknown storage backend `{0}` (expected `memory` or `postgrest`)")]
    UnknownBackend(String),
    /// A setting required by the chosen backend is missing.
    #[error("`{0}` is required when the postgrest backend is selected")]
    Missing(&'static str),
    /// The PostgREST URL does not parse.
    #[error("invalid postgrest url `{url}`: {message}")]
    InvalidUrl {
        /// Raw value.
        url: String,
        /// Parser message.
        message: String,
    },
}

/// Resolved storage choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageChoice {
    /// Use the in-memory adapter.
    Memory,
    /// Use the PostgREST adapter with these settings.
    Postgrest(PostgrestSettings),
}

/// Settings for the desk binary.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "DIVEDESK")]
pub struct DeskSettings {
    /// Storage backend name: `memory` (default) or `postgrest`.
    pub backend: Option<String>,
    /// PostgREST base URL.
    pub postgrest_url: Option<String>,
    /// PostgREST API key.
    pub postgrest_key: Option<String>,
    /// HTTP request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Number of audit rows shown by the logs view.
    pub audit_limit: Option<usize>,
    /// Emit logs as JSON rather than human-readable text.
    #[ortho_config(default = false)]
    pub json_logs: bool,
}

impl DeskSettings {
    /// Load from the environment and configuration files only.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when a value fails to deserialise.
    pub fn load_without_cli() -> ortho_config::OrthoResult<Self> {
        Self::load_from_iter([OsString::from("divedesk")])
    }

    /// Configured backend, defaulting to memory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownBackend`] for unrecognised names.
    pub fn backend(&self) -> Result<StorageBackend, ConfigError> {
        self.backend
            .as_deref()
            .map_or(Ok(StorageBackend::Memory), StorageBackend::from_str)
    }

    /// Request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1))
    }

    /// Audit page size, never zero.
    #[must_use]
    pub fn audit_limit(&self) -> usize {
        self.audit_limit.unwrap_or(DEFAULT_AUDIT_LIMIT).max(1)
    }

    /// Resolve the storage adapter and its settings.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the backend name is unknown or the
    /// PostgREST settings are incomplete.
    pub fn storage(&self) -> Result<StorageChoice, ConfigError> {
        match self.backend()? {
            StorageBackend::Memory => Ok(StorageChoice::Memory),
            StorageBackend::Postgrest => {
                let raw_url = self
                    .postgrest_url
                    .as_deref()
                    .ok_or(ConfigError::Missing("postgrest_url"))?;
                let base_url = Url::parse(raw_url).map_err(|error| ConfigError::InvalidUrl {
                    url: raw_url.to_owned(),
                    message: error.to_string(),
                })?;
                let api_key = self
                    .postgrest_key
                    .clone()
                    .ok_or(ConfigError::Missing("postgrest_key"))?;
                Ok(StorageChoice::Postgrest(PostgrestSettings {
                    base_url,
                    api_key,
                    timeout: self.timeout(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for desk configuration parsing.

    use super::*;

    use env_lock::lock_env;
    use rstest::rstest;

    const KEYS: [&str; 6] = [
        "DIVEDESK_BACKEND",
        "DIVEDESK_POSTGREST_URL",
        "DIVEDESK_POSTGREST_KEY",
        "DIVEDESK_TIMEOUT_SECS",
        "DIVEDESK_AUDIT_LIMIT",
        "DIVEDESK_JSON_LOGS",
    ];

    fn cleared() -> Vec<(&'static str, Option<String>)> {
        KEYS.iter().map(|key| (*key, None)).collect()
    }

    fn with(overrides: &[(&'static str, &str)]) -> Vec<(&'static str, Option<String>)> {
        let mut vars = cleared();
        for (key, value) in overrides {
            if let Some(slot) = vars.iter_mut().find(|(name, _)| name == key) {
                slot.1 = Some((*value).to_owned());
            }
        }
        vars
    }

    #[rstest]
    fn defaults_select_the_memory_backend() {
        let _guard = lock_env(cleared());

        let settings = DeskSettings::load_without_cli().expect("config should load");

        assert_eq!(settings.storage().expect("storage"), StorageChoice::Memory);
        assert_eq!(settings.audit_limit(), DEFAULT_AUDIT_LIMIT);
        assert_eq!(settings.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(!settings.json_logs);
    }

    #[rstest]
    fn postgrest_settings_come_from_the_environment() {
        let _guard = lock_env(with(&[
            ("DIVEDESK_BACKEND", "postgrest"),
            ("DIVEDESK_POSTGREST_URL", "https://db.example/rest/v1"),
            ("DIVEDESK_POSTGREST_KEY", "anon"),
            ("DIVEDESK_TIMEOUT_SECS", "3"),
            ("DIVEDESK_AUDIT_LIMIT", "20"),
        ]));

        let settings = DeskSettings::load_without_cli().expect("config should load");

        let StorageChoice::Postgrest(postgrest) = settings.storage().expect("storage") else {
            panic!("expected postgrest backend");
        };
        assert_eq!(postgrest.base_url.as_str(), "https://db.example/rest/v1");
        assert_eq!(postgrest.api_key, "anon");
        assert_eq!(postgrest.timeout, Duration::from_secs(3));
        assert_eq!(settings.audit_limit(), 20);
    }

    #[rstest]
    fn postgrest_without_key_is_rejected() {
        let _guard = lock_env(with(&[
            ("DIVEDESK_BACKEND", "postgrest"),
            ("DIVEDESK_POSTGREST_URL", "https://db.example"),
        ]));

        let settings = DeskSettings::load_without_cli().expect("config should load");

        assert_eq!(
            settings.storage(),
            Err(ConfigError::Missing("postgrest_key"))
        );
    }

    #[rstest]
    #[case::memory("Memory", Ok(StorageBackend::Memory))]
    #[case::demo("demo", Ok(StorageBackend::Memory))]
    #[case::postgrest(" postgrest ", Ok(StorageBackend::Postgrest))]
    #[case::unknown("sqlite", Err(ConfigError::UnknownBackend("sqlite".to_owned())))]
    fn backend_names_parse(
        #[case] raw: &str,
        #[case] expected: Result<StorageBackend, ConfigError>,
    ) {
        assert_eq!(raw.parse::<StorageBackend>(), expected);
    }
}
