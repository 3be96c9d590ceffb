//! Relaybox configuration management

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main Relaybox configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Messaging provider configuration
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed CORS origins for the management API (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
        }
    }
}

/// WhatsApp Business Cloud API configuration
///
/// Credentials are referenced by environment variable name, never stored
/// in the config file itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Business phone number id, the path segment of the send endpoint
    pub phone_number_id: String,

    /// Graph API base URL
    pub api_base: String,

    /// Graph API version segment
    pub api_version: String,

    /// Env var holding the Cloud API bearer token
    pub access_token_ref: String,

    /// Env var holding the webhook verification token
    pub verify_token_ref: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            phone_number_id: String::new(),
            api_base: "https://graph.facebook.com".to_string(),
            api_version: "v18.0".to_string(),
            access_token_ref: "WHATSAPP_ACCESS_TOKEN".to_string(),
            verify_token_ref: "WHATSAPP_VERIFY_TOKEN".to_string(),
        }
    }
}

/// Storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Volatile in-memory store
    Memory,
    /// SQLite database on disk
    Sqlite,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which backend holds conversations
    pub backend: StorageBackend,

    /// SQLite database path; defaults under the platform data dir
    pub db_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            db_path: None,
        }
    }
}

impl StorageConfig {
    /// Database path to open: the configured one, or
    /// `<data dir>/relaybox/inbox.db`
    pub fn database_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            dirs_next::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("relaybox")
                .join("inbox.db")
        })
    }
}

/// Resolve a credential from the environment variable it references
pub fn resolve_credential(credential_ref: &str) -> Result<String> {
    std::env::var(credential_ref).map_err(|_| {
        Error::Config(format!(
            "Failed to resolve credential from env var: {}",
            credential_ref
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert!(config.server.cors_origins.is_empty());
        assert_eq!(config.whatsapp.api_base, "https://graph.facebook.com");
        assert_eq!(config.whatsapp.api_version, "v18.0");
        assert_eq!(config.whatsapp.access_token_ref, "WHATSAPP_ACCESS_TOKEN");
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = RelayConfig::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: RelayConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.whatsapp.api_version, config.whatsapp.api_version);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml = r#"
            [server]
            host = "0.0.0.0"
            port = 8080

            [whatsapp]
            phone_number_id = "106540352242922"
            api_base = "https://graph.facebook.com"
            api_version = "v19.0"
            access_token_ref = "WA_TOKEN"
            verify_token_ref = "WA_VERIFY"
        "#;

        let config: RelayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.whatsapp.api_version, "v19.0");
        // Unlisted sections fall back to defaults
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.storage.db_path.is_none());
    }

    #[test]
    fn test_storage_backend_labels() {
        let config: StorageConfig = toml::from_str("backend = \"memory\"").unwrap();
        assert_eq!(config.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_database_path_override() {
        let config = StorageConfig {
            backend: StorageBackend::Sqlite,
            db_path: Some(PathBuf::from("/tmp/custom.db")),
        };
        assert_eq!(config.database_path(), PathBuf::from("/tmp/custom.db"));
    }

    #[test]
    fn test_resolve_credential() {
        std::env::set_var("RELAYBOX_TEST_CREDENTIAL", "secret");
        assert_eq!(
            resolve_credential("RELAYBOX_TEST_CREDENTIAL").unwrap(),
            "secret"
        );

        let result = resolve_credential("RELAYBOX_TEST_CREDENTIAL_UNSET");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
