//! Configuration management
//!
//! Settings are resolved in the following order:
//! 1. environment variables
//! 2. the hc-gateway.toml configuration file
//! 3. defaults
//!
//! Inside the file, `${VAR_NAME}` expands to the value of that environment
//! variable.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Error;

/// WhatsApp Cloud API credentials and identifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Graph API access token (Bearer)
    pub access_token: String,

    /// Token the webhook subscription handshake must present
    pub verify_token: String,

    /// Business phone number id, the `/{id}/messages` path segment
    pub phone_number_id: String,

    /// App secret for X-Hub-Signature-256 validation; when unset the
    /// signature check is skipped
    pub app_secret: Option<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port the webhook server listens on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

/// User store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "data/hc-gateway.db".to_string()
}

/// Main configuration for hc-gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// WhatsApp credentials
    pub whatsapp: WhatsAppConfig,

    /// Webhook server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Persistence settings
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Expand `${VAR_NAME}` references to environment variable values.
    /// Unset variables expand to the empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // consume '{'

                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '}' {
                        chars.next(); // consume '}'
                        break;
                    }
                    var_name.push(chars.next().unwrap());
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load configuration from a TOML file, expanding `${VAR}` references
    /// and applying environment overrides on top.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let expanded_content = Self::expand_env_vars(&toml_content);

        let file: TomlConfig = toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        let mut cfg = Self::from_toml_config(file);
        cfg.apply_env_overrides();
        cfg.validate()?;

        Ok(cfg)
    }

    /// Load configuration from the default locations.
    ///
    /// Tries `./hc-gateway.toml` first; when absent, environment variables
    /// alone must supply the WhatsApp credentials.
    pub fn load() -> crate::Result<Self> {
        if Path::new("hc-gateway.toml").exists() {
            return Self::from_toml_file("hc-gateway.toml");
        }

        Self::from_env()
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = Config {
            whatsapp: WhatsAppConfig {
                access_token: String::new(),
                verify_token: String::new(),
                phone_number_id: String::new(),
                app_secret: None,
            },
            server: ServerConfig::default(),
            store: StoreConfig::default(),
        };

        cfg.apply_env_overrides();
        cfg.validate()?;

        Ok(cfg)
    }

    /// Build a Config from the parsed TOML structure
    fn from_toml_config(file: TomlConfig) -> Self {
        let whatsapp = file.whatsapp.unwrap_or_default();
        let server = file.server.unwrap_or_default();
        let store = file.store.unwrap_or_default();

        Config {
            whatsapp: WhatsAppConfig {
                access_token: whatsapp.access_token.unwrap_or_default(),
                verify_token: whatsapp.verify_token.unwrap_or_default(),
                phone_number_id: whatsapp.phone_number_id.unwrap_or_default(),
                app_secret: whatsapp.app_secret.filter(|s| !s.is_empty()),
            },
            server: ServerConfig {
                port: server.port.unwrap_or_else(default_port),
            },
            store: StoreConfig {
                db_path: store.db_path.unwrap_or_else(default_db_path),
            },
        }
    }

    /// Overlay environment variables on the current values
    fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("WHATSAPP_ACCESS_TOKEN") {
            if !token.is_empty() {
                self.whatsapp.access_token = token;
            }
        }
        if let Ok(token) = std::env::var("WHATSAPP_VERIFY_TOKEN") {
            if !token.is_empty() {
                self.whatsapp.verify_token = token;
            }
        }
        if let Ok(id) = std::env::var("WHATSAPP_PHONE_NUMBER_ID") {
            if !id.is_empty() {
                self.whatsapp.phone_number_id = id;
            }
        }
        if let Ok(secret) = std::env::var("WHATSAPP_APP_SECRET") {
            if !secret.is_empty() {
                self.whatsapp.app_secret = Some(secret);
            }
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            if !path.is_empty() {
                self.store.db_path = path;
            }
        }
    }

    /// Reject configurations that cannot talk to the Cloud API
    fn validate(&self) -> crate::Result<()> {
        if self.whatsapp.access_token.is_empty() {
            return Err(Error::Config(
                "WHATSAPP_ACCESS_TOKEN not set".to_string(),
            ));
        }
        if self.whatsapp.verify_token.is_empty() {
            return Err(Error::Config("WHATSAPP_VERIFY_TOKEN not set".to_string()));
        }
        if self.whatsapp.phone_number_id.is_empty() {
            return Err(Error::Config(
                "WHATSAPP_PHONE_NUMBER_ID not set".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// TOML structures (file parsing only)
// ============================================================================

#[derive(Debug, Deserialize)]
struct TomlConfig {
    whatsapp: Option<TomlWhatsAppConfig>,
    server: Option<TomlServerConfig>,
    store: Option<TomlStoreConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlWhatsAppConfig {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    verify_token: Option<String>,
    #[serde(default)]
    phone_number_id: Option<String>,
    #[serde(default)]
    app_secret: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlServerConfig {
    #[serde(default)]
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlStoreConfig {
    #[serde(default)]
    db_path: Option<String>,
}
