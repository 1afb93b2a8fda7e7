//! Configuration types, built once from the environment at startup.
//!
//! Every `from_env` has a `from_vars` twin that takes a lookup function, so
//! tests can supply variables without touching the process environment.
//! Empty values are treated as unset.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;

use crate::channels::AppCredentials;
use crate::error::{ConfigError, LlmError};
use crate::llm::{self, LlmConfig, LlmProvider};

/// Default port of the bot endpoint.
pub const DEFAULT_BOT_PORT: u16 = 3978;

/// Default port of the webhook relay.
pub const DEFAULT_RELAY_PORT: u16 = 3000;

const DEFAULT_BIND: &str = "0.0.0.0";

fn var<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn port<F>(lookup: &F, default: u16) -> Result<u16, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(lookup, "PORT") {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: "PORT".to_string(),
            message: format!("expected a port number, got {:?}", raw),
        }),
        None => Ok(default),
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Claude API settings shared by both services.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// `None` disables the AI call entirely.
    pub api_key: Option<SecretString>,
    pub api_base: String,
    pub model: String,
}

impl LlmSettings {
    pub fn from_vars<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            api_key: var(lookup, "CLAUDE_API_KEY").map(SecretString::from),
            api_base: var(lookup, "CLAUDE_API_URL")
                .unwrap_or_else(|| llm::DEFAULT_API_BASE.to_string()),
            model: var(lookup, "CLAUDE_MODEL").unwrap_or_else(|| llm::DEFAULT_MODEL.to_string()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Provider config, or `None` when no API key is set.
    pub fn llm_config(&self) -> Option<LlmConfig> {
        let api_key = self.api_key.clone()?;
        Some(LlmConfig {
            api_key,
            api_base: self.api_base.clone(),
            model: self.model.clone(),
            timeout: llm::REQUEST_TIMEOUT,
        })
    }

    /// Build the provider, or `None` when no API key is set.
    pub fn create_provider(&self) -> Result<Option<Arc<dyn LlmProvider>>, LlmError> {
        self.llm_config()
            .map(|config| llm::create_provider(&config))
            .transpose()
    }
}

/// Listener and log settings shared by both services.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
    /// Directory for rolling log files; stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl ServerSettings {
    pub fn from_vars<F>(lookup: &F, default_port: u16) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            bind: var(lookup, "RELAY_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: port(lookup, default_port)?,
            log_dir: var(lookup, "RELAY_LOG_DIR").map(PathBuf::from),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Configuration of the `teams-bot` service.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub llm: LlmSettings,
    /// Microsoft app registration; `None` runs unauthenticated (emulator).
    pub app_credentials: Option<AppCredentials>,
    /// Service hosts trusted in addition to the Bot Framework defaults.
    pub trusted_service_hosts: Vec<String>,
    pub server: ServerSettings,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env_lookup)
    }

    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_id = var(&lookup, "MicrosoftAppId");
        let app_password = var(&lookup, "MicrosoftAppPassword");
        let app_credentials = match (app_id, app_password) {
            (Some(app_id), Some(password)) => Some(AppCredentials {
                app_id,
                app_password: SecretString::from(password),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingRequired {
                    key: "MicrosoftAppPassword".to_string(),
                    hint: "MicrosoftAppId is set; set its password as well".to_string(),
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingRequired {
                    key: "MicrosoftAppId".to_string(),
                    hint: "MicrosoftAppPassword is set; set the app id as well".to_string(),
                });
            }
        };

        let trusted_service_hosts = var(&lookup, "BOT_TRUSTED_SERVICE_HOSTS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            llm: LlmSettings::from_vars(&lookup),
            app_credentials,
            trusted_service_hosts,
            server: ServerSettings::from_vars(&lookup, DEFAULT_BOT_PORT)?,
        })
    }
}

/// Configuration of the `webhook-relay` service.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub llm: LlmSettings,
    /// Teams incoming webhook; delivery is skipped when unset.
    pub webhook_url: Option<String>,
    pub server: ServerSettings,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env_lookup)
    }

    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            llm: LlmSettings::from_vars(&lookup),
            webhook_url: var(&lookup, "TEAMS_WEBHOOK_URL"),
            server: ServerSettings::from_vars(&lookup, DEFAULT_RELAY_PORT)?,
        })
    }
}
