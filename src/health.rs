//! Liveness payloads shared by both services.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Which external integrations are configured. Never carries the values.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFlags {
    pub claude_configured: bool,
    pub teams_configured: bool,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigFlags>,
}

impl HealthStatus {
    pub fn healthy(config: Option<ConfigFlags>) -> Self {
        Self {
            status: "healthy",
            timestamp: now_rfc3339(),
            config,
        }
    }
}

/// Current UTC time as RFC 3339 with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
