//! Bot Connector client. Posts reply activities back to the channel service.
//!
//! Replies go to `{serviceUrl}/v3/conversations/{id}/activities/{replyToId}`.
//! When app credentials are configured, requests carry a bearer token from
//! the Bot Framework OAuth endpoint and are only sent to trusted channel
//! service hosts; without credentials (local emulator) no `Authorization`
//! header is sent and any host is accepted.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::activity::{
    ChannelAccount, ConversationAccount, ConversationReference, Formatting, OutgoingActivity,
};
use crate::error::ChannelError;

/// Bot Framework OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str =
    "https://login.microsoftonline.com/botframework.com/oauth2/v2.0/token";

const TOKEN_SCOPE: &str = "https://api.botframework.com/.default";

/// Channel service host suffixes trusted with the bot's token by default.
pub const DEFAULT_TRUSTED_SERVICE_HOSTS: &[&str] = &["botframework.com", "trafficmanager.net"];

/// Refresh tokens this long before they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Bound on each token or activity request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const CHANNEL_NAME: &str = "botframework";

/// Sends activities into a conversation.
///
/// The bot handler only depends on this trait, so any adapter (or a test
/// double) can carry its replies.
#[async_trait]
pub trait ActivitySender: Send + Sync {
    async fn send(
        &self,
        reference: &ConversationReference,
        activity: OutgoingActivity,
    ) -> Result<(), ChannelError>;
}

/// Microsoft app registration used to authenticate outgoing activities.
#[derive(Debug, Clone)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_password: SecretString,
}

struct CachedToken {
    value: SecretString,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Wire shape of an outgoing activity.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyActivity<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a ChannelAccount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient: Option<&'a ChannelAccount>,
    conversation: &'a ConversationAccount,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_id: Option<&'a str>,
}

impl<'a> ReplyActivity<'a> {
    fn new(reference: &'a ConversationReference, activity: &'a OutgoingActivity) -> Self {
        let (kind, text, text_format) = match activity {
            OutgoingActivity::Typing => ("typing", None, None),
            // Without textFormat, Teams renders the text as markdown.
            OutgoingActivity::Message(message) => {
                let format = match message.formatting {
                    Formatting::Plain => None,
                    Formatting::Card => Some("markdown"),
                };
                ("message", Some(message.text.as_str()), format)
            }
        };

        Self {
            kind,
            text,
            text_format,
            channel_id: reference.channel_id.as_deref(),
            from: reference.bot.as_ref(),
            recipient: reference.user.as_ref(),
            conversation: &reference.conversation,
            reply_to_id: reference.activity_id.as_deref(),
        }
    }
}

/// Build the activities URL for a conversation, threading under the inbound
/// activity when its id is known. Path segments are percent-encoded.
pub fn activities_url(reference: &ConversationReference) -> Result<Url, ChannelError> {
    let mut url = Url::parse(&reference.service_url).map_err(|e| {
        ChannelError::InvalidMessage(format!(
            "invalid serviceUrl {}: {}",
            reference.service_url, e
        ))
    })?;

    {
        let mut segments = url.path_segments_mut().map_err(|_| {
            ChannelError::InvalidMessage(format!(
                "serviceUrl cannot be a base: {}",
                reference.service_url
            ))
        })?;
        segments
            .pop_if_empty()
            .extend(["v3", "conversations", reference.conversation.id.as_str(), "activities"]);
        if let Some(id) = &reference.activity_id {
            segments.push(id);
        }
    }

    Ok(url)
}

/// True when `host` equals a trusted entry or is a subdomain of one.
/// Entries may be written as `*.example.com`.
pub fn host_is_trusted(host: &str, trusted: &[String]) -> bool {
    let host = host.to_ascii_lowercase();
    trusted.iter().any(|entry| {
        let entry = entry.trim().trim_start_matches("*.").to_ascii_lowercase();
        !entry.is_empty()
            && (host == entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|rest| rest.ends_with('.')))
    })
}

/// HTTP client for the Bot Connector REST API.
pub struct ConnectorClient {
    client: reqwest::Client,
    credentials: Option<AppCredentials>,
    token_url: String,
    token: Mutex<Option<CachedToken>>,
    trusted_hosts: Vec<String>,
    timeout: Duration,
}

impl ConnectorClient {
    pub fn new(credentials: Option<AppCredentials>) -> Self {
        Self::with_token_url(credentials, DEFAULT_TOKEN_URL)
    }

    /// Create a client that fetches tokens from `token_url` (for testing).
    pub fn with_token_url(credentials: Option<AppCredentials>, token_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            token_url: token_url.to_string(),
            token: Mutex::new(None),
            trusted_hosts: DEFAULT_TRUSTED_SERVICE_HOSTS
                .iter()
                .map(|h| h.to_string())
                .collect(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Trust additional service hosts (emulator tunnels, sovereign clouds).
    pub fn with_trusted_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_hosts.extend(hosts.into_iter().map(Into::into));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// With credentials configured, only trusted hosts may receive activities.
    fn check_service_host(&self, url: &Url) -> Result<(), ChannelError> {
        if self.credentials.is_none() {
            return Ok(());
        }
        let host = url.host_str().unwrap_or_default();
        if host_is_trusted(host, &self.trusted_hosts) {
            return Ok(());
        }
        tracing::warn!(%host, "Refusing to send activity to untrusted serviceUrl");
        Err(ChannelError::AuthFailed {
            name: CHANNEL_NAME.into(),
            reason: format!("untrusted serviceUrl host {:?}", host),
        })
    }

    /// Current bearer token, fetching a new one when missing or near expiry.
    async fn bearer_token(&self) -> Result<Option<SecretString>, ChannelError> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(Some(token.value.clone()));
            }
        }

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.app_id.as_str()),
            ("client_secret", credentials.app_password.expose_secret()),
            ("scope", TOKEN_SCOPE),
        ];
        let resp = self
            .client
            .post(&self.token_url)
            .timeout(self.timeout)
            .form(&params)
            .send()
            .await
            .map_err(|e| ChannelError::AuthFailed {
                name: CHANNEL_NAME.into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(ChannelError::AuthFailed {
                name: CHANNEL_NAME.into(),
                reason: format!("token endpoint returned {}", resp.status()),
            });
        }

        let token: TokenResponse = resp.json().await.map_err(|e| ChannelError::AuthFailed {
            name: CHANNEL_NAME.into(),
            reason: format!("invalid token response: {}", e),
        })?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        let value = SecretString::from(token.access_token);
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
        });
        tracing::debug!(expires_in = lifetime.as_secs(), "Fetched Bot Framework token");

        Ok(Some(value))
    }
}

#[async_trait]
impl ActivitySender for ConnectorClient {
    async fn send(
        &self,
        reference: &ConversationReference,
        activity: OutgoingActivity,
    ) -> Result<(), ChannelError> {
        let url = activities_url(reference)?;
        self.check_service_host(&url)?;
        let body = ReplyActivity::new(reference, &activity);

        let mut request = self.client.post(url).timeout(self.timeout).json(&body);
        if let Some(token) = self.bearer_token().await? {
            request = request.bearer_auth(token.expose_secret());
        }

        let resp = request.send().await.map_err(|e| ChannelError::SendFailed {
            name: CHANNEL_NAME.into(),
            reason: e.to_string(),
        })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: format!("connector returned {}: {}", status, err),
            });
        }

        tracing::debug!(
            conversation = %reference.conversation.id,
            kind = body.kind,
            "Activity sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::activity::OutgoingMessage;

    fn reference(service_url: &str, activity_id: Option<&str>) -> ConversationReference {
        ConversationReference {
            service_url: service_url.to_string(),
            channel_id: Some("msteams".into()),
            conversation: ConversationAccount {
                id: "a:1/b c".into(),
                name: None,
                is_group: None,
            },
            bot: Some(ChannelAccount {
                id: "bot".into(),
                name: Some("Claude".into()),
            }),
            user: Some(ChannelAccount {
                id: "user".into(),
                name: None,
            }),
            activity_id: activity_id.map(str::to_string),
        }
    }

    #[test]
    fn activities_url_threads_under_inbound_activity() {
        let url = activities_url(&reference("https://smba.example/emea/", Some("42"))).unwrap();
        assert_eq!(
            url.as_str(),
            "https://smba.example/emea/v3/conversations/a:1%2Fb%20c/activities/42"
        );
    }

    #[test]
    fn activities_url_without_activity_id() {
        let url = activities_url(&reference("http://localhost:3979", None)).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3979/v3/conversations/a:1%2Fb%20c/activities"
        );
    }

    #[test]
    fn activities_url_rejects_garbage() {
        let err = activities_url(&reference("not a url", None)).unwrap_err();
        assert!(matches!(err, ChannelError::InvalidMessage(_)));
    }

    #[test]
    fn reply_activity_addresses_the_sender() {
        let reference = reference("https://smba.example/", Some("42"));
        let activity = OutgoingActivity::Message(OutgoingMessage::plain("Antwort"));
        let json = serde_json::to_value(ReplyActivity::new(&reference, &activity)).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["text"], "Antwort");
        assert!(json.get("textFormat").is_none());
        assert_eq!(json["from"]["id"], "bot");
        assert_eq!(json["recipient"]["id"], "user");
        assert_eq!(json["replyToId"], "42");
        assert_eq!(json["conversation"]["id"], "a:1/b c");
    }

    #[test]
    fn typing_activity_has_no_text() {
        let reference = reference("https://smba.example/", None);
        let activity = OutgoingActivity::Typing;
        let json = serde_json::to_value(ReplyActivity::new(&reference, &activity)).unwrap();
        assert_eq!(json["type"], "typing");
        assert!(json.get("text").is_none());
        assert!(json.get("replyToId").is_none());
    }

    #[test]
    fn card_message_is_sent_as_markdown() {
        let reference = reference("https://smba.example/", None);
        let activity = OutgoingActivity::Message(OutgoingMessage::card("**fett**"));
        let json = serde_json::to_value(ReplyActivity::new(&reference, &activity)).unwrap();
        assert_eq!(json["textFormat"], "markdown");
    }

    fn trusted(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn default_hosts_cover_bot_framework_services() {
        let defaults = trusted(DEFAULT_TRUSTED_SERVICE_HOSTS);
        assert!(host_is_trusted("smba.trafficmanager.net", &defaults));
        assert!(host_is_trusted("webchat.botframework.com", &defaults));
        assert!(host_is_trusted("SMBA.TrafficManager.net", &defaults));
        assert!(!host_is_trusted("evil.example", &defaults));
        assert!(!host_is_trusted("evilbotframework.com", &defaults));
        assert!(!host_is_trusted("botframework.com.evil.example", &defaults));
        assert!(!host_is_trusted("127.0.0.1", &defaults));
    }

    #[test]
    fn extra_hosts_accept_exact_and_wildcard_entries() {
        let hosts = trusted(&["127.0.0.1", "*.ngrok.example", " "]);
        assert!(host_is_trusted("127.0.0.1", &hosts));
        assert!(host_is_trusted("abc.ngrok.example", &hosts));
        assert!(!host_is_trusted("localhost", &hosts));
        assert!(!host_is_trusted("", &hosts));
    }

    #[test]
    fn authenticated_client_rejects_untrusted_service_url() {
        let client = ConnectorClient::new(Some(AppCredentials {
            app_id: "id".into(),
            app_password: SecretString::from("pw"),
        }));
        let url = Url::parse("http://evil.example/v3/conversations").unwrap();
        assert!(matches!(
            client.check_service_host(&url),
            Err(ChannelError::AuthFailed { .. })
        ));
        let url = Url::parse("https://smba.trafficmanager.net/emea/v3").unwrap();
        assert!(client.check_service_host(&url).is_ok());
    }

    #[test]
    fn unauthenticated_client_accepts_any_host() {
        let url = Url::parse("http://localhost:3979/v3/conversations").unwrap();
        assert!(ConnectorClient::new(None).check_service_host(&url).is_ok());
    }

    #[test]
    fn client_without_credentials_is_unauthenticated() {
        assert!(!ConnectorClient::new(None).is_authenticated());
    }
}
