use std::sync::Arc;

use anyhow::Context;
use teams_relay::channels::WebhookClient;
use teams_relay::config::RelayConfig;
use teams_relay::relay::{self, RelayService};
use teams_relay::responder::{FallbackPolicy, ReplyGenerator};
use teams_relay::{server, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env().context("invalid relay configuration")?;
    let _log_guard = telemetry::init_tracing(config.server.log_dir.as_deref(), "webhook-relay");

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        claude_configured = config.llm.is_configured(),
        teams_configured = config.webhook_url.is_some(),
        model = %config.llm.model,
        "Teams webhook relay starting"
    );

    let llm = config
        .llm
        .create_provider()
        .context("failed to create LLM provider")?;
    let service = Arc::new(RelayService::new(
        ReplyGenerator::new(llm, FallbackPolicy::Static),
        WebhookClient::new(config.webhook_url.clone()),
    ));

    server::serve(relay::app(service), &config.server.addr())
        .await
        .context("relay server failed")?;

    Ok(())
}
