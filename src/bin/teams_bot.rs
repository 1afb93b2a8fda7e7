use std::sync::Arc;

use anyhow::Context;
use teams_relay::bot::{self, BotHandler};
use teams_relay::channels::ConnectorClient;
use teams_relay::config::BotConfig;
use teams_relay::responder::{FallbackPolicy, ReplyGenerator};
use teams_relay::{server, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env().context("invalid bot configuration")?;
    let _log_guard = telemetry::init_tracing(config.server.log_dir.as_deref(), "teams-bot");

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        claude_configured = config.llm.is_configured(),
        model = %config.llm.model,
        authenticated = config.app_credentials.is_some(),
        "Teams Claude bot starting"
    );

    let llm = config
        .llm
        .create_provider()
        .context("failed to create LLM provider")?;
    let generator = ReplyGenerator::new(llm, FallbackPolicy::Keywords);
    let connector = Arc::new(
        ConnectorClient::new(config.app_credentials.clone())
            .with_trusted_hosts(config.trusted_service_hosts.clone()),
    );
    let handler = Arc::new(BotHandler::new(generator, connector));

    tracing::info!(
        messages = "/api/messages",
        health = "/health",
        port = config.server.port,
        "Bot endpoints ready"
    );

    server::serve(bot::app(handler), &config.server.addr())
        .await
        .context("bot server failed")?;

    Ok(())
}
