use anyhow::Result;
use std::time::Duration;
use tracing::info;

use slingcheck::relay::{router, RelayConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let mut config = RelayConfig::default();
    if let Ok(url) = std::env::var("SLINGCHECK_ANTHROPIC_UPSTREAM") {
        config = config.with_anthropic_upstream(url);
    }
    if let Ok(url) = std::env::var("SLINGCHECK_OPENAI_UPSTREAM") {
        config = config.with_openai_upstream(url);
    }
    if let Ok(secs) = std::env::var("SLINGCHECK_RELAY_TIMEOUT_SECS") {
        config = config.with_timeout(Duration::from_secs(secs.parse()?));
    }

    let addr =
        std::env::var("SLINGCHECK_RELAY_ADDR").unwrap_or_else(|_| "0.0.0.0:8002".to_string());
    info!("Starting relay on {}", addr);
    info!("Anthropic: POST /anthropic/v1/messages -> {}", config.anthropic_upstream);
    info!("OpenAI: POST /openai/v1/chat/completions -> {}", config.openai_upstream);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(config)).await?;

    Ok(())
}
