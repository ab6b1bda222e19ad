mod config;
mod error;
mod llm;
mod prompt;
mod relay;

use anyhow::Context;
use config::Config;
use llm::LlmService;
use prompt::SystemPrompt;
use relay::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!("Using model {} via {}", config.upstream.model, config.upstream.api_url);
    info!("Error policy: {:?}, CORS origins: {:?}", config.error_policy, config.allowed_origins);

    let system_prompt = SystemPrompt::load(config.system_prompt_file.as_deref())?;
    let llm_service = LlmService::new(config.upstream.clone(), system_prompt)
        .context("Failed to create completion client")?;

    let state = AppState {
        llm: Arc::new(llm_service),
        policy: config.error_policy,
    };
    let app = relay::router(state, &config.allowed_origins)?;

    let addr = config.bind_addr();
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
