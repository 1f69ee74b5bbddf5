use std::net::SocketAddr;

use finsight::config::HostConfig;
use finsight::llm::CompletionClient;
use finsight::llm::config::CompletionConfig;
use finsight::rate_limit::{RateLimitConfig, RateLimiter};
use finsight::{routes, state};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let host = HostConfig::from_env().expect("invalid host config");
    let limits = RateLimitConfig::from_env();

    // Non-fatal: AI actions answer E_LLM_NOT_CONFIGURED when config is missing.
    let completion = match CompletionConfig::from_env() {
        Ok(config) => match CompletionClient::from_config(&config) {
            Ok(client) => {
                tracing::info!(
                    deployment = %config.deployment,
                    max_requests = limits.max_requests,
                    window_ms = limits.window.as_millis(),
                    "completion client initialized"
                );
                Some(client.with_rate_limiter(RateLimiter::from_config(limits)))
            }
            Err(e) => {
                tracing::warn!(error = %e, "completion client failed to build; AI actions disabled");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "completion endpoint not configured; AI actions disabled");
            None
        }
    };

    let state = state::AppState::new(completion, &host.tooltip, host.escape_model_html);
    tracing::info!(
        ai_enabled = state.router.ai_enabled(),
        escape_model_html = host.escape_model_html,
        "host state ready"
    );
    let app = routes::app(state);

    let addr = SocketAddr::new(host.bind_addr, host.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    tracing::info!(%addr, "finsight listening");
    axum::serve(listener, app).await.expect("server failed");
}
