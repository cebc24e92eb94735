use anyhow::Context;

use jobwork_infra::LedgerConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    jobwork_observability::init();

    let bind_addr =
        std::env::var("JOBWORK_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let config = LedgerConfig::from_env();
    tracing::info!(
        max_attempts = config.max_attempts,
        contention_timeout_ms = config.contention_timeout.as_millis() as u64,
        "ledger configured"
    );

    let app = jobwork_api::app::build_app(config);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}
