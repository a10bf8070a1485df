use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use newsparser_core::{api, AppConfig, AppContext};

/// Start the scheduler and serve the HTTP API until Ctrl+C
pub async fn run(config: AppConfig) -> Result<()> {
    let addr = config.listen_addr();
    let ctx = Arc::new(AppContext::from_config(config).await?);

    // A scheduler that cannot start is fatal at boot
    ctx.start()
        .await
        .context("Failed to start background scheduler")?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("News Parser API listening on http://{}", addr);

    axum::serve(listener, api::router(ctx.clone()))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
        })
        .await?;

    ctx.shutdown().await;
    println!("Server stopped.");

    Ok(())
}
