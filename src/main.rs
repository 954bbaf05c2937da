use cors_relay::config::Config;
use cors_relay::server::Listener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "cors_relay=info".into()),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let listener = Listener::bind(&cfg).await?;
    let addr = listener.local_addr()?;

    tracing::info!("CORS relay running: http://{}", addr);
    tracing::info!(
        "Example: http://{}/?url=https://api.binance.com/api/v3/ticker/24hr",
        addr
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        }
    });

    listener.run(shutdown_rx).await?;

    tracing::info!("Relay stopped");
    Ok(())
}
