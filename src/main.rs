use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use roombook::cli::Console;
use roombook::config::Config;
use roombook::engine::Engine;
use roombook::limits::SHUTDOWN_DRAIN_SECS;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they don't interleave with the console menu.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = runtime.block_on(run());
    // The stdin reader thread may still be parked in a blocking read.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    roombook::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let engine = Arc::new(Engine::open(config.wal_path(), config.compact_threshold)?);

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("roombook listening on http://{addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  export_dir: {}", config.export_dir.display());
    info!("  console: {}", if config.console { "enabled" } else { "disabled" });
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let app = roombook::http::router(engine.clone());
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await
    });

    // Quitting the console stops the whole process, as does a signal.
    let console = async {
        if !config.console {
            return std::future::pending::<()>().await;
        }
        let mut console = Console::new(
            engine.clone(),
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            config.export_dir.clone(),
        );
        if let Err(e) = console.run().await {
            error!("console error: {e}");
        }
        info!("console closed");
    };

    tokio::select! {
        _ = console => {}
        _ = shutdown_signal() => info!("shutdown signal received"),
    }

    info!("draining connections...");
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(Duration::from_secs(SHUTDOWN_DRAIN_SECS), server).await {
        Ok(Ok(Ok(()))) => info!("all connections drained"),
        Ok(Ok(Err(e))) => error!("http server error: {e}"),
        Ok(Err(e)) => error!("http server task failed: {e}"),
        Err(_) => warn!("drain timeout, in-flight requests dropped"),
    }

    info!("roombook stopped");
    Ok(())
}

/// Resolves on ctrl-c, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
