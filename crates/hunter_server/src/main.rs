use anyhow::{Context, Result};
use clap::Parser;
use hunter_engine::ensure_output_dir;
use hunter_logging::{hunter_info, hunter_warn};
use hunter_server::{build_router, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    let config = Config::parse();
    config.validate()?;

    if !hunter_logging::initialize(config.log_destination()?, config.log_level) {
        eprintln!("Warning: logger was not initialized");
    }

    ensure_output_dir(&config.output_dir)
        .with_context(|| format!("preparing {}", config.output_dir.display()))?;

    let state = AppState::from_config(&config)?;
    let orchestrator = state.orchestrator.clone();
    let app = build_router(state, &config.cors_origins);

    let address = config.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    hunter_info!(
        "listening on {} (provider {:?}, output {})",
        address,
        config.provider,
        config.output_dir.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    hunter_info!("stopping background jobs");
    orchestrator.shutdown().await;
    hunter_info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        hunter_warn!("cannot listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
    hunter_info!("shutdown requested");
}
