use std::sync::Arc;

use anyhow::Result;
use pvsite_datamodel::{api, config::Config, database::Database, telemetry};
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;

    let database = Database::new(&cfg.db).await?;
    let state = api::AppState::new(Arc::new(database.store()), cfg.forecast.clone());
    let app = api::router(state, &cfg.server);

    let addr = cfg.server.socket_addr()?;
    info!(%addr, day_ahead_gate = %cfg.forecast.day_ahead_gate, "starting pvsite api");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    database.close().await;
    warn!("shutdown complete");
    Ok(())
}
