use anyhow::Context;
use mentorlink::{
    app,
    auth::{Gate, SqliteIdentityGate},
    config::Config,
    db, AppState,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env(std::env::args().nth(1)).context("loading configuration")?;
    let db_pool = db::connect(&config.database)
        .await
        .context("opening database")?;

    let gate = Gate::new(SqliteIdentityGate::new(db_pool.clone()));
    let bind = config.server.bind.clone();
    let state = AppState::new(db_pool, gate, config);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!(%bind, "listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
