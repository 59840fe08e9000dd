use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

use event_registration_api::{
    app::{create_app, AppState},
    config::Config,
    jobs::{JobScheduler, PoolMetricsJob, RateLimitSweepJob, ScannerReaperJob, SessionCleanupJob},
    middleware::{init_logging, init_metrics},
    services::bootstrap_super_admin,
};
use persistence::repositories::StaffRepository;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    init_logging(&config.logging)?;
    init_metrics()?;

    info!("Starting event registration API v{}", env!("CARGO_PKG_VERSION"));

    let db_config: persistence::db::DatabaseConfig = (&config.database).into();
    let pool = persistence::db::create_pool(&db_config).await?;

    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    let addr = config.socket_addr()?;
    let state = AppState::with_postgres(config.clone(), pool.clone())?;

    if let Some(staff_id) = bootstrap_super_admin(state.staff.as_ref(), &config.admin).await? {
        info!(staff_id = %staff_id, "Super admin bootstrap applied");
    }

    let mut scheduler = JobScheduler::new();
    scheduler.register(PoolMetricsJob::new(pool.clone()));
    scheduler.register(SessionCleanupJob::new(StaffRepository::new(pool)));
    scheduler.register(ScannerReaperJob::new(state.scanners.clone()));
    if let Some(rate_limiter) = state.rate_limiter.clone() {
        scheduler.register(RateLimitSweepJob::new(rate_limiter));
    }
    scheduler.start();

    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    scheduler.shutdown();
    scheduler.wait_for_shutdown(Duration::from_secs(10)).await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
