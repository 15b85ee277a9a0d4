use anyhow::Context;
use gym_manager::api::{routes::create_routes, AppState};
use gym_manager::auth::JwtService;
use gym_manager::config::{run_migrations, AppConfig, DatabaseConfig, DatabaseSeeder};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    config.init_tracing();

    if config.is_development() {
        warn!("Running in development mode; do not expose this instance publicly");
    }

    let pool = DatabaseConfig::from_env()?
        .create_pool()
        .await
        .context("failed to connect to the database")?;
    run_migrations(&pool).await?;
    DatabaseSeeder::new(pool.clone()).seed_all(&config).await?;

    let state = AppState::new(pool, JwtService::from_config(&config));
    let app = create_routes(state);

    let address = config.server_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    info!("Gym manager listening on http://{}", address);
    info!("Health check available at http://{}/health", address);

    axum::serve(listener, app).await?;

    Ok(())
}
