use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dunlin_worker::{Dispatcher, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dunlin_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    let pool = dunlin_db::create_pool(&config.database_url).await?;
    dunlin_db::run_migrations(&pool).await?;

    let cancel = CancellationToken::new();
    let dispatcher = Dispatcher::new(pool, config.refresh_interval);

    let loop_cancel = cancel.clone();
    let dispatcher_task = tokio::spawn(async move { dispatcher.run(loop_cancel).await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    cancel.cancel();
    dispatcher_task.await?;

    Ok(())
}
