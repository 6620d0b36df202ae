use anyhow::Result;
use cf_analytics_exporter::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct UtcTimer;

impl FormatTime for UtcTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(UtcTimer)
        .with_env_filter(filter)
        .init();

    tracing::info!(version = version::VERSION, "starting {}", version::NAME);
    let app_config = config::AppConfig::load()?;

    let store = Arc::new(
        datastore::SqliteFactStore::connect(
            &app_config.database.path,
            app_config.database.max_pool_size,
        )
        .await?,
    );
    let source = Arc::new(analytics_api::GraphQlClient::from_env(&app_config.api)?);
    let admission = admission::from_config(&app_config.admission)?;

    let scheduler = scheduler::Scheduler::new(
        scheduler::SchedulerDeps {
            source,
            store: store.clone(),
            admission,
            clock: Arc::new(clock::SystemClock),
        },
        scheduler::SchedulerConfig::from_app_config(&app_config),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let mut scheduler_handle = scheduler::spawn(scheduler, shutdown_rx);
    let retention_handle = retention_worker::spawn(
        store,
        retention_worker::RetentionWorkerConfig::from(&app_config.database),
    );

    let outcome = tokio::select! {
        result = &mut scheduler_handle => result?,
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            scheduler_handle.await?
        }
    };
    retention_handle.abort();

    match outcome? {
        scheduler::ExitReason::AdmissionLost => {
            tracing::warn!("exiting: instance is no longer admitted to run");
        }
        scheduler::ExitReason::Shutdown => tracing::info!("exiting"),
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
