use std::sync::Arc;
use std::time::Duration;

use coral_server::api::{self, AppState};
use coral_server::config::ServerConfig;
use coral_server::{ContributionService, ServiceOptions};
use coral_shared::constants::APP_NAME;
use coral_shared::{LevelTable, SystemClock};
use coral_store::SqliteLedger;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,coral_server=debug,coral_store=debug")),
        )
        .init();

    info!("Starting {APP_NAME} contribution server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        http_addr = %config.http_addr,
        ledger = %config.ledger_path.display(),
        max_top_k = config.max_top_k,
        admin_enabled = config.admin_token.is_some(),
        "Loaded configuration"
    );

    let levels = match &config.level_table_path {
        Some(path) => {
            let table = LevelTable::load(path)?;
            info!(path = %path.display(), tiers = table.tiers().len(), "Loaded level table");
            table
        }
        None => LevelTable::default(),
    };

    // -----------------------------------------------------------------------
    // 3. Open the ledger and rebuild standings from it
    // -----------------------------------------------------------------------
    let ledger = Arc::new(SqliteLedger::open_at(&config.ledger_path)?);
    let service = ContributionService::open(
        ledger,
        Arc::new(levels),
        Arc::new(SystemClock::new()),
        ServiceOptions {
            max_top_k: config.max_top_k,
        },
    )
    .await?;

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic cleanup of per-user award slots nobody is using
    let slots = service.slots().clone();
    let purge_every = Duration::from_secs(config.slot_purge_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(purge_every);
        loop {
            interval.tick().await;
            let purged = slots.purge_idle().await;
            if purged > 0 {
                tracing::debug!(purged, "Dropped idle award slots");
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    let app_state = AppState {
        service,
        config: Arc::new(config),
    };

    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
