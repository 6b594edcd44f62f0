use std::sync::Arc;

use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally::config::Config;
use tally::db::{create_pool, AppState};
use tally::idempotency::IdempotencyGuard;
use tally::ledger::{init_db, LedgerStore, MemoryLedger, SqliteLedger};
use tally::models::{CreateBillingEntry, EntryStatus, EntryType};
use tally::payments::Providers;

#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(about = "Payment webhook verification and billing reconciliation service")]
struct Cli {
    /// Seed the ledger with dev data (a few pending entries per provider)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the ledger with pending entries for local webhook testing.
/// Only runs in dev mode and when the ledger is empty.
fn seed_dev_data(ledger: &dyn LedgerStore) {
    let existing = ledger.list_entries(1).expect("Failed to read ledger for seeding");
    if !existing.is_empty() {
        tracing::info!("Ledger already has data, skipping seed");
        return;
    }

    let fixtures = [
        ("jazzcash", "T20260101120000", 150_000.0, "PKR"),
        ("easypaisa", "E20260101120000", 99_900.0, "PKR"),
        ("paddle", "P1756400000000", 29.99, "USD"),
        ("stripe", "cs_test_dev_seed", 2_999.0, "USD"),
    ];

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV LEDGER");
    for (provider, tx, amount, currency) in fixtures {
        let entry = ledger
            .create_entry(CreateBillingEntry {
                provider: provider.to_string(),
                provider_tx_id: Some(tx.to_string()),
                entry_type: Some(EntryType::Charge),
                amount: Some(amount),
                currency: Some(currency.to_string()),
                status: Some(EntryStatus::Pending),
                ..Default::default()
            })
            .expect("Failed to seed ledger entry");
        tracing::info!("  {} {} -> {}", provider, tx, entry.id);
    }
    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    // Pick the ledger backend: SQLite when a path is configured, otherwise
    // an in-memory store that does not survive a restart.
    let ledger: Arc<dyn LedgerStore> = match config.database_path.as_deref() {
        Some(path) => {
            let pool = create_pool(path).expect("Failed to create database pool");
            {
                let conn = pool.get().expect("Failed to get connection");
                init_db(&conn).expect("Failed to initialize database");
            }
            tracing::info!("Ledger backed by SQLite at {}", path);
            Arc::new(SqliteLedger::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_PATH not set: ledger is in-memory and NON-DURABLE");
            Arc::new(MemoryLedger::new())
        }
    };

    let providers =
        Providers::from_config(&config).expect("Failed to build payment provider clients");

    if config.admin_api_key.is_none() {
        tracing::warn!("TALLY_ADMIN_API_KEY not set: admin endpoints are OPEN");
    }

    let state = AppState {
        ledger,
        providers: Arc::new(providers),
        guard: Arc::new(IdempotencyGuard::new()),
        admin_api_key: config.admin_api_key.clone(),
    };

    // Seed dev data if --seed flag is passed (only in dev mode)
    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set TALLY_ENV=dev)");
        } else {
            seed_dev_data(state.ledger.as_ref());
        }
    }

    let app = tally::build_router(state, config.checkout_rate_limit_rpm)
        .layer(TraceLayer::new_for_http());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Tally server listening on {}", addr);

    // Run server with graceful shutdown
    // Use into_make_service_with_connect_info to enable IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    // Cleanup on exit if ephemeral mode
    if cleanup_on_exit {
        if let Some(db_path) = db_path {
            tracing::info!("Cleaning up ephemeral database...");
            if let Err(e) = std::fs::remove_file(&db_path) {
                tracing::warn!("Failed to remove {}: {}", db_path, e);
            } else {
                tracing::info!("Removed {}", db_path);
            }
            // Also remove WAL and SHM files if they exist
            let _ = std::fs::remove_file(format!("{}-wal", db_path));
            let _ = std::fs::remove_file(format!("{}-shm", db_path));
        }
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
