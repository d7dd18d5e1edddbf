//! TaskRoute — single-binary task routing and execution server.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod routes;
mod state;
mod worker;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("TASKROUTE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--help" | "-h" | "help" => {
                println!("TaskRoute — SLA- and budget-aware task routing server");
                println!();
                println!("Usage: taskroute [command]");
                println!();
                println!("Commands:");
                println!("  (none)      Start the server");
                println!("  backends    Print the backend catalog and exit");
                println!("  help        Show this help message");
                println!();
                println!("Environment: TASKROUTE_DATA_DIR, PORT, TASKROUTE_MAX_ATTEMPTS,");
                println!("  TASKROUTE_JITTER_MS, TASKROUTE_WEBHOOK_URL, TASKROUTE_DEFAULT_KIND,");
                println!("  TASKROUTE_DEFAULT_SLA, TASKROUTE_DEFAULT_BUDGET, RUST_LOG");
                return Ok(());
            }
            "--backends" | "backends" => {
                let config = taskroute_core::TaskRouteConfig::from_env(resolve_data_dir())?;
                let catalog = taskroute_router::BackendCatalog::load_or_default(&config.data_paths.catalog_file)?;
                println!("{}", serde_json::to_string_pretty(catalog.backends())?);
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'taskroute help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let config = taskroute_core::TaskRouteConfig::from_env(&data_dir)?;
    let port = config.port;

    let store = taskroute_store::SqliteStore::open(&config.data_paths.db)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;

    let catalog = taskroute_router::BackendCatalog::load_or_default(&config.data_paths.catalog_file)
        .map_err(|e| anyhow::anyhow!("Failed to load backend catalog: {}", e))?;

    let state = Arc::new(AppState::new(config, store, catalog)?);

    // Resumes ingestions in-process unless a webhook takes the events.
    worker::start_resume_worker(state.clone());

    let app = routes::build_router(state.clone());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("TaskRoute server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
