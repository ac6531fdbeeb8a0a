use clap::Parser;
use gamemarket::application::catalog::{CatalogService, FixtureOutcome};
use gamemarket::config::{Cli, Command, StoreArgs};
use gamemarket::domain::ports::MarketStore;
use gamemarket::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use gamemarket::infrastructure::rocksdb::RocksDBStore;
use gamemarket::interfaces::csv::listing_reader::ListingReader;
use gamemarket::interfaces::http::{self, state::AppState};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LOG_FILTER: &str = "gamemarket=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let store_args = match &cli.command {
        Command::Serve(args) => args.store.clone(),
        Command::Import(args) => args.store.clone(),
    };
    dispatch(store_args, cli.command).await
}

#[cfg(feature = "storage-rocksdb")]
async fn dispatch(store: StoreArgs, command: Command) -> Result<()> {
    match &store.db_path {
        Some(path) => {
            // Use persistent storage (RocksDB)
            let db = RocksDBStore::open(path, store.lock_wait()).into_diagnostic()?;
            run(Arc::new(db), command).await
        }
        None => run(Arc::new(InMemoryStore::with_lock_wait(store.lock_wait())), command).await,
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
async fn dispatch(store: StoreArgs, command: Command) -> Result<()> {
    if let Some(path) = &store.db_path {
        warn!(
            path = %path.display(),
            "--db-path needs the `storage-rocksdb` feature; falling back to in-memory storage"
        );
    }
    run(Arc::new(InMemoryStore::with_lock_wait(store.lock_wait())), command).await
}

async fn run<S: MarketStore + 'static>(store: Arc<S>, command: Command) -> Result<()> {
    match command {
        Command::Serve(args) => {
            let state = AppState::new(store, args.http_settings());
            if let Some(fixture) = &args.fixture {
                import_fixture(&state.catalog, fixture).await?;
            }

            let listener = TcpListener::bind(args.bind).await.into_diagnostic()?;
            info!(addr = %args.bind, policy = ?args.self_purchase, "gamemarket listening");
            axum::serve(listener, http::router(state))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .into_diagnostic()?;
            Ok(())
        }
        Command::Import(args) => {
            let catalog = CatalogService::new(store.clone(), store.clone(), store);
            match import_fixture(&catalog, &args.input).await? {
                FixtureOutcome::Imported(count) => println!("Imported {count} listings"),
                FixtureOutcome::Skipped => println!("Catalog is not empty, fixture skipped"),
            }
            Ok(())
        }
    }
}

async fn import_fixture(catalog: &CatalogService, path: &Path) -> Result<FixtureOutcome> {
    let file = File::open(path).into_diagnostic()?;
    let mut listings = Vec::new();
    for row in ListingReader::new(file).listings() {
        match row {
            Ok(listing) => listings.push(listing),
            Err(e) => eprintln!("Error reading listing: {}", e),
        }
    }
    catalog.load_fixture(listings).await.into_diagnostic()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
