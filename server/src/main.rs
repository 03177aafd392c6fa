use clap::{Parser, ValueEnum};
use log::{error, info};
use server::service::{MatchmakingService, ServiceConfig};
use server::store::{DocumentStore, HttpDocumentStore, MemoryStore};
use server::watchdog::spawn_watchdog;
use shared::{DEFAULT_PORT, RESULT_RETENTION_SECS, STORE_TIMEOUT_MS, WATCHDOG_INTERVAL_MS};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Keep player documents in process memory
    Memory,
    /// Mirror player documents to an HTTP document service
    Http,
}

/// Main-method of the application.
/// Parses command-line arguments, then starts the watchdog and the HTTP server.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Watchdog sweep period, also the silence after which a player is dropped
        #[clap(long, default_value_t = WATCHDOG_INTERVAL_MS)]
        watchdog_interval_ms: u64,
        /// Seconds a result waits for its second fetch
        #[clap(long, default_value_t = RESULT_RETENTION_SECS)]
        result_retention_secs: u64,
        /// Document store backend
        #[clap(long, value_enum, default_value_t = StoreKind::Memory)]
        store: StoreKind,
        /// Base URL of the document service (required with --store http)
        #[clap(long)]
        store_url: Option<String>,
        /// Milliseconds before a document store call is abandoned
        #[clap(long, default_value_t = STORE_TIMEOUT_MS)]
        store_timeout_ms: u64,
    }

    env_logger::init();

    let args = Args::parse();

    let store_timeout = Duration::from_millis(args.store_timeout_ms);
    let store: Arc<dyn DocumentStore> = match (args.store, args.store_url.as_deref()) {
        (StoreKind::Memory, _) => Arc::new(MemoryStore::new()),
        (StoreKind::Http, Some(url)) => {
            info!("Mirroring player documents to {}", url);
            Arc::new(HttpDocumentStore::new(url, store_timeout)?)
        }
        (StoreKind::Http, None) => return Err("--store http requires --store-url".into()),
    };

    let config = ServiceConfig {
        watchdog_interval: Duration::from_millis(args.watchdog_interval_ms),
        result_retention: Duration::from_secs(args.result_retention_secs),
        store_timeout,
    };
    let service = Arc::new(MatchmakingService::new(store, config));

    let address = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&address).await?;

    let watchdog_handle = spawn_watchdog(Arc::clone(&service));
    let server_handle = tokio::spawn(server::http::serve(listener, Arc::clone(&service)));

    // Handle shutdown gracefully
    tokio::select! {
        result = server_handle => {
            match result {
                Ok(Err(e)) => error!("HTTP server stopped: {}", e),
                Err(e) => error!("HTTP server task panicked: {}", e),
                Ok(Ok(())) => {}
            }
        }
        result = watchdog_handle => {
            if let Err(e) = result {
                error!("Watchdog task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
