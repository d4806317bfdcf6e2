use duespool::{
    api, config::Config, db::init_db, Directory, HttpDirectory, HttpProcessor, PaymentProcessor,
    Repository,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // INFO default so payout and settlement events show; RUST_LOG adds per-target directives.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Migrations run before any collaborator touches the ledger.
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let directory: Arc<dyn Directory> = Arc::new(HttpDirectory::new(
        config.directory_api_url.clone(),
        config.http_retry_max,
    ));
    let processor: Arc<dyn PaymentProcessor> = Arc::new(HttpProcessor::new(
        config.processor_api_url.clone(),
        config.processor_api_key.clone(),
        config.checkout_return_url.clone(),
        config.http_retry_max,
    ));

    let app = api::create_router(api::AppState::new(repo, config, directory, processor));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
