use tokio::net::TcpListener;

use botbridge_server::auth::AuthCodeBroker;
use botbridge_server::chat::ChatHistoryCache;
use botbridge_server::config::{generate_config_template, Config};
use botbridge_server::db;
use botbridge_server::routes;
use botbridge_server::state::AppState;
use botbridge_server::store::Store;
use botbridge_server::stream::StreamRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "botbridge_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "botbridge_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!(
        "botbridge server v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    // Coordination core: stream registry, store, code broker, chat cache
    let streams = StreamRegistry::new(config.stream_config());
    let store = Store::new(db.clone(), streams.clone());
    let codes = AuthCodeBroker::new(config.auth_code_ttl());
    let chat = ChatHistoryCache::new(db.clone(), config.system_prompt.clone());

    // Rebuild the chat cache from persisted rows before serving
    chat.hydrate().await?;

    let state = AppState {
        db,
        codes,
        streams,
        store,
        chat,
    };

    let app = routes::build_router(state);
    let listener = TcpListener::bind(format!("{}:{}", config.bind_address, config.port)).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
