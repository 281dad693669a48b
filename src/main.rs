use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;
use warikan::{
    auth::{ApiKey, API_KEY_HEADER},
    config::{Config, StorageBackend},
    handlers,
    service::Ledger,
    store::{GroupStore, MemoryStore, MongoStore},
};

fn cors(allowed_origins: &[String]) -> Cors {
    allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static("x-api-key"),
        ])
        .supports_credentials()
        .max_age(3600)
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn GroupStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Mongo => {
            let uri = config
                .mongo
                .uri
                .as_deref()
                .context("mongo.uri is required for the mongo backend")?;
            let store = MongoStore::connect(uri, &config.mongo.database)
                .await
                .context("Failed to connect to MongoDB")?;
            store.ping().await.context("MongoDB did not answer ping")?;
            Ok(Arc::new(store))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .json()
        .init();

    info!("Starting warikan...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;

    let store = open_store(&config).await?;
    let ledger = web::Data::new(Arc::new(Ledger::new(store, config.defaults.currency)));

    let api_key = web::Data::new(ApiKey::new(config.auth.api_key.as_deref()));
    if api_key.is_enabled() {
        info!(header = API_KEY_HEADER, "API key required");
    } else {
        info!("No API key configured, all requests are accepted");
    }

    let server = config.server.clone();
    let allowed_origins = config.cors.allowed_origins.clone();
    info!("Starting HTTP server on {}:{}", server.host, server.port);

    HttpServer::new(move || {
        App::new()
            .app_data(ledger.clone())
            .app_data(api_key.clone())
            .wrap(cors(&allowed_origins))
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(handlers::configure_routes)
    })
    .workers(server.workers)
    .bind((server.host.as_str(), server.port))?
    .run()
    .await?;

    Ok(())
}
