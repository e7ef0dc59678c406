use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mediregistry::config::AppConfig;
use mediregistry::store::DieselStore;
use mediregistry::{build_registry, configure};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    // RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let store = DieselStore::open(&config.database_url, config.pool_size)
        .with_context(|| format!("opening database at {}", config.database_url))?;
    let registry = build_registry(store, config.registry.clone()).context("seeding reference data")?;
    let registry = web::Data::new(registry);

    info!(host = %config.host, port = config.port, database = %config.database_url, "starting health registry");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(registry.clone())
            .configure(configure)
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("binding {}:{}", config.host, config.port))?
    .run()
    .await
    .context("server terminated")
}
