//! Digital health-identity registry: identifier issuance, benefits
//! eligibility and enrollment, family and hospital directories, medical
//! images and teleconsultation requests, served over JSON/HTTP.

pub mod config;
pub mod eligibility;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod models;
pub mod schema;
pub mod services;
pub mod store;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use config::RegistryConfig;
use error::RegistryResult;
use ids::RandomIdentifiers;
use services::Registry;
use store::DieselStore;

pub use handlers::configure;

/// Registry over `store` with random identifiers, hospitals seeded.
pub fn build_registry(store: DieselStore, config: RegistryConfig) -> RegistryResult<Registry> {
    let registry = Registry::new(Arc::new(store), Arc::new(RandomIdentifiers), config);
    let seeded = registry.directory.seed_hospitals()?;
    tracing::info!(seeded, "empaneled hospitals ready");
    Ok(registry)
}
