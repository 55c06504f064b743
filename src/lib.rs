pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

pub use api::handlers;
pub use api::routes;

pub use error::{AuthoringError, AuthoringResult};

pub use logic::{
    AuthoringSession, InstanceView, ModifierCompatibility, ModifierMenu, ModifierRegistry,
    OperationOutcome, ReferenceEngine, TemplateCatalog, TreeMutator, TreeOperation, TypeResolver,
};

pub use model::*;

pub use store::{ArtifactStore, MemoryStore, PostgresStore};

use anyhow::Context;
use std::sync::Arc;

/// Modifier registry and template catalog from the configured JSON files,
/// or the built-in lists when none are configured
pub fn load_catalogs(
    config: &config::CatalogConfig,
) -> anyhow::Result<(ModifierRegistry, TemplateCatalog)> {
    let registry = match &config.modifiers_path {
        Some(path) => ModifierRegistry::from_json_file(path)
            .with_context(|| format!("Failed to load modifiers from {}", path.display()))?,
        None => ModifierRegistry::new(seed::default_modifiers())?,
    };
    let catalog = match &config.templates_path {
        Some(path) => TemplateCatalog::from_json_file(path)
            .with_context(|| format!("Failed to load templates from {}", path.display()))?,
        None => TemplateCatalog::new(seed::default_templates())?,
    };
    Ok((registry, catalog))
}

/// Router with its state attached, ready to serve
pub fn build_app<S: ArtifactStore + 'static>(
    store: Arc<S>,
    registry: ModifierRegistry,
    catalog: TemplateCatalog,
) -> axum::Router {
    let context = api::handlers::ApiContext::new(store, registry, catalog);
    api::routes::create_router().with_state(Arc::new(context))
}

/// Load configuration, connect the configured store and serve until shutdown
pub async fn run_server() -> anyhow::Result<()> {
    use crate::config::{AppConfig, StorageBackend};
    use log::info;
    use tokio::net::TcpListener;

    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    let (registry, catalog) = load_catalogs(&config.catalog)?;
    info!(
        "Loaded {} modifiers and {} template categories",
        registry.len(),
        catalog.categories().len()
    );

    let app = match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory artifact store");
            build_app(Arc::new(MemoryStore::new()), registry, catalog)
        }
        StorageBackend::Postgres => {
            info!("Connecting to PostgreSQL...");
            let store = PostgresStore::new(&config.database_url(), config.max_connections()).await?;
            store.migrate().await?;
            build_app(Arc::new(store), registry, catalog)
        }
    };

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("CDS authoring server running on http://{}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
