use salvo::Depot;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::datasources::StoreDatasourceResolver;
use crate::core::queries::{
    DynamicVariableManager, IntegrationRegistry, MemoryVariableCache, QueryEventSink, QueryRunner, QueryService,
    TracingEventSink,
};
use crate::core::storage::{DocumentStore, MemoryStore, PgDocumentStore};
use crate::db;
use crate::utils::{AppError, Config};

#[derive(Clone)]
pub struct AppState {
    /// Present only when documents are kept in Postgres
    pub db: Option<Arc<DatabaseConnection>>,
    pub config: Arc<Config>,
    pub query_service: Arc<QueryService>,
}

impl AppState {
    pub async fn new(config: &Config, registry: IntegrationRegistry) -> anyhow::Result<Self> {
        let (db, store): (Option<Arc<DatabaseConnection>>, Arc<dyn DocumentStore>) = match &config.database_url {
            Some(database_url) => {
                let db = db::connect(database_url).await?;
                let pool = db::create_pool(database_url).await?;
                info!("Using Postgres document store");
                let store: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(pool));
                (Some(Arc::new(db)), store)
            }
            None => {
                warn!("DATABASE_URL not set, documents are kept in memory and lost on restart");
                let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
                (None, store)
            }
        };

        if registry.sources().is_empty() {
            warn!("No integrations registered, every query run will fail with a configuration error");
        } else {
            info!("Registered integrations: {}", registry.sources().join(", "));
        }

        let state = AppState {
            db,
            config: Arc::new(config.clone()),
            query_service: Arc::new(build_query_service(config, store, registry)),
        };
        Ok(state)
    }
}

pub fn build_query_service(config: &Config, store: Arc<dyn DocumentStore>, registry: IntegrationRegistry) -> QueryService {
    let resolver = Arc::new(StoreDatasourceResolver::new(
        store.clone(),
        config.environment_variables.clone(),
    ));
    let cache = Arc::new(MemoryVariableCache::new(config.variable_cache_ttl));
    let events: Arc<dyn QueryEventSink> = Arc::new(TracingEventSink);

    QueryService::new(
        store.clone(),
        resolver,
        QueryRunner::new(registry, config.query_timeout),
        events,
        DynamicVariableManager::new(store, cache),
    )
}

pub fn get_app_state(depot: &Depot) -> Result<&AppState, AppError> {
    depot
        .obtain::<AppState>()
        .map_err(|_| AppError::InternalServerError("Application state not found".to_string()))
}
