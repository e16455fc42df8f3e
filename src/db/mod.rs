use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::prelude::*;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, sea_orm::DbErr> {
    debug!("Connecting to database...");
    let db = Database::connect(database_url).await?;
    debug!("Database connected successfully");

    // Run migrations
    debug!("Running database migrations...");
    migration::Migrator::up(&db, None).await?;
    debug!("Migrations completed successfully");

    Ok(db)
}

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool_options = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Some(Duration::from_secs(300)))
        .max_lifetime(Some(Duration::from_secs(900)));

    let mut attempts = 0;
    const MAX_ATTEMPTS: u8 = 3;

    loop {
        attempts += 1;
        match pool_options.clone().connect(database_url).await {
            Ok(pool) => {
                info!("Document store pool created (attempt {}/{})", attempts, MAX_ATTEMPTS);
                return Ok(pool);
            }
            Err(e) => {
                error!("Pool creation attempt {} failed: {}", attempts, e);
                if attempts >= MAX_ATTEMPTS {
                    return Err(e);
                }
                warn!("Retrying pool creation in 2 seconds...");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
