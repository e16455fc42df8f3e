// Query execution and schema inference backend

pub mod api;
pub mod core;
pub mod db;
pub mod models;
pub mod utils;

// Re-export commonly used types for convenience
pub use crate::core::queries::{
    Integration, IntegrationError, IntegrationFactory, IntegrationRegistry, QueryRunner, QueryService,
};
pub use crate::core::storage::{DocumentStore, MemoryStore, PgDocumentStore};

pub use utils::error::AppError;
