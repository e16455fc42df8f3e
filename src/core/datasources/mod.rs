pub mod resolver;

pub use resolver::{DatasourceResolver, ResolvedDatasource, StoreDatasourceResolver};
