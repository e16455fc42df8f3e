pub mod datasources;
pub mod queries;
pub mod storage;
