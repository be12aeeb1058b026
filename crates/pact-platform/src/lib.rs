pub mod config;
pub mod db;
pub mod pg_store;
pub mod redis_bus;

pub use config::ServiceConfig;
pub use db::{connect_database, ensure_schema};
pub use pg_store::PgDocumentStore;
pub use redis_bus::RedisBus;
