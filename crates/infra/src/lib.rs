//! Infrastructure layer: persistence backends, seeding and configuration.

pub mod config;
pub mod seed;
pub mod store;

pub use config::{AppConfig, ConfigError, StoreBackend};
pub use store::{InMemoryStore, LabtrackStore};
#[cfg(feature = "postgres")]
pub use store::PostgresStore;
