pub mod configuration;
pub mod db;
pub mod error;
pub mod loader;

pub use configuration::{APP_ID_KEY, APP_NAME_KEY, Configuration};
pub use db::{PostgresLoader, SqliteLoader};
pub use error::ConfigError;
pub use loader::{Backend, BackendKind, BackendSpec, ConfigLoader, ConfigMap};
