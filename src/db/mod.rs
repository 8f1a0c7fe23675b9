//! Relational persistence: the dual-table model shared by the SQLite and
//! PostgreSQL loaders.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL templates and table-name validation
//! - `sqlite.rs` / `postgres.rs`: one loader per engine

pub mod models;
pub mod postgres;
pub mod schema;
pub mod sqlite;

pub use models::{ApplicationRow, ConfigRow};
pub use postgres::PostgresLoader;
pub use sqlite::SqliteLoader;
