use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of the identity registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct ApplicationRow {
    pub app_id: String,
    pub app_name: String,
    pub created_at: NaiveDateTime,
}

/// A row of the key-value table. `created_at` is set once; `updated_at`
/// is refreshed on every upsert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct ConfigRow {
    pub id: i64,
    pub app_id: String,
    pub key: String,
    pub value: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
