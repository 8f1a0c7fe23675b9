use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ConfigError {
    /// The backing store cannot be reached: missing file, refused
    /// connection, permission denied.
    #[error("configuration source unavailable: {0}")]
    SourceUnavailable(String),

    /// The store was reachable but its content does not parse into a
    /// string-keyed mapping.
    #[error("malformed configuration source: {0}")]
    MalformedSource(String),

    /// A value cannot be represented in the target backend's encoding
    /// (nested structures written to the env or relational backends).
    #[error("unsupported value type for key `{key}`: {type_name}")]
    UnsupportedValueType {
        key: String,
        type_name: &'static str,
    },

    /// An operation was invoked without a required location parameter,
    /// e.g. a file loader with neither a path nor inline data.
    #[error("missing configuration target: {0}")]
    MissingTarget(&'static str),

    /// Table names are interpolated into SQL and therefore restricted to
    /// plain identifiers.
    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error("unsupported backend kind: {0:?}")]
    UnknownBackend(String),

    #[error("storage error: {0}")]
    Storage(#[from] SqlxError),
}
