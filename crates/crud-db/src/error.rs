//! Error types for crud-db.

use miette::Diagnostic;
use thiserror::Error;

/// Database error type for crud-db operations.
#[derive(Error, Diagnostic, Debug)]
pub enum DbError {
    #[error("Invalid argument: {0}")]
    #[diagnostic(code(crud_db::invalid_argument))]
    InvalidArgument(String),

    #[error("Missing update key `{key}` for table `{table}`")]
    #[diagnostic(
        code(crud_db::missing_update_key),
        help("Every key column must be present in the fields being updated")
    )]
    MissingUpdateKey { table: String, key: String },

    #[error("Duplicate insert into `{table}`: a row with the same {columns} already exists")]
    #[diagnostic(
        code(crud_db::duplicate_insert),
        help("Use create_or_update to update the existing row instead")
    )]
    DuplicateInsert { table: String, columns: String },

    #[error("Failed to execute `{sql}`")]
    #[diagnostic(code(crud_db::execution))]
    Execution {
        sql: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Insert into `{table}` produced no row id")]
    #[diagnostic(code(crud_db::insert_failed))]
    InsertFailed { table: String },

    #[error("No rows in `{table}` matched the update")]
    #[diagnostic(
        code(crud_db::no_rows_affected),
        help("Check that the key columns identify an existing row")
    )]
    NoRowsAffected { table: String },

    #[error("Record of `{table}` has no id")]
    #[diagnostic(
        code(crud_db::missing_id),
        help("Only records read from or created in the database can be updated or deleted")
    )]
    MissingId { table: String },

    #[error("Failed to decode column `{column}`: {reason}")]
    #[diagnostic(code(crud_db::decode))]
    Decode { column: String, reason: String },

    #[error("Database connection failed: {0}")]
    #[diagnostic(
        code(crud_db::connection),
        help("Check if the database file exists and is accessible")
    )]
    Connection(String),

    #[error("Database connection lock poisoned")]
    #[diagnostic(code(crud_db::poisoned))]
    Poisoned,
}

impl DbError {
    /// Whether the error is a duplicate-insert condition.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DbError::DuplicateInsert { .. })
    }
}

/// Result type alias for crud-db operations.
pub type Result<T> = std::result::Result<T, DbError>;
