//! Convention-driven data access over a relational database.
//!
//! [`Database`] is the entry point. It hands out [`Table`]s for
//! create/read/update/delete, [`Search`]es for building `SELECT`
//! statements, and loads typed [`Record`]s together with the related
//! records it can infer from column names.

pub mod catalog;
pub mod connection;
pub mod database;
pub mod decode;
pub mod error;
pub mod graph;
pub mod macros;
pub mod query;
pub mod record;
pub mod relation;
pub mod table;

#[cfg(test)]
mod test_utils;

pub use catalog::{Catalog, Column, TableSchema};
pub use connection::{Dialect, Driver, ExecResult, SqliteDriver};
pub use database::{Criteria, Database, Options};
pub use decode::{RowMap, RowMapExt, RowMapsExt, RowRef, Rows, ValueMap};
pub use error::{DbError, Result};
pub use graph::{Graph, GraphReport};
pub use query::{qualify, Qualified, Search};
pub use record::{Record, Relation, Slot};
pub use relation::{Relationship, Resolver};
pub use rusqlite::types::Value;
pub use table::{Fields, Table, Upsert};
