//! Database execution capability.
//!
//! Everything above this module talks to the database through the
//! [`Driver`] trait. [`SqliteDriver`] is the bundled implementation.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use rusqlite::{params_from_iter, types::Value, Connection};
use tracing::{error, trace};

use crate::{
    catalog::{base_type, Column},
    decode::Rows,
    error::{DbError, Result},
    query::interpolate,
};

/// SQL flavour spoken by a driver, where statements differ between engines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dialect {
    #[default]
    Sqlite,
    Mysql,
}

impl Dialect {
    /// `UPDATE` statement touching at most one row matching `condition`.
    ///
    /// Bound arguments are the SET arguments followed by the condition's.
    pub fn update_one(&self, table: &str, assignments: &str, condition: &str) -> String {
        match self {
            Dialect::Sqlite => format!(
                "UPDATE {table} SET {assignments} WHERE rowid IN (SELECT rowid FROM {table} WHERE {condition} LIMIT 1)"
            ),
            Dialect::Mysql => format!("UPDATE {table} SET {assignments} WHERE {condition} LIMIT 1"),
        }
    }

    /// Statement reporting how `sql` would be executed.
    pub fn explain(&self, sql: &str) -> String {
        match self {
            Dialect::Sqlite => format!("EXPLAIN QUERY PLAN {sql}"),
            Dialect::Mysql => format!("EXPLAIN {sql}"),
        }
    }
}

/// Outcome of a statement that returns no rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub last_insert_id: i64,
    pub rows_affected: usize,
}

/// Executes statements and reads table metadata.
pub trait Driver: Send + Sync {
    fn query(&self, sql: &str, args: &[Value]) -> Result<Rows>;

    fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult>;

    /// Names of every user table.
    fn table_names(&self) -> Result<Vec<String>>;

    /// Columns of `table` in declaration order, empty when the table is unknown.
    fn table_columns(&self, table: &str) -> Result<Vec<Column>>;

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}

/// [`Driver`] over a single shared SQLite connection.
#[derive(Clone)]
pub struct SqliteDriver {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDriver {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| DbError::Connection(format!("{}: {e}", path.display())))?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| DbError::Connection(e.to_string()))?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Runs several `;` separated statements without arguments.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.lock()?
            .execute_batch(sql)
            .map_err(|e| failed(sql, &[], e))
    }
}

fn failed(sql: &str, args: &[Value], source: rusqlite::Error) -> DbError {
    let sql = interpolate(sql, args);
    error!("{}: {}", sql, source);
    DbError::Execution { sql, source }
}

impl Driver for SqliteDriver {
    fn query(&self, sql: &str, args: &[Value]) -> Result<Rows> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(|e| failed(sql, args, e))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt
            .query(params_from_iter(args.iter()))
            .map_err(|e| failed(sql, args, e))?;

        let mut values = Vec::new();
        while let Some(row) = rows.next().map_err(|e| failed(sql, args, e))? {
            let record = (0..columns.len())
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| failed(sql, args, e))?;
            values.push(record);
        }

        trace!("{} rows", values.len());
        Ok(Rows::new(columns, values))
    }

    fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        let conn = self.lock()?;
        let rows_affected = conn
            .execute(sql, params_from_iter(args.iter()))
            .map_err(|e| failed(sql, args, e))?;
        Ok(ExecResult {
            last_insert_id: conn.last_insert_rowid(),
            rows_affected,
        })
    }

    fn table_names(&self) -> Result<Vec<String>> {
        const SQL: &str = "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

        let conn = self.lock()?;
        let mut stmt = conn.prepare(SQL).map_err(|e| failed(SQL, &[], e))?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<String>>>())
            .map_err(|e| failed(SQL, &[], e))?;
        Ok(names)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<Column>> {
        const SQL: &str = "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid";

        let conn = self.lock()?;
        let mut stmt = conn.prepare(SQL).map_err(|e| failed(SQL, &[], e))?;
        let columns = stmt
            .query_map([table], |row| {
                let name: String = row.get(0)?;
                let column_type: String = row.get(1)?;
                let not_null: bool = row.get(2)?;
                let pk: i64 = row.get(3)?;
                Ok(Column {
                    name,
                    comment: String::new(),
                    data_type: base_type(&column_type),
                    column_type,
                    nullable: !not_null && pk == 0,
                })
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| failed(SQL, &[Value::Text(table.to_string())], e))?;
        Ok(columns)
    }
}
