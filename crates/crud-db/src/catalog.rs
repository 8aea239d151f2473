//! Per-table column metadata, loaded lazily from the database.
//!
//! The [`Catalog`] is shared by every component that needs to know which
//! tables and columns exist. A table's schema is fetched from the driver on
//! first access and kept for the lifetime of the catalog.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, RwLock},
};

use crud_utils::sql::unquote;
use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    connection::Driver,
    error::{DbError, Result},
};

/// Metadata of a single column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub comment: String,
    /// Declared type, as written in the table definition (`VARCHAR(64)`).
    pub column_type: String,
    /// Lower-case base type keyword (`varchar`).
    pub data_type: String,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        let column_type = column_type.into();
        Self {
            name: name.into(),
            comment: String::new(),
            data_type: base_type(&column_type),
            column_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// Extracts the base type keyword from a declared type,
/// `VARCHAR(255)` becomes `varchar`, `BIGINT UNSIGNED` becomes `bigint`.
pub fn base_type(declared: &str) -> String {
    declared
        .split(|c: char| c == '(' || c.is_whitespace())
        .find(|part| !part.is_empty())
        .unwrap_or_default()
        .to_lowercase()
}

/// The columns of one table, in declaration order.
///
/// An empty schema stands for a table the database does not know.
#[derive(Clone, Debug, Default)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, column)| (column.name.clone(), i))
            .collect();
        Self {
            name: name.into(),
            columns,
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    pub fn column(&self, column: &str) -> Option<&Column> {
        self.index.get(column).map(|&i| &self.columns[i])
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}

/// Read-through cache of table schemas.
///
/// Readers only take the map's read lock. Population of missing entries is
/// serialized through a single mutex, and the map is checked again once the
/// mutex is held, so concurrent first accesses of a table issue one metadata
/// query and all observe the same schema. Names the database does not know
/// are remembered as missing until [`Catalog::invalidate`] is called.
pub struct Catalog {
    driver: Option<Arc<dyn Driver>>,
    tables: RwLock<HashMap<String, Arc<TableSchema>>>,
    missing: RwLock<HashSet<String>>,
    populate: Mutex<()>,
}

impl Catalog {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver: Some(driver),
            tables: RwLock::new(HashMap::new()),
            missing: RwLock::new(HashSet::new()),
            populate: Mutex::new(()),
        }
    }

    /// Builds a catalog from fixed schemas. It never queries a database.
    pub fn with_tables<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = TableSchema>,
    {
        let tables = tables
            .into_iter()
            .map(|schema| (schema.name.clone(), Arc::new(schema)))
            .collect();
        Self {
            driver: None,
            tables: RwLock::new(tables),
            missing: RwLock::new(HashSet::new()),
            populate: Mutex::new(()),
        }
    }

    fn cached(&self, table: &str) -> Result<Option<Arc<TableSchema>>> {
        let tables = self.tables.read().map_err(|_| DbError::Poisoned)?;
        if let Some(schema) = tables.get(table) {
            return Ok(Some(schema.clone()));
        }
        let missing = self.missing.read().map_err(|_| DbError::Poisoned)?;
        Ok(missing
            .contains(table)
            .then(|| Arc::new(TableSchema::new(table, Vec::new()))))
    }

    /// Returns the schema of `table`, loading it on first access.
    pub fn columns(&self, table: &str) -> Result<Arc<TableSchema>> {
        let table = unquote(table);
        if let Some(schema) = self.cached(&table)? {
            return Ok(schema);
        }

        let Some(driver) = &self.driver else {
            return Ok(Arc::new(TableSchema::new(table, Vec::new())));
        };

        let _guard = self.populate.lock().map_err(|_| DbError::Poisoned)?;
        if let Some(schema) = self.cached(&table)? {
            return Ok(schema);
        }

        let schema = Arc::new(TableSchema::new(
            table.clone(),
            driver.table_columns(&table)?,
        ));
        if schema.is_empty() {
            debug!("table `{}` is unknown to the database", table);
            self.missing
                .write()
                .map_err(|_| DbError::Poisoned)?
                .insert(table);
            return Ok(schema);
        }

        trace!("loaded {} columns of `{}`", schema.len(), table);
        self.tables
            .write()
            .map_err(|_| DbError::Poisoned)?
            .insert(table, schema.clone());
        Ok(schema)
    }

    /// Whether `table` exists. Lookup failures count as absent.
    pub fn has_table(&self, table: &str) -> bool {
        self.columns(table)
            .map(|schema| !schema.is_empty())
            .unwrap_or(false)
    }

    /// Whether `table` exists and has `column`. Never fails.
    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns(table)
            .map(|schema| schema.has_column(&unquote(column)))
            .unwrap_or(false)
    }

    /// Names of every table, from the database when one is attached.
    pub fn table_names(&self) -> Result<Vec<String>> {
        if let Some(driver) = &self.driver {
            return driver.table_names();
        }
        let tables = self.tables.read().map_err(|_| DbError::Poisoned)?;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Forgets every loaded schema and every name known to be missing, so
    /// the next lookups see the current database. Fixed catalogs keep their
    /// tables.
    pub fn invalidate(&self) -> Result<()> {
        if self.driver.is_none() {
            return Ok(());
        }
        let _guard = self.populate.lock().map_err(|_| DbError::Poisoned)?;
        self.tables.write().map_err(|_| DbError::Poisoned)?.clear();
        self.missing.write().map_err(|_| DbError::Poisoned)?.clear();
        debug!("schema cache cleared");
        Ok(())
    }

    /// Loads the schema of every table. Returns the number of tables loaded.
    pub fn preload(&self) -> Result<usize> {
        let names = self.table_names()?;
        for name in &names {
            self.columns(name)?;
        }
        debug!("preloaded schema of {} tables", names.len());
        Ok(names.len())
    }
}
