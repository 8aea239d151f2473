//! The entry handle tying driver, catalog and options together.

use std::sync::Arc;

use crud_config::config::{ColumnNames, Config, MEMORY};
use crud_utils::{
    naming::to_storage_name,
    sql::{has_keyword, is_schema_change, unquote},
};
use rusqlite::types::Value;
use tracing::{debug, info};

use crate::{
    catalog::{Catalog, Column, TableSchema},
    connection::{Driver, ExecResult, SqliteDriver},
    decode::Rows,
    error::{DbError, Result},
    graph::{Graph, GraphReport},
    query::{interpolate, Search},
    record::{decode_records, Record},
    table::{Fields, Table},
};

const TIME_TYPES: &[&str] = &["date", "datetime", "timestamp"];

/// Runtime options, usually taken from the [`Config`].
#[derive(Clone, Debug)]
pub struct Options {
    pub max_relation_depth: usize,
    pub log_sql: bool,
    pub preload_schema: bool,
    pub time_format: String,
    pub columns: ColumnNames,
}

impl Default for Options {
    fn default() -> Self {
        Self::from(&Config::default_config())
    }
}

impl From<&Config> for Options {
    fn from(config: &Config) -> Self {
        Self {
            max_relation_depth: config.get_max_relation_depth(),
            log_sql: config.get_log_sql(),
            preload_schema: config.get_preload_schema(),
            time_format: config.get_time_format().to_string(),
            columns: config.columns.clone(),
        }
    }
}

/// How records are selected by [`Database::find`].
#[derive(Clone, Debug, PartialEq)]
pub enum Criteria {
    /// Every live row.
    All,
    /// The row with this primary key.
    Id(Value),
    /// Rows matching a WHERE fragment.
    Where(String, Vec<Value>),
    /// A complete statement.
    Sql(String, Vec<Value>),
}

impl Criteria {
    pub fn id(id: impl Into<Value>) -> Self {
        Criteria::Id(id.into())
    }

    /// A complete statement when `fragment` contains the `SELECT` keyword,
    /// a WHERE fragment otherwise.
    pub fn parse(fragment: impl Into<String>, args: Vec<Value>) -> Self {
        let fragment = fragment.into();
        if has_keyword(&fragment, "SELECT") {
            Criteria::Sql(fragment, args)
        } else {
            Criteria::Where(fragment, args)
        }
    }
}

struct Inner {
    driver: Arc<dyn Driver>,
    catalog: Arc<Catalog>,
    options: Options,
}

/// Shared handle to a database. Cloning is cheap.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl Database {
    /// Opens the data source named by the configuration.
    pub fn open(config: &Config) -> Result<Self> {
        let source = config.get_data_source();
        let driver = if source == MEMORY {
            SqliteDriver::open_in_memory()?
        } else {
            SqliteDriver::open(&source)?
        };
        info!("opened {}", source);
        Self::new(Arc::new(driver), Options::from(config))
    }

    /// Wraps a driver, loading every table's schema when
    /// [`Options::preload_schema`] is set.
    pub fn new(driver: Arc<dyn Driver>, options: Options) -> Result<Self> {
        let catalog = Arc::new(Catalog::new(driver.clone()));
        if options.preload_schema {
            catalog.preload()?;
        }
        Ok(Self::with_catalog(driver, catalog, options))
    }

    pub fn with_catalog(driver: Arc<dyn Driver>, catalog: Arc<Catalog>, options: Options) -> Self {
        Self {
            inner: Arc::new(Inner {
                driver,
                catalog,
                options,
            }),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn driver(&self) -> &dyn Driver {
        self.inner.driver.as_ref()
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Handle on `name`, given either as a table name or as a type name.
    pub fn table(&self, name: &str) -> Table {
        Table::new(self.clone(), to_storage_name(&unquote(name)))
    }

    pub fn search(&self, table: &str) -> Search {
        Search::new(self.clone(), table)
    }

    pub fn query(&self, sql: &str, args: &[Value]) -> Result<Rows> {
        if self.inner.options.log_sql {
            debug!("{}", interpolate(sql, args));
        }
        self.inner.driver.query(sql, args)
    }

    /// Executes a statement. Schema changes clear the catalog.
    pub fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult> {
        if self.inner.options.log_sql {
            debug!("{}", interpolate(sql, args));
        }
        let result = self.inner.driver.exec(sql, args)?;
        if is_schema_change(sql) {
            self.inner.catalog.invalidate()?;
        }
        Ok(result)
    }

    /// Records of `T` selected by `criteria`, without their relations.
    pub fn find<T: Record>(&self, criteria: Criteria) -> Result<Vec<T>> {
        let search = self.search(&T::table_name());
        let rows = match criteria {
            Criteria::All => search.rows()?,
            Criteria::Id(id) => search.filter_id(id).rows()?,
            Criteria::Where(fragment, args) => search.filter(fragment, args).rows()?,
            Criteria::Sql(sql, args) => self.query(&sql, &args)?,
        };
        decode_records(&rows)
    }

    pub fn find_one<T: Record>(&self, criteria: Criteria) -> Result<Option<T>> {
        Ok(self.find(criteria)?.into_iter().next())
    }

    /// Records of `T` selected by `criteria`, with their relations loaded.
    pub fn find_all<T: Record>(&self, criteria: Criteria) -> Result<(Vec<T>, GraphReport)> {
        let mut records = self.find(criteria)?;
        let report = self.populate(&mut records)?;
        Ok((records, report))
    }

    /// Loads the relations of every record.
    pub fn populate<T: Record>(&self, records: &mut [T]) -> Result<GraphReport> {
        let mut report = GraphReport::default();
        for record in records.iter_mut() {
            let mut graph = Graph::new(self);
            graph.populate(record)?;
            report.merge(graph.report());
        }
        if report.truncated > 0 {
            debug!("{} records hit the relation depth limit", report.truncated);
        }
        Ok(report)
    }
}

/// Whether `value` is what an unset field holds: NULL, zero or empty text.
fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Integer(i) => *i == 0,
        Value::Text(s) => s.is_empty(),
        _ => false,
    }
}

impl Database {
    /// Stored values of `record` worth writing to `schema`.
    ///
    /// Columns the table lacks are dropped, and so are unset time columns,
    /// which leaves the bookkeeping timestamps to be stamped.
    fn record_fields<T: Record>(&self, record: &T, schema: &TableSchema) -> Fields {
        let columns = &self.inner.options.columns;
        let is_time = |column: &Column| {
            TIME_TYPES.contains(&column.data_type.as_str())
                || [&columns.created_at, &columns.updated_at, &columns.deleted_at]
                    .contains(&&column.name)
        };

        let mut fields = record.fields();
        fields.retain(|name, value| match schema.column(name) {
            Some(column) => {
                let blank = matches!(value, Value::Null)
                    || matches!(value, Value::Text(text) if text.is_empty());
                !(blank && is_time(column))
            }
            None => schema.is_empty(),
        });
        fields
    }

    fn record_id<T: Record>(record: &T) -> Result<Value> {
        record
            .value("id")
            .filter(|id| !is_unset(id))
            .ok_or_else(|| DbError::MissingId {
                table: T::table_name(),
            })
    }

    /// Inserts `record` and stores the new id in it.
    ///
    /// An unset `id` is left for the database to assign.
    pub fn create<T: Record>(&self, record: &mut T) -> Result<i64> {
        record.before_create()?;

        let table = self.table(&T::table_name());
        let mut fields = self.record_fields(record, &*table.schema()?);
        if fields.get("id").is_some_and(is_unset) {
            fields.remove("id");
        }

        let id = table.create(fields, &[])?;
        record.set_value("id", Value::Integer(id))?;
        debug!("created `{}` {}", table.name(), id);

        record.after_create()?;
        Ok(id)
    }

    /// Writes every stored column of `record` to the row with its id.
    pub fn update<T: Record>(&self, record: &mut T) -> Result<()> {
        record.before_update()?;

        Self::record_id(record)?;
        let table = self.table(&T::table_name());
        let fields = self.record_fields(record, &*table.schema()?);
        table.update(fields, &[])?;

        record.after_update()
    }

    /// Deletes the row of `record`, softly when the table allows it.
    pub fn delete<T: Record>(&self, record: &mut T) -> Result<usize> {
        record.before_delete()?;

        let id = Self::record_id(record)?;
        let count = self
            .table(&T::table_name())
            .delete(Fields::from([("id".to_string(), id)]))?;

        record.after_delete()?;
        Ok(count)
    }

    /// Creates every record in order, stopping at the first failure.
    pub fn create_all<T: Record>(&self, records: &mut [T]) -> Result<Vec<i64>> {
        records.iter_mut().map(|record| self.create(record)).collect()
    }

    pub fn update_all<T: Record>(&self, records: &mut [T]) -> Result<()> {
        records.iter_mut().try_for_each(|record| self.update(record))
    }

    /// Deletes every record and returns the number of rows affected.
    pub fn delete_all<T: Record>(&self, records: &mut [T]) -> Result<usize> {
        records
            .iter_mut()
            .try_fold(0, |total, record| Ok(total + self.delete(record)?))
    }
}
