//! The `SELECT` statement builder.

use crud_utils::sql::{has_keyword, placeholders, qualified, quote, unquote};
use rusqlite::types::Value;
use tracing::debug;

use super::{
    clause::{Join, OrderClause, Predicate},
    field::qualify,
};
use crate::{
    catalog::TableSchema,
    database::Database,
    decode::{RowMap, RowMapExt, Rows, ValueMap},
    error::Result,
    graph::GraphReport,
    query::interpolate,
    record::{decode_records, Record},
};

/// Fluent builder for a `SELECT` on one base table.
///
/// Every method consumes the builder and returns it. To branch a query,
/// clone it first; clones share nothing, so adding to one never changes
/// the other.
///
/// ```ignore
/// let (sql, args) = db
///     .search("order")
///     .fields(["id", "user.name AS author"])
///     .filter("status = ?", args!["paid"])
///     .order_by("id", true)
///     .limit(10)
///     .build();
/// ```
#[derive(Clone)]
pub struct Search {
    db: Database,
    table: String,
    fields: Vec<String>,
    joins: Vec<Join>,
    predicates: Vec<Predicate>,
    groups: Vec<String>,
    orders: Vec<OrderClause>,
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Compiled statement and every table it reads from.
struct Compiled {
    sql: String,
    args: Vec<Value>,
    tables: Vec<String>,
}

impl Search {
    pub fn new(db: Database, table: &str) -> Self {
        Self {
            db,
            table: unquote(table),
            fields: vec![],
            joins: vec![],
            predicates: vec![],
            groups: vec![],
            orders: vec![],
            limit: None,
            offset: None,
        }
    }

    /// Base table of the query.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Appends projected fields. `$C` and `$c` stand for `COUNT(1) AS total`.
    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            match name.as_str() {
                "$C" | "$c" => self.fields.push("COUNT(1) AS total".into()),
                _ => self.fields.push(name),
            }
        }
        self
    }

    /// Adds a WHERE fragment with `?` placeholders bound to `args`.
    pub fn filter(mut self, fragment: impl Into<String>, args: Vec<Value>) -> Self {
        self.predicates.push(Predicate {
            fragment: fragment.into(),
            args,
        });
        self
    }

    /// Restricts the query to the row with primary key `id`.
    pub fn filter_id(self, id: impl Into<Value>) -> Self {
        let fragment = format!("{} = ?", qualified(&self.table, "id"));
        self.filter(fragment, vec![id.into()])
    }

    /// Adds `field IN (...)`. Without arguments nothing is added.
    pub fn in_(self, field: &str, args: Vec<Value>) -> Self {
        self.membership(field, args, "IN")
    }

    /// Adds `field NOT IN (...)`. Without arguments nothing is added.
    pub fn not_in(self, field: &str, args: Vec<Value>) -> Self {
        self.membership(field, args, "NOT IN")
    }

    fn membership(self, field: &str, args: Vec<Value>, operator: &str) -> Self {
        if args.is_empty() {
            return self;
        }
        let field = qualify(field, &self.table, self.db.catalog()).text;
        let fragment = format!("{field} {operator} ({})", placeholders(args.len()));
        self.filter(fragment, args)
    }

    /// Joins `table`, inferring the ON condition from the column names.
    ///
    /// The first match wins among: `table` has `<base>id`, `table` has
    /// `<base>_id`, the base table has `<table>id`, the base table has
    /// `<table>_id`. When nothing matches no join is added.
    pub fn join(mut self, table: &str) -> Self {
        let target = unquote(table);
        if self.is_joined(&target) {
            return self;
        }
        match self.infer_join(&target) {
            Some(on) => self.joins.push(Join { table: target, on }),
            None => debug!("no join condition between `{}` and `{}`", self.table, target),
        }
        self
    }

    /// Joins `table` on an explicit condition.
    pub fn join_on(mut self, table: &str, on: impl Into<String>) -> Self {
        self.joins.push(Join {
            table: unquote(table),
            on: on.into(),
        });
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, desc: bool) -> Self {
        self.orders.push(OrderClause {
            field: field.into(),
            desc,
        });
        self
    }

    pub fn group_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// One-based page of `per_page` rows.
    pub fn page(self, page: i64, per_page: i64) -> Self {
        let offset = (page.max(1) - 1).saturating_mul(per_page);
        self.limit(per_page).offset(offset)
    }

    fn is_joined(&self, table: &str) -> bool {
        table == self.table || self.joins.iter().any(|join| join.table == table)
    }

    fn infer_join(&self, target: &str) -> Option<String> {
        let catalog = self.db.catalog();
        let base = self.table.as_str();
        [
            (target, format!("{base}id"), base),
            (target, format!("{base}_id"), base),
            (base, format!("{target}id"), target),
            (base, format!("{target}_id"), target),
        ]
        .into_iter()
        .find(|(holder, column, _)| catalog.has_column(holder, column))
        .map(|(holder, column, referenced)| {
            format!(
                "{} = {}",
                qualified(holder, &column),
                qualified(referenced, "id")
            )
        })
    }

    fn compile(&self) -> Compiled {
        let catalog = self.db.catalog();
        let mut joins = self.joins.clone();

        let fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            let mut fields = Vec::with_capacity(self.fields.len());
            for field in &self.fields {
                let field = qualify(field, &self.table, catalog);
                if let Some(table) = &field.table {
                    if *table != self.table && !joins.iter().any(|j| j.table == *table) {
                        match self.infer_join(table) {
                            Some(on) => joins.push(Join {
                                table: table.clone(),
                                on,
                            }),
                            None => debug!("`{}` is not joinable from `{}`", table, self.table),
                        }
                    }
                }
                fields.push(field.text);
            }
            fields.join(",")
        };

        let mut sql = format!("SELECT {} FROM {}", fields, quote(&self.table));
        for join in &joins {
            sql.push_str(&format!(" LEFT JOIN {} ON {}", quote(&join.table), join.on));
        }

        let mut args = Vec::new();
        let mut wheres = Vec::with_capacity(self.predicates.len() + 1);
        for predicate in &self.predicates {
            if has_keyword(&predicate.fragment.to_uppercase(), "OR") {
                wheres.push(format!("({})", predicate.fragment));
            } else {
                wheres.push(predicate.fragment.clone());
            }
            args.extend(predicate.args.iter().cloned());
        }

        let is_deleted = &self.db.options().columns.is_deleted;
        if catalog.has_column(&self.table, is_deleted) {
            wheres.push(format!("{} = ?", qualified(&self.table, is_deleted)));
            args.push(Value::Integer(0));
        }

        if !wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&wheres.join(" AND "));
        }
        if !self.groups.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.groups.join(","));
        }
        if !self.orders.is_empty() {
            sql.push_str(" ORDER BY ");
            let orders: Vec<String> = self.orders.iter().map(OrderClause::render).collect();
            sql.push_str(&orders.join(","));
        }

        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                sql.push_str(" LIMIT ?");
                args.push(Value::Integer(limit));
                if let Some(offset) = offset {
                    sql.push_str(" OFFSET ?");
                    args.push(Value::Integer(offset));
                }
            }
            (None, Some(offset)) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                args.push(Value::Integer(i64::MAX));
                args.push(Value::Integer(offset));
            }
            (None, None) => {}
        }

        let mut tables = vec![self.table.clone()];
        tables.extend(joins.into_iter().map(|join| join.table));

        Compiled { sql, args, tables }
    }

    /// Compiles the statement into SQL text and its bound arguments.
    ///
    /// Tables with a soft-delete column get a not-deleted predicate on the
    /// base table. It lives only in the output, so building again, or
    /// building a clone, never repeats it.
    pub fn build(&self) -> (String, Vec<Value>) {
        let compiled = self.compile();
        (compiled.sql, compiled.args)
    }

    pub fn rows(&self) -> Result<Rows> {
        let (sql, args) = self.build();
        self.db.query(&sql, &args)
    }

    pub fn row_maps(&self) -> Result<Vec<RowMap>> {
        Ok(self.rows()?.row_maps())
    }

    /// First matching row.
    pub fn row_map(&self) -> Result<Option<RowMap>> {
        Ok(self.clone().limit(1).row_maps()?.into_iter().next())
    }

    /// Rows with values coerced by the declared types of the tables read.
    pub fn value_maps(&self) -> Result<Vec<ValueMap>> {
        let compiled = self.compile();
        let rows = self.db.query(&compiled.sql, &compiled.args)?;

        let catalog = self.db.catalog();
        let schemas = compiled
            .tables
            .iter()
            .map(|table| catalog.columns(table))
            .collect::<Result<Vec<_>>>()?;
        let schemas: Vec<&TableSchema> = schemas.iter().map(|schema| &**schema).collect();

        Ok(rows.value_maps(&schemas))
    }

    pub fn fetch<T: Record>(&self) -> Result<Vec<T>> {
        decode_records(&self.rows()?)
    }

    pub fn fetch_one<T: Record>(&self) -> Result<Option<T>> {
        Ok(self.clone().limit(1).fetch()?.pop())
    }

    /// Number of rows the query matches, ignoring ordering and paging.
    pub fn count(&self) -> Result<i64> {
        let mut inner = self.clone();
        inner.orders.clear();
        inner.limit = None;
        inner.offset = None;

        let (sql, args) = if inner.groups.is_empty() {
            inner.fields = vec!["COUNT(1) AS total".into()];
            inner.build()
        } else {
            let (sql, args) = inner.build();
            (format!("SELECT COUNT(1) AS total FROM ({sql}) AS counted"), args)
        };

        let rows = self.db.query(&sql, &args)?;
        match rows.first() {
            Some(row) => row.get("total"),
            None => Ok(0),
        }
    }

    /// `column` of the first row as an integer, `0` without rows.
    pub fn int(&self, column: &str) -> Result<i64> {
        Ok(self.row_map()?.map(|row| row.int(column)).unwrap_or(0))
    }

    /// `column` of the first row as a flag, `false` without rows.
    pub fn bool(&self, column: &str) -> Result<bool> {
        Ok(self
            .row_map()?
            .is_some_and(|row| row.bool_value(column)))
    }

    /// `column` of the first row as text, empty without rows.
    pub fn string(&self, column: &str) -> Result<String> {
        Ok(self
            .row_map()?
            .and_then(|mut row| row.remove(column))
            .unwrap_or_default())
    }

    /// Execution plan of the statement, as reported by the engine.
    pub fn explain(&self) -> Result<Rows> {
        let (sql, args) = self.build();
        debug!("explaining {}", interpolate(&sql, &args));
        self.db.query(&self.db.driver().dialect().explain(&sql), &args)
    }

    /// Fetches the records and loads their relations.
    pub fn find_all<T: Record>(&self) -> Result<(Vec<T>, GraphReport)> {
        let mut records = self.fetch::<T>()?;
        let report = self.db.populate(&mut records)?;
        Ok((records, report))
    }
}
