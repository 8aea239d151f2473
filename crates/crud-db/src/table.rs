//! Create, read, update and delete on a single table.
//!
//! Bookkeeping columns are maintained when the table has them: the
//! creation, update and deletion timestamps are stamped, and a table with
//! the soft-delete column is never physically deleted from. The column
//! names come from [`Options::columns`](crate::database::Options).

use std::{collections::BTreeMap, fmt::Write, sync::Arc};

use crud_utils::sql::{placeholders, qualified, quote};
use rusqlite::types::Value;
use tracing::debug;

use crate::{
    catalog::TableSchema,
    database::Database,
    decode::{RowMap, RowMapExt},
    error::{DbError, Result},
    query::Search,
};

/// Column values of one row, ordered by column name.
pub type Fields = BTreeMap<String, Value>;

/// Outcome of [`Table::create_or_update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upsert {
    Created(i64),
    Updated,
    /// A matching row existed and there was nothing to update.
    Unchanged,
}

#[derive(Clone)]
pub struct Table {
    db: Database,
    name: String,
}

impl Table {
    pub fn new(db: Database, name: impl Into<String>) -> Self {
        Self {
            db,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Result<Arc<TableSchema>> {
        self.db.catalog().columns(&self.name)
    }

    pub fn search(&self) -> Search {
        self.db.search(&self.name)
    }

    fn now(&self) -> Result<String> {
        let format = self.db.options().time_format.as_str();
        let mut stamp = String::new();
        write!(stamp, "{}", chrono::Local::now().format(format)).map_err(|_| {
            DbError::InvalidArgument(format!("invalid time format `{format}`"))
        })?;
        Ok(stamp)
    }

    /// Equality-AND filter over every entry of `filter`.
    fn filtered(&self, filter: &Fields) -> Search {
        filter.iter().fold(self.search(), |search, (column, value)| {
            search.filter(
                format!("{} = ?", qualified(&self.name, column)),
                vec![value.clone()],
            )
        })
    }

    /// Inserts a row and returns its id.
    ///
    /// With `check` columns, a live row with the same values in all of them
    /// makes the call fail with [`DbError::DuplicateInsert`] before anything
    /// is written.
    pub fn create(&self, mut fields: Fields, check: &[&str]) -> Result<i64> {
        if fields.is_empty() {
            return Err(DbError::InvalidArgument(format!(
                "no fields to insert into `{}`",
                self.name
            )));
        }

        if !check.is_empty() {
            let mut guard = Fields::new();
            for column in check {
                let value = fields.get(*column).ok_or_else(|| {
                    DbError::InvalidArgument(format!(
                        "check column `{column}` is missing from the fields"
                    ))
                })?;
                guard.insert(column.to_string(), value.clone());
            }
            if self.filtered(&guard).count()? > 0 {
                return Err(DbError::DuplicateInsert {
                    table: self.name.clone(),
                    columns: check.join(", "),
                });
            }
        }

        let schema = self.schema()?;
        let created_at = &self.db.options().columns.created_at;
        if schema.has_column(created_at) && !fields.contains_key(created_at) {
            fields.insert(created_at.clone(), Value::Text(self.now()?));
        }

        let columns: Vec<String> = fields.keys().map(|c| quote(c)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(&self.name),
            columns.join(","),
            placeholders(fields.len())
        );
        let args: Vec<Value> = fields.into_values().collect();

        let result = self.db.exec(&sql, &args)?;
        if result.last_insert_id <= 0 {
            return Err(DbError::InsertFailed {
                table: self.name.clone(),
            });
        }
        Ok(result.last_insert_id)
    }

    fn live_filter(&self, mut filter: Fields) -> Result<Fields> {
        let is_deleted = &self.db.options().columns.is_deleted;
        if self.schema()?.has_column(is_deleted) {
            // replaced by the not-deleted predicate of the search
            filter.remove(is_deleted);
        }
        Ok(filter)
    }

    /// First live row matching `filter`.
    pub fn read(&self, filter: Fields) -> Result<Option<RowMap>> {
        self.filtered(&self.live_filter(filter)?).row_map()
    }

    /// Every live row matching `filter`.
    pub fn reads(&self, filter: Fields) -> Result<Vec<RowMap>> {
        self.filtered(&self.live_filter(filter)?).row_maps()
    }

    /// Updates the single live row identified by `keys`, `["id"]` when empty.
    ///
    /// Key columns and `id` are matched on, every other field is written.
    pub fn update(&self, mut fields: Fields, keys: &[&str]) -> Result<()> {
        let keys = if keys.is_empty() { &["id"][..] } else { keys };

        for key in keys {
            if !fields.contains_key(*key) {
                return Err(DbError::MissingUpdateKey {
                    table: self.name.clone(),
                    key: key.to_string(),
                });
            }
        }

        let columns = &self.db.options().columns;
        let schema = self.schema()?;
        if schema.has_column(&columns.updated_at) && !fields.contains_key(&columns.updated_at) {
            fields.insert(columns.updated_at.clone(), Value::Text(self.now()?));
        }

        let mut conditions = Vec::with_capacity(keys.len() + 1);
        let mut condition_args = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = fields.remove(*key) {
                conditions.push(format!("{} = ?", quote(key)));
                condition_args.push(value);
            }
        }
        fields.remove("id");
        // deleted rows are never the target of an update
        if schema.has_column(&columns.is_deleted) && !keys.contains(&columns.is_deleted.as_str()) {
            conditions.push(format!("{} = 0", quote(&columns.is_deleted)));
        }

        if fields.is_empty() {
            return Err(DbError::InvalidArgument(format!(
                "nothing to update in `{}`",
                self.name
            )));
        }

        let assignments: Vec<String> = fields.keys().map(|c| format!("{} = ?", quote(c))).collect();
        let sql = self.db.driver().dialect().update_one(
            &quote(&self.name),
            &assignments.join(", "),
            &conditions.join(" AND "),
        );
        let mut args: Vec<Value> = fields.into_values().collect();
        args.extend(condition_args);

        let result = self.db.exec(&sql, &args)?;
        if result.rows_affected == 0 {
            return Err(DbError::NoRowsAffected {
                table: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Creates the row, or updates it when a row with the same `keys`
    /// already exists.
    pub fn create_or_update(&self, fields: Fields, keys: &[&str]) -> Result<Upsert> {
        match self.create(fields.clone(), keys) {
            Ok(id) => Ok(Upsert::Created(id)),
            Err(err) if err.is_duplicate() => {
                let has_changes = fields
                    .keys()
                    .any(|column| column != "id" && !keys.contains(&column.as_str()));
                if !has_changes {
                    debug!("`{}` row exists and has nothing to update", self.name);
                    return Ok(Upsert::Unchanged);
                }
                self.update(fields, keys)?;
                Ok(Upsert::Updated)
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes the rows matching `filter` and returns how many were affected.
    ///
    /// With a soft-delete column the rows are only marked deleted, and the
    /// deletion timestamp is stamped when that column exists. An empty
    /// filter is refused.
    pub fn delete(&self, filter: Fields) -> Result<usize> {
        let columns = &self.db.options().columns;
        let schema = self.schema()?;
        let soft = schema.has_column(&columns.is_deleted);
        let filter = self.live_filter(filter)?;

        if filter.is_empty() {
            return Err(DbError::InvalidArgument(format!(
                "refusing to delete from `{}` without a filter",
                self.name
            )));
        }

        let mut conditions: Vec<String> = filter.keys().map(|c| format!("{} = ?", quote(c))).collect();
        let mut args: Vec<Value> = Vec::new();

        let sql = if soft {
            let mut assignments = vec![format!("{} = 1", quote(&columns.is_deleted))];
            if schema.has_column(&columns.deleted_at) {
                assignments.push(format!("{} = ?", quote(&columns.deleted_at)));
                args.push(Value::Text(self.now()?));
            }
            conditions.push(format!("{} = 0", quote(&columns.is_deleted)));
            format!(
                "UPDATE {} SET {} WHERE {}",
                quote(&self.name),
                assignments.join(", "),
                conditions.join(" AND ")
            )
        } else {
            format!(
                "DELETE FROM {} WHERE {}",
                quote(&self.name),
                conditions.join(" AND ")
            )
        };
        args.extend(filter.into_values());

        Ok(self.db.exec(&sql, &args)?.rows_affected)
    }

    /// Every live row.
    pub fn all(&self) -> Result<Vec<RowMap>> {
        self.search().row_maps()
    }

    /// Number of live rows.
    pub fn count(&self) -> Result<i64> {
        self.search().count()
    }

    /// Largest `id` in the table, deleted rows included. `0` when empty.
    pub fn max_id(&self) -> Result<i64> {
        let sql = format!("SELECT MAX(`id`) AS max_id FROM {}", quote(&self.name));
        let rows = self.db.query(&sql, &[])?;
        Ok(rows
            .first()
            .map(|row| row.row_map().int("max_id"))
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fields, test_utils::memory_db};

    #[test]
    fn test_create_stamps_and_reads() {
        let users = memory_db().table("user");

        let id = users.create(fields! { "name" => "ada" }, &[]).unwrap();
        assert_eq!(id, 1);

        let row = users.read(fields! { "id" => id }).unwrap().unwrap();
        assert_eq!(row["name"], "ada");
        assert_eq!(row["is_deleted"], "0");
        assert_eq!(row["created_at"].len(), "2024-01-01 00:00:00".len());
        assert_eq!(row["updated_at"], "");
    }

    #[test]
    fn test_create_requires_fields_and_check_columns() {
        let users = memory_db().table("user");

        assert!(matches!(
            users.create(Fields::new(), &[]),
            Err(DbError::InvalidArgument(_))
        ));
        assert!(matches!(
            users.create(fields! { "name" => "ada" }, &["email"]),
            Err(DbError::InvalidArgument(_))
        ));
        assert_eq!(users.count().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_guard() {
        let users = memory_db().table("user");

        users.create(fields! { "name" => "a" }, &["name"]).unwrap();
        let err = users.create(fields! { "name" => "a" }, &["name"]).unwrap_err();

        assert!(err.is_duplicate());
        assert_eq!(users.count().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_guard_ignores_deleted_rows() {
        let users = memory_db().table("user");

        let id = users.create(fields! { "name" => "a" }, &["name"]).unwrap();
        users.delete(fields! { "id" => id }).unwrap();

        assert!(users.create(fields! { "name" => "a" }, &["name"]).is_ok());
    }

    #[test]
    fn test_update_round_trip() {
        let users = memory_db().table("user");

        let id = users.create(fields! { "name" => "a" }, &[]).unwrap();
        users
            .update(fields! { "id" => id, "name" => "b" }, &[])
            .unwrap();

        let row = users.read(fields! { "id" => id }).unwrap().unwrap();
        assert_eq!(row["name"], "b");
        assert!(!row["updated_at"].is_empty());
    }

    #[test]
    fn test_update_touches_one_row() {
        let db = memory_db();
        let orders = db.table("order");
        orders.create(fields! { "status" => "new" }, &[]).unwrap();
        orders.create(fields! { "status" => "new" }, &[]).unwrap();

        orders
            .update(fields! { "status" => "new", "user_id" => 5 }, &["status"])
            .unwrap();

        let rows = orders.reads(fields! { "user_id" => 5 }).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_update_errors() {
        let users = memory_db().table("user");

        assert!(matches!(
            users.update(fields! { "name" => "b" }, &[]),
            Err(DbError::MissingUpdateKey { ref key, .. }) if key == "id"
        ));
        assert!(matches!(
            users.update(fields! { "id" => 42, "name" => "b" }, &[]),
            Err(DbError::NoRowsAffected { .. })
        ));

        let orders = memory_db().table("order");
        assert!(matches!(
            orders.update(fields! { "id" => 1 }, &[]),
            Err(DbError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_create_or_update() {
        let users = memory_db().table("user");

        let created = users
            .create_or_update(fields! { "name" => "ada" }, &["name"])
            .unwrap();
        assert_eq!(created, Upsert::Created(1));

        let unchanged = users
            .create_or_update(fields! { "name" => "ada" }, &["name"])
            .unwrap();
        assert_eq!(unchanged, Upsert::Unchanged);

        let updated = users
            .create_or_update(fields! { "name" => "ada", "created_at" => "then" }, &["name"])
            .unwrap();
        assert_eq!(updated, Upsert::Updated);
        assert_eq!(users.count().unwrap(), 1);
        assert_eq!(
            users.read(fields! { "name" => "ada" }).unwrap().unwrap()["created_at"],
            "then"
        );
    }

    #[test]
    fn test_create_or_update_skips_deleted_rows() {
        let users = memory_db().table("user");

        let first = users.create(fields! { "name" => "a" }, &["name"]).unwrap();
        users.delete(fields! { "id" => first }).unwrap();
        let second = users.create(fields! { "name" => "a" }, &["name"]).unwrap();

        let outcome = users
            .create_or_update(fields! { "name" => "a", "created_at" => "NEW" }, &["name"])
            .unwrap();
        assert_eq!(outcome, Upsert::Updated);

        let live = users.read(fields! { "id" => second }).unwrap().unwrap();
        assert_eq!(live["created_at"], "NEW");
        let raw = users
            .db
            .query("SELECT created_at FROM user WHERE id = ?", &[Value::Integer(first)])
            .unwrap();
        assert_ne!(raw.first().unwrap().row_map()["created_at"], "NEW");
    }

    #[test]
    fn test_update_ignores_deleted_rows() {
        let users = memory_db().table("user");
        let id = users.create(fields! { "name" => "a" }, &[]).unwrap();
        users.delete(fields! { "id" => id }).unwrap();

        assert!(matches!(
            users.update(fields! { "id" => id, "name" => "b" }, &[]),
            Err(DbError::NoRowsAffected { .. })
        ));
    }

    #[test]
    fn test_soft_delete() {
        let users = memory_db().table("user");
        let id = users.create(fields! { "name" => "ada" }, &[]).unwrap();
        users.create(fields! { "name" => "bob" }, &[]).unwrap();

        assert_eq!(users.delete(fields! { "id" => id }).unwrap(), 1);
        assert_eq!(users.delete(fields! { "id" => id }).unwrap(), 0);

        assert!(users.read(fields! { "id" => id }).unwrap().is_none());
        assert!(users
            .read(fields! { "id" => id, "is_deleted" => 1 })
            .unwrap()
            .is_none());
        assert_eq!(users.count().unwrap(), 1);
        assert_eq!(users.max_id().unwrap(), 2);

        let raw = users
            .db
            .query("SELECT is_deleted, deleted_at FROM user WHERE id = ?", &[Value::Integer(id)])
            .unwrap();
        let row = raw.first().unwrap().row_map();
        assert_eq!(row["is_deleted"], "1");
        assert!(!row["deleted_at"].is_empty());
    }

    #[test]
    fn test_physical_delete() {
        let orders = memory_db().table("order");
        orders.create(fields! { "status" => "new" }, &[]).unwrap();
        orders.create(fields! { "status" => "paid" }, &[]).unwrap();

        assert!(matches!(
            orders.delete(Fields::new()),
            Err(DbError::InvalidArgument(_))
        ));
        assert_eq!(orders.delete(fields! { "status" => "new" }).unwrap(), 1);
        assert_eq!(orders.all().unwrap().len(), 1);
        assert_eq!(orders.max_id().unwrap(), 2);
    }

    #[test]
    fn test_max_id_of_empty_table() {
        assert_eq!(memory_db().table("tag").max_id().unwrap(), 0);
    }
}
