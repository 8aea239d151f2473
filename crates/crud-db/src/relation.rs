//! Relationship inference between tables.
//!
//! Given a row of a known table and the name of a target table, the
//! [`Resolver`] finds the query that fetches the related target rows using
//! nothing but column naming conventions:
//!
//! 1. the known table has `<target>_id`: the target row it points to,
//! 2. the target table has `<known>_id`: the target rows pointing back,
//! 3. a junction table `<target>_<known>` or `<known>_<target>` holding
//!    both `<target>_id` and `<known>_id`.
//!
//! Rules are tried in that order and the first one whose columns exist
//! decides the outcome.

use crud_utils::sql::{qualified, quote, unquote};
use rusqlite::types::Value;
use tracing::trace;

use crate::{catalog::Catalog, record::Record};

/// Query fetching the target rows related to one known row.
#[derive(Clone, Debug, PartialEq)]
pub struct Relationship {
    pub sql: String,
    pub arg: Value,
}

pub struct Resolver<'a> {
    catalog: &'a Catalog,
    is_deleted: &'a str,
}

impl<'a> Resolver<'a> {
    /// `is_deleted` names the soft-delete column excluded from results.
    pub fn new(catalog: &'a Catalog, is_deleted: &'a str) -> Self {
        Self {
            catalog,
            is_deleted,
        }
    }

    /// Resolves `target` from a record.
    pub fn resolve_record<T: Record>(&self, record: &T, target: &str) -> Option<Relationship> {
        self.resolve(&T::table_name(), |column| record.value(column), target)
    }

    /// Resolves `target` from a row of `known`, reading the row's values
    /// through `value`.
    ///
    /// Returns `None` when no rule applies, or when the rule that applies
    /// needs a value the row lacks or holds as NULL.
    pub fn resolve<F>(&self, known: &str, value: F, target: &str) -> Option<Relationship>
    where
        F: Fn(&str) -> Option<Value>,
    {
        let known = unquote(known);
        let target = unquote(target);
        let known_fk = format!("{known}_id");
        let target_fk = format!("{target}_id");
        let present = |column: &str| value(column).filter(|v| *v != Value::Null);

        if self.catalog.has_column(&known, &target_fk) {
            trace!("`{}` belongs to `{}`", known, target);
            let sql = format!(
                "SELECT {}.* FROM {} WHERE {} = ?",
                quote(&target),
                quote(&target),
                qualified(&target, "id")
            );
            return present(&target_fk).map(|arg| self.finish(&target, sql, arg));
        }

        if self.catalog.has_column(&target, &known_fk) {
            trace!("`{}` belongs to `{}`", target, known);
            let sql = format!(
                "SELECT {}.* FROM {} WHERE {} = ?",
                quote(&target),
                quote(&target),
                qualified(&target, &known_fk)
            );
            return present("id").map(|arg| self.finish(&target, sql, arg));
        }

        let junction = [format!("{target}_{known}"), format!("{known}_{target}")]
            .into_iter()
            .find(|junction| {
                self.catalog.has_column(junction, &target_fk)
                    && self.catalog.has_column(junction, &known_fk)
            })?;
        trace!("`{}` and `{}` linked through `{}`", known, target, junction);
        let sql = format!(
            "SELECT {}.* FROM {} INNER JOIN {} ON {} = {} WHERE {} = ?",
            quote(&target),
            quote(&target),
            quote(&junction),
            qualified(&junction, &target_fk),
            qualified(&target, "id"),
            qualified(&junction, &known_fk)
        );
        present("id").map(|arg| self.finish(&target, sql, arg))
    }

    fn finish(&self, target: &str, mut sql: String, arg: Value) -> Relationship {
        if self.catalog.has_column(target, self.is_deleted) {
            sql.push_str(&format!(" AND {} = 0", qualified(target, self.is_deleted)));
        }
        Relationship { sql, arg }
    }
}
