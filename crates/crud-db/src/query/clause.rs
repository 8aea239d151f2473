//! Internal representation of statement fragments.

use rusqlite::types::Value;

/// A `LEFT JOIN` on `table` with its ON condition.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Join {
    pub table: String,
    pub on: String,
}

/// A WHERE fragment with `?` placeholders and the values bound to them.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Predicate {
    pub fragment: String,
    pub args: Vec<Value>,
}

/// An ORDER BY clause.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct OrderClause {
    pub field: String,
    pub desc: bool,
}

impl OrderClause {
    pub fn render(&self) -> String {
        format!("{} {}", self.field, if self.desc { "DESC" } else { "ASC" })
    }
}
