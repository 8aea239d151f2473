use std::{
    fmt::Display,
    sync::{LazyLock, RwLock},
};

use crud_db::{
    decode::{coerce, value_to_json, value_to_string},
    Fields, Rows, Table, TableSchema,
};
use miette::miette;
use nu_ansi_term::Color;
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};

pub static COLOR: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));

pub struct Colored<T: Display>(pub Color, pub T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let color = COLOR.read().map(|c| *c).unwrap_or(false);
        if color {
            write!(f, "{}", self.0.prefix())?;
            self.1.fmt(f)?;
            write!(f, "{}", self.0.suffix())
        } else {
            self.1.fmt(f)
        }
    }
}

/// Parses `column=value` pairs, coercing each value by the column's type.
pub fn parse_fields(pairs: &[String], schema: &TableSchema) -> miette::Result<Fields> {
    pairs
        .iter()
        .map(|pair| {
            let (column, value) = pair
                .split_once('=')
                .ok_or_else(|| miette!("expected `column=value`, got `{pair}`"))?;
            let column = column.trim();
            if !schema.has_column(column) {
                return Err(miette!(
                    "table `{}` has no column `{}`",
                    schema.name(),
                    column
                ));
            }
            let value = coerce(value.to_string().into(), schema.column(column));
            Ok((column.to_string(), value))
        })
        .collect()
}

/// Parses `column=value` pairs against the columns of `table`.
pub fn table_fields(table: &Table, pairs: &[String]) -> miette::Result<Fields> {
    let schema = table.schema()?;
    parse_fields(pairs, schema.as_ref())
}

/// Renders rows as a table with the column names as header.
pub fn rows_table(rows: &Rows, title: &str) -> String {
    let mut builder = Builder::new();
    builder.push_record(rows.columns.iter().map(|c| Colored(Color::Cyan, c).to_string()));
    for values in &rows.values {
        builder.push_record(values.iter().map(value_to_string));
    }

    builder
        .build()
        .with(Panel::header(title))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string()
}

/// Rows as a JSON array of objects keyed by column name.
pub fn rows_json(rows: &Rows) -> serde_json::Value {
    rows.values
        .iter()
        .map(|values| {
            rows.columns
                .iter()
                .zip(values)
                .map(|(column, value)| (column.clone(), value_to_json(value)))
                .collect::<serde_json::Map<_, _>>()
        })
        .map(serde_json::Value::Object)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crud_db::{Column, Database, Options, SqliteDriver, Value};

    use super::*;

    fn schema() -> TableSchema {
        TableSchema::new(
            "user",
            vec![
                Column::new("id", "INTEGER"),
                Column::new("name", "VARCHAR(64)"),
            ],
        )
    }

    #[test]
    fn test_parse_fields() {
        let fields = parse_fields(&["id=7".into(), "name= ada".into()], &schema()).unwrap();
        assert_eq!(fields["id"], Value::Integer(7));
        assert_eq!(fields["name"], Value::Text(" ada".into()));
    }

    #[test]
    fn test_parse_fields_rejects_unknown_columns() {
        assert!(parse_fields(&["age=3".into()], &schema()).is_err());
        assert!(parse_fields(&["name".into()], &schema()).is_err());
    }

    #[test]
    fn test_table_fields() {
        let driver = SqliteDriver::open_in_memory().unwrap();
        driver
            .execute_batch("CREATE TABLE tag (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        let db = Database::new(Arc::new(driver), Options::default()).unwrap();

        let fields = table_fields(&db.table("tag"), &["id=3".into(), "name=rust".into()]).unwrap();
        assert_eq!(fields["id"], Value::Integer(3));
        assert_eq!(fields["name"], Value::Text("rust".into()));
        assert!(table_fields(&db.table("tag"), &["label=x".into()]).is_err());
        assert!(table_fields(&db.table("missing"), &["id=1".into()]).is_err());
    }

    #[test]
    fn test_rows_json() {
        let rows = Rows::new(
            vec!["id".into(), "name".into()],
            vec![vec![Value::Integer(1), Value::Null]],
        );
        assert_eq!(
            rows_json(&rows),
            serde_json::json!([{ "id": 1, "name": null }])
        );
    }
}
