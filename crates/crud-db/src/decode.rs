//! Conversion of driver rows into maps and records.

use std::collections::HashMap;

use rusqlite::types::{FromSql, Value, ValueRef};

use crate::{
    catalog::{Column, TableSchema},
    error::{DbError, Result},
    record::Record,
};

/// A row keyed by column name, every value rendered as text. NULL is `""`.
pub type RowMap = HashMap<String, String>;

/// A row keyed by column name with values coerced per the catalog.
pub type ValueMap = HashMap<String, Value>;

const INTEGER_TYPES: &[&str] = &[
    "int", "tinyint", "smallint", "mediumint", "integer", "bigint", "int2", "int8",
];

const TEXT_TYPES: &[&str] = &[
    "char", "varchar", "nchar", "nvarchar", "text", "tinytext", "mediumtext", "longtext", "clob",
];

/// Result set returned by a [`Driver`](crate::connection::Driver) query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rows {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Value>>,
}

impl Rows {
    pub fn new(columns: Vec<String>, values: Vec<Vec<Value>>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.values.iter().map(|values| RowRef {
            columns: &self.columns,
            values,
        })
    }

    pub fn first(&self) -> Option<RowRef<'_>> {
        self.iter().next()
    }

    pub fn row_maps(&self) -> Vec<RowMap> {
        self.iter().map(|row| row.row_map()).collect()
    }

    /// Converts every row into a [`ValueMap`], coercing each value by the
    /// base type of the first schema that declares its column.
    pub fn value_maps(&self, schemas: &[&TableSchema]) -> Vec<ValueMap> {
        let columns: Vec<Option<&Column>> = self
            .columns
            .iter()
            .map(|name| schemas.iter().find_map(|schema| schema.column(name)))
            .collect();

        self.values
            .iter()
            .map(|values| {
                self.columns
                    .iter()
                    .zip(values)
                    .zip(&columns)
                    .map(|((name, value), column)| (name.clone(), coerce(value.clone(), *column)))
                    .collect()
            })
            .collect()
    }

    /// Decodes every row into `T`.
    pub fn decode<T: Record>(&self) -> Result<Vec<T>> {
        self.iter().map(|row| T::from_row(&row)).collect()
    }
}

/// A borrowed view of one row.
#[derive(Clone, Copy, Debug)]
pub struct RowRef<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> RowRef<'a> {
    pub fn new(columns: &'a [String], values: &'a [Value]) -> Self {
        Self { columns, values }
    }

    /// Raw value of `column`, `None` when the row has no such column.
    pub fn value(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|i| self.values.get(i))
    }

    /// Reads `column` as `T`.
    ///
    /// A column missing from the row or holding NULL yields `T::default()`,
    /// so records can be decoded from partial projections.
    pub fn get<T: FromSql + Default>(&self, column: &str) -> Result<T> {
        match self.value(column) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => T::column_result(ValueRef::from(value)).map_err(|e| DbError::Decode {
                column: column.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn row_map(&self) -> RowMap {
        self.columns
            .iter()
            .zip(self.values)
            .map(|(name, value)| (name.clone(), value_to_string(value)))
            .collect()
    }
}

/// Renders a value as text. NULL becomes the empty string, blobs are read
/// as lossy UTF-8.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
    }
}

pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => (*i).into(),
        Value::Real(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => s.clone().into(),
        Value::Blob(b) => String::from_utf8_lossy(b).into_owned().into(),
    }
}

/// Coerces a raw value by its column's base type.
///
/// Integer types become [`Value::Integer`] and character types become
/// [`Value::Text`]. Anything else, including values that do not parse and
/// columns without metadata, is returned unchanged.
pub fn coerce(value: Value, column: Option<&Column>) -> Value {
    let Some(column) = column else {
        return value;
    };
    let data_type = column.data_type.as_str();

    if INTEGER_TYPES.contains(&data_type) {
        return match value {
            Value::Text(s) => match s.trim().parse() {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::Text(s),
            },
            Value::Real(f) if f.fract() == 0.0 => Value::Integer(f as i64),
            other => other,
        };
    }
    if TEXT_TYPES.contains(&data_type) {
        return match value {
            Value::Null => Value::Null,
            Value::Text(_) => value,
            other => Value::Text(value_to_string(&other)),
        };
    }
    value
}

/// Typed accessors on a [`RowMap`].
pub trait RowMapExt {
    /// Value of `key` as an integer, `0` when missing or not numeric.
    fn int(&self, key: &str) -> i64;
    fn float(&self, key: &str) -> f64;
    /// `true` for `1`, `true`, `yes` and `on`.
    fn bool_value(&self, key: &str) -> bool;
    fn field_or(&self, key: &str, default: &str) -> String;
}

impl RowMapExt for RowMap {
    fn int(&self, key: &str) -> i64 {
        self.get(key)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(|v| v as i64)
            .unwrap_or(0)
    }

    fn float(&self, key: &str) -> f64 {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0.0)
    }

    fn bool_value(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    fn field_or(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(v) if !v.is_empty() => v.clone(),
            _ => default.to_string(),
        }
    }
}

/// Helpers over a list of [`RowMap`]s.
pub trait RowMapsExt {
    fn pluck(&self, key: &str) -> Vec<String>;
    /// Rows keyed by the value of `key`. Later rows win on duplicate keys.
    fn index_by(&self, key: &str) -> HashMap<String, RowMap>;
    fn group_by(&self, key: &str) -> HashMap<String, Vec<RowMap>>;
}

impl RowMapsExt for [RowMap] {
    fn pluck(&self, key: &str) -> Vec<String> {
        self.iter()
            .map(|row| row.get(key).cloned().unwrap_or_default())
            .collect()
    }

    fn index_by(&self, key: &str) -> HashMap<String, RowMap> {
        self.iter()
            .map(|row| (row.get(key).cloned().unwrap_or_default(), row.clone()))
            .collect()
    }

    fn group_by(&self, key: &str) -> HashMap<String, Vec<RowMap>> {
        let mut groups: HashMap<String, Vec<RowMap>> = HashMap::new();
        for row in self {
            groups
                .entry(row.get(key).cloned().unwrap_or_default())
                .or_default()
                .push(row.clone());
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Rows {
        Rows::new(
            vec!["id".into(), "name".into(), "score".into(), "note".into()],
            vec![
                vec![
                    Value::Text("1".into()),
                    Value::Integer(42),
                    Value::Real(9.5),
                    Value::Null,
                ],
                vec![
                    Value::Integer(2),
                    Value::Text("bob".into()),
                    Value::Blob(b"raw".to_vec()),
                    Value::Text("x".into()),
                ],
            ],
        )
    }

    #[test]
    fn test_row_maps_render_null_as_empty() {
        let maps = rows().row_maps();

        assert_eq!(maps[0]["id"], "1");
        assert_eq!(maps[0]["name"], "42");
        assert_eq!(maps[0]["note"], "");
        assert_eq!(maps[1]["score"], "raw");
    }

    #[test]
    fn test_value_maps_coerce_by_schema() {
        let schema = TableSchema::new(
            "player",
            vec![
                Column::new("id", "INTEGER"),
                Column::new("name", "VARCHAR(32)"),
                Column::new("score", "REAL"),
            ],
        );
        let maps = rows().value_maps(&[&schema]);

        assert_eq!(maps[0]["id"], Value::Integer(1));
        assert_eq!(maps[0]["name"], Value::Text("42".into()));
        assert_eq!(maps[0]["score"], Value::Real(9.5));
        assert_eq!(maps[0]["note"], Value::Null);
        assert_eq!(maps[1]["score"], Value::Blob(b"raw".to_vec()));
    }

    #[test]
    fn test_coerce_keeps_unparsable_integers() {
        let column = Column::new("id", "BIGINT");
        assert_eq!(
            coerce(Value::Text("abc".into()), Some(&column)),
            Value::Text("abc".into())
        );
        assert_eq!(coerce(Value::Real(3.0), Some(&column)), Value::Integer(3));
    }

    #[test]
    fn test_row_ref_get() {
        let rows = rows();
        let row = rows.first().unwrap();

        assert_eq!(row.get::<String>("note").unwrap(), "");
        assert_eq!(row.get::<Option<String>>("note").unwrap(), None);
        assert_eq!(row.get::<i64>("missing").unwrap(), 0);
        assert_eq!(row.get::<f64>("score").unwrap(), 9.5);
        assert!(matches!(
            row.get::<i64>("id"),
            Err(DbError::Decode { ref column, .. }) if column == "id"
        ));
    }

    #[test]
    fn test_row_map_ext() {
        let mut row = RowMap::new();
        row.insert("age".into(), "31".into());
        row.insert("ratio".into(), "0.25".into());
        row.insert("active".into(), "Yes".into());
        row.insert("empty".into(), String::new());

        assert_eq!(row.int("age"), 31);
        assert_eq!(row.int("ratio"), 0);
        assert_eq!(row.int("missing"), 0);
        assert_eq!(row.float("ratio"), 0.25);
        assert!(row.bool_value("active"));
        assert!(!row.bool_value("age"));
        assert_eq!(row.field_or("empty", "n/a"), "n/a");
        assert_eq!(row.field_or("age", "n/a"), "31");
    }

    #[test]
    fn test_row_maps_ext() {
        let maps = vec![
            RowMap::from([("id".into(), "1".into()), ("kind".into(), "a".into())]),
            RowMap::from([("id".into(), "2".into()), ("kind".into(), "b".into())]),
            RowMap::from([("id".into(), "3".into()), ("kind".into(), "a".into())]),
        ];

        assert_eq!(maps.pluck("id"), ["1", "2", "3"]);
        assert_eq!(maps.index_by("id")["2"]["kind"], "b");
        assert_eq!(maps.group_by("kind")["a"].len(), 2);
    }
}
