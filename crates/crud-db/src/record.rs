//! Typed records and their relation slots.
//!
//! A [`Record`] knows its table, how to decode itself from a row and how
//! to hand out the values of its columns. Records with nested relations
//! expose them as [`Relation`]s, which the [`Graph`] fills. Implement it
//! with the [`impl_record!`](crate::impl_record) macro.

use crud_utils::naming::to_storage_name;
use rusqlite::{
    types::{ToSqlOutput, Value},
    ToSql,
};

use crate::{
    decode::{RowRef, Rows},
    error::Result,
    graph::Graph,
    table::Fields,
};

/// A type stored as rows of one table.
pub trait Record: Sized {
    /// Identifier name of the type, `QuestionOption`.
    const TYPE_NAME: &'static str;

    /// Explicit table name, overriding the one derived from [`Self::TYPE_NAME`].
    const TABLE: Option<&'static str> = None;

    fn table_name() -> String {
        match Self::TABLE {
            Some(table) => table.to_string(),
            None => to_storage_name(Self::TYPE_NAME),
        }
    }

    /// Stored columns, in declaration order.
    fn columns() -> &'static [&'static str];

    fn from_row(row: &RowRef<'_>) -> Result<Self>;

    /// Current value of `column`, `None` if the record has no such column.
    fn value(&self, column: &str) -> Option<Value>;

    /// Stores `value` in `column`. Returns `false` if the record has no such
    /// column.
    fn set_value(&mut self, column: &str, value: Value) -> Result<bool>;

    /// Values of every stored column.
    fn fields(&self) -> Fields {
        Self::columns()
            .iter()
            .filter_map(|column| Some((column.to_string(), self.value(column)?)))
            .collect()
    }

    fn relations(&mut self) -> Vec<Relation<'_>> {
        Vec::new()
    }

    /// Called on every record after it was decoded.
    fn after_find(&mut self) {}

    /// Called before the record is inserted. An error aborts the insert.
    fn before_create(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_create(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called before the record is updated. An error aborts the update.
    fn before_update(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_update(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called before the record is deleted. An error aborts the delete.
    fn before_delete(&mut self) -> Result<()> {
        Ok(())
    }

    fn after_delete(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A nested field filled with related records.
pub struct Relation<'a> {
    pub field: &'static str,
    pub slot: &'a mut dyn Slot,
}

impl<'a> Relation<'a> {
    pub fn new(field: &'static str, slot: &'a mut dyn Slot) -> Self {
        Self { field, slot }
    }
}

/// Storage for related records: `Vec<T>` for many, `Option<T>` for one.
pub trait Slot {
    /// Table the related records are read from.
    fn table(&self) -> String;

    /// Decodes `rows` into the slot and expands their own relations.
    fn fill(&mut self, graph: &mut Graph<'_>, rows: &Rows, depth: usize) -> Result<()>;
}

impl<T: Record> Slot for Vec<T> {
    fn table(&self) -> String {
        T::table_name()
    }

    fn fill(&mut self, graph: &mut Graph<'_>, rows: &Rows, depth: usize) -> Result<()> {
        let mut records = decode_records::<T>(rows)?;
        for record in &mut records {
            graph.expand(record, depth)?;
        }
        *self = records;
        Ok(())
    }
}

impl<T: Record> Slot for Option<T> {
    fn table(&self) -> String {
        T::table_name()
    }

    fn fill(&mut self, graph: &mut Graph<'_>, rows: &Rows, depth: usize) -> Result<()> {
        let mut record = match rows.first() {
            Some(row) => T::from_row(&row)?,
            None => {
                *self = None;
                return Ok(());
            }
        };
        record.after_find();
        graph.expand(&mut record, depth)?;
        *self = Some(record);
        Ok(())
    }
}

/// Decodes every row into `T` and runs its [`Record::after_find`] hook.
pub fn decode_records<T: Record>(rows: &Rows) -> Result<Vec<T>> {
    let mut records = rows.decode::<T>()?;
    records.iter_mut().for_each(Record::after_find);
    Ok(records)
}

/// Converts anything bindable into an owned [`Value`].
///
/// Values the driver cannot represent, such as a `u64` above `i64::MAX`,
/// become NULL.
pub fn to_value<T: ToSql + ?Sized>(value: &T) -> Value {
    match value.to_sql() {
        Ok(ToSqlOutput::Borrowed(value)) => value.into(),
        Ok(ToSqlOutput::Owned(value)) => value,
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_record;

    #[derive(Debug, Default, PartialEq)]
    struct QuestionOption {
        id: i64,
        label: String,
        weight: Option<f64>,
        touched: bool,
    }

    fn touch(option: &mut QuestionOption) {
        option.touched = true;
    }

    impl_record! {
        QuestionOption { id, label, weight }
        extra { touched }
        after_find = touch;
    }

    #[derive(Debug, Default)]
    struct Account {
        id: i64,
    }

    impl_record! {
        Account as "accounts" { id }
    }

    #[test]
    fn test_table_names() {
        assert_eq!(QuestionOption::table_name(), "question_option");
        assert_eq!(Account::table_name(), "accounts");
    }

    #[test]
    fn test_decode_and_hook() {
        let rows = Rows::new(
            vec!["id".into(), "label".into(), "weight".into()],
            vec![vec![
                Value::Integer(3),
                Value::Text("yes".into()),
                Value::Null,
            ]],
        );

        let options = decode_records::<QuestionOption>(&rows).unwrap();
        assert_eq!(
            options,
            vec![QuestionOption {
                id: 3,
                label: "yes".into(),
                weight: None,
                touched: true,
            }]
        );

        let option = &options[0];
        assert_eq!(option.value("id"), Some(Value::Integer(3)));
        assert_eq!(option.value("label"), Some(Value::Text("yes".into())));
        assert_eq!(option.value("weight"), Some(Value::Null));
        assert_eq!(option.value("touched"), None);
    }

    #[test]
    fn test_columns_and_fields() {
        let option = QuestionOption {
            id: 3,
            label: "yes".into(),
            weight: Some(0.5),
            touched: true,
        };

        assert_eq!(QuestionOption::columns(), ["id", "label", "weight"]);
        let fields = option.fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["weight"], Value::Real(0.5));
    }

    #[test]
    fn test_set_value() {
        let mut option = QuestionOption::default();

        assert!(option.set_value("id", Value::Integer(9)).unwrap());
        assert!(option.set_value("weight", Value::Real(1.5)).unwrap());
        assert!(option.set_value("label", Value::Null).unwrap());
        assert!(!option.set_value("touched", Value::Integer(1)).unwrap());
        assert!(option.set_value("id", Value::Text("nine".into())).is_err());

        assert_eq!(option.id, 9);
        assert_eq!(option.weight, Some(1.5));
        assert_eq!(option.label, "");
        assert!(!option.touched);
    }

    #[test]
    fn test_to_value() {
        assert_eq!(to_value("a"), Value::Text("a".into()));
        assert_eq!(to_value(&7_u8), Value::Integer(7));
        assert_eq!(to_value(&Some(1.5)), Value::Real(1.5));
        assert_eq!(to_value(&None::<i64>), Value::Null);
        assert_eq!(to_value(&u64::MAX), Value::Null);
    }
}
