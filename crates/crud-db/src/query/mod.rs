//! Statement building.
//!
//! [`Search`] accumulates the fragments of one `SELECT` and compiles them
//! into SQL text plus its bound arguments. Field names are qualified against
//! the [`Catalog`](crate::catalog::Catalog) by [`qualify`].

mod clause;
mod field;
mod search;

use rusqlite::types::Value;

pub use field::{qualify, Qualified};
pub use search::Search;

/// Replaces each `?` placeholder in `sql` with its argument, for logging and
/// error reports. The result is not meant to be executed.
///
/// Placeholders inside quoted literals are left alone. Surplus placeholders
/// stay as `?`.
///
/// ```
/// use crud_db::{query::interpolate, Value};
///
/// let sql = interpolate(
///     "SELECT * FROM `user` WHERE name = ? AND id = ?",
///     &[Value::Text("o'neil".into()), Value::Integer(7)],
/// );
/// assert_eq!(sql, "SELECT * FROM `user` WHERE name = 'o''neil' AND id = 7");
/// ```
pub fn interpolate(sql: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut args = args.iter();
    let mut quote: Option<char> = None;

    for c in sql.chars() {
        match (c, quote) {
            ('?', None) => match args.next() {
                Some(arg) => out.push_str(&literal(arg)),
                None => out.push('?'),
            },
            ('\'' | '"' | '`', None) => {
                quote = Some(c);
                out.push(c);
            }
            (c, Some(q)) if c == q => {
                quote = None;
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".into(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Blob(b) => format!(
            "X'{}'",
            b.iter().map(|byte| format!("{byte:02X}")).collect::<String>()
        ),
    }
}
