use crud_utils::sql::{qualified, quote, unquote};

use crate::catalog::Catalog;

/// A projected field after qualification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Qualified {
    pub text: String,
    /// Table the field was qualified with, `None` when left as written.
    pub table: Option<String>,
}

impl Qualified {
    fn verbatim(text: &str) -> Self {
        Self {
            text: text.to_string(),
            table: None,
        }
    }
}

/// Qualifies a projected field with its table.
///
/// For an expression with spaces only one token is rewritten: the one right
/// before `AS` or, without an alias, the last one. A token written as
/// `table.column` is quoted as `` `table`.`column` `` when the catalog knows
/// the pair, `table.*` works for any known table. A bare column is qualified
/// with `base` when the base table has it. Everything else is kept verbatim.
///
/// Already qualified input comes back unchanged.
pub fn qualify(field: &str, base: &str, catalog: &Catalog) -> Qualified {
    let field = field.trim();
    if !field.contains(char::is_whitespace) {
        return qualify_segment(field, base, catalog);
    }

    let mut tokens: Vec<&str> = field.split_whitespace().collect();
    let target = match tokens.iter().position(|t| t.eq_ignore_ascii_case("AS")) {
        Some(0) => return Qualified::verbatim(field),
        Some(i) => i - 1,
        None => tokens.len() - 1,
    };

    let segment = qualify_segment(tokens[target], base, catalog);
    if segment.table.is_none() {
        return Qualified::verbatim(field);
    }
    tokens[target] = &segment.text;
    Qualified {
        text: tokens.join(" "),
        table: segment.table.clone(),
    }
}

fn qualify_segment(segment: &str, base: &str, catalog: &Catalog) -> Qualified {
    let base = unquote(base);

    let Some((table, column)) = segment.split_once('.') else {
        let column = unquote(segment);
        if catalog.has_column(&base, &column) {
            return Qualified {
                text: qualified(&base, &column),
                table: Some(base),
            };
        }
        return Qualified::verbatim(segment);
    };

    let table = match unquote(table) {
        t if t.is_empty() => base,
        t => t,
    };
    let column = match unquote(column) {
        c if c.is_empty() => "*".to_string(),
        c => c,
    };

    if column == "*" && catalog.has_table(&table) {
        return Qualified {
            text: format!("{}.*", quote(&table)),
            table: Some(table),
        };
    }
    if catalog.has_column(&table, &column) {
        return Qualified {
            text: qualified(&table, &column),
            table: Some(table),
        };
    }
    Qualified::verbatim(segment)
}
