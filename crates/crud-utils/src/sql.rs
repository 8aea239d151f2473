//! Small helpers for assembling SQL text.

/// Removes every backtick from an identifier.
pub fn unquote(ident: &str) -> String {
    ident.replace('`', "")
}

/// Wraps an identifier in backticks, dropping any quoting it already had.
///
/// ```
/// use crud_utils::sql::quote;
///
/// assert_eq!(quote("user"), "`user`");
/// assert_eq!(quote("`user`"), "`user`");
/// ```
pub fn quote(ident: &str) -> String {
    format!("`{}`", unquote(ident))
}

/// Quoted `table`.`column` pair.
pub fn qualified(table: &str, column: &str) -> String {
    format!("{}.{}", quote(table), quote(column))
}

/// Comma separated positional placeholders, `?,?,?` for `n = 3`.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// Whether `sql` contains `keyword` as a standalone, upper-case token.
///
/// Used to tell a hand written statement (`SELECT ...`) apart from a bare
/// predicate fragment.
pub fn has_keyword(sql: &str, keyword: &str) -> bool {
    sql.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|token| token == keyword)
}

/// Whether `sql` is a statement that creates, alters or drops schema objects.
pub fn is_schema_change(sql: &str) -> bool {
    sql.split_whitespace().next().is_some_and(|verb| {
        ["CREATE", "ALTER", "DROP"]
            .iter()
            .any(|ddl| verb.eq_ignore_ascii_case(ddl))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote("name"), "`name`");
        assert_eq!(quote("`name`"), "`name`");
        assert_eq!(qualified("user", "`name`"), "`user`.`name`");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(0), "");
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?,?,?");
    }

    #[test]
    fn test_has_keyword() {
        assert!(has_keyword("SELECT * FROM user", "SELECT"));
        assert!(has_keyword("(SELECT id FROM t)", "SELECT"));
        assert!(!has_keyword("selected = 1", "SELECT"));
        assert!(!has_keyword("SELECTED = 1", "SELECT"));
    }

    #[test]
    fn test_is_schema_change() {
        assert!(is_schema_change("CREATE TABLE note (id INTEGER)"));
        assert!(is_schema_change("  alter table note ADD text TEXT"));
        assert!(is_schema_change("Drop TABLE note"));
        assert!(!is_schema_change("INSERT INTO note (text) VALUES ('drop')"));
        assert!(!is_schema_change("UPDATE note SET created_at = ?"));
        assert!(!is_schema_change(""));
    }
}
