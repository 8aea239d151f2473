//! Macros for declaring records and building argument lists.

/// Implements [`Record`](crate::record::Record) for a struct.
///
/// Stored fields are listed in the braces after the type name; each maps to
/// the column of the same name. Fields holding related records go under
/// `relations`, fields that are neither under `extra`. Both are set to their
/// `Default` when a row is decoded.
///
/// Write hooks (`before_create`, `after_create`, `before_update`,
/// `after_update`, `before_delete`, `after_delete`) go under `hooks`, each
/// naming a `fn(&mut T) -> Result<()>`.
///
/// # Syntax
///
/// ```ignore
/// impl_record! {
///     Post as "posts" { id, title, user_id }
///     relations { user, tags }
///     extra { cached_score }
///     after_find = Post::normalize;
///     hooks { before_create = Post::validate, after_delete = Post::forget }
/// }
/// ```
///
/// Everything after the stored fields is optional. Without `as`, the table
/// name is the storage name of the type, `post` for `Post`.
///
/// # Example
///
/// ```
/// use crud_db::{impl_record, record::Record};
///
/// #[derive(Default)]
/// struct User {
///     id: i64,
///     name: String,
///     orders: Vec<Order>,
/// }
///
/// #[derive(Default)]
/// struct Order {
///     id: i64,
///     user_id: i64,
/// }
///
/// impl_record! {
///     User { id, name }
///     relations { orders }
/// }
/// impl_record! {
///     Order { id, user_id }
/// }
///
/// assert_eq!(User::table_name(), "user");
/// ```
#[macro_export]
macro_rules! impl_record {
    (
        $ty:ident $(as $table:literal)? {
            $($field:ident),* $(,)?
        }
        $(relations { $($rel:ident),* $(,)? })?
        $(extra { $($extra:ident),* $(,)? })?
        $(after_find = $hook:path;)?
        $(hooks { $($hook_name:ident = $hook_fn:path),* $(,)? })?
    ) => {
        impl $crate::record::Record for $ty {
            const TYPE_NAME: &'static str = stringify!($ty);
            $(const TABLE: Option<&'static str> = Some($table);)?

            fn columns() -> &'static [&'static str] {
                &[$(stringify!($field)),*]
            }

            fn from_row(row: &$crate::decode::RowRef<'_>) -> $crate::error::Result<Self> {
                Ok(Self {
                    $($field: row.get(stringify!($field))?,)*
                    $($($rel: Default::default(),)*)?
                    $($($extra: Default::default(),)*)?
                })
            }

            fn value(&self, column: &str) -> Option<$crate::Value> {
                match column {
                    $(stringify!($field) => Some($crate::record::to_value(&self.$field)),)*
                    _ => None,
                }
            }

            #[allow(unused_variables)]
            fn set_value(
                &mut self,
                column: &str,
                value: $crate::Value,
            ) -> $crate::error::Result<bool> {
                let columns = [column.to_string()];
                let values = [value];
                let row = $crate::decode::RowRef::new(&columns, &values);
                match column {
                    $(stringify!($field) => {
                        self.$field = row.get(column)?;
                        Ok(true)
                    })*
                    _ => Ok(false),
                }
            }

            $(
                fn relations(&mut self) -> Vec<$crate::record::Relation<'_>> {
                    vec![$($crate::record::Relation::new(stringify!($rel), &mut self.$rel),)*]
                }
            )?

            $(
                fn after_find(&mut self) {
                    $hook(self)
                }
            )?

            $($(
                fn $hook_name(&mut self) -> $crate::error::Result<()> {
                    $hook_fn(self)
                }
            )*)?
        }
    };
}

/// Builds a `Vec<Value>` of bound arguments.
///
/// ```
/// use crud_db::{args, Value};
///
/// assert_eq!(args![7, "a"], vec![Value::Integer(7), Value::Text("a".into())]);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::record::to_value(&$value)),+]
    };
}

/// Builds the [`Fields`](crate::table::Fields) map of a table operation.
///
/// ```
/// use crud_db::{fields, Value};
///
/// let fields = fields! { "name" => "ada", "age" => 36 };
/// assert_eq!(fields["age"], Value::Integer(36));
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::table::Fields::new()
    };
    ($($column:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::table::Fields::new();
        $(fields.insert(String::from($column), $crate::record::to_value(&$value));)+
        fields
    }};
}
