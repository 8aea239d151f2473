use crud_db::{
    decode::{coerce, value_to_string},
    Database, Resolver, Rows, Upsert, Value,
};
use miette::{miette, IntoDiagnostic};
use nu_ansi_term::Color::{Blue, Cyan, Green, Yellow};
use tabled::{
    builder::Builder,
    settings::{themes::BorderCorrection, Panel, Style},
};
use tracing::{debug, info};

use crate::utils::{rows_json, rows_table, table_fields, Colored};

pub struct SelectOptions {
    pub table: String,
    pub fields: Vec<String>,
    pub filter: Option<String>,
    pub args: Vec<String>,
    pub join: Vec<String>,
    pub order: Option<String>,
    pub desc: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub count: bool,
}

fn print_json(value: &serde_json::Value) -> miette::Result<()> {
    let output = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{output}");
    Ok(())
}

fn print_rows(rows: &Rows, title: &str, json: bool) -> miette::Result<()> {
    if json {
        return print_json(&rows_json(rows));
    }
    if rows.is_empty() {
        info!("No rows in {}", Colored(Blue, title));
        return Ok(());
    }
    info!("\n{}", rows_table(rows, title));
    Ok(())
}

pub fn list_tables(db: &Database, json: bool) -> miette::Result<()> {
    let mut tables = db.catalog().table_names()?;
    tables.sort();

    let mut listing = Vec::with_capacity(tables.len());
    for table in tables {
        let columns = db.catalog().columns(&table)?.len();
        listing.push((table, columns));
    }

    if json {
        let value = listing
            .iter()
            .map(|(table, columns)| serde_json::json!({ "table": table, "columns": columns }))
            .collect();
        return print_json(&serde_json::Value::Array(value));
    }

    for (table, columns) in &listing {
        info!("{} ({} columns)", Colored(Blue, table), Colored(Cyan, columns));
    }
    Ok(())
}

pub fn show_columns(db: &Database, table: &str, json: bool) -> miette::Result<()> {
    let table = db.table(table);
    let schema = table.schema()?;
    if schema.is_empty() {
        return Err(miette!("unknown table `{}`", table.name()));
    }

    if json {
        let value = serde_json::to_value(schema.columns()).into_diagnostic()?;
        return print_json(&value);
    }

    let mut builder = Builder::new();
    builder.push_record(["Column", "Type", "Nullable", "Comment"].map(String::from));
    for column in schema.columns() {
        builder.push_record([
            Colored(Blue, &column.name).to_string(),
            column.column_type.clone(),
            if column.nullable { "yes" } else { "no" }.to_string(),
            column.comment.clone(),
        ]);
    }
    let output = builder
        .build()
        .with(Panel::header(table.name()))
        .with(Style::rounded())
        .with(BorderCorrection {})
        .to_string();

    info!("\n{output}");
    Ok(())
}

pub fn select(db: &Database, options: SelectOptions, json: bool) -> miette::Result<()> {
    let mut search = db.table(&options.table).search();
    if !options.fields.is_empty() {
        search = search.fields(options.fields);
    }
    for table in &options.join {
        search = search.join(table);
    }
    if let Some(filter) = options.filter {
        let args = options.args.into_iter().map(Value::Text).collect();
        search = search.filter(filter, args);
    }
    if let Some(order) = options.order {
        search = search.order_by(order, options.desc);
    }
    if let Some(limit) = options.limit {
        search = search.limit(limit);
    }
    if let Some(offset) = options.offset {
        search = search.offset(offset);
    }

    let (sql, _) = search.build();
    debug!("{}", sql);

    if options.count {
        let count = search.count()?;
        if json {
            return print_json(&serde_json::json!({ "count": count }));
        }
        info!("{}", count);
        return Ok(());
    }

    let rows = search.rows()?;
    print_rows(&rows, search.table(), json)
}

pub fn insert(
    db: &Database,
    table: &str,
    values: &[String],
    unique: &[String],
    upsert: bool,
) -> miette::Result<()> {
    let table = db.table(table);
    let fields = table_fields(&table, values)?;
    let unique: Vec<&str> = unique.iter().map(String::as_str).collect();

    if upsert {
        match table.create_or_update(fields, &unique)? {
            Upsert::Created(id) => info!("Created {} #{}", table.name(), Colored(Green, id)),
            Upsert::Updated => info!("Updated existing {} row", table.name()),
            Upsert::Unchanged => info!("{} row already up to date", table.name()),
        }
        return Ok(());
    }

    let id = table.create(fields, &unique)?;
    info!("Created {} #{}", table.name(), Colored(Green, id));
    Ok(())
}

pub fn update(db: &Database, table: &str, values: &[String], keys: &[String]) -> miette::Result<()> {
    let table = db.table(table);
    let fields = table_fields(&table, values)?;
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();

    table.update(fields, &keys)?;
    info!("Updated {} row", table.name());
    Ok(())
}

pub fn delete(db: &Database, table: &str, filter: &[String]) -> miette::Result<()> {
    let table = db.table(table);
    let filter = table_fields(&table, filter)?;

    let count = table.delete(filter)?;
    info!("Deleted {} {} rows", Colored(Yellow, count), table.name());
    Ok(())
}

pub fn relate(db: &Database, table: &str, id: &str, target: &str, json: bool) -> miette::Result<()> {
    let table = db.table(table);
    let schema = table.schema()?;
    if schema.is_empty() {
        return Err(miette!("unknown table `{}`", table.name()));
    }

    let id = coerce(Value::Text(id.to_string()), schema.column("id"));
    let rows = table.search().filter_id(id.clone()).rows()?;
    let row = rows
        .value_maps(&[schema.as_ref()])
        .into_iter()
        .next()
        .ok_or_else(|| miette!("no live `{}` row with id {}", table.name(), value_to_string(&id)))?;

    let target = db.table(target);
    let resolver = Resolver::new(db.catalog(), &db.options().columns.is_deleted);
    let Some(relationship) = resolver.resolve(table.name(), |column| row.get(column).cloned(), target.name())
    else {
        info!(
            "No relationship from {} to {}",
            Colored(Blue, table.name()),
            Colored(Blue, target.name())
        );
        return Ok(());
    };

    debug!("{}", relationship.sql);
    let related = db.query(&relationship.sql, std::slice::from_ref(&relationship.arg))?;
    print_rows(&related, target.name(), json)
}
