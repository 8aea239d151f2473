use std::{path::Path, sync::Arc};

use clap::Parser;
use cli::{Args, Commands};
use commands::{delete, insert, list_tables, relate, select, show_columns, update, SelectOptions};
use crud_config::config::{generate_default_config, Config, MEMORY};
use crud_db::{Database, Options, SqliteDriver};
use crud_utils::path::expand_tilde;
use logging::setup_logging;
use tracing::{debug, info};
use utils::COLOR;

mod cli;
mod commands;
mod logging;
mod utils;

fn load_config(args: &Args) -> miette::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(expand_tilde(path))?,
        None => Config::new()?,
    };
    if args.log_sql {
        config.log_sql = Some(true);
    }
    Ok(config)
}

/// Opens `--data-source` when given, the configured data source otherwise.
fn open_database(args: &Args, config: &Config) -> miette::Result<Database> {
    let Some(source) = &args.data_source else {
        return Ok(Database::open(config)?);
    };

    let driver = if source == MEMORY {
        SqliteDriver::open_in_memory()?
    } else {
        SqliteDriver::open(expand_tilde(source))?
    };
    debug!("opened {}", source);
    Ok(Database::new(Arc::new(driver), Options::from(config))?)
}

fn handle_cli() -> miette::Result<()> {
    let args = Args::parse();

    setup_logging(&args);

    if args.no_color {
        if let Ok(mut color) = COLOR.write() {
            *color = false;
        }
    }

    if let Commands::DefConfig {
        path,
    } = &args.command
    {
        let path = generate_default_config(path.as_deref().map(Path::new))?;
        info!("Default configuration written to {}", path.display());
        return Ok(());
    }

    let config = load_config(&args)?;
    if let Commands::Config = args.command {
        let document = config.to_annotated_document()?;
        info!("{}", document.to_string().trim_end());
        return Ok(());
    }

    let db = open_database(&args, &config)?;
    let json = args.json;

    match args.command {
        Commands::Tables => list_tables(&db, json)?,
        Commands::Columns {
            table,
        } => show_columns(&db, &table, json)?,
        Commands::Select {
            table,
            fields,
            filter,
            args,
            join,
            order,
            desc,
            limit,
            offset,
            count,
        } => select(
            &db,
            SelectOptions {
                table,
                fields,
                filter,
                args,
                join,
                order,
                desc,
                limit,
                offset,
                count,
            },
            json,
        )?,
        Commands::Insert {
            table,
            values,
            unique,
            upsert,
        } => insert(&db, &table, &values, &unique, upsert)?,
        Commands::Update {
            table,
            values,
            key,
        } => update(&db, &table, &values, &key)?,
        Commands::Delete {
            table,
            filter,
        } => delete(&db, &table, &filter)?,
        Commands::Relate {
            table,
            id,
            target,
        } => relate(&db, &table, &id, &target, json)?,
        Commands::Config | Commands::DefConfig {
            ..
        } => unreachable!(),
    }

    Ok(())
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}
