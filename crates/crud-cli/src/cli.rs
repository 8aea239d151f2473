use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    /// Database to open, overriding the configuration
    #[arg(short = 'd', long, global = true, value_hint = ValueHint::FilePath)]
    pub data_source: Option<String>,

    /// Log every statement with its arguments interpolated
    #[arg(long, global = true)]
    pub log_sql: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the configuration
    Config,

    /// Write the default configuration file
    #[clap(name = "defconfig")]
    DefConfig {
        /// Where to write it, the default config path if omitted
        #[arg(required = false, value_hint = ValueHint::FilePath)]
        path: Option<String>,
    },

    /// List the tables of the database
    #[clap(name = "tables", visible_alias = "ls")]
    Tables,

    /// Show the columns of a table
    #[command(arg_required_else_help = true)]
    Columns {
        /// Table or type name
        #[arg(required = true)]
        table: String,
    },

    /// Select live rows of a table
    #[command(arg_required_else_help = true)]
    #[clap(name = "select", visible_alias = "s")]
    Select {
        /// Table or type name
        #[arg(required = true)]
        table: String,

        /// Fields to select, qualified against the known tables
        #[arg(required = false, short, long, value_delimiter = ',')]
        fields: Vec<String>,

        /// WHERE fragment with `?` placeholders
        #[arg(required = false, short = 'w', long = "where")]
        filter: Option<String>,

        /// Values bound to the placeholders, in order
        #[arg(required = false, short, long = "arg")]
        args: Vec<String>,

        /// Tables to join on inferred conditions
        #[arg(required = false, long, value_delimiter = ',')]
        join: Vec<String>,

        /// Order by this field
        #[arg(required = false, short, long)]
        order: Option<String>,

        /// Order descending
        #[arg(required = false, long, requires = "order")]
        desc: bool,

        /// Maximum number of rows
        #[arg(required = false, short, long)]
        limit: Option<i64>,

        /// Rows to skip
        #[arg(required = false, long)]
        offset: Option<i64>,

        /// Print the number of matching rows only
        #[arg(required = false, long)]
        count: bool,
    },

    /// Insert a row
    #[command(arg_required_else_help = true)]
    Insert {
        /// Table or type name
        #[arg(required = true)]
        table: String,

        /// Column values as `column=value`
        #[arg(required = true, num_args = 1..)]
        values: Vec<String>,

        /// Refuse the insert when a live row has the same values in these columns
        #[arg(required = false, long, value_delimiter = ',')]
        unique: Vec<String>,

        /// Update the existing row instead of refusing the insert
        #[arg(required = false, long, requires = "unique")]
        upsert: bool,
    },

    /// Update the single row identified by the key columns
    #[command(arg_required_else_help = true)]
    Update {
        /// Table or type name
        #[arg(required = true)]
        table: String,

        /// Column values as `column=value`, key columns included
        #[arg(required = true, num_args = 1..)]
        values: Vec<String>,

        /// Key columns, `id` if omitted
        #[arg(required = false, short, long, value_delimiter = ',')]
        key: Vec<String>,
    },

    /// Delete the rows matching every `column=value`
    #[command(arg_required_else_help = true)]
    #[clap(name = "delete", visible_alias = "rm")]
    Delete {
        /// Table or type name
        #[arg(required = true)]
        table: String,

        /// Filter as `column=value`
        #[arg(required = true, num_args = 1..)]
        filter: Vec<String>,
    },

    /// Show the rows of `target` related to one row of `table`
    #[command(arg_required_else_help = true)]
    Relate {
        /// Table of the known row
        #[arg(required = true)]
        table: String,

        /// Id of the known row
        #[arg(required = true)]
        id: String,

        /// Table to resolve
        #[arg(required = true)]
        target: String,
    },
}
