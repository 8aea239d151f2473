use std::{
    fs,
    path::{Path, PathBuf},
};

use crud_utils::path::{expand_tilde, xdg_config_home};
use documented::{Documented, DocumentedFields};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{debug, info};

use crate::{
    annotations::annotate_toml_table,
    error::{ConfigError, Result},
};

/// Name of the in-memory data source.
pub const MEMORY: &str = ":memory:";

pub const DEFAULT_MAX_RELATION_DEPTH: usize = 8;
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Data-access layer configuration
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
pub struct Config {
    /// Database to open, either a SQLite file path or `:memory:`.
    /// Overridden by the CRUD_DATA_SOURCE environment variable.
    /// Default: crud.db
    pub data_source: Option<String>,

    /// How many levels of related records are loaded when populating a record graph.
    /// Default: 8
    pub max_relation_depth: Option<usize>,

    /// If true, every executed statement is logged with its arguments interpolated.
    /// Default: false
    pub log_sql: Option<bool>,

    /// If true, the column metadata of every table is loaded when the database is opened.
    /// Default: true
    pub preload_schema: Option<bool>,

    /// strftime format used for the bookkeeping timestamp columns.
    /// Default: %Y-%m-%d %H:%M:%S
    pub time_format: Option<String>,

    /// Names of the bookkeeping columns maintained automatically.
    #[serde(default)]
    pub columns: ColumnNames,
}

/// Bookkeeping column names
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Documented, DocumentedFields)]
#[serde(default)]
pub struct ColumnNames {
    /// Column marking a row as logically deleted (0 = live, 1 = deleted).
    pub is_deleted: String,

    /// Column stamped when a row is created.
    pub created_at: String,

    /// Column stamped when a row is updated.
    pub updated_at: String,

    /// Column stamped when a row is logically deleted.
    pub deleted_at: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            is_deleted: "is_deleted".into(),
            created_at: "created_at".into(),
            updated_at: "updated_at".into(),
            deleted_at: "deleted_at".into(),
        }
    }
}

impl ColumnNames {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("columns.is_deleted", &self.is_deleted),
            ("columns.created_at", &self.created_at),
            ("columns.updated_at", &self.updated_at),
            ("columns.deleted_at", &self.deleted_at),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    reason: "column name must not be empty".into(),
                });
            }
        }
        Ok(())
    }
}

/// Location of the configuration file, `$CRUD_CONFIG` or
/// `$XDG_CONFIG_HOME/crud/config.toml`.
pub fn config_path() -> PathBuf {
    match std::env::var("CRUD_CONFIG") {
        Ok(path) => expand_tilde(&path),
        Err(_) => xdg_config_home().join("crud").join("config.toml"),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            data_source: Some("crud.db".into()),
            max_relation_depth: Some(DEFAULT_MAX_RELATION_DEPTH),
            log_sql: Some(false),
            preload_schema: Some(true),
            time_format: Some(DEFAULT_TIME_FORMAT.into()),
            columns: ColumnNames::default(),
        }
    }

    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self {
            data_source: Some(MEMORY.into()),
            ..Self::default_config()
        }
    }

    /// Loads the configuration from [`config_path`].
    /// If the configuration file is not found, the default configuration is used.
    pub fn new() -> Result<Self> {
        let path = config_path();
        match Self::from_file(&path) {
            Err(ConfigError::IoError(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("no config file at {}, using defaults", path.display());
                Ok(Self::default_config())
            }
            other => other,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config: Config = toml::from_str(&content)?;
        config.resolve()?;
        Ok(config)
    }

    /// Fills unset options with their defaults and validates the result.
    pub fn resolve(&mut self) -> Result<()> {
        self.data_source.get_or_insert_with(|| "crud.db".into());
        self.max_relation_depth
            .get_or_insert(DEFAULT_MAX_RELATION_DEPTH);
        self.log_sql.get_or_insert(false);
        self.preload_schema.get_or_insert(true);
        self.time_format
            .get_or_insert_with(|| DEFAULT_TIME_FORMAT.into());

        if self.max_relation_depth == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_relation_depth".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.time_format.as_deref().is_some_and(|f| f.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "time_format".into(),
                reason: "must not be empty".into(),
            });
        }
        self.columns.validate()
    }

    pub fn get_data_source(&self) -> String {
        let source = std::env::var("CRUD_DATA_SOURCE")
            .ok()
            .or_else(|| self.data_source.clone())
            .unwrap_or_else(|| "crud.db".into());
        if source == MEMORY {
            return source;
        }
        expand_tilde(&source).display().to_string()
    }

    pub fn get_max_relation_depth(&self) -> usize {
        self.max_relation_depth
            .unwrap_or(DEFAULT_MAX_RELATION_DEPTH)
    }

    pub fn get_log_sql(&self) -> bool {
        self.log_sql.unwrap_or(false)
    }

    pub fn get_preload_schema(&self) -> bool {
        self.preload_schema.unwrap_or(true)
    }

    pub fn get_time_format(&self) -> &str {
        self.time_format.as_deref().unwrap_or(DEFAULT_TIME_FORMAT)
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;

        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;

        if let Some(columns) = doc.get_mut("columns").and_then(|c| c.as_table_mut()) {
            annotate_toml_table::<ColumnNames>(columns, false)?;
        }

        Ok(doc)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// Writes the default configuration, annotated with the documentation of
/// every option, to `path` or to [`config_path`].
pub fn generate_default_config(path: Option<&Path>) -> Result<PathBuf> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(config_path);

    if config_path.exists() {
        return Err(ConfigError::ConfigAlreadyExists(
            config_path.display().to_string(),
        ));
    }

    let annotated_doc = Config::default_config().to_annotated_document()?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(&config_path, annotated_doc.to_string())?;
    info!(
        "Default configuration file generated with documentation at: {}",
        config_path.display()
    );
    Ok(config_path)
}
