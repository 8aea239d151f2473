use std::sync::Arc;

use crate::{
    connection::SqliteDriver,
    database::{Database, Options},
};

pub const SCHEMA: &str = "
CREATE TABLE user (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR(64) NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    created_at TEXT,
    updated_at TEXT,
    deleted_at TEXT
);
CREATE TABLE `order` (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    status TEXT
);
CREATE TABLE post (id INTEGER PRIMARY KEY, title TEXT, user_id INTEGER);
CREATE TABLE tag (id INTEGER PRIMARY KEY, name TEXT);
CREATE TABLE post_tag (id INTEGER PRIMARY KEY, post_id INTEGER, tag_id INTEGER);
";

/// In-memory database with the test schema, its catalog preloaded.
pub fn memory_db() -> Database {
    let driver = SqliteDriver::open_in_memory().unwrap();
    driver.execute_batch(SCHEMA).unwrap();
    Database::new(Arc::new(driver), Options::default()).unwrap()
}
