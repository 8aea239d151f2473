//! Loading of nested relations.
//!
//! The [`Graph`] walks the relation slots of a record, resolves each slot's
//! table against the record's table, runs the resulting query and recurses
//! into the decoded records. Expansion stops at the configured depth and
//! at records already being expanded higher up the same path.

use tracing::{debug, warn};

use crate::{
    database::Database,
    decode::{value_to_string, Rows},
    error::Result,
    record::Record,
    relation::Resolver,
};

/// What a population run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphReport {
    /// Relation slots filled from a query.
    pub expanded: usize,
    /// Relation slots left alone: no relationship, or a cycle.
    pub skipped: usize,
    /// Records whose relations were not loaded because the depth bound was hit.
    pub truncated: usize,
}

impl GraphReport {
    pub fn merge(&mut self, other: GraphReport) {
        self.expanded += other.expanded;
        self.skipped += other.skipped;
        self.truncated += other.truncated;
    }
}

pub struct Graph<'a> {
    db: &'a Database,
    max_depth: usize,
    path: Vec<(String, String)>,
    report: GraphReport,
}

impl<'a> Graph<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            max_depth: db.options().max_relation_depth,
            path: Vec::new(),
            report: GraphReport::default(),
        }
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn report(&self) -> GraphReport {
        self.report
    }

    /// Loads the relations of `record` and, recursively, of every record loaded.
    pub fn populate<T: Record>(&mut self, record: &mut T) -> Result<()> {
        self.expand(record, 0)
    }

    /// Loads the relations of a record found `depth` levels below the root.
    pub fn expand<T: Record>(&mut self, record: &mut T, depth: usize) -> Result<()> {
        let table = T::table_name();
        let targets: Vec<(&'static str, String)> = record
            .relations()
            .iter()
            .map(|relation| (relation.field, relation.slot.table()))
            .collect();
        if targets.is_empty() {
            return Ok(());
        }

        if depth >= self.max_depth {
            warn!(
                "relations of `{}` not loaded, depth limit {} reached",
                table, self.max_depth
            );
            self.report.truncated += 1;
            return Ok(());
        }

        let key = record
            .value("id")
            .map(|id| (table.clone(), value_to_string(&id)));
        if let Some(key) = &key {
            if self.path.contains(key) {
                debug!("`{}` {} already on the path, not expanding", key.0, key.1);
                self.report.skipped += targets.len();
                return Ok(());
            }
        }

        let db = self.db;
        let resolver = Resolver::new(db.catalog(), &db.options().columns.is_deleted);
        let mut fetched: Vec<Option<Rows>> = Vec::with_capacity(targets.len());
        for (field, target) in &targets {
            match resolver.resolve_record(&*record, target) {
                Some(relationship) => {
                    let rows = db.query(&relationship.sql, std::slice::from_ref(&relationship.arg))?;
                    fetched.push(Some(rows));
                }
                None => {
                    debug!("no relationship from `{}` to `{}` for `{}`", table, target, field);
                    fetched.push(None);
                }
            }
        }

        if let Some(key) = &key {
            self.path.push(key.clone());
        }
        let result = self.fill(record, &fetched, depth);
        if key.is_some() {
            self.path.pop();
        }
        result
    }

    fn fill<T: Record>(&mut self, record: &mut T, fetched: &[Option<Rows>], depth: usize) -> Result<()> {
        for (relation, rows) in record.relations().into_iter().zip(fetched) {
            match rows {
                Some(rows) => {
                    self.report.expanded += 1;
                    relation.slot.fill(self, rows, depth + 1)?;
                }
                None => self.report.skipped += 1,
            }
        }
        Ok(())
    }
}
