//! The full stored collection at one point in time

use std::collections::HashSet;

use serde::Serialize;

use super::change_log::ChangeLogEntry;
use super::record::Record;

/// Records plus their audit log, as read from or written to the workbook.
///
/// `columns` is the `apontamentos` header row. It only ever grows: a column
/// first seen on an incoming record is appended, none is ever removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
    pub log: Vec<ChangeLogEntry>,
}

impl Snapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// IDs of every record carrying one.
    #[must_use]
    pub fn ids(&self) -> HashSet<String> {
        self.records.iter().filter_map(Record::id).collect()
    }

    /// First record with the given ID.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Record> {
        self.records
            .iter()
            .find(|record| record.id().as_deref() == Some(id))
    }

    /// Append a column to the schema unless already present.
    ///
    /// Returns `true` when the column was added.
    pub fn ensure_column(&mut self, name: &str) -> bool {
        if self.columns.iter().any(|column| column == name) {
            return false;
        }
        self.columns.push(name.to_string());
        true
    }

    /// Extend the schema with every field of `record` it does not know yet.
    pub fn absorb_columns(&mut self, record: &Record) {
        for (name, _) in record.fields() {
            self.ensure_column(name);
        }
    }

    /// The most recent `count` log entries, oldest first.
    #[must_use]
    pub fn last_log_entries(&self, count: usize) -> &[ChangeLogEntry] {
        let start = self.log.len().saturating_sub(count);
        &self.log[start..]
    }

    /// Log entries about one record, oldest first.
    pub fn history<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a ChangeLogEntry> + 'a {
        self.log.iter().filter(move |entry| entry.record_id == id)
    }
}
