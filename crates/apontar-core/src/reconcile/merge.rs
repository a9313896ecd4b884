//! Field-level merge of incoming records into a fetched snapshot.

use chrono::NaiveDateTime;

use crate::models::{columns, ChangeLogEntry, LogOperation, Record, Snapshot};

/// Who and when, stamped on every log entry a merge writes.
#[derive(Debug, Clone, Copy)]
pub struct MergeContext<'a> {
    pub timestamp: NaiveDateTime,
    pub actor: &'a str,
    pub reason: &'a str,
}

/// IDs touched by a merge, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub log_entries: usize,
}

impl MergeSummary {
    fn note_updated(&mut self, id: &str) {
        if !self.updated.iter().any(|known| known == id) && !self.created.iter().any(|known| known == id) {
            self.updated.push(id.to_string());
        }
    }
}

/// Merge `incoming` into `base` in order.
///
/// Unknown IDs are appended as they are, with one `create` entry each.
/// Known IDs get every incoming cell written over the base cell, and an
/// `update` entry for each cell whose value actually changed. Cells the
/// incoming record does not carry are left alone. A record listed twice is
/// merged twice, so the second copy updates the first.
///
/// Records without an ID are skipped; callers reject them beforehand.
pub fn merge(base: &mut Snapshot, incoming: &[Record], ctx: &MergeContext<'_>) -> MergeSummary {
    let mut summary = MergeSummary::default();

    for record in incoming {
        let Some(id) = record.id() else {
            continue;
        };
        base.absorb_columns(record);

        let position = base
            .records
            .iter()
            .position(|existing| existing.id().as_deref() == Some(id.as_str()));

        let Some(position) = position else {
            let entry = ChangeLogEntry::new(ctx.timestamp, &id, LogOperation::Create, ctx.actor)
                .study(record.text(columns::STUDY).unwrap_or_default())
                .reason(ctx.reason);
            base.records.push(record.clone());
            base.log.push(entry);
            summary.log_entries += 1;
            summary.created.push(id);
            continue;
        };

        let target = &mut base.records[position];
        let mut changes = Vec::new();
        for (name, value) in record.fields() {
            if name == columns::ID {
                continue;
            }
            let previous = target.set(name, value.clone()).unwrap_or_default();
            if !previous.same_as(value) {
                changes.push((name.to_string(), previous.to_string(), value.to_string()));
            }
        }

        if changes.is_empty() {
            continue;
        }

        let study = target.text(columns::STUDY).unwrap_or_default();
        for (field, old_value, new_value) in changes {
            base.log.push(
                ChangeLogEntry::new(ctx.timestamp, &id, LogOperation::Update, ctx.actor)
                    .study(study.clone())
                    .change(field, old_value, new_value)
                    .reason(ctx.reason),
            );
            summary.log_entries += 1;
        }
        summary.note_updated(&id);
    }

    summary
}
