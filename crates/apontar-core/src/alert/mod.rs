//! Alerting on suspicious record-count drops.
//!
//! Alerts are advisory: delivery failures are logged and reported as
//! `false`, never turned into errors for the caller.

mod smtp;

use std::fmt::Write as _;

use chrono::NaiveDateTime;

use crate::models::{ChangeLogEntry, DATETIME_FORMAT};

pub use smtp::{SmtpAlertHook, SmtpConfig};

/// Raised when a merge would leave fewer records than were fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyEvent {
    pub path: String,
    pub before_count: usize,
    pub after_count: usize,
    pub actor: String,
    pub reason: String,
    pub timestamp: NaiveDateTime,
    pub last_log_entries: Vec<ChangeLogEntry>,
    /// Workbook bytes as they were before the merge.
    pub backup: Vec<u8>,
    /// Where the backup was uploaded, when that succeeded.
    pub backup_path: Option<String>,
}

impl AnomalyEvent {
    #[must_use]
    pub const fn lost(&self) -> usize {
        self.before_count.saturating_sub(self.after_count)
    }

    /// Plain-text report used by log and e-mail hooks.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Arquivo: {}", self.path);
        let _ = writeln!(
            out,
            "Apontamentos antes: {} / depois: {} (perda de {})",
            self.before_count,
            self.after_count,
            self.lost()
        );
        let _ = writeln!(out, "Usuário: {}", self.actor);
        if !self.reason.is_empty() {
            let _ = writeln!(out, "Motivo: {}", self.reason);
        }
        let _ = writeln!(out, "Horário: {}", self.timestamp.format(DATETIME_FORMAT));
        if let Some(path) = &self.backup_path {
            let _ = writeln!(out, "Backup: {path}");
        }
        if !self.last_log_entries.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Últimas entradas do log:");
            for entry in &self.last_log_entries {
                let _ = writeln!(
                    out,
                    "  {} {} {} {} [{} -> {}] por {}",
                    entry.timestamp,
                    entry.record_id,
                    entry.operation,
                    entry.field,
                    entry.old_value,
                    entry.new_value,
                    entry.actor
                );
            }
        }
        out
    }
}

/// Receiver of anomaly events.
#[allow(async_fn_in_trait)]
pub trait AlertHook {
    /// Deliver the event; `true` when it was accepted.
    async fn notify(&self, event: &AnomalyEvent) -> bool;
}

/// Writes anomaly events to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertHook;

impl AlertHook for LogAlertHook {
    async fn notify(&self, event: &AnomalyEvent) -> bool {
        tracing::error!(
            path = %event.path,
            before = event.before_count,
            after = event.after_count,
            actor = %event.actor,
            "Record count dropped during merge"
        );
        true
    }
}

/// Alert hook chosen at runtime from configuration.
#[derive(Debug)]
pub enum AlertChannel {
    Log(LogAlertHook),
    Smtp(Box<SmtpAlertHook>),
}

impl AlertHook for AlertChannel {
    async fn notify(&self, event: &AnomalyEvent) -> bool {
        match self {
            Self::Log(hook) => hook.notify(event).await,
            Self::Smtp(hook) => {
                // The log line is kept even when mail goes out.
                LogAlertHook.notify(event).await;
                hook.notify(event).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::LogOperation;

    pub(crate) fn sample_event() -> AnomalyEvent {
        let at = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        AnomalyEvent {
            path: "QA/apontamentos.xlsx".to_string(),
            before_count: 10,
            after_count: 8,
            actor: "Ana".to_string(),
            reason: "edição de status".to_string(),
            timestamp: at,
            last_log_entries: vec![ChangeLogEntry::new(at, "123AB", LogOperation::Update, "Ana")
                .change("Status", "PENDENTE", "REALIZADO")],
            backup: b"backup".to_vec(),
            backup_path: Some("QA/apontamentos.backup-20240601T080000.xlsx".to_string()),
        }
    }

    #[test]
    fn report_lists_counts_and_recent_entries() {
        let report = sample_event().report();
        assert!(report.contains("antes: 10 / depois: 8 (perda de 2)"));
        assert!(report.contains("Usuário: Ana"));
        assert!(report.contains("123AB update Status [PENDENTE -> REALIZADO]"));
        assert!(report.contains("Backup: QA/apontamentos.backup-20240601T080000.xlsx"));
    }

    #[tokio::test]
    async fn log_hook_always_accepts() {
        assert!(LogAlertHook.notify(&sample_event()).await);
    }
}
