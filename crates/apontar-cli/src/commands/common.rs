use std::path::{Path, PathBuf};

use apontar_core::alert::AlertChannel;
use apontar_core::config::AppConfig;
use apontar_core::models::columns;
use apontar_core::reconcile::Loaded;
use apontar_core::storage::AnyStore;
use apontar_core::util::normalize_text_option;
use apontar_core::{
    ApplyOutcome, ChangeLogEntry, FieldValue, Reconciler, Record, Snapshot, Study, StudyCatalog,
};

use crate::error::CliError;

pub type Workbook = Reconciler<AnyStore, AlertChannel>;

/// Build the reconciler for the configured store.
pub fn open_reconciler(config: &AppConfig) -> Result<Workbook, CliError> {
    let store = config.open_store()?;
    let alert = config.alert_channel()?;
    if matches!(alert, AlertChannel::Smtp(_)) {
        tracing::info!("Anomaly alerts will be sent by e-mail");
    }
    Ok(Reconciler::new(store, config.path.clone(), alert)
        .with_policy(config.backoff_policy())
        .with_verify_delay(config.verify_delay)
        .with_backup_on_anomaly(config.backup_on_anomaly))
}

/// `--actor` wins over `APONTAR_ACTOR`.
pub fn resolve_actor(cli_actor: Option<&str>, config: &AppConfig) -> Result<String, CliError> {
    normalize_text_option(cli_actor.map(ToString::to_string))
        .or_else(|| config.actor.clone())
        .ok_or(CliError::MissingActor)
}

/// Read the workbook, warning on stderr when it could not be decoded.
pub async fn load_snapshot(workbook: &Workbook) -> Result<Snapshot, CliError> {
    let Loaded {
        snapshot,
        malformed,
    } = workbook.load().await?;
    if let Some(message) = malformed {
        eprintln!("Warning: stored workbook is unreadable, showing it as empty: {message}");
    }
    Ok(snapshot)
}

/// Copy `--set` values onto the record. The ID is never taken from them.
/// Read the study catalog when one is configured.
pub async fn load_catalog(
    config: &AppConfig,
    workbook: &Workbook,
) -> Result<Option<StudyCatalog>, CliError> {
    match &config.studies_path {
        Some(path) => Ok(Some(StudyCatalog::load(workbook.store(), path).await?)),
        None => Ok(None),
    }
}

/// Without a catalog any study code is accepted.
pub fn lookup_study<'a>(
    catalog: Option<&'a StudyCatalog>,
    code: &str,
) -> Result<Option<&'a Study>, CliError> {
    let Some(catalog) = catalog else {
        return Ok(None);
    };
    catalog
        .find(code)
        .map(Some)
        .ok_or_else(|| CliError::UnknownStudy(code.trim().to_string()))
}

/// `path` itself, or `path/<default_name>` when `path` is a directory.
pub fn output_target(path: &Path, default_name: impl FnOnce() -> String) -> PathBuf {
    if path.is_dir() {
        path.join(default_name())
    } else {
        path.to_path_buf()
    }
}

pub fn apply_assignments(
    record: &mut Record,
    assignments: &[(String, String)],
) -> Result<(), CliError> {
    if assignments.iter().any(|(field, _)| is_identity_field(field)) {
        return Err(CliError::IdentityAssignment);
    }
    for (field, value) in assignments {
        record.set(field.as_str(), FieldValue::parse_input(value));
    }
    Ok(())
}

pub fn is_identity_field(field: &str) -> bool {
    field.trim().eq_ignore_ascii_case(columns::ID)
}

pub fn print_warnings(outcome: &ApplyOutcome) {
    for warning in &outcome.warnings {
        eprintln!("Warning: {warning}");
    }
}

pub fn text_preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_record_lines(records: &[&Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let field = |name: &str| record.text(name).unwrap_or_default();
            let id = field(columns::ID);
            let status = field(columns::STATUS);
            let study = text_preview(&field(columns::STUDY), 14);
            let participant = text_preview(&field(columns::PARTICIPANT), 12);
            let finding = text_preview(&field(columns::FINDING), 40);
            format!("{id:<5}  {status:<28}  {study:<14}  {participant:<12}  {finding}")
        })
        .collect()
}

pub fn format_log_lines(entries: &[&ChangeLogEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let mut line = format!(
                "{:<19}  {:<5}  {:<6}  {}",
                entry.timestamp.to_string(),
                entry.record_id,
                entry.operation.as_str(),
                entry.actor
            );
            if !entry.field.is_empty() {
                line.push_str(&format!(
                    "  {}: {} -> {}",
                    entry.field,
                    text_preview(&entry.old_value, 30),
                    text_preview(&entry.new_value, 30)
                ));
            }
            if !entry.reason.is_empty() {
                line.push_str(&format!("  ({})", text_preview(&entry.reason, 40)));
            }
            line
        })
        .collect()
}
