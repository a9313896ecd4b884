//! The reconciler: fetch the shared workbook, merge, write it back.
//!
//! Every call re-downloads the workbook right before merging and uploads the
//! whole file afterwards. There is no lock; two editors racing between fetch
//! and upload still lose the earlier writer's overlapping fields. Conflict
//! and throttling signals from the store are retried under a
//! [`BackoffPolicy`].

pub mod merge;
mod retry;


use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use thiserror::Error;

use crate::alert::{AlertHook, AnomalyEvent};
use crate::codec::{self, CodecError};
use crate::models::{ChangeLogEntry, LogOperation, Record, Snapshot};
use crate::storage::{backup_path, RemoteError, RemoteErrorKind, RemoteStore};

pub use merge::{MergeContext, MergeSummary};
pub use retry::{BackoffPolicy, Sleeper, TokioSleeper, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL};

/// Log entries handed to the alert hook.
const ALERT_LOG_TAIL: usize = 5;

/// Failures of a reconciler call. Nothing was written when one is returned.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An incoming record has no usable `ID`
    #[error("Incoming record at position {index} has no ID")]
    MissingIdentityColumn { index: usize },

    /// The write did not go through
    #[error("Store write failed after {attempts} attempt(s): {kind}: {message}")]
    StoreWriteFailed {
        attempts: u32,
        kind: RemoteErrorKind,
        message: String,
    },

    /// The workbook could not be read
    #[error("Store read failed after {attempts} attempt(s): {kind}: {message}")]
    StoreReadFailed {
        attempts: u32,
        kind: RemoteErrorKind,
        message: String,
    },

    /// The merged snapshot could not be encoded
    #[error(transparent)]
    Encode(#[from] CodecError),
}

impl StoreError {
    /// The store failure class, for failures that came from the store.
    #[must_use]
    pub const fn remote_kind(&self) -> Option<RemoteErrorKind> {
        match self {
            Self::StoreWriteFailed { kind, .. } | Self::StoreReadFailed { kind, .. } => Some(*kind),
            Self::MissingIdentityColumn { .. } | Self::Encode(_) => None,
        }
    }
}

/// Non-fatal findings attached to a successful call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyWarning {
    /// The stored workbook was unreadable and was replaced by a fresh one.
    /// `backup_path` names the copy of the unreadable file, when one was kept.
    MalformedSnapshot {
        message: String,
        backup_path: Option<String>,
    },
    /// The written snapshot holds fewer records than were seen before.
    AnomalyDetected {
        before: usize,
        after: usize,
        alert_delivered: bool,
        backup_path: Option<String>,
    },
    /// Records missing when the workbook was read back after the write.
    VerificationMissing(Vec<String>),
    /// The read-back after the write failed.
    VerificationUnavailable(String),
}

impl fmt::Display for ApplyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedSnapshot {
                message,
                backup_path,
            } => {
                write!(f, "stored workbook was unreadable and has been rebuilt: {message}")?;
                if let Some(path) = backup_path {
                    write!(f, "; original kept at {path}")?;
                }
                Ok(())
            }
            Self::AnomalyDetected {
                before,
                after,
                alert_delivered,
                backup_path,
            } => {
                write!(f, "record count dropped from {before} to {after}")?;
                if let Some(path) = backup_path {
                    write!(f, "; backup saved to {path}")?;
                }
                if !alert_delivered {
                    f.write_str("; alert was not delivered")?;
                }
                Ok(())
            }
            Self::VerificationMissing(ids) => {
                write!(f, "records not found after write: {}", ids.join(", "))
            }
            Self::VerificationUnavailable(message) => {
                write!(f, "could not verify the write: {message}")
            }
        }
    }
}

/// Result of a successful apply.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// The snapshot as written. Callers replace their held copy with it.
    pub snapshot: Snapshot,
    pub warnings: Vec<ApplyWarning>,
    pub attempts: u32,
    pub created: Vec<String>,
    pub updated: Vec<String>,
}

impl ApplyOutcome {
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    #[must_use]
    pub fn anomaly(&self) -> Option<(usize, usize)> {
        self.warnings.iter().find_map(|warning| match warning {
            ApplyWarning::AnomalyDetected { before, after, .. } => Some((*before, *after)),
            _ => None,
        })
    }
}

/// A snapshot read without merging.
#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub snapshot: Snapshot,
    /// Set when the stored workbook exists but could not be decoded.
    pub malformed: Option<String>,
}

struct Fetched {
    snapshot: Snapshot,
    raw: Option<Vec<u8>>,
    malformed: Option<String>,
}

/// State kept across the attempts of one apply call.
#[derive(Default)]
struct CallState {
    first_count: Option<usize>,
    /// Bytes of the first workbook fetched, the copy the anomaly baseline counts.
    first_raw: Option<Vec<u8>>,
    backup_path: Option<Option<String>>,
}

struct Written {
    snapshot: Snapshot,
    summary: MergeSummary,
    malformed: Option<String>,
    malformed_backup: Option<String>,
    anomaly: Option<AnomalyEvent>,
}

enum AttemptError {
    Remote(RemoteError),
    Encode(CodecError),
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Merges edits into the workbook at `path` on `store`.
pub struct Reconciler<S, A, Z = TokioSleeper> {
    store: S,
    path: String,
    alert: A,
    sleeper: Z,
    policy: BackoffPolicy,
    verify_delay: Option<Duration>,
    backup_on_anomaly: bool,
    clock: fn() -> NaiveDateTime,
}

impl<S, A> Reconciler<S, A> {
    pub fn new(store: S, path: impl Into<String>, alert: A) -> Self {
        Self {
            store,
            path: path.into(),
            alert,
            sleeper: TokioSleeper,
            policy: BackoffPolicy::default(),
            verify_delay: None,
            backup_on_anomaly: true,
            clock: local_now,
        }
    }
}

impl<S, A, Z> Reconciler<S, A, Z> {
    #[must_use]
    pub fn with_sleeper<Z2>(self, sleeper: Z2) -> Reconciler<S, A, Z2> {
        Reconciler {
            store: self.store,
            path: self.path,
            alert: self.alert,
            sleeper,
            policy: self.policy,
            verify_delay: self.verify_delay,
            backup_on_anomaly: self.backup_on_anomaly,
            clock: self.clock,
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Read the workbook back this long after a successful write.
    #[must_use]
    pub const fn with_verify_delay(mut self, delay: Option<Duration>) -> Self {
        self.verify_delay = delay;
        self
    }

    /// Whether a copy of the previous workbook is uploaded when records go
    /// missing or an unreadable workbook is about to be replaced.
    #[must_use]
    pub const fn with_backup_on_anomaly(mut self, enabled: bool) -> Self {
        self.backup_on_anomaly = enabled;
        self
    }

    #[must_use]
    pub const fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn alert(&self) -> &A {
        &self.alert
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}

impl<S: RemoteStore, A: AlertHook, Z: Sleeper> Reconciler<S, A, Z> {
    /// Read the current snapshot. A missing workbook reads as empty.
    pub async fn load(&self) -> Result<Loaded, StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch().await {
                Ok(fetched) => {
                    return Ok(Loaded {
                        snapshot: fetched.snapshot,
                        malformed: fetched.malformed,
                    })
                }
                Err(error) if self.policy.should_retry(error.kind, attempt) => {
                    self.back_off(&error, attempt).await;
                }
                Err(error) => {
                    return Err(StoreError::StoreReadFailed {
                        attempts: attempt,
                        kind: error.kind,
                        message: error.message,
                    })
                }
            }
        }
    }

    /// Merge `incoming` into the stored workbook.
    pub async fn apply(
        &self,
        incoming: &[Record],
        actor: &str,
        reason: &str,
    ) -> Result<ApplyOutcome, StoreError> {
        self.apply_inner(None, incoming, actor, reason).await
    }

    /// Like [`Self::apply`], also treating the caller's held snapshot as a
    /// record-count floor for anomaly detection.
    pub async fn apply_with_baseline(
        &self,
        held: &Snapshot,
        incoming: &[Record],
        actor: &str,
        reason: &str,
    ) -> Result<ApplyOutcome, StoreError> {
        self.apply_inner(Some(held), incoming, actor, reason).await
    }

    async fn apply_inner(
        &self,
        held: Option<&Snapshot>,
        incoming: &[Record],
        actor: &str,
        reason: &str,
    ) -> Result<ApplyOutcome, StoreError> {
        if let Some(index) = incoming.iter().position(|record| record.id().is_none()) {
            return Err(StoreError::MissingIdentityColumn { index });
        }

        let mut state = CallState::default();
        let mut attempt = 0;
        let written = loop {
            attempt += 1;
            match self
                .attempt(held, incoming, actor, reason, &mut state)
                .await
            {
                Ok(written) => break written,
                Err(AttemptError::Encode(error)) => return Err(StoreError::Encode(error)),
                Err(AttemptError::Remote(error)) if self.policy.should_retry(error.kind, attempt) => {
                    self.back_off(&error, attempt).await;
                }
                Err(AttemptError::Remote(error)) => {
                    tracing::error!(
                        path = %self.path,
                        attempt,
                        kind = %error.kind,
                        "Store write failed: {}",
                        error.message
                    );
                    return Err(StoreError::StoreWriteFailed {
                        attempts: attempt,
                        kind: error.kind,
                        message: error.message,
                    });
                }
            }
        };

        tracing::info!(
            path = %self.path,
            attempts = attempt,
            created = written.summary.created.len(),
            updated = written.summary.updated.len(),
            "Workbook written"
        );

        let mut warnings = Vec::new();
        if let Some(message) = written.malformed {
            warnings.push(ApplyWarning::MalformedSnapshot {
                message,
                backup_path: written.malformed_backup,
            });
        }
        if let Some(event) = written.anomaly {
            let alert_delivered = self.alert.notify(&event).await;
            if !alert_delivered {
                tracing::error!(path = %self.path, "Anomaly alert was not delivered");
            }
            warnings.push(ApplyWarning::AnomalyDetected {
                before: event.before_count,
                after: event.after_count,
                alert_delivered,
                backup_path: event.backup_path,
            });
        }
        if let Some(delay) = self.verify_delay {
            if let Some(warning) = self.verify(delay, incoming).await {
                warnings.push(warning);
            }
        }

        Ok(ApplyOutcome {
            snapshot: written.snapshot,
            warnings,
            attempts: attempt,
            created: written.summary.created,
            updated: written.summary.updated,
        })
    }

    async fn attempt(
        &self,
        held: Option<&Snapshot>,
        incoming: &[Record],
        actor: &str,
        reason: &str,
        state: &mut CallState,
    ) -> Result<Written, AttemptError> {
        let Fetched {
            snapshot: mut working,
            raw,
            malformed,
        } = self.fetch().await.map_err(AttemptError::Remote)?;

        if state.first_count.is_none() {
            state.first_count = Some(working.len());
            state.first_raw.clone_from(&raw);
        }
        let first_count = state.first_count.unwrap_or_default();
        let held_count = held.map_or(0, Snapshot::len);
        let baseline = first_count.max(held_count);

        let now = (self.clock)();
        let mut malformed_backup = None;
        if let Some(message) = &malformed {
            working.log.push(
                ChangeLogEntry::new(now, "", LogOperation::Error, actor)
                    .reason(format!("unreadable workbook replaced: {message}")),
            );
            let unreadable = raw.as_deref().unwrap_or_default();
            malformed_backup = self.upload_backup(unreadable, now, state).await;
        }

        let ctx = MergeContext {
            timestamp: now,
            actor,
            reason,
        };
        let summary = merge::merge(&mut working, incoming, &ctx);

        let mut anomaly = None;
        if working.len() < baseline {
            tracing::warn!(
                path = %self.path,
                before = baseline,
                after = working.len(),
                "Record count dropped during merge"
            );
            let last_log_entries = working.last_log_entries(ALERT_LOG_TAIL).to_vec();
            working.log.push(
                ChangeLogEntry::new(now, "", LogOperation::Alert, actor)
                    .change("count", baseline.to_string(), working.len().to_string())
                    .reason(reason),
            );
            let backup = match held.filter(|_| held_count > first_count) {
                Some(held) => self.encode_held(held, state),
                None => state.first_raw.clone().unwrap_or_default(),
            };
            let backup_path = self.upload_backup(&backup, now, state).await;
            anomaly = Some(AnomalyEvent {
                path: self.path.clone(),
                before_count: baseline,
                after_count: working.len(),
                actor: actor.to_string(),
                reason: reason.to_string(),
                timestamp: now,
                last_log_entries,
                backup,
                backup_path,
            });
        }

        let bytes = codec::encode(&working).map_err(AttemptError::Encode)?;
        self.store
            .upload(&self.path, &bytes, true)
            .await
            .map_err(AttemptError::Remote)?;

        Ok(Written {
            snapshot: working,
            summary,
            malformed,
            malformed_backup,
            anomaly,
        })
    }

    async fn fetch(&self) -> Result<Fetched, RemoteError> {
        let bytes = match self.store.download(&self.path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind == RemoteErrorKind::NotFound => {
                tracing::info!(path = %self.path, "No workbook yet, starting empty");
                return Ok(Fetched {
                    snapshot: Snapshot::default(),
                    raw: None,
                    malformed: None,
                });
            }
            Err(error) => return Err(error),
        };

        match codec::decode(&bytes) {
            Ok(snapshot) => {
                tracing::info!(path = %self.path, records = snapshot.len(), "Fetched workbook");
                Ok(Fetched {
                    snapshot,
                    raw: Some(bytes),
                    malformed: None,
                })
            }
            Err(error) => {
                tracing::warn!(
                    path = %self.path,
                    size = bytes.len(),
                    "Stored workbook is unreadable, treating it as empty: {error}"
                );
                Ok(Fetched {
                    snapshot: Snapshot::default(),
                    raw: Some(bytes),
                    malformed: Some(error.to_string()),
                })
            }
        }
    }

    /// The caller's held snapshot as a workbook, falling back to the first
    /// fetched bytes when it cannot be encoded.
    fn encode_held(&self, held: &Snapshot, state: &CallState) -> Vec<u8> {
        match codec::encode(held) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(path = %self.path, "Held snapshot could not be encoded for backup: {error}");
                state.first_raw.clone().unwrap_or_default()
            }
        }
    }

    /// Upload a copy of the workbook as it was before this call, once per call.
    async fn upload_backup(
        &self,
        backup: &[u8],
        at: NaiveDateTime,
        state: &mut CallState,
    ) -> Option<String> {
        if let Some(done) = &state.backup_path {
            return done.clone();
        }
        if !self.backup_on_anomaly || backup.is_empty() {
            return None;
        }

        let path = backup_path(&self.path, at);
        let stored = match self.store.upload(&path, backup, false).await {
            Ok(()) => {
                tracing::info!(backup = %path, "Pre-merge backup uploaded");
                Some(path)
            }
            Err(error) => {
                tracing::warn!(backup = %path, "Backup upload failed: {error}");
                None
            }
        };
        state.backup_path = Some(stored.clone());
        stored
    }

    async fn verify(&self, delay: Duration, incoming: &[Record]) -> Option<ApplyWarning> {
        self.sleeper.sleep(delay).await;

        let snapshot = match self.store.download(&self.path).await {
            Ok(bytes) => match codec::decode(&bytes) {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    tracing::warn!(path = %self.path, "Read-back is unreadable: {error}");
                    return Some(ApplyWarning::VerificationUnavailable(error.to_string()));
                }
            },
            Err(error) => {
                tracing::warn!(path = %self.path, "Read-back failed: {error}");
                return Some(ApplyWarning::VerificationUnavailable(error.to_string()));
            }
        };

        let present = snapshot.ids();
        let mut seen = HashSet::new();
        let missing: Vec<String> = incoming
            .iter()
            .filter_map(Record::id)
            .filter(|id| !present.contains(id) && seen.insert(id.clone()))
            .collect();

        if missing.is_empty() {
            None
        } else {
            tracing::warn!(path = %self.path, missing = missing.len(), "Written records not found on read-back");
            Some(ApplyWarning::VerificationMissing(missing))
        }
    }

    async fn back_off(&self, error: &RemoteError, attempt: u32) {
        tracing::warn!(
            path = %self.path,
            attempt,
            max_attempts = self.policy.max_attempts,
            kind = %error.kind,
            "Store busy, retrying in {:?}",
            self.policy.interval
        );
        self.sleeper.sleep(self.policy.interval).await;
    }
}
