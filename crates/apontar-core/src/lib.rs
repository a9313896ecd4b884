//! apontar-core - Core library for Apontar
//!
//! This crate contains the record model, the workbook codec, the remote
//! store connectors and the reconciler that merges locally edited findings
//! into the shared workbook.

pub mod alert;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod ids;
pub mod models;
pub mod reconcile;
pub mod storage;
pub mod util;
pub mod validation;

pub use catalog::{Study, StudyCatalog};
pub use error::{Error, Result};
pub use models::{ChangeLogEntry, FieldValue, LogOperation, Record, RecordId, Snapshot, Status};
pub use reconcile::{ApplyOutcome, ApplyWarning, BackoffPolicy, Reconciler, StoreError};
