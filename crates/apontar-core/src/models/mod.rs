//! Data models for Apontar

pub mod columns;
mod change_log;
mod record;
mod snapshot;
mod status;
mod value;

pub use change_log::{ChangeLogEntry, LogOperation, LOG_COLUMNS};
pub use record::{Record, RecordId};
pub use snapshot::Snapshot;
pub use status::{ParseStatusError, Status};
pub use value::{FieldValue, DATETIME_FORMAT, DATE_FORMAT};
