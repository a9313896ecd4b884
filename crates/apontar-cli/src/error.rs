use std::io;

use apontar_core::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] apontar_core::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No actor given. Pass --actor or set APONTAR_ACTOR.")]
    MissingActor,
    #[error("Finding not found: {0}")]
    RecordNotFound(String),
    #[error("A finding for this study, document and participant already exists: {id} (raised {raised_on}). Use --allow-duplicate to save anyway.")]
    Duplicate { id: String, raised_on: String },
    #[error("Nothing to update. Pass --status or --set FIELD=VALUE.")]
    NothingToUpdate,
    #[error("The ID column cannot be set with --set")]
    IdentityAssignment,
    #[error("Study {0} is not in the study catalog. Run `apontar studies` to see the known codes.")]
    UnknownStudy(String),
    #[error("No study catalog configured. Set APONTAR_STUDIES_PATH.")]
    NoCatalog,
}
