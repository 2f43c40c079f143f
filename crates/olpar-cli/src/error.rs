use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] olpar_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Record not found: {0}")]
    RecordNotFound(String),
    #[error("Record ID cannot be empty")]
    EmptyRecordId,
    #[error("Not logged in. Run `olpar login <USER_ID> --pin <PIN>` first.")]
    NotLoggedIn,
}
