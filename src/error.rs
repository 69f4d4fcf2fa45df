use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum PetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed save data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid color {input:?}: {reason}")]
    Color { input: String, reason: &'static str },
}

pub(crate) type PetResult<T> = Result<T, PetError>;
