use thiserror::Error;

use crate::api::ApiError;
use crate::session::CheckpointError;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Gateway(#[from] ApiError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Tool-call loop exceeded {rounds} reasoning rounds for this turn")]
    LoopCeilingExceeded { rounds: u32 },
    #[error("Invalid state: {0}")]
    InvalidState(String),
}
