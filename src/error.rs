//! Errors surfaced by the lifecycle facade.
//!
//! Engine and backend code works with [`anyhow::Result`]; those errors are
//! wrapped as the source of a [`RoomError`] once they cross into the facade.

use thiserror::Error;

use crate::room::RoomState;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("`{operation}` is not valid while the room is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: RoomState,
    },
    #[error("Mandatory asset `{name}` could not be loaded")]
    MandatoryAsset {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Renderer could not be created")]
    Renderer(#[source] anyhow::Error),
    #[error("Invalid manifest: {0}")]
    Manifest(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type RoomResult<T> = Result<T, RoomError>;
