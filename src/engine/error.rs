use thiserror::Error;

use crate::io::backend::BackendError;
use crate::synth::player::PlayerError;
use crate::table::TableError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is already open")]
    AlreadyInitialized,
    #[error("engine is closed")]
    NotInitialized,
    #[error("engine is already started")]
    AlreadyStarted,
    #[error("engine is not started")]
    NotStarted,
    #[error("no table loaded in slot {0}")]
    TableNotFound(usize),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Player(#[from] PlayerError),
    #[error("audio backend error")]
    Backend(#[from] BackendError),
    #[error("output device not found: {0}")]
    Device(String),
}
