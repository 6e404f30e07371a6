use parley_persist::PersistError;
use thiserror::Error;

use crate::assembler::AssemblerState;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("A turn is already in flight")]
    TurnInFlight,

    #[error("Invalid assembler state: expected {expected:?}, found {actual:?}")]
    InvalidState {
        expected: AssemblerState,
        actual: AssemblerState,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
