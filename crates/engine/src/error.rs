use eavscope_core::CoreError;
use eavscope_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("could not save: {0}")]
    CouldNotSave(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("hook rejected operation: {0}")]
    Hook(String),

    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    #[error("core error: {0}")]
    Core(#[source] CoreError),
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(msg) => EngineError::NotFound(msg),
            CoreError::InvalidInput(msg) => EngineError::InvalidInput(msg),
            CoreError::Configuration(msg) => EngineError::Configuration(msg),
            other => EngineError::Core(other),
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Core(core) => core.into(),
            StorageError::NotFound(msg) => EngineError::NotFound(msg),
            other => EngineError::Storage(other),
        }
    }
}

impl EngineError {
    /// Any failure reported by the persistence engine during a save. Input,
    /// identity and configuration problems keep their own type.
    pub(crate) fn from_save(err: StorageError) -> Self {
        match EngineError::from(err) {
            e @ (EngineError::InvalidInput(_)
            | EngineError::NotFound(_)
            | EngineError::Configuration(_)) => e,
            other => EngineError::CouldNotSave(other.to_string()),
        }
    }

    pub(crate) fn from_delete(err: StorageError) -> Self {
        match err {
            StorageError::ConstraintViolation(msg) => EngineError::StateConflict(msg),
            other => other.into(),
        }
    }
}
