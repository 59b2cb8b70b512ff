use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("core error: {0}")]
    Core(#[from] eavscope_core::CoreError),
}

impl StorageError {
    /// Lift constraint failures out of the generic sqlite variant so callers
    /// can tell a rejected write from a broken connection.
    pub(crate) fn from_write(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(failure, msg)
                if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::ConstraintViolation(
                    msg.unwrap_or_else(|| failure.to_string()),
                )
            }
            other => StorageError::Sqlite(other),
        }
    }
}
