use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Every integrity violation the storage layer can raise is translated into
/// one of these before it reaches a caller; raw rusqlite errors only surface
/// for genuine storage faults.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },

    #[error("channel name already exists")]
    DuplicateName,

    #[error("email or username already in use")]
    DuplicateCredential,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("parent channel not found")]
    ParentNotFound,

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn validation(field: &'static str, message: &'static str) -> Self {
        Self::Validation { field, message }
    }
}

/// True for UNIQUE and PRIMARY KEY violations only — a foreign-key failure
/// must not be mistaken for a lost insert race.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}
