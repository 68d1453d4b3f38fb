use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote query failed: {status} - {body}")]
    Http { status: u16, body: String },

    #[error("remote database error: {0}")]
    Api(String),

    #[error("{0}")]
    DatabaseNotFound(String),

    #[error("row decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0} missing after write")]
    MissingRow(&'static str),

    #[error("unique constraint violated: {0}")]
    Conflict(String),
}

const UNIQUE_VIOLATION: &str = "UNIQUE constraint failed";

impl DbError {
    /// Unique-key violations become `Conflict`, whichever backend reported them.
    pub(crate) fn classify(self) -> Self {
        let conflict = match &self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(e, message))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Some(message.clone().unwrap_or_else(|| e.to_string()))
            }
            DbError::Api(message) | DbError::Http { body: message, .. } if message.contains(UNIQUE_VIOLATION) => {
                Some(message.clone())
            }
            _ => None,
        };
        match conflict {
            Some(message) => DbError::Conflict(message),
            None => self,
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
