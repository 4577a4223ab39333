use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed user input — surfaced to the requester, never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Duplicate subscription or item. A user-visible "already exists"
    /// outcome, not a system failure.
    #[error("already exists: {0}")]
    Constraint(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn is_constraint(&self) -> bool {
        matches!(self, AppError::Constraint(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}
