use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("test not found")]
    TestNotFound,

    #[error("option does not belong to this test")]
    OptionNotFound,

    #[error("test is no longer accepting votes")]
    TestInactive,

    /// Benign: the voter already has a recorded vote for this test. The HTTP
    /// layer answers "already counted" instead of surfacing a failure.
    #[error("vote already counted for this voter")]
    AlreadyVoted,

    #[error("voter identity must not be empty")]
    InvalidVoter,

    /// Write conflict that survived the bounded retry loop.
    #[error("storage is busy")]
    Transient,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl EngineError {
    /// SQLite reports lock contention as BUSY/LOCKED (optionally the extended
    /// BUSY_SNAPSHOT/BUSY_TIMEOUT codes). Those are the only storage errors
    /// worth retrying.
    pub(crate) fn is_busy(&self) -> bool {
        let EngineError::Storage(sqlx::Error::Database(db_err)) = self else {
            return false;
        };
        match db_err.code().as_deref() {
            Some("5") | Some("6") | Some("261") | Some("517") => true,
            _ => {
                let message = db_err.message();
                message.contains("database is locked") || message.contains("database table is locked")
            }
        }
    }
}

impl ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::TestNotFound | EngineError::OptionNotFound => StatusCode::NOT_FOUND,
            EngineError::InvalidVoter => StatusCode::BAD_REQUEST,
            EngineError::TestInactive | EngineError::AlreadyVoted => StatusCode::CONFLICT,
            EngineError::Transient => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            EngineError::Storage(e) => {
                error!("Storage failure surfaced to client: {}", e);
                "please try again".to_string()
            }
            EngineError::Transient => "please try again".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}
