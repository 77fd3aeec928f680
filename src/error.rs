use rocket::Request;
use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder, Response};
use std::io::Cursor;
use thiserror::Error;

/// Every handler failure becomes one HTTP status plus a JSON body of the
/// shape `{"message": "..."}`, which is what the client renders inline.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::Validation(_) => Status::BadRequest,
            ApiError::InvalidCredentials | ApiError::Unauthorized => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::Database(_) | ApiError::Pool(_) => Status::InternalServerError,
        }
    }

    fn message(&self) -> String {
        match self {
            // Storage details stay out of client-facing messages.
            ApiError::Database(err) => {
                log::error!("database error: {err}");
                "Internal server error".to_string()
            }
            ApiError::Pool(err) => {
                log::error!("connection pool error: {err}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _req: &'r Request<'_>) -> response::Result<'static> {
        let body = serde_json::json!({ "message": self.message() }).to_string();
        Response::build()
            .status(self.status())
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Maps a UNIQUE-constraint violation to a 409 with `message`; any other
/// storage error stays a 500. Writes race between pooled connections, so a
/// pre-insert existence check alone is not enough.
pub fn unique_conflict(err: rusqlite::Error, message: &str) -> ApiError {
    match &err {
        rusqlite::Error::SqliteFailure(cause, _)
            if cause.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            ApiError::Conflict(message.to_string())
        }
        _ => ApiError::Database(err),
    }
}
