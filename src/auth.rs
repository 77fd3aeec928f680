use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use password_hash::SaltString;
use rand_core::OsRng;
use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use uuid::Uuid;

use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult};
use crate::models::User;

/// Newest sessions kept per user; older tokens are dropped at login.
pub const MAX_SESSIONS: i64 = 5;

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Creates a session row and returns its bearer token, evicting the oldest
/// sessions past [`MAX_SESSIONS`].
pub fn issue_token(conn: &rusqlite::Connection, user_id: i64) -> ApiResult<String> {
    let token = Uuid::new_v4().to_string();
    let created_at = Utc::now().to_rfc3339();
    db::create_session(conn, user_id, &token, &created_at)?;
    db::prune_sessions(conn, user_id, MAX_SESSIONS)?;
    Ok(token)
}

/// Request guard resolving `Authorization: Bearer <token>` to the session's
/// user. Carries the raw token so logout can revoke exactly this session.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

fn bearer_token<'r>(req: &'r Request<'_>) -> Option<&'r str> {
    let header = req.headers().get_one("Authorization")?;
    header.strip_prefix("Bearer ").map(str::trim)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = ApiError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(token) = bearer_token(req) else {
            return Outcome::Error((Status::Unauthorized, ApiError::Unauthorized));
        };
        let Some(pool) = req.rocket().state::<DbPool>() else {
            return Outcome::Error((
                Status::InternalServerError,
                ApiError::Validation("database pool not configured".to_string()),
            ));
        };
        let conn = match pool.get() {
            Ok(conn) => conn,
            Err(err) => return Outcome::Error((Status::InternalServerError, err.into())),
        };
        match db::user_by_session(&conn, token) {
            Ok(Some(user)) => Outcome::Success(AuthUser {
                user,
                token: token.to_string(),
            }),
            Ok(None) => Outcome::Error((Status::Unauthorized, ApiError::Unauthorized)),
            Err(err) => Outcome::Error((Status::InternalServerError, err.into())),
        }
    }
}
