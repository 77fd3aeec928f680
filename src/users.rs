use chrono::Utc;
use rocket::State;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use serde::Deserialize;

use crate::auth::{self, AuthUser};
use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult, unique_conflict};
use crate::models::{LoginView, UserView};

#[derive(Deserialize)]
pub struct RegisterPayload {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ProfilePayload {
    pub username: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct PasswordPayload {
    pub password: String,
}

/// Minimal shape check; the mailbox is never verified beyond this.
fn valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn check_password(password: &str) -> ApiResult<()> {
    if password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters long".to_string(),
        ));
    }
    Ok(())
}

fn check_identity(username: &str, email: &str) -> ApiResult<()> {
    if username.is_empty() {
        return Err(ApiError::Validation("Username is required".to_string()));
    }
    if !valid_email(email) {
        return Err(ApiError::Validation("Invalid email address".to_string()));
    }
    Ok(())
}

#[post("/users/register", data = "<payload>")]
pub fn register(
    pool: &State<DbPool>,
    payload: Json<RegisterPayload>,
) -> ApiResult<status::Created<Json<UserView>>> {
    let payload = payload.into_inner();
    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_lowercase();
    check_identity(&username, &email)?;
    check_password(&payload.password)?;

    let conn = pool.get()?;
    if db::email_taken(&conn, &email, None)? {
        return Err(ApiError::Conflict("Email is already registered".to_string()));
    }

    let password_hash = auth::hash_password(&payload.password)
        .map_err(|_| ApiError::Validation("Unable to hash password".to_string()))?;
    let created_at = Utc::now().to_rfc3339();
    let user_id = db::insert_user(&conn, &username, &email, &password_hash, &created_at)
        .map_err(|err| unique_conflict(err, "Email is already registered"))?;
    db::seed_default_categories(&conn, user_id)?;
    log::info!("registered user {user_id}");

    Ok(status::Created::new(format!("/api/v1/users/{user_id}")).body(Json(UserView {
        id: user_id,
        username,
        email,
    })))
}

#[post("/users/login", data = "<payload>")]
pub fn login(pool: &State<DbPool>, payload: Json<LoginPayload>) -> ApiResult<Json<LoginView>> {
    let payload = payload.into_inner();
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let conn = pool.get()?;
    // One message for both unknown email and bad password.
    let Some((user_id, hash)) = db::user_credentials(&conn, &email)? else {
        return Err(ApiError::InvalidCredentials);
    };
    if !auth::verify_password(&hash, &payload.password) {
        return Err(ApiError::InvalidCredentials);
    }

    let token = auth::issue_token(&conn, user_id)?;
    let user = db::user_by_session(&conn, &token)?.ok_or(ApiError::InvalidCredentials)?;
    Ok(Json(LoginView {
        id: user.id,
        username: user.username,
        email: user.email,
        token,
    }))
}

#[post("/users/logout")]
pub fn logout(pool: &State<DbPool>, auth: AuthUser) -> ApiResult<Status> {
    let conn = pool.get()?;
    db::delete_session(&conn, &auth.token)?;
    Ok(Status::NoContent)
}

#[patch("/users/profile", data = "<payload>")]
pub fn update_profile(
    pool: &State<DbPool>,
    auth: AuthUser,
    payload: Json<ProfilePayload>,
) -> ApiResult<Json<UserView>> {
    let payload = payload.into_inner();
    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_lowercase();
    check_identity(&username, &email)?;

    let conn = pool.get()?;
    if db::email_taken(&conn, &email, Some(auth.user.id))? {
        return Err(ApiError::Conflict("Email is already registered".to_string()));
    }
    db::update_profile(&conn, auth.user.id, &username, &email)
        .map_err(|err| unique_conflict(err, "Email is already registered"))?;
    Ok(Json(UserView {
        id: auth.user.id,
        username,
        email,
    }))
}

#[patch("/users/password", data = "<payload>")]
pub fn update_password(
    pool: &State<DbPool>,
    auth: AuthUser,
    payload: Json<PasswordPayload>,
) -> ApiResult<Status> {
    check_password(&payload.password)?;
    let conn = pool.get()?;
    let password_hash = auth::hash_password(&payload.password)
        .map_err(|_| ApiError::Validation("Unable to hash password".to_string()))?;
    db::update_password(&conn, auth.user.id, &password_hash)?;
    // A password change invalidates every open session; the client logs out.
    db::delete_sessions_for_user(&conn, auth.user.id)?;
    Ok(Status::NoContent)
}
