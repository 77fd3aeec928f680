use rocket::State;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::{self, DbPool};
use crate::error::{ApiError, ApiResult, unique_conflict};
use crate::models::Category;

#[derive(Deserialize)]
pub struct CategoryPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

fn check_payload(payload: &CategoryPayload) -> ApiResult<(String, String)> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::Validation("Category name is required".to_string()));
    }
    match payload.kind.as_str() {
        "income" | "expense" => Ok((name, payload.kind.clone())),
        _ => Err(ApiError::Validation("Category type is required".to_string())),
    }
}

#[get("/categories")]
pub fn list(pool: &State<DbPool>, auth: AuthUser) -> ApiResult<Json<Vec<Category>>> {
    let conn = pool.get()?;
    Ok(Json(db::list_categories(&conn, auth.user.id)?))
}

#[post("/categories", data = "<payload>")]
pub fn create(
    pool: &State<DbPool>,
    auth: AuthUser,
    payload: Json<CategoryPayload>,
) -> ApiResult<status::Created<Json<Category>>> {
    let (name, kind) = check_payload(&payload)?;
    let conn = pool.get()?;
    if db::category_name_taken(&conn, auth.user.id, &name, None)? {
        return Err(ApiError::Conflict("Category already exists".to_string()));
    }
    let id = db::insert_category(&conn, auth.user.id, &name, &kind)
        .map_err(|err| unique_conflict(err, "Category already exists"))?;
    Ok(status::Created::new(format!("/api/v1/categories/{id}")).body(Json(Category {
        id,
        name,
        kind,
        is_default: false,
    })))
}

#[put("/categories/<id>", data = "<payload>")]
pub fn update(
    pool: &State<DbPool>,
    auth: AuthUser,
    id: i64,
    payload: Json<CategoryPayload>,
) -> ApiResult<Json<Category>> {
    let (name, kind) = check_payload(&payload)?;
    let conn = pool.get()?;
    let existing = db::category_by_id(&conn, auth.user.id, id)?
        .ok_or(ApiError::NotFound("Category"))?;
    if existing.is_default {
        return Err(ApiError::Forbidden(
            "Default categories cannot be modified".to_string(),
        ));
    }
    if db::category_name_taken(&conn, auth.user.id, &name, Some(id))? {
        return Err(ApiError::Conflict("Category already exists".to_string()));
    }
    db::update_category(&conn, auth.user.id, id, &name, &kind)
        .map_err(|err| unique_conflict(err, "Category already exists"))?;
    Ok(Json(Category {
        id,
        name,
        kind,
        is_default: false,
    }))
}

#[delete("/categories/<id>")]
pub fn remove(pool: &State<DbPool>, auth: AuthUser, id: i64) -> ApiResult<Status> {
    let conn = pool.get()?;
    let existing = db::category_by_id(&conn, auth.user.id, id)?
        .ok_or(ApiError::NotFound("Category"))?;
    if existing.is_default {
        return Err(ApiError::Forbidden(
            "Default categories cannot be deleted".to_string(),
        ));
    }
    // Referencing transactions fall back to uncategorized via FK SET NULL.
    db::delete_category(&conn, auth.user.id, id)?;
    Ok(Status::NoContent)
}
