use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rocket::State;
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::{self, CategoryFilter, DbPool, TransactionFilter};
use crate::error::{ApiError, ApiResult};
use crate::models::TransactionView;
use crate::summary::{self, Summary};

#[derive(Deserialize)]
pub struct TransactionPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: f64,
    pub category: String,
    pub date: String,
    pub time: Option<String>,
    pub description: Option<String>,
}

/// Payload after server-side validation, ready to write.
#[derive(Debug)]
struct Validated {
    kind: String,
    amount_cents: i64,
    category: String,
    occurred_at: String,
    description: Option<String>,
}

fn amount_to_cents(amount: f64) -> ApiResult<i64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ApiError::Validation("Amount must be positive".to_string()));
    }
    let cents = (amount * 100.0).round();
    // `as i64` would saturate past i64::MAX, silently storing a corrupted
    // amount; reject anything outside exact cent range instead.
    if cents >= i64::MAX as f64 {
        return Err(ApiError::Validation("Amount is too large".to_string()));
    }
    let cents = cents as i64;
    if cents <= 0 {
        return Err(ApiError::Validation("Amount must be positive".to_string()));
    }
    Ok(cents)
}

/// Accepts either a full RFC 3339 timestamp in `date`, or a `YYYY-MM-DD`
/// date plus an optional `HH:MM[:SS]` time (the form sends the latter pair).
fn parse_occurred_at(date: &str, time: Option<&str>) -> ApiResult<DateTime<Utc>> {
    let date = date.trim();
    if date.is_empty() {
        return Err(ApiError::Validation("Date is required".to_string()));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("Invalid date".to_string()))?;
    let time = match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(raw) => NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .map_err(|_| ApiError::Validation("Invalid time".to_string()))?,
        None => NaiveTime::MIN,
    };
    Ok(day.and_time(time).and_utc())
}

fn validate(payload: TransactionPayload) -> ApiResult<Validated> {
    match payload.kind.as_str() {
        "income" | "expense" => {}
        _ => {
            return Err(ApiError::Validation(
                "Transaction type is required".to_string(),
            ));
        }
    }
    let amount_cents = amount_to_cents(payload.amount)?;
    let category = payload.category.trim().to_string();
    if category.is_empty() {
        return Err(ApiError::Validation("Category is required".to_string()));
    }
    let occurred_at = parse_occurred_at(&payload.date, payload.time.as_deref())?;
    if occurred_at > Utc::now() {
        return Err(ApiError::Validation(
            "Date cannot be in the future".to_string(),
        ));
    }
    Ok(Validated {
        kind: payload.kind,
        amount_cents,
        category,
        occurred_at: occurred_at.to_rfc3339(),
        description: payload
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
    })
}

/// Query filters as the client sends them (camelCase keys, blank = unset).
#[derive(FromForm, Default)]
pub struct ListQuery {
    #[field(name = "startDate")]
    pub start_date: Option<String>,
    #[field(name = "endDate")]
    pub end_date: Option<String>,
    #[field(name = "type")]
    pub kind: Option<String>,
    pub category: Option<String>,
}

fn check_date_bound(raw: &str) -> ApiResult<String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|_| raw.to_string())
        .map_err(|_| ApiError::Validation("Invalid date filter".to_string()))
}

impl ListQuery {
    fn into_filter(self) -> ApiResult<TransactionFilter> {
        let mut filter = TransactionFilter::default();
        if let Some(start) = self.start_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            filter.start_date = Some(check_date_bound(start)?);
        }
        if let Some(end) = self.end_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            filter.end_date = Some(check_date_bound(end)?);
        }
        match self.kind.as_deref().map(str::trim) {
            None | Some("") => {}
            Some(kind @ ("income" | "expense")) => filter.kind = Some(kind.to_string()),
            Some(_) => {
                return Err(ApiError::Validation("Invalid type filter".to_string()));
            }
        }
        match self.category.as_deref().map(str::trim) {
            None | Some("") | Some("All") => {}
            Some("Uncategorized") => filter.category = Some(CategoryFilter::Uncategorized),
            Some(name) => filter.category = Some(CategoryFilter::Named(name.to_string())),
        }
        Ok(filter)
    }
}

#[get("/transactions?<query..>")]
pub fn list(
    pool: &State<DbPool>,
    auth: AuthUser,
    query: ListQuery,
) -> ApiResult<Json<Vec<TransactionView>>> {
    let filter = query.into_filter()?;
    let conn = pool.get()?;
    let records = db::list_transactions(&conn, auth.user.id, &filter)?;
    Ok(Json(records.into_iter().map(TransactionView::from).collect()))
}

/// Aggregates the filtered list for the dashboard charts: overall totals by
/// type plus a chronological per-date series.
#[get("/transactions/summary?<query..>")]
pub fn summarize(
    pool: &State<DbPool>,
    auth: AuthUser,
    query: ListQuery,
) -> ApiResult<Json<Summary>> {
    let filter = query.into_filter()?;
    let conn = pool.get()?;
    let records = db::list_transactions(&conn, auth.user.id, &filter)?;
    Ok(Json(summary::summarize(&records)))
}

#[post("/transactions", data = "<payload>")]
pub fn create(
    pool: &State<DbPool>,
    auth: AuthUser,
    payload: Json<TransactionPayload>,
) -> ApiResult<status::Created<Json<TransactionView>>> {
    let validated = validate(payload.into_inner())?;
    let conn = pool.get()?;
    let category_id = db::category_id_by_name(&conn, auth.user.id, &validated.category)?
        .ok_or_else(|| ApiError::Validation("Unknown category".to_string()))?;
    let id = db::insert_transaction(
        &conn,
        auth.user.id,
        &validated.kind,
        validated.amount_cents,
        category_id,
        &validated.occurred_at,
        validated.description.as_deref(),
    )?;
    Ok(status::Created::new(format!("/api/v1/transactions/{id}")).body(Json(TransactionView {
        id,
        kind: validated.kind,
        amount: validated.amount_cents as f64 / 100.0,
        category: Some(validated.category),
        date: validated.occurred_at,
        description: validated.description,
    })))
}

#[put("/transactions/<id>", data = "<payload>")]
pub fn update(
    pool: &State<DbPool>,
    auth: AuthUser,
    id: i64,
    payload: Json<TransactionPayload>,
) -> ApiResult<Json<TransactionView>> {
    let validated = validate(payload.into_inner())?;
    let conn = pool.get()?;
    if !db::transaction_owned_by(&conn, auth.user.id, id)? {
        return Err(ApiError::NotFound("Transaction"));
    }
    let category_id = db::category_id_by_name(&conn, auth.user.id, &validated.category)?
        .ok_or_else(|| ApiError::Validation("Unknown category".to_string()))?;
    db::update_transaction(
        &conn,
        auth.user.id,
        id,
        &validated.kind,
        validated.amount_cents,
        category_id,
        &validated.occurred_at,
        validated.description.as_deref(),
    )?;
    Ok(Json(TransactionView {
        id,
        kind: validated.kind,
        amount: validated.amount_cents as f64 / 100.0,
        category: Some(validated.category),
        date: validated.occurred_at,
        description: validated.description,
    }))
}

#[delete("/transactions/<id>")]
pub fn remove(pool: &State<DbPool>, auth: AuthUser, id: i64) -> ApiResult<Status> {
    let conn = pool.get()?;
    if !db::transaction_owned_by(&conn, auth.user.id, id)? {
        return Err(ApiError::NotFound("Transaction"));
    }
    db::delete_transaction(&conn, auth.user.id, id)?;
    Ok(Status::NoContent)
}


#[cfg(test)]
mod route_tests {
    use rocket::http::Status;
    use serde_json::{Value, json};

    use crate::test_support::{authed_client, bearer, get_json, post_json};

    fn add(client: &rocket::local::blocking::Client, token: &str, body: Value) -> Value {
        let (status, body) = post_json(client, token, "/api/v1/transactions", body);
        assert_eq!(status, Status::Created);
        body
    }

    #[test]
    fn create_list_update_delete() {
        let (client, token) = authed_client("mia@example.com");
        let created = add(
            &client,
            &token,
            json!({
                "type": "expense",
                "amount": 42.5,
                "category": "food",
                "date": "2024-02-10",
                "time": "12:15",
                "description": "lunch"
            }),
        );
        assert_eq!(created["amount"], 42.5);
        assert_eq!(created["category"], "food");
        let id = created["id"].as_i64().expect("id");

        let list = get_json(&client, &token, "/api/v1/transactions");
        assert_eq!(list.as_array().expect("array").len(), 1);

        let res = client
            .put(format!("/api/v1/transactions/{id}"))
            .header(bearer(&token))
            .json(&json!({
                "type": "expense",
                "amount": 40.0,
                "category": "bills",
                "date": "2024-02-10"
            }))
            .dispatch();
        assert_eq!(res.status(), Status::Ok);
        let body: Value = res.into_json().expect("json body");
        assert_eq!(body["category"], "bills");
        assert_eq!(body["amount"], 40.0);

        let res = client
            .delete(format!("/api/v1/transactions/{id}"))
            .header(bearer(&token))
            .dispatch();
        assert_eq!(res.status(), Status::NoContent);
        let list = get_json(&client, &token, "/api/v1/transactions");
        assert!(list.as_array().expect("array").is_empty());
    }

    #[test]
    fn invalid_payloads_are_rejected_before_any_write() {
        let (client, token) = authed_client("noah@example.com");
        let cases = [
            json!({"type": "expense", "amount": -5, "category": "food", "date": "2024-02-10"}),
            json!({"type": "expense", "amount": 5, "category": "", "date": "2024-02-10"}),
            json!({"type": "", "amount": 5, "category": "food", "date": "2024-02-10"}),
            json!({"type": "expense", "amount": 5, "category": "food", "date": "2999-01-01"}),
            json!({"type": "expense", "amount": 5, "category": "no-such", "date": "2024-02-10"}),
            json!({"type": "expense", "amount": 1e300, "category": "food", "date": "2024-02-10"}),
        ];
        for payload in cases {
            let (status, _) = post_json(&client, &token, "/api/v1/transactions", payload);
            assert_eq!(status, Status::BadRequest);
        }
        let list = get_json(&client, &token, "/api/v1/transactions");
        assert!(list.as_array().expect("array").is_empty());
    }

    #[test]
    fn filters_narrow_the_listing() {
        let (client, token) = authed_client("olga@example.com");
        add(&client, &token, json!({"type": "income", "amount": 100, "category": "salary", "date": "2024-01-01"}));
        add(&client, &token, json!({"type": "expense", "amount": 20, "category": "food", "date": "2024-01-05"}));
        add(&client, &token, json!({"type": "expense", "amount": 30, "category": "bills", "date": "2024-02-01"}));

        let by_type = get_json(&client, &token, "/api/v1/transactions?type=expense");
        assert_eq!(by_type.as_array().expect("array").len(), 2);

        let by_range = get_json(
            &client,
            &token,
            "/api/v1/transactions?startDate=2024-01-01&endDate=2024-01-31",
        );
        assert_eq!(by_range.as_array().expect("array").len(), 2);

        let by_category = get_json(&client, &token, "/api/v1/transactions?category=food");
        assert_eq!(by_category.as_array().expect("array").len(), 1);

        let all = get_json(&client, &token, "/api/v1/transactions?category=All&type=");
        assert_eq!(all.as_array().expect("array").len(), 3);
    }

    #[test]
    fn deleted_category_leaves_transactions_uncategorized() {
        let (client, token) = authed_client("pete@example.com");
        let (_, category) = post_json(
            &client,
            &token,
            "/api/v1/categories",
            json!({"name": "hobby", "type": "expense"}),
        );
        let category_id = category["id"].as_i64().expect("id");
        add(&client, &token, json!({"type": "expense", "amount": 15, "category": "hobby", "date": "2024-03-01"}));

        let res = client
            .delete(format!("/api/v1/categories/{category_id}"))
            .header(bearer(&token))
            .dispatch();
        assert_eq!(res.status(), Status::NoContent);

        let list = get_json(&client, &token, "/api/v1/transactions?category=Uncategorized");
        let list = list.as_array().expect("array");
        assert_eq!(list.len(), 1);
        assert!(list[0]["category"].is_null());
    }

    #[test]
    fn summary_reports_totals_and_chronological_series() {
        let (client, token) = authed_client("quinn@example.com");
        add(&client, &token, json!({"type": "expense", "amount": 10, "category": "food", "date": "2024-03-09"}));
        add(&client, &token, json!({"type": "income", "amount": 250, "category": "salary", "date": "2024-03-01"}));
        add(&client, &token, json!({"type": "expense", "amount": 5.5, "category": "food", "date": "2024-03-01"}));

        let summary = get_json(&client, &token, "/api/v1/transactions/summary");
        assert_eq!(summary["totals"]["income"], 250.0);
        assert_eq!(summary["totals"]["expense"], 15.5);
        let series = summary["series"].as_array().expect("array");
        assert_eq!(series.len(), 2);
        assert_eq!(series[0]["date"], "2024-03-01");
        assert_eq!(series[0]["income"], 250.0);
        assert_eq!(series[0]["expense"], 5.5);
        assert_eq!(series[1]["date"], "2024-03-09");
    }

    #[test]
    fn summary_of_empty_list_is_empty() {
        let (client, token) = authed_client("rosa@example.com");
        let summary = get_json(&client, &token, "/api/v1/transactions/summary");
        assert_eq!(summary["totals"]["income"], 0.0);
        assert_eq!(summary["totals"]["expense"], 0.0);
        assert!(summary["series"].as_array().expect("array").is_empty());
    }

    #[test]
    fn requests_without_a_token_are_unauthorized() {
        let (client, _) = authed_client("sam@example.com");
        let res = client.get("/api/v1/transactions").dispatch();
        assert_eq!(res.status(), Status::Unauthorized);
    }
}
