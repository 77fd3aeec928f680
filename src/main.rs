#[macro_use]
extern crate rocket;

mod auth;
mod categories;
mod config;
mod cors;
mod db;
mod error;
mod models;
mod summary;
mod transactions;
mod users;

use rocket::serde::json::{Value, json};
use rocket::{Build, Rocket};

use config::AppConfig;
use cors::Cors;
use db::DbPool;

#[catch(400)]
fn bad_request() -> Value {
    json!({ "message": "Malformed request" })
}

#[catch(401)]
fn unauthorized() -> Value {
    json!({ "message": "Authentication required" })
}

#[catch(404)]
fn not_found() -> Value {
    json!({ "message": "Not found" })
}

#[catch(422)]
fn unprocessable() -> Value {
    json!({ "message": "Malformed request body" })
}

#[catch(500)]
fn internal_error() -> Value {
    json!({ "message": "Internal server error" })
}

fn build_rocket(pool: DbPool, allowed_origins: Vec<String>) -> Rocket<Build> {
    rocket::build()
        .manage(pool)
        .mount(
            "/api/v1",
            routes![
                users::register,
                users::login,
                users::logout,
                users::update_profile,
                users::update_password,
                categories::list,
                categories::create,
                categories::update,
                categories::remove,
                transactions::list,
                transactions::summarize,
                transactions::create,
                transactions::update,
                transactions::remove,
                cors::preflight,
            ],
        )
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                not_found,
                unprocessable,
                internal_error
            ],
        )
        .attach(Cors::new(allowed_origins))
}

#[launch]
fn rocket() -> _ {
    let app: AppConfig = rocket::Config::figment()
        .extract_inner("fintrack")
        .unwrap_or_default();
    if let Some(parent) = app.db_path.parent() {
        std::fs::create_dir_all(parent).expect("create data directory");
    }
    let pool = db::init_db(&app.db_path);
    build_rocket(pool, app.allowed_origins)
}

#[cfg(test)]
pub mod test_support {
    use rocket::http::{Header, Status};
    use rocket::local::blocking::Client;
    use serde_json::{Value, json};
    use uuid::Uuid;

    /// Fresh app over a throwaway SQLite file; every test gets its own.
    pub fn client() -> Client {
        let path = std::env::temp_dir().join(format!("fintrack-test-{}.sqlite", Uuid::new_v4()));
        let pool = crate::db::init_db(&path);
        Client::tracked(crate::build_rocket(pool, vec!["*".to_string()])).expect("valid rocket")
    }

    pub fn bearer(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {token}"))
    }

    pub fn register_user(client: &Client, username: &str, email: &str, password: &str) {
        let res = client
            .post("/api/v1/users/register")
            .json(&json!({"username": username, "email": email, "password": password}))
            .dispatch();
        assert_eq!(res.status(), Status::Created);
    }

    pub fn login_user(client: &Client, email: &str, password: &str) -> (String, Value) {
        let res = client
            .post("/api/v1/users/login")
            .json(&json!({"email": email, "password": password}))
            .dispatch();
        assert_eq!(res.status(), Status::Ok);
        let body: Value = res.into_json().expect("json body");
        let token = body["token"].as_str().expect("token").to_string();
        (token, body)
    }

    /// Fresh app with one registered, logged-in user.
    pub fn authed_client(email: &str) -> (Client, String) {
        let client = client();
        let token = signup(&client, email);
        (client, token)
    }

    /// Registers `email` on an existing app and returns a session token.
    pub fn signup(client: &Client, email: &str) -> String {
        let username = email.split('@').next().expect("local part");
        register_user(client, username, email, "secret-pass");
        let (token, _) = login_user(client, email, "secret-pass");
        token
    }

    pub fn get_json(client: &Client, token: &str, uri: &str) -> Value {
        let res = client.get(uri.to_string()).header(bearer(token)).dispatch();
        assert_eq!(res.status(), Status::Ok);
        res.into_json().expect("json body")
    }

    pub fn post_json(client: &Client, token: &str, uri: &str, body: Value) -> (Status, Value) {
        let res = client
            .post(uri.to_string())
            .header(bearer(token))
            .json(&body)
            .dispatch();
        let status = res.status();
        let body = res.into_json().unwrap_or(Value::Null);
        (status, body)
    }
}
