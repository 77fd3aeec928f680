use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::ToSql;
use rusqlite::{Connection, Result, params};

use crate::models::{Category, TransactionRecord, User};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Default categories seeded for every new user. The API never allows
/// editing or deleting these.
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("salary", "income"),
    ("side income", "income"),
    ("food", "expense"),
    ("movie", "expense"),
    ("bills", "expense"),
    ("medical", "expense"),
    ("fee", "expense"),
    ("tax", "expense"),
];

pub fn init_db(path: &Path) -> DbPool {
    let manager = SqliteConnectionManager::file(path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::new(manager).expect("db pool");
    {
        let conn = pool.get().expect("db connection");
        run_migrations(&conn).expect("db migrations");
    }
    pool
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            token TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('income', 'expense')),
            is_default INTEGER NOT NULL DEFAULT 0,
            UNIQUE(user_id, name),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('income', 'expense')),
            amount_cents INTEGER NOT NULL CHECK(amount_cents > 0),
            category_id INTEGER,
            occurred_at TEXT NOT NULL,
            description TEXT,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE SET NULL
        );
        ",
    )
}

// --- users ---

pub fn insert_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
    created_at: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO users (username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![username, email, password_hash, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn email_taken(conn: &Connection, email: &str, exclude_user: Option<i64>) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1 AND id != COALESCE(?2, -1))",
        params![email, exclude_user],
        |row| row.get::<_, i64>(0),
    )
    .map(|value| value == 1)
}

pub fn user_credentials(conn: &Connection, email: &str) -> Result<Option<(i64, String)>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, password_hash
        FROM users
        WHERE email = ?1
        ",
    )?;
    let mut rows = stmt.query(params![email])?;
    if let Some(row) = rows.next()? {
        Ok(Some((row.get(0)?, row.get(1)?)))
    } else {
        Ok(None)
    }
}

pub fn update_profile(conn: &Connection, user_id: i64, username: &str, email: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET username = ?1, email = ?2 WHERE id = ?3",
        params![username, email, user_id],
    )?;
    Ok(())
}

pub fn update_password(conn: &Connection, user_id: i64, password_hash: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, user_id],
    )?;
    Ok(())
}

// --- sessions ---

pub fn create_session(conn: &Connection, user_id: i64, token: &str, created_at: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (user_id, token, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, token, created_at],
    )?;
    Ok(())
}

pub fn user_by_session(conn: &Connection, token: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare(
        "
        SELECT u.id, u.username, u.email
        FROM sessions s
        JOIN users u ON s.user_id = u.id
        WHERE s.token = ?1
        ",
    )?;
    let mut rows = stmt.query(params![token])?;
    if let Some(row) = rows.next()? {
        Ok(Some(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
        }))
    } else {
        Ok(None)
    }
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

pub fn delete_sessions_for_user(conn: &Connection, user_id: i64) -> Result<()> {
    conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
    Ok(())
}

pub fn prune_sessions(conn: &Connection, user_id: i64, keep: i64) -> Result<()> {
    conn.execute(
        "
        DELETE FROM sessions
        WHERE user_id = ?1
          AND id NOT IN (
            SELECT id
            FROM sessions
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
          )
        ",
        params![user_id, keep],
    )?;
    Ok(())
}

// --- categories ---

pub fn seed_default_categories(conn: &Connection, user_id: i64) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO categories (user_id, name, kind, is_default) VALUES (?1, ?2, ?3, 1)",
    )?;
    for (name, kind) in DEFAULT_CATEGORIES {
        stmt.execute(params![user_id, name, kind])?;
    }
    Ok(())
}

pub fn list_categories(conn: &Connection, user_id: i64) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, name, kind, is_default
        FROM categories
        WHERE user_id = ?1
        ORDER BY kind, name
        ",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            is_default: row.get::<_, i64>(3)? == 1,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn insert_category(conn: &Connection, user_id: i64, name: &str, kind: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO categories (user_id, name, kind, is_default) VALUES (?1, ?2, ?3, 0)",
        params![user_id, name, kind],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn category_by_id(conn: &Connection, user_id: i64, id: i64) -> Result<Option<Category>> {
    let mut stmt = conn.prepare(
        "
        SELECT id, name, kind, is_default
        FROM categories
        WHERE user_id = ?1 AND id = ?2
        ",
    )?;
    let mut rows = stmt.query(params![user_id, id])?;
    if let Some(row) = rows.next()? {
        Ok(Some(Category {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            is_default: row.get::<_, i64>(3)? == 1,
        }))
    } else {
        Ok(None)
    }
}

pub fn category_id_by_name(conn: &Connection, user_id: i64, name: &str) -> Result<Option<i64>> {
    let mut stmt = conn.prepare(
        "
        SELECT id
        FROM categories
        WHERE user_id = ?1 AND name = ?2
        ",
    )?;
    let mut rows = stmt.query(params![user_id, name])?;
    if let Some(row) = rows.next()? {
        Ok(Some(row.get(0)?))
    } else {
        Ok(None)
    }
}

pub fn category_name_taken(
    conn: &Connection,
    user_id: i64,
    name: &str,
    exclude_id: Option<i64>,
) -> Result<bool> {
    conn.query_row(
        "
        SELECT EXISTS(
            SELECT 1 FROM categories
            WHERE user_id = ?1 AND name = ?2 AND id != COALESCE(?3, -1)
        )
        ",
        params![user_id, name, exclude_id],
        |row| row.get::<_, i64>(0),
    )
    .map(|value| value == 1)
}

pub fn update_category(
    conn: &Connection,
    user_id: i64,
    id: i64,
    name: &str,
    kind: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE categories SET name = ?1, kind = ?2 WHERE user_id = ?3 AND id = ?4",
        params![name, kind, user_id, id],
    )?;
    Ok(())
}

pub fn delete_category(conn: &Connection, user_id: i64, id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM categories WHERE user_id = ?1 AND id = ?2",
        params![user_id, id],
    )?;
    Ok(())
}

// --- transactions ---

/// Category selector for transaction listings. The client sends the literal
/// strings "All" and "Uncategorized" alongside real category names.
pub enum CategoryFilter {
    Uncategorized,
    Named(String),
}

#[derive(Default)]
pub struct TransactionFilter {
    /// Inclusive lower bound, `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    pub end_date: Option<String>,
    pub kind: Option<String>,
    pub category: Option<CategoryFilter>,
}

pub fn list_transactions(
    conn: &Connection,
    user_id: i64,
    filter: &TransactionFilter,
) -> Result<Vec<TransactionRecord>> {
    let mut sql = String::from(
        "
        SELECT t.id, t.kind, t.amount_cents, t.occurred_at, t.description, c.name
        FROM transactions t
        LEFT JOIN categories c ON t.category_id = c.id
        WHERE t.user_id = ?1
        ",
    );
    let mut values: Vec<String> = Vec::new();

    // occurred_at is RFC 3339 with a leading YYYY-MM-DD, so the date bounds
    // compare lexicographically against its first ten characters.
    if let Some(start) = &filter.start_date {
        values.push(start.clone());
        sql.push_str(&format!(
            " AND substr(t.occurred_at, 1, 10) >= ?{}",
            values.len() + 1
        ));
    }
    if let Some(end) = &filter.end_date {
        values.push(end.clone());
        sql.push_str(&format!(
            " AND substr(t.occurred_at, 1, 10) <= ?{}",
            values.len() + 1
        ));
    }
    if let Some(kind) = &filter.kind {
        values.push(kind.clone());
        sql.push_str(&format!(" AND t.kind = ?{}", values.len() + 1));
    }
    match &filter.category {
        Some(CategoryFilter::Uncategorized) => sql.push_str(" AND t.category_id IS NULL"),
        Some(CategoryFilter::Named(name)) => {
            values.push(name.clone());
            sql.push_str(&format!(" AND c.name = ?{}", values.len() + 1));
        }
        None => {}
    }
    sql.push_str(" ORDER BY t.occurred_at DESC, t.id DESC");

    let mut bind: Vec<&dyn ToSql> = Vec::with_capacity(values.len() + 1);
    bind.push(&user_id);
    for value in &values {
        bind.push(value);
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(&bind[..], |row| {
        Ok(TransactionRecord {
            id: row.get(0)?,
            kind: row.get(1)?,
            amount_cents: row.get(2)?,
            occurred_at: row.get(3)?,
            description: row.get(4)?,
            category_name: row.get(5)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn transaction_owned_by(conn: &Connection, user_id: i64, id: i64) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM transactions WHERE user_id = ?1 AND id = ?2)",
        params![user_id, id],
        |row| row.get::<_, i64>(0),
    )
    .map(|value| value == 1)
}

pub fn insert_transaction(
    conn: &Connection,
    user_id: i64,
    kind: &str,
    amount_cents: i64,
    category_id: i64,
    occurred_at: &str,
    description: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "
        INSERT INTO transactions (user_id, kind, amount_cents, category_id, occurred_at, description)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![user_id, kind, amount_cents, category_id, occurred_at, description],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_transaction(
    conn: &Connection,
    user_id: i64,
    id: i64,
    kind: &str,
    amount_cents: i64,
    category_id: i64,
    occurred_at: &str,
    description: Option<&str>,
) -> Result<()> {
    conn.execute(
        "
        UPDATE transactions
        SET kind = ?1, amount_cents = ?2, category_id = ?3, occurred_at = ?4, description = ?5
        WHERE user_id = ?6 AND id = ?7
        ",
        params![kind, amount_cents, category_id, occurred_at, description, user_id, id],
    )?;
    Ok(())
}

pub fn delete_transaction(conn: &Connection, user_id: i64, id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM transactions WHERE user_id = ?1 AND id = ?2",
        params![user_id, id],
    )?;
    Ok(())
}
