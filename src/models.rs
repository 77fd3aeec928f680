use serde::Serialize;

/// Authenticated account as stored, minus the password hash.
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct LoginView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub token: String,
}

#[derive(Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub is_default: bool,
}

pub struct TransactionRecord {
    pub id: i64,
    pub kind: String,
    pub amount_cents: i64,
    pub occurred_at: String,
    pub description: Option<String>,
    pub category_name: Option<String>,
}

#[derive(Serialize)]
pub struct TransactionView {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: f64,
    pub category: Option<String>,
    pub date: String,
    pub description: Option<String>,
}

impl From<TransactionRecord> for TransactionView {
    fn from(record: TransactionRecord) -> Self {
        TransactionView {
            id: record.id,
            kind: record.kind,
            amount: record.amount_cents as f64 / 100.0,
            category: record.category_name,
            date: record.occurred_at,
            description: record.description,
        }
    }
}
