use std::path::PathBuf;

use serde::Deserialize;

/// App settings, read from Rocket's figment under the `fintrack` key
/// (`Rocket.toml` or `ROCKET_FINTRACK_*` env vars).
#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            db_path: PathBuf::from("data/fintrack.sqlite"),
            allowed_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5175".to_string(),
            ],
        }
    }
}
