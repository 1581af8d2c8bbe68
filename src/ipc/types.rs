use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One request line: `{ "id": "...", "method": "...", "params": {...} }`.
#[derive(Debug, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Mutable session state: the selected workspace and its open database.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            workspace: None,
            db: None,
        }
    }
}
