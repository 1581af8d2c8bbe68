pub mod announcements;
pub mod core;
pub mod import;
pub mod sections;
pub mod students;
pub mod subjects;
pub mod teachers;

use crate::ipc::error::HandlerErr;
use serde_json::Value;

/// Pull a required, non-blank string out of request params.
pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Optional string param; blank collapses to None.
pub fn get_opt_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
