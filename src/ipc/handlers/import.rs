use crate::db;
use crate::import::{self, ImportOutcome, ImportRules, ManualSubjectRow, ValidatedSubject};
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::sheet;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use uuid::Uuid;

/// Spreadsheet rows come in either as a path to an uploaded workbook or
/// pre-parsed as inline JSON objects. `None` when the request carries
/// neither (commit allows manual-only batches).
fn collect_sheet_rows(params: &Value) -> Result<Option<Vec<Map<String, Value>>>, HandlerErr> {
    if let Some(path) = params.get("inPath").and_then(|v| v.as_str()) {
        let path = PathBuf::from(path.trim());
        if !sheet::has_supported_extension(&path) {
            return Err(HandlerErr::new(
                "bad_file_type",
                format!(
                    "only .{} files can be imported",
                    sheet::SUPPORTED_EXTENSIONS.join(" and .")
                ),
            ));
        }
        let rows = sheet::read_rows(&path).map_err(|e| HandlerErr {
            code: "parse_failed",
            message: e.to_string(),
            details: Some(json!({ "path": path.to_string_lossy() })),
        })?;
        return Ok(Some(rows));
    }

    match params.get("rows") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut rows = Vec::with_capacity(items.len());
            for item in items {
                let Some(obj) = item.as_object() else {
                    return Err(HandlerErr::bad_params("rows must contain objects"));
                };
                rows.push(obj.clone());
            }
            Ok(Some(rows))
        }
        Some(_) => Err(HandlerErr::bad_params("rows must be an array")),
    }
}

fn collect_manual_rows(params: &Value) -> Result<Vec<ManualSubjectRow>, HandlerErr> {
    match params.get("manualRows") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(v) => serde_json::from_value::<Vec<ManualSubjectRow>>(v.clone())
            .map_err(|e| HandlerErr::bad_params(format!("bad manualRows: {e}"))),
    }
}

fn distinct_rows(outcome: &ImportOutcome) -> usize {
    outcome
        .errors
        .iter()
        .map(|e| e.row)
        .collect::<HashSet<_>>()
        .len()
}

fn handle_import_preview(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let rows = match collect_sheet_rows(&req.params) {
        Ok(Some(rows)) => rows,
        Ok(None) => return err(&req.id, "bad_params", "missing inPath or rows", None),
        Err(e) => return e.response(&req.id),
    };
    let teachers = match db::list_teacher_refs(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let outcome = import::validate_sheet_rows(&rows, &teachers, &ImportRules::default());
    let errors: Vec<String> = outcome.errors.iter().map(|e| e.render()).collect();
    let valid_rows: Vec<Value> = outcome
        .subjects
        .iter()
        .map(|s| serde_json::to_value(s).unwrap_or_else(|_| json!({})))
        .collect();

    ok(
        &req.id,
        json!({
            "rowsTotal": rows.len(),
            "rowsValid": outcome.subjects.len(),
            "rowsInvalid": distinct_rows(&outcome),
            "errors": errors,
            "validRows": valid_rows
        }),
    )
}

fn insert_batch(conn: &Connection, batch: &[ValidatedSubject]) -> Result<usize, HandlerErr> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let now = db::now_stamp();
    let mut imported = 0usize;
    for subject in batch {
        // Uniqueness on (code, grade_level, semester): resubmitted rows are
        // skipped, and the response reports what actually landed.
        let changed = tx.execute(
            "INSERT OR IGNORE INTO subjects(id, code, name, grade_level, semester, track,
                                            strand, subject_type, teacher_id, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &subject.subject_code,
                &subject.subject_name,
                subject.grade_level,
                subject.semester,
                &subject.track,
                &subject.strand,
                &subject.subject_type,
                &subject.teacher_id,
                &now,
            ),
        );
        match changed {
            Ok(n) => imported += n,
            Err(e) => {
                let _ = tx.rollback();
                return Err(HandlerErr::new("db_insert_failed", e.to_string()));
            }
        }
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(imported)
}

fn handle_import_commit(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let sheet_rows = match collect_sheet_rows(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let manual_rows = match collect_manual_rows(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    if sheet_rows.is_none() && manual_rows.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "nothing to import: provide inPath, rows or manualRows",
            None,
        );
    }

    let teachers = match db::list_teacher_refs(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rules = ImportRules::default();

    let sheet_outcome = sheet_rows
        .as_deref()
        .map(|rows| import::validate_sheet_rows(rows, &teachers, &rules))
        .unwrap_or_default();
    let manual_outcome = import::validate_manual_rows(&manual_rows, &teachers, &rules);

    // One batch, spreadsheet rows first, then manual rows. Valid rows commit
    // even when other rows failed; the errors ride along in the response.
    let mut batch = sheet_outcome.subjects.clone();
    batch.extend(manual_outcome.subjects.iter().cloned());
    let imported = match insert_batch(conn, &batch) {
        Ok(n) => n,
        Err(e) => return e.response(&req.id),
    };

    let mut errors: Vec<String> = sheet_outcome.errors.iter().map(|e| e.render()).collect();
    errors.extend(
        manual_outcome
            .errors
            .iter()
            .map(|e| format!("Manual row {}: {}", e.row, e.message)),
    );

    ok(
        &req.id,
        json!({
            "submitted": batch.len(),
            "imported": imported,
            "rowsInvalid": distinct_rows(&sheet_outcome) + distinct_rows(&manual_outcome),
            "errors": errors
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "subjects.importPreview" => Some(handle_import_preview(state, req)),
        "subjects.importCommit" => Some(handle_import_commit(state, req)),
        _ => None,
    }
}
