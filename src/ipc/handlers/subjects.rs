use crate::db;
use crate::import::{self, ImportOutcome, ImportRules, ManualSubjectRow, ValidatedSubject};
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::handlers::get_required_str;
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

/// Build the one-row form payload the subject modals submit and run it
/// through the same validation the bulk importer applies to manual rows.
fn validated_from_params(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<ValidatedSubject, HandlerErr> {
    let row = ManualSubjectRow {
        subject_code: params
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        subject_name: params
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        grade_level: params.get("gradeLevel").and_then(|v| v.as_i64()),
        semester: params.get("semester").and_then(|v| v.as_i64()),
        track: params
            .get("track")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        strand: params
            .get("strand")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        subject_type: params
            .get("subjectType")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
        teacher_id: params
            .get("teacherId")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string(),
    };
    let teachers = db::list_teacher_refs(conn)
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let ImportOutcome { mut subjects, errors } =
        import::validate_manual_rows(&[row], &teachers, &ImportRules::default());
    match subjects.pop() {
        Some(subject) if errors.is_empty() => Ok(subject),
        _ => {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            Err(HandlerErr {
                code: "bad_params",
                message: "subject failed validation".to_string(),
                details: Some(json!({ "errors": messages })),
            })
        }
    }
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "subjects": [] }));
    };

    let mut sql = String::from(
        "SELECT s.id, s.code, s.name, s.grade_level, s.semester, s.track, s.strand,
                s.subject_type, s.teacher_id, t.full_name
         FROM subjects s
         LEFT JOIN teachers t ON t.id = s.teacher_id",
    );
    let mut clauses: Vec<&str> = Vec::new();
    let mut params: Vec<i64> = Vec::new();
    if let Some(grade) = req.params.get("gradeLevel").and_then(|v| v.as_i64()) {
        clauses.push("s.grade_level = ?");
        params.push(grade);
    }
    if let Some(sem) = req.params.get("semester").and_then(|v| v.as_i64()) {
        clauses.push("s.semester = ?");
        params.push(sem);
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY s.code");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params), |row| {
            let id: String = row.get(0)?;
            let code: String = row.get(1)?;
            let name: String = row.get(2)?;
            let grade_level: i64 = row.get(3)?;
            let semester: i64 = row.get(4)?;
            let track: String = row.get(5)?;
            let strand: String = row.get(6)?;
            let subject_type: String = row.get(7)?;
            let teacher_id: Option<String> = row.get(8)?;
            let teacher_name: Option<String> = row.get(9)?;
            Ok(json!({
                "id": id,
                "code": code,
                "name": name,
                "gradeLevel": grade_level,
                "semester": semester,
                "track": track,
                "strand": strand,
                "subjectType": subject_type,
                "teacherId": teacher_id,
                "teacherName": teacher_name
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let subject = match validated_from_params(conn, &req.params) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };

    let duplicate: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM subjects WHERE code = ? AND grade_level = ? AND semester = ?",
            (
                &subject.subject_code,
                subject.grade_level,
                subject.semester,
            ),
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if duplicate.is_some() {
        return err(
            &req.id,
            "duplicate",
            format!(
                "subject {} already exists for grade {} semester {}",
                subject.subject_code, subject.grade_level, subject.semester
            ),
            None,
        );
    }

    let subject_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO subjects(id, code, name, grade_level, semester, track, strand,
                              subject_type, teacher_id, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &subject_id,
            &subject.subject_code,
            &subject.subject_name,
            subject.grade_level,
            subject.semester,
            &subject.track,
            &subject.strand,
            &subject.subject_type,
            &subject.teacher_id,
            db::now_stamp(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "subjects" })),
        );
    }

    ok(
        &req.id,
        json!({ "subjectId": subject_id, "code": subject.subject_code }),
    )
}

fn handle_subjects_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let subject_id = match get_required_str(&req.params, "subjectId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let subject = match validated_from_params(conn, &req.params) {
        Ok(s) => s,
        Err(e) => return e.response(&req.id),
    };

    let duplicate: Option<String> = match conn
        .query_row(
            "SELECT id FROM subjects
             WHERE code = ? AND grade_level = ? AND semester = ? AND id != ?",
            (
                &subject.subject_code,
                subject.grade_level,
                subject.semester,
                &subject_id,
            ),
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if duplicate.is_some() {
        return err(
            &req.id,
            "duplicate",
            format!(
                "subject {} already exists for grade {} semester {}",
                subject.subject_code, subject.grade_level, subject.semester
            ),
            None,
        );
    }

    let updated = match conn.execute(
        "UPDATE subjects
         SET code = ?, name = ?, grade_level = ?, semester = ?, track = ?, strand = ?,
             subject_type = ?, teacher_id = ?, updated_at = ?
         WHERE id = ?",
        (
            &subject.subject_code,
            &subject.subject_name,
            subject.grade_level,
            subject.semester,
            &subject.track,
            &subject.strand,
            &subject.subject_type,
            &subject.teacher_id,
            db::now_stamp(),
            &subject_id,
        ),
    ) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    };
    if updated == 0 {
        return err(&req.id, "not_found", "subject not found", None);
    }

    ok(&req.id, json!({ "subjectId": subject_id }))
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let subject_id = match get_required_str(&req.params, "subjectId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let deleted = match conn.execute("DELETE FROM subjects WHERE id = ?", [&subject_id]) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_delete_failed", e.to_string(), None),
    };
    if deleted == 0 {
        return err(&req.id, "not_found", "subject not found", None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.create" => Some(handle_subjects_create(state, req)),
        "subjects.update" => Some(handle_subjects_update(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        _ => None,
    }
}
