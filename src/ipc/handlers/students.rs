use crate::db;
use crate::import::ImportRules;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::handlers::{get_opt_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

struct StudentInput {
    student_no: Option<String>,
    last_name: String,
    first_name: String,
    grade_level: i64,
    section_id: Option<String>,
    active: bool,
}

fn parse_student_input(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<StudentInput, HandlerErr> {
    let last_name = get_required_str(params, "lastName")?;
    let first_name = get_required_str(params, "firstName")?;
    let Some(grade_level) = params.get("gradeLevel").and_then(|v| v.as_i64()) else {
        return Err(HandlerErr::bad_params("missing gradeLevel"));
    };
    if !ImportRules::default().grade_levels.contains(&grade_level) {
        return Err(HandlerErr::bad_params(format!(
            "gradeLevel {grade_level} is not offered"
        )));
    }
    let section_id = get_opt_str(params, "sectionId");
    if let Some(id) = section_id.as_deref() {
        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM sections WHERE id = ?", [id], |r| r.get(0))
            .optional()
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
        if exists.is_none() {
            return Err(HandlerErr::new("not_found", "section not found"));
        }
    }
    Ok(StudentInput {
        student_no: get_opt_str(params, "studentNo"),
        last_name,
        first_name,
        grade_level,
        section_id,
        active: params
            .get("active")
            .and_then(|v| v.as_bool())
            .unwrap_or(true),
    })
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };

    let section_filter = get_opt_str(&req.params, "sectionId");
    let mut sql = String::from(
        "SELECT st.id, st.student_no, st.last_name, st.first_name, st.grade_level,
                st.section_id, sec.name, st.active
         FROM students st
         LEFT JOIN sections sec ON sec.id = st.section_id",
    );
    if section_filter.is_some() {
        sql.push_str(" WHERE st.section_id = ?");
    }
    sql.push_str(" ORDER BY st.last_name, st.first_name");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<serde_json::Value> {
        let id: String = row.get(0)?;
        let student_no: Option<String> = row.get(1)?;
        let last_name: String = row.get(2)?;
        let first_name: String = row.get(3)?;
        let grade_level: i64 = row.get(4)?;
        let section_id: Option<String> = row.get(5)?;
        let section_name: Option<String> = row.get(6)?;
        let active: i64 = row.get(7)?;
        Ok(json!({
            "id": id,
            "studentNo": student_no,
            "lastName": last_name,
            "firstName": first_name,
            "gradeLevel": grade_level,
            "sectionId": section_id,
            "sectionName": section_name,
            "active": active != 0
        }))
    };
    let rows = match section_filter {
        Some(section_id) => stmt
            .query_map([&section_id], map_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
        None => stmt
            .query_map([], map_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
    };

    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let input = match parse_student_input(conn, &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let student_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO students(id, student_no, last_name, first_name, grade_level,
                              section_id, active, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            &input.student_no,
            &input.last_name,
            &input.first_name,
            input.grade_level,
            &input.section_id,
            if input.active { 1 } else { 0 },
            db::now_stamp(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    ok(&req.id, json!({ "studentId": student_id }))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let input = match parse_student_input(conn, &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let updated = match conn.execute(
        "UPDATE students
         SET student_no = ?, last_name = ?, first_name = ?, grade_level = ?,
             section_id = ?, active = ?, updated_at = ?
         WHERE id = ?",
        (
            &input.student_no,
            &input.last_name,
            &input.first_name,
            input.grade_level,
            &input.section_id,
            if input.active { 1 } else { 0 },
            db::now_stamp(),
            &student_id,
        ),
    ) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    };
    if updated == 0 {
        return err(&req.id, "not_found", "student not found", None);
    }

    ok(&req.id, json!({ "studentId": student_id }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let deleted = match conn.execute("DELETE FROM students WHERE id = ?", [&student_id]) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_delete_failed", e.to_string(), None),
    };
    if deleted == 0 {
        return err(&req.id, "not_found", "student not found", None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
