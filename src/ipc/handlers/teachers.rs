use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::{get_opt_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "teachers": [] }));
    };

    // Subject counts ride along so the directory screen can show load.
    let mut stmt = match conn.prepare(
        "SELECT
           t.id,
           t.full_name,
           t.email,
           t.classroom,
           (SELECT COUNT(*) FROM subjects s WHERE s.teacher_id = t.id) AS subject_count
         FROM teachers t
         ORDER BY t.full_name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let full_name: String = row.get(1)?;
            let email: Option<String> = row.get(2)?;
            let classroom: Option<String> = row.get(3)?;
            let subject_count: i64 = row.get(4)?;
            Ok(json!({
                "id": id,
                "fullName": full_name,
                "email": email,
                "classroom": classroom,
                "subjectCount": subject_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(teachers) => ok(&req.id, json!({ "teachers": teachers })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_teachers_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let full_name = match get_required_str(&req.params, "fullName") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let email = get_opt_str(&req.params, "email");
    let classroom = get_opt_str(&req.params, "classroom");

    let teacher_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO teachers(id, full_name, email, classroom, updated_at)
         VALUES(?, ?, ?, ?, ?)",
        (&teacher_id, &full_name, &email, &classroom, db::now_stamp()),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "teachers" })),
        );
    }

    ok(&req.id, json!({ "teacherId": teacher_id, "fullName": full_name }))
}

fn handle_teachers_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let teacher_id = match get_required_str(&req.params, "teacherId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let full_name = match get_required_str(&req.params, "fullName") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let email = get_opt_str(&req.params, "email");
    let classroom = get_opt_str(&req.params, "classroom");

    let updated = match conn.execute(
        "UPDATE teachers SET full_name = ?, email = ?, classroom = ?, updated_at = ?
         WHERE id = ?",
        (&full_name, &email, &classroom, db::now_stamp(), &teacher_id),
    ) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    };
    if updated == 0 {
        return err(&req.id, "not_found", "teacher not found", None);
    }

    ok(&req.id, json!({ "teacherId": teacher_id }))
}

fn handle_teachers_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let teacher_id = match get_required_str(&req.params, "teacherId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM teachers WHERE id = ?", [&teacher_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "teacher not found", None);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Subjects survive their teacher; they go back to unassigned.
    if let Err(e) = tx.execute(
        "UPDATE subjects SET teacher_id = NULL WHERE teacher_id = ?",
        [&teacher_id],
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    if let Err(e) = tx.execute(
        "UPDATE sections SET adviser_id = NULL WHERE adviser_id = ?",
        [&teacher_id],
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    if let Err(e) = tx.execute(
        "DELETE FROM teacher_schedules WHERE teacher_id = ?",
        [&teacher_id],
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }
    if let Err(e) = tx.execute("DELETE FROM teachers WHERE id = ?", [&teacher_id]) {
        let _ = tx.rollback();
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

fn handle_schedule_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let teacher_id = match get_required_str(&req.params, "teacherId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let mut stmt = match conn.prepare(
        "SELECT id, day, start_time, end_time, subject, room
         FROM teacher_schedules
         WHERE teacher_id = ?
         ORDER BY day, start_time",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&teacher_id], |row| {
            let id: String = row.get(0)?;
            let day: String = row.get(1)?;
            let start_time: String = row.get(2)?;
            let end_time: String = row.get(3)?;
            let subject: String = row.get(4)?;
            let room: Option<String> = row.get(5)?;
            Ok(json!({
                "id": id,
                "day": day,
                "startTime": start_time,
                "endTime": end_time,
                "subject": subject,
                "room": room
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(entries) => ok(&req.id, json!({ "teacherId": teacher_id, "entries": entries })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_schedule_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let teacher_id = match get_required_str(&req.params, "teacherId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM teachers WHERE id = ?", [&teacher_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "teacher not found", None);
    }

    let Some(entries) = req.params.get("entries").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "entries must be an array", None);
    };

    // Replace-all semantics: the schedule screen saves the whole grid.
    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute(
        "DELETE FROM teacher_schedules WHERE teacher_id = ?",
        [&teacher_id],
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }

    let mut saved = 0usize;
    for (i, entry) in entries.iter().enumerate() {
        let day = entry.get("day").and_then(|v| v.as_str()).unwrap_or("").trim();
        let start_time = entry
            .get("startTime")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        let end_time = entry
            .get("endTime")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        let subject = entry
            .get("subject")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        let room = entry
            .get("room")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if day.is_empty() || start_time.is_empty() || end_time.is_empty() || subject.is_empty() {
            let _ = tx.rollback();
            return err(
                &req.id,
                "bad_params",
                format!(
                    "entry {} needs day, startTime, endTime and subject",
                    i + 1
                ),
                None,
            );
        }
        if let Err(e) = tx.execute(
            "INSERT INTO teacher_schedules(id, teacher_id, day, start_time, end_time, subject, room)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &teacher_id,
                day,
                start_time,
                end_time,
                subject,
                &room,
            ),
        ) {
            let _ = tx.rollback();
            return err(&req.id, "db_insert_failed", e.to_string(), None);
        }
        saved += 1;
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "teacherId": teacher_id, "saved": saved }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "teachers.create" => Some(handle_teachers_create(state, req)),
        "teachers.update" => Some(handle_teachers_update(state, req)),
        "teachers.delete" => Some(handle_teachers_delete(state, req)),
        "teachers.scheduleGet" => Some(handle_schedule_get(state, req)),
        "teachers.scheduleSet" => Some(handle_schedule_set(state, req)),
        _ => None,
    }
}
