use crate::db;
use crate::import::ImportRules;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::handlers::{get_opt_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

struct SectionInput {
    name: String,
    grade_level: i64,
    track: String,
    strand: String,
    adviser_id: Option<String>,
}

/// Sections use the same grade/track/strand domains as the subject importer.
fn parse_section_input(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<SectionInput, HandlerErr> {
    let rules = ImportRules::default();
    let name = get_required_str(params, "name")?;
    let Some(grade_level) = params.get("gradeLevel").and_then(|v| v.as_i64()) else {
        return Err(HandlerErr::bad_params("missing gradeLevel"));
    };
    if !rules.grade_levels.contains(&grade_level) {
        return Err(HandlerErr::bad_params(format!(
            "gradeLevel {grade_level} is not offered"
        )));
    }
    let track = get_required_str(params, "track")?;
    let strand = get_required_str(params, "strand")?.to_uppercase();
    let Some(track_rule) = rules
        .tracks
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(&track))
    else {
        return Err(HandlerErr::bad_params(format!("unknown track {track}")));
    };
    if !track_rule.strands.iter().any(|s| *s == strand) {
        return Err(HandlerErr::bad_params(format!(
            "strand {} is not valid for the {} track",
            strand, track_rule.name
        )));
    }

    let adviser_id = get_opt_str(params, "adviserId");
    if let Some(id) = adviser_id.as_deref() {
        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM teachers WHERE id = ?", [id], |r| r.get(0))
            .optional()
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
        if exists.is_none() {
            return Err(HandlerErr::new("not_found", "adviser not found"));
        }
    }

    Ok(SectionInput {
        name,
        grade_level,
        track: track_rule.name.clone(),
        strand,
        adviser_id,
    })
}

fn handle_sections_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "sections": [] }));
    };

    let mut stmt = match conn.prepare(
        "SELECT
           sec.id, sec.name, sec.grade_level, sec.track, sec.strand,
           sec.adviser_id, t.full_name,
           (SELECT COUNT(*) FROM students st WHERE st.section_id = sec.id) AS student_count
         FROM sections sec
         LEFT JOIN teachers t ON t.id = sec.adviser_id
         ORDER BY sec.grade_level, sec.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let grade_level: i64 = row.get(2)?;
            let track: String = row.get(3)?;
            let strand: String = row.get(4)?;
            let adviser_id: Option<String> = row.get(5)?;
            let adviser_name: Option<String> = row.get(6)?;
            let student_count: i64 = row.get(7)?;
            Ok(json!({
                "id": id,
                "name": name,
                "gradeLevel": grade_level,
                "track": track,
                "strand": strand,
                "adviserId": adviser_id,
                "adviserName": adviser_name,
                "studentCount": student_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(sections) => ok(&req.id, json!({ "sections": sections })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_sections_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let input = match parse_section_input(conn, &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let section_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO sections(id, name, grade_level, track, strand, adviser_id, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &section_id,
            &input.name,
            input.grade_level,
            &input.track,
            &input.strand,
            &input.adviser_id,
            db::now_stamp(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "sections" })),
        );
    }

    ok(&req.id, json!({ "sectionId": section_id, "name": input.name }))
}

fn handle_sections_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let section_id = match get_required_str(&req.params, "sectionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let input = match parse_section_input(conn, &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let updated = match conn.execute(
        "UPDATE sections
         SET name = ?, grade_level = ?, track = ?, strand = ?, adviser_id = ?, updated_at = ?
         WHERE id = ?",
        (
            &input.name,
            input.grade_level,
            &input.track,
            &input.strand,
            &input.adviser_id,
            db::now_stamp(),
            &section_id,
        ),
    ) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    };
    if updated == 0 {
        return err(&req.id, "not_found", "section not found", None);
    }

    ok(&req.id, json!({ "sectionId": section_id }))
}

fn handle_sections_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let section_id = match get_required_str(&req.params, "sectionId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM sections WHERE id = ?", [&section_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "section not found", None);
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    // Students stay enrolled, just unassigned from the section.
    if let Err(e) = tx.execute(
        "UPDATE students SET section_id = NULL WHERE section_id = ?",
        [&section_id],
    ) {
        let _ = tx.rollback();
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    if let Err(e) = tx.execute("DELETE FROM sections WHERE id = ?", [&section_id]) {
        let _ = tx.rollback();
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sections.list" => Some(handle_sections_list(state, req)),
        "sections.create" => Some(handle_sections_create(state, req)),
        "sections.update" => Some(handle_sections_update(state, req)),
        "sections.delete" => Some(handle_sections_delete(state, req)),
        _ => None,
    }
}
