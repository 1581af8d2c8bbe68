use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::{get_opt_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_announcements_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "announcements": [] }));
    };

    let mut stmt = match conn.prepare(
        "SELECT id, title, body, audience, posted_at
         FROM announcements
         ORDER BY posted_at DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let title: String = row.get(1)?;
            let body: String = row.get(2)?;
            let audience: String = row.get(3)?;
            let posted_at: String = row.get(4)?;
            Ok(json!({
                "id": id,
                "title": title,
                "body": body,
                "audience": audience,
                "postedAt": posted_at
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(announcements) => ok(&req.id, json!({ "announcements": announcements })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_announcements_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let title = match get_required_str(&req.params, "title") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let body = match get_required_str(&req.params, "body") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let audience = get_opt_str(&req.params, "audience").unwrap_or_else(|| "all".to_string());

    let announcement_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO announcements(id, title, body, audience, posted_at)
         VALUES(?, ?, ?, ?, ?)",
        (&announcement_id, &title, &body, &audience, db::now_stamp()),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "announcements" })),
        );
    }

    ok(&req.id, json!({ "announcementId": announcement_id }))
}

fn handle_announcements_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let announcement_id = match get_required_str(&req.params, "announcementId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let deleted = match conn.execute(
        "DELETE FROM announcements WHERE id = ?",
        [&announcement_id],
    ) {
        Ok(n) => n,
        Err(e) => return err(&req.id, "db_delete_failed", e.to_string(), None),
    };
    if deleted == 0 {
        return err(&req.id, "not_found", "announcement not found", None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "announcements.list" => Some(handle_announcements_list(state, req)),
        "announcements.create" => Some(handle_announcements_create(state, req)),
        "announcements.delete" => Some(handle_announcements_delete(state, req)),
        _ => None,
    }
}
