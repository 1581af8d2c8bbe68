use crate::import::TeacherRef;
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("schooldesk.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            full_name TEXT NOT NULL,
            email TEXT,
            classroom TEXT,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_schedules(
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            day TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            subject TEXT NOT NULL,
            room TEXT,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teacher_schedules_teacher
         ON teacher_schedules(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            grade_level INTEGER NOT NULL,
            track TEXT NOT NULL,
            strand TEXT NOT NULL,
            adviser_id TEXT,
            updated_at TEXT,
            FOREIGN KEY(adviser_id) REFERENCES teachers(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            student_no TEXT,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            grade_level INTEGER NOT NULL,
            section_id TEXT,
            active INTEGER NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(section_id) REFERENCES sections(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_section ON students(section_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            grade_level INTEGER NOT NULL,
            semester INTEGER NOT NULL,
            track TEXT NOT NULL,
            strand TEXT NOT NULL,
            subject_type TEXT NOT NULL,
            teacher_id TEXT,
            updated_at TEXT,
            UNIQUE(code, grade_level, semester),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_teacher ON subjects(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS announcements(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            body TEXT NOT NULL,
            audience TEXT NOT NULL,
            posted_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

/// RFC 3339 UTC stamp used for updated_at / posted_at columns.
pub fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The teacher directory the importer resolves names against.
pub fn list_teacher_refs(conn: &Connection) -> anyhow::Result<Vec<TeacherRef>> {
    let mut stmt = conn.prepare("SELECT id, full_name FROM teachers ORDER BY full_name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(TeacherRef {
                id: r.get(0)?,
                full_name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
