use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "schoold.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    migrate(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    migrate(&conn)?;
    Ok(conn)
}

fn migrate(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            UNIQUE(class_id, name)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sections_class ON sections(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            UNIQUE(class_id, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            section_id TEXT NOT NULL,
            name TEXT NOT NULL,
            roll_no INTEGER,
            active INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(section_id) REFERENCES sections(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_section ON students(class_id, section_id)",
        [],
    )?;

    // One row per (kind, class, section, key). Created by the first draft save.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS submissions(
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            class_id TEXT NOT NULL,
            section_id TEXT NOT NULL,
            context_key TEXT NOT NULL,
            subject_id TEXT,
            context_date TEXT NOT NULL,
            state TEXT NOT NULL,
            version INTEGER NOT NULL,
            max_marks REAL,
            counts_json TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            finalized_by TEXT,
            finalized_at TEXT,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(section_id) REFERENCES sections(id),
            UNIQUE(kind, class_id, section_id, context_key)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submissions_section
         ON submissions(kind, class_id, section_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_rows(
            submission_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL,
            remark TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(submission_id, student_id),
            FOREIGN KEY(submission_id) REFERENCES submissions(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS mark_rows(
            submission_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            marks REAL,
            remark TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(submission_id, student_id),
            FOREIGN KEY(submission_id) REFERENCES submissions(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_rows_student ON attendance_rows(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_mark_rows_student ON mark_rows(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(
            serde_json::from_str(&s).with_context(|| format!("corrupt setting {}", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, value.to_string()),
    )?;
    Ok(())
}
