use rusqlite::{Connection, OptionalExtension};

use super::error::{WorkflowError, WorkflowResult};
use super::model::{RosterEntry, SubmissionContext};

pub fn section_exists(conn: &Connection, class_id: &str, section_id: &str) -> WorkflowResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM sections WHERE class_id = ? AND id = ?",
            (class_id, section_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

pub fn subject_exists(conn: &Connection, class_id: &str, subject_id: &str) -> WorkflowResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM subjects WHERE class_id = ? AND id = ?",
            (class_id, subject_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

/// Fails with `not_found` unless the class/section (and subject, for class
/// tests) referenced by `ctx` exist.
pub fn ensure_context_exists(conn: &Connection, ctx: &SubmissionContext) -> WorkflowResult<()> {
    if !section_exists(conn, &ctx.class_id, &ctx.section_id)? {
        return Err(WorkflowError::NotFound("section"));
    }
    if let Some(subject_id) = ctx.key.subject_id() {
        if !subject_exists(conn, &ctx.class_id, subject_id)? {
            return Err(WorkflowError::NotFound("subject"));
        }
    }
    Ok(())
}

/// Active students of a class/section, by roll number then name.
pub fn get_roster(
    conn: &Connection,
    class_id: &str,
    section_id: &str,
) -> WorkflowResult<Vec<RosterEntry>> {
    if !section_exists(conn, class_id, section_id)? {
        return Err(WorkflowError::NotFound("section"));
    }
    let mut stmt = conn.prepare(
        "SELECT id, name, roll_no
         FROM students
         WHERE class_id = ? AND section_id = ? AND active = 1
         ORDER BY roll_no IS NULL, roll_no, name",
    )?;
    let roster = stmt
        .query_map((class_id, section_id), |r| {
            Ok(RosterEntry {
                student_id: r.get(0)?,
                name: r.get(1)?,
                roll_no: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(roster)
}
