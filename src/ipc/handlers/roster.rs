use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{json, Value};
use uuid::Uuid;

use super::respond;
use crate::ipc::error::ok;
use crate::ipc::params::{get_bool_or, get_optional_i64, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::workflow::error::{WorkflowError, WorkflowResult};
use crate::workflow::roster;

fn class_exists(conn: &Connection, class_id: &str) -> WorkflowResult<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

fn require_class(conn: &Connection, class_id: &str) -> WorkflowResult<()> {
    if class_exists(conn, class_id)? {
        Ok(())
    } else {
        Err(WorkflowError::NotFound("class"))
    }
}

/// Section and subject names are unique within a class.
fn ensure_name_free(
    conn: &Connection,
    table: &'static str,
    class_id: &str,
    name: &str,
) -> WorkflowResult<()> {
    let sql = format!("SELECT 1 FROM {} WHERE class_id = ? AND name = ?", table);
    let taken = conn
        .query_row(&sql, (class_id, name), |r| r.get::<_, i64>(0))
        .optional()?
        .is_some();
    if taken {
        return Err(WorkflowError::BadParams(format!(
            "{} already has {:?}",
            table, name
        )));
    }
    Ok(())
}

fn classes_create(conn: &Connection, params: &Value) -> WorkflowResult<Value> {
    let name = get_required_str(params, "name")?;
    let class_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name) VALUES(?, ?)",
        (&class_id, &name),
    )?;
    Ok(json!({ "classId": class_id, "name": name }))
}

fn classes_list(conn: &Connection, _params: &Value) -> WorkflowResult<Value> {
    // Correlated subqueries avoid double-counting from joins.
    let mut stmt = conn.prepare(
        "SELECT
           c.id,
           c.name,
           (SELECT COUNT(*) FROM sections x WHERE x.class_id = c.id) AS section_count,
           (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id AND s.active = 1) AS student_count
         FROM classes c
         ORDER BY c.name",
    )?;
    let classes = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let section_count: i64 = row.get(2)?;
            let student_count: i64 = row.get(3)?;
            Ok(json!({
                "id": id,
                "name": name,
                "sectionCount": section_count,
                "studentCount": student_count
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "classes": classes }))
}

fn sections_create(conn: &Connection, params: &Value) -> WorkflowResult<Value> {
    let class_id = get_required_str(params, "classId")?;
    let name = get_required_str(params, "name")?;
    require_class(conn, &class_id)?;
    ensure_name_free(conn, "sections", &class_id, &name)?;
    let section_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO sections(id, class_id, name) VALUES(?, ?, ?)",
        (&section_id, &class_id, &name),
    )?;
    Ok(json!({ "sectionId": section_id, "name": name }))
}

fn sections_list(conn: &Connection, params: &Value) -> WorkflowResult<Value> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    let mut stmt = conn.prepare(
        "SELECT
           x.id,
           x.name,
           (SELECT COUNT(*) FROM students s WHERE s.section_id = x.id AND s.active = 1)
         FROM sections x
         WHERE x.class_id = ?
         ORDER BY x.name",
    )?;
    let sections = stmt
        .query_map([&class_id], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?,
                "studentCount": row.get::<_, i64>(2)?
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "sections": sections }))
}

fn subjects_create(conn: &Connection, params: &Value) -> WorkflowResult<Value> {
    let class_id = get_required_str(params, "classId")?;
    let name = get_required_str(params, "name")?;
    require_class(conn, &class_id)?;
    ensure_name_free(conn, "subjects", &class_id, &name)?;
    let subject_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, class_id, name) VALUES(?, ?, ?)",
        (&subject_id, &class_id, &name),
    )?;
    Ok(json!({ "subjectId": subject_id, "name": name }))
}

fn subjects_list(conn: &Connection, params: &Value) -> WorkflowResult<Value> {
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    let mut stmt =
        conn.prepare("SELECT id, name FROM subjects WHERE class_id = ? ORDER BY name")?;
    let subjects = stmt
        .query_map([&class_id], |row| {
            Ok(json!({
                "id": row.get::<_, String>(0)?,
                "name": row.get::<_, String>(1)?
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "subjects": subjects }))
}

fn students_create(conn: &Connection, params: &Value) -> WorkflowResult<Value> {
    let class_id = get_required_str(params, "classId")?;
    let section_id = get_required_str(params, "sectionId")?;
    let name = get_required_str(params, "name")?;
    let roll_no = get_optional_i64(params, "rollNo")?;
    let active = get_bool_or(params, "active", true)?;
    if !roster::section_exists(conn, &class_id, &section_id)? {
        return Err(WorkflowError::NotFound("section"));
    }

    let student_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, class_id, section_id, name, roll_no, active, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            &class_id,
            &section_id,
            &name,
            roll_no,
            active as i64,
            Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(json!({ "studentId": student_id }))
}

fn students_update(conn: &Connection, params: &Value) -> WorkflowResult<Value> {
    let student_id = get_required_str(params, "studentId")?;
    let Some(patch) = params.get("patch").filter(|v| v.is_object()) else {
        return Err(WorkflowError::BadParams("patch must be an object".to_string()));
    };
    let exists = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [&student_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some();
    if !exists {
        return Err(WorkflowError::NotFound("student"));
    }

    let tx = conn.unchecked_transaction()?;
    let mut changed = 0usize;
    if patch.get("name").is_some() {
        let name = get_required_str(patch, "name")?;
        changed += tx.execute("UPDATE students SET name = ? WHERE id = ?", (&name, &student_id))?;
    }
    if patch.get("rollNo").is_some() {
        let roll_no = get_optional_i64(patch, "rollNo")?;
        changed += tx.execute(
            "UPDATE students SET roll_no = ? WHERE id = ?",
            (roll_no, &student_id),
        )?;
    }
    if patch.get("active").is_some() {
        let active = get_bool_or(patch, "active", true)?;
        changed += tx.execute(
            "UPDATE students SET active = ? WHERE id = ?",
            (active as i64, &student_id),
        )?;
    }
    if changed > 0 {
        tx.execute(
            "UPDATE students SET updated_at = ? WHERE id = ?",
            (Utc::now().to_rfc3339(), &student_id),
        )?;
    }
    tx.commit()?;
    Ok(json!({ "ok": true }))
}

/// The roster for a class/section.
fn students_list(conn: &Connection, params: &Value) -> WorkflowResult<Value> {
    let class_id = get_required_str(params, "classId")?;
    let section_id = get_required_str(params, "sectionId")?;
    let students = roster::get_roster(conn, &class_id, &section_id)?;
    Ok(json!({ "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&Connection, &Value) -> WorkflowResult<Value> = match req.method.as_str() {
        "classes.list" => {
            if state.db.is_none() {
                return Some(ok(&req.id, json!({ "classes": [] })));
            }
            classes_list
        }
        "classes.create" => classes_create,
        "sections.create" => sections_create,
        "sections.list" => sections_list,
        "subjects.create" => subjects_create,
        "subjects.list" => subjects_list,
        "students.create" => students_create,
        "students.update" => students_update,
        "students.list" => students_list,
        _ => return None,
    };
    Some(respond(state, req, handler))
}
