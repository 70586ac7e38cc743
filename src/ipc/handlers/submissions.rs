use rusqlite::Connection;
use serde_json::{json, Value};

use super::{load_settings, respond};
use crate::ipc::params::{
    get_optional_f64, get_optional_i64, get_required_str, parse_actor, parse_context, parse_rows,
};
use crate::ipc::types::{AppState, Request};
use crate::workflow::draft::{self, SaveDraft};
use crate::workflow::error::WorkflowResult;
use crate::workflow::model::SubmissionKind;
use crate::workflow::{finalize, status};

fn handle_status(conn: &Connection, params: &Value, kind: SubmissionKind) -> WorkflowResult<Value> {
    let actor = parse_actor(params)?;
    let ctx = parse_context(params, kind)?;
    let report = status::status(conn, &actor, &ctx)?;
    Ok(json!({ "context": ctx.to_json(), "status": report }))
}

fn handle_rows(conn: &Connection, params: &Value, kind: SubmissionKind) -> WorkflowResult<Value> {
    let actor = parse_actor(params)?;
    let ctx = parse_context(params, kind)?;
    let rows = status::rows(conn, &actor, &ctx)?;
    Ok(json!({ "rows": rows }))
}

fn handle_save_draft(
    conn: &Connection,
    params: &Value,
    kind: SubmissionKind,
) -> WorkflowResult<Value> {
    let actor = parse_actor(params)?;
    let context = parse_context(params, kind)?;
    let rows = parse_rows(params, kind)?;
    let req = SaveDraft {
        context,
        rows,
        expected_version: get_optional_i64(params, "expectedVersion")?,
        max_marks: get_optional_f64(params, "maxMarks")?,
    };
    let settings = load_settings(conn)?;
    let outcome = draft::save_draft(conn, &actor, &settings, &req)?;
    Ok(serde_json::to_value(outcome)?)
}

fn handle_finalize(conn: &Connection, params: &Value, kind: SubmissionKind) -> WorkflowResult<Value> {
    let actor = parse_actor(params)?;
    let ctx = parse_context(params, kind)?;
    let expected_version = get_optional_i64(params, "expectedVersion")?;
    let settings = load_settings(conn)?;
    let report = finalize::finalize(conn, &actor, &settings, &ctx, expected_version)?;
    Ok(json!({ "context": ctx.to_json(), "status": report }))
}

fn handle_history(conn: &Connection, params: &Value, kind: SubmissionKind) -> WorkflowResult<Value> {
    let actor = parse_actor(params)?;
    let class_id = get_required_str(params, "classId")?;
    let section_id = get_required_str(params, "sectionId")?;
    let entries = status::history(conn, &actor, kind, &class_id, &section_id)?;
    Ok(json!({ "submissions": entries }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (family, action) = req.method.split_once('.')?;
    let kind = match family {
        "attendance" => SubmissionKind::Attendance,
        "marks" => SubmissionKind::Marks,
        _ => return None,
    };
    let handler: fn(&Connection, &Value, SubmissionKind) -> WorkflowResult<Value> = match action {
        "status" => handle_status,
        "rows" => handle_rows,
        "saveDraft" => handle_save_draft,
        "finalize" => handle_finalize,
        "history" => handle_history,
        _ => return None,
    };
    Some(respond(state, req, |conn, params| handler(conn, params, kind)))
}
