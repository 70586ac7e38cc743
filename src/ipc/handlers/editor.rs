use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

use super::load_settings;
use crate::ipc::error::{err, ok, workflow_err};
use crate::ipc::params::{get_bool_or, get_optional_f64, get_required_str, parse_actor, parse_context};
use crate::ipc::types::{AppState, Request};
use crate::workflow::editor::{Editor, EditorOptions};
use crate::workflow::error::{WorkflowError, WorkflowResult};
use crate::workflow::model::SubmissionKind;

fn parse_kind(params: &Value) -> WorkflowResult<SubmissionKind> {
    match get_required_str(params, "kind")?.as_str() {
        "attendance" => Ok(SubmissionKind::Attendance),
        "marks" => Ok(SubmissionKind::Marks),
        other => Err(WorkflowError::BadParams(format!(
            "kind must be attendance or marks, got {}",
            other
        ))),
    }
}

fn snapshot_json(editor: &Editor) -> WorkflowResult<Value> {
    Ok(serde_json::to_value(editor.snapshot())?)
}

fn handle_open(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let opened = (|| -> WorkflowResult<(Editor, Value)> {
        let params = &req.params;
        let actor = parse_actor(params)?;
        let kind = parse_kind(params)?;
        let context = parse_context(params, kind)?;
        let options = EditorOptions {
            read_only: get_bool_or(params, "readOnly", false)?,
            max_marks: get_optional_f64(params, "maxMarks")?,
        };
        let settings = load_settings(conn)?;
        let editor = Editor::open(conn, actor, settings, context, options)?;
        let snapshot = snapshot_json(&editor)?;
        Ok((editor, snapshot))
    })();

    match opened {
        Ok((editor, snapshot)) => {
            let editor_id = Uuid::new_v4().to_string();
            tracing::debug!(editor_id = %editor_id, state = editor.state().as_str(), "editor opened");
            state.editors.insert(editor_id.clone(), editor);
            ok(&req.id, json!({ "editorId": editor_id, "editor": snapshot }))
        }
        Err(e) => workflow_err(&req.id, &e),
    }
}

/// Runs `f` against the session named by `params.editorId`.
fn with_editor<F>(state: &mut AppState, req: &Request, f: F) -> Value
where
    F: FnOnce(&Connection, &mut Editor, &Value) -> WorkflowResult<Value>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let editor_id = match get_required_str(&req.params, "editorId") {
        Ok(id) => id,
        Err(e) => return workflow_err(&req.id, &e),
    };
    let Some(editor) = state.editors.get_mut(&editor_id) else {
        return workflow_err(&req.id, &WorkflowError::NotFound("editor"));
    };
    match f(conn, editor, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => workflow_err(&req.id, &e),
    }
}

fn handle_get(_conn: &Connection, editor: &mut Editor, _params: &Value) -> WorkflowResult<Value> {
    Ok(json!({ "editor": snapshot_json(editor)? }))
}

fn handle_set_value(_conn: &Connection, editor: &mut Editor, params: &Value) -> WorkflowResult<Value> {
    let student_id = get_required_str(params, "studentId")?;
    let value = params.get("value").unwrap_or(&Value::Null);
    editor.set_value(&student_id, value)?;
    Ok(json!({ "editor": snapshot_json(editor)? }))
}

fn handle_set_remark(_conn: &Connection, editor: &mut Editor, params: &Value) -> WorkflowResult<Value> {
    let student_id = get_required_str(params, "studentId")?;
    let remark = match params.get("remark") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            return Err(WorkflowError::BadParams(
                "remark must be a string or null".to_string(),
            ))
        }
    };
    editor.set_remark(&student_id, remark)?;
    Ok(json!({ "editor": snapshot_json(editor)? }))
}

fn handle_save(conn: &Connection, editor: &mut Editor, _params: &Value) -> WorkflowResult<Value> {
    let outcome = editor.save(conn)?;
    Ok(json!({ "outcome": outcome, "editor": snapshot_json(editor)? }))
}

fn handle_finalize(conn: &Connection, editor: &mut Editor, _params: &Value) -> WorkflowResult<Value> {
    let report = editor.finalize(conn)?;
    Ok(json!({ "status": report, "editor": snapshot_json(editor)? }))
}

fn handle_close(state: &mut AppState, req: &Request) -> Value {
    match get_required_str(&req.params, "editorId") {
        Ok(editor_id) => {
            let closed = state.editors.remove(&editor_id).is_some();
            ok(&req.id, json!({ "closed": closed }))
        }
        Err(e) => workflow_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&Connection, &mut Editor, &Value) -> WorkflowResult<Value> =
        match req.method.as_str() {
            "editor.open" => return Some(handle_open(state, req)),
            "editor.close" => return Some(handle_close(state, req)),
            "editor.get" => handle_get,
            "editor.setValue" => handle_set_value,
            "editor.setRemark" => handle_set_remark,
            "editor.save" => handle_save,
            "editor.finalize" => handle_finalize,
            _ => return None,
        };
    Some(with_editor(state, req, handler))
}
