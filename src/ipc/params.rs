use serde_json::Value;

use crate::workflow::error::{WorkflowError, WorkflowResult};
use crate::workflow::model::{
    parse_date, AttendanceRow, MarksRow, RecordRow, SubmissionContext, SubmissionKind,
};
use crate::workflow::ActorContext;

pub fn get_required_str(params: &Value, key: &str) -> WorkflowResult<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WorkflowError::BadParams(format!("missing {}", key)))
}

pub fn get_optional_i64(params: &Value, key: &str) -> WorkflowResult<Option<i64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| WorkflowError::BadParams(format!("{} must be an integer", key))),
    }
}

pub fn get_optional_f64(params: &Value, key: &str) -> WorkflowResult<Option<f64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| WorkflowError::BadParams(format!("{} must be a number", key))),
    }
}

pub fn get_bool_or(params: &Value, key: &str, default: bool) -> WorkflowResult<bool> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| WorkflowError::BadParams(format!("{} must be a boolean", key))),
    }
}

pub fn parse_actor(params: &Value) -> WorkflowResult<ActorContext> {
    let Some(raw) = params.get("actor") else {
        return Err(WorkflowError::BadParams("missing actor".to_string()));
    };
    let actor: ActorContext = serde_json::from_value(raw.clone())
        .map_err(|e| WorkflowError::BadParams(format!("invalid actor: {}", e)))?;
    if actor.user_id.trim().is_empty() {
        return Err(WorkflowError::BadParams("actor.userId must not be empty".to_string()));
    }
    Ok(actor)
}

pub fn parse_context(params: &Value, kind: SubmissionKind) -> WorkflowResult<SubmissionContext> {
    let class_id = get_required_str(params, "classId")?;
    let section_id = get_required_str(params, "sectionId")?;
    let date = parse_date(&get_required_str(params, "date")?)?;
    Ok(match kind {
        SubmissionKind::Attendance => SubmissionContext::attendance(&class_id, &section_id, date),
        SubmissionKind::Marks => {
            let subject_id = get_required_str(params, "subjectId")?;
            SubmissionContext::class_test(&class_id, &section_id, &subject_id, date)
        }
    })
}

pub fn parse_rows(params: &Value, kind: SubmissionKind) -> WorkflowResult<Vec<RecordRow>> {
    let Some(raw) = params.get("rows").filter(|v| v.is_array()) else {
        return Err(WorkflowError::BadParams("rows must be an array".to_string()));
    };
    let rows = match kind {
        SubmissionKind::Attendance => serde_json::from_value::<Vec<AttendanceRow>>(raw.clone())
            .map(|rows| rows.into_iter().map(RecordRow::Attendance).collect()),
        SubmissionKind::Marks => serde_json::from_value::<Vec<MarksRow>>(raw.clone())
            .map(|rows| rows.into_iter().map(RecordRow::Marks).collect()),
    };
    rows.map_err(|e| WorkflowError::BadParams(format!("invalid rows: {}", e)))
}
