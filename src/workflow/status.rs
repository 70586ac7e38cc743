use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use super::access::ActorContext;
use super::error::{WorkflowError, WorkflowResult};
use super::model::{
    AttendanceRow, AttendanceStatus, MarksRow, RecordRow, StatusReport, SubmissionContext,
    SubmissionKind, SubmissionState, Tally,
};
use super::roster;

/// A persisted submission row.
#[derive(Debug, Clone)]
pub(crate) struct SubmissionRecord {
    pub id: String,
    pub state: SubmissionState,
    pub version: i64,
    pub max_marks: Option<f64>,
    pub counts_json: Option<String>,
    pub updated_at: String,
    pub finalized_at: Option<String>,
    pub finalized_by: Option<String>,
}

impl SubmissionRecord {
    fn from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let state_raw: String = r.get(1)?;
        let state = SubmissionState::from_stored(&state_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                format!("unknown submission state {:?}", state_raw).into(),
            )
        })?;
        Ok(Self {
            id: r.get(0)?,
            state,
            version: r.get(2)?,
            max_marks: r.get(3)?,
            counts_json: r.get(4)?,
            updated_at: r.get(5)?,
            finalized_at: r.get(6)?,
            finalized_by: r.get(7)?,
        })
    }

    pub fn report(&self) -> WorkflowResult<StatusReport> {
        let counts = match (&self.state, &self.counts_json) {
            (SubmissionState::Finalized, Some(raw)) => Some(serde_json::from_str::<Tally>(raw)?),
            _ => None,
        };
        Ok(StatusReport {
            state: self.state,
            version: self.version,
            max_marks: self.max_marks,
            counts,
            updated_at: Some(self.updated_at.clone()),
            finalized_at: self.finalized_at.clone(),
            finalized_by: self.finalized_by.clone(),
        })
    }
}

const RECORD_COLUMNS: &str =
    "id, state, version, max_marks, counts_json, updated_at, finalized_at, finalized_by";

pub(crate) fn load_record(
    conn: &Connection,
    ctx: &SubmissionContext,
) -> WorkflowResult<Option<SubmissionRecord>> {
    let sql = format!(
        "SELECT {} FROM submissions
         WHERE kind = ? AND class_id = ? AND section_id = ? AND context_key = ?",
        RECORD_COLUMNS
    );
    let found = conn
        .query_row(
            &sql,
            (
                ctx.kind().as_str(),
                &ctx.class_id,
                &ctx.section_id,
                ctx.key.storage_key(),
            ),
            SubmissionRecord::from_row,
        )
        .optional()?;
    Ok(found)
}

pub(crate) fn load_rows(
    conn: &Connection,
    submission_id: &str,
    kind: SubmissionKind,
) -> WorkflowResult<Vec<RecordRow>> {
    match kind {
        SubmissionKind::Attendance => {
            let mut stmt = conn.prepare(
                "SELECT r.student_id, r.status, r.remark
                 FROM attendance_rows r
                 JOIN students s ON s.id = r.student_id
                 WHERE r.submission_id = ?
                 ORDER BY s.roll_no IS NULL, s.roll_no, s.name",
            )?;
            let raw = stmt
                .query_map([submission_id], |r| {
                    Ok((
                        r.get::<_, String>(0)?,
                        r.get::<_, String>(1)?,
                        r.get::<_, Option<String>>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            raw.into_iter()
                .map(|(student_id, status, remark)| -> WorkflowResult<RecordRow> {
                    let status = AttendanceStatus::parse(&status).ok_or_else(|| {
                        WorkflowError::InvalidValue(format!("stored status {:?} is unknown", status))
                    })?;
                    Ok(RecordRow::Attendance(AttendanceRow {
                        student_id,
                        status,
                        remark,
                    }))
                })
                .collect()
        }
        SubmissionKind::Marks => {
            let mut stmt = conn.prepare(
                "SELECT r.student_id, r.marks, r.remark
                 FROM mark_rows r
                 JOIN students s ON s.id = r.student_id
                 WHERE r.submission_id = ?
                 ORDER BY s.roll_no IS NULL, s.roll_no, s.name",
            )?;
            let rows = stmt
                .query_map([submission_id], |r| {
                    Ok(RecordRow::Marks(MarksRow {
                        student_id: r.get(0)?,
                        marks: r.get(1)?,
                        remark: r.get(2)?,
                    }))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        }
    }
}

/// Reports the state of a context. Never fails for a context that has no
/// submission yet; that is `not_started`.
pub fn status(
    conn: &Connection,
    actor: &ActorContext,
    ctx: &SubmissionContext,
) -> WorkflowResult<StatusReport> {
    actor.ensure_can_read(&ctx.class_id, &ctx.section_id)?;
    roster::ensure_context_exists(conn, ctx)?;
    match load_record(conn, ctx)? {
        Some(rec) => rec.report(),
        None => Ok(StatusReport::not_started()),
    }
}

pub fn rows(
    conn: &Connection,
    actor: &ActorContext,
    ctx: &SubmissionContext,
) -> WorkflowResult<Vec<RecordRow>> {
    actor.ensure_can_read(&ctx.class_id, &ctx.section_id)?;
    roster::ensure_context_exists(conn, ctx)?;
    match load_record(conn, ctx)? {
        Some(rec) => load_rows(conn, &rec.id, ctx.kind()),
        None => Ok(Vec::new()),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(flatten)]
    pub status: StatusReport,
}

/// Every submission of one kind for a class/section, newest first.
pub fn history(
    conn: &Connection,
    actor: &ActorContext,
    kind: SubmissionKind,
    class_id: &str,
    section_id: &str,
) -> WorkflowResult<Vec<HistoryEntry>> {
    actor.ensure_can_read(class_id, section_id)?;
    if !roster::section_exists(conn, class_id, section_id)? {
        return Err(WorkflowError::NotFound("section"));
    }
    let sql = format!(
        "SELECT {}, subject_id, context_date FROM submissions
         WHERE kind = ? AND class_id = ? AND section_id = ?
         ORDER BY context_date DESC, context_key",
        RECORD_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let found = stmt
        .query_map((kind.as_str(), class_id, section_id), |r| {
            let rec = SubmissionRecord::from_row(r)?;
            let subject_id: Option<String> = r.get(8)?;
            let date: String = r.get(9)?;
            Ok((rec, subject_id, date))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    found
        .into_iter()
        .map(|(rec, subject_id, date)| -> WorkflowResult<HistoryEntry> {
            Ok(HistoryEntry {
                date,
                subject_id,
                status: rec.report()?,
            })
        })
        .collect()
}
