use std::collections::HashSet;

use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::access::ActorContext;
use super::error::{WorkflowError, WorkflowResult};
use super::model::{format_date, RecordRow, SubmissionContext, SubmissionKind, SubmissionState};
use super::roster;
use super::status::load_record;
use crate::settings::WorkflowSettings;

#[derive(Debug, Clone)]
pub struct SaveDraft {
    pub context: SubmissionContext,
    pub rows: Vec<RecordRow>,
    /// Version the caller last saw; 0 for a context it believes is not started.
    pub expected_version: Option<i64>,
    /// Marks only. Fixed by the first save of a class test.
    pub max_marks: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub state: SubmissionState,
    pub version: i64,
    pub row_count: usize,
    pub created: bool,
}

pub(crate) fn validate_max_marks(max: f64) -> WorkflowResult<f64> {
    if !max.is_finite() || max <= 0.0 {
        return Err(WorkflowError::InvalidValue(
            "maxMarks must be a positive number".to_string(),
        ));
    }
    Ok(max)
}

pub(crate) fn validate_marks(value: f64, max: Option<f64>) -> WorkflowResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(WorkflowError::InvalidValue(format!(
            "marks must be a number >= 0, got {}",
            value
        )));
    }
    if let Some(max) = max {
        if value > max {
            return Err(WorkflowError::OutOfRange { value, max });
        }
    }
    Ok(())
}

fn check_rows(
    req: &SaveDraft,
    roster_ids: &HashSet<String>,
    settings: &WorkflowSettings,
) -> WorkflowResult<()> {
    let kind = req.context.kind();
    let mut seen: HashSet<&str> = HashSet::new();
    for row in &req.rows {
        if row.kind() != kind {
            return Err(WorkflowError::ContextMismatch(format!(
                "{} row sent to a {} submission",
                row.kind().as_str(),
                kind.as_str()
            )));
        }
        if !seen.insert(row.student_id()) {
            return Err(WorkflowError::BadParams(format!(
                "student {} appears more than once",
                row.student_id()
            )));
        }
        if !roster_ids.contains(row.student_id()) {
            return Err(WorkflowError::NotInRoster(row.student_id().to_string()));
        }
        match row {
            RecordRow::Attendance(r) => {
                if !r.status.is_basic() && !settings.attendance.allow_extended_statuses {
                    return Err(WorkflowError::InvalidValue(format!(
                        "attendance must be present or absent, got {}",
                        r.status.as_str()
                    )));
                }
            }
            RecordRow::Marks(r) => {
                if let Some(v) = r.marks {
                    validate_marks(v, None)?;
                }
            }
        }
    }
    Ok(())
}

fn check_version(
    expected: Option<i64>,
    actual: i64,
    required: bool,
) -> WorkflowResult<()> {
    match expected {
        Some(v) if v != actual => Err(WorkflowError::Conflict {
            expected: Some(v),
            actual,
        }),
        None if required => Err(WorkflowError::Conflict {
            expected: None,
            actual,
        }),
        _ => Ok(()),
    }
}

/// Upserts a batch of rows as a draft, creating the submission on first save.
///
/// The whole batch is written in one transaction: any invalid row leaves the
/// store untouched.
pub fn save_draft(
    conn: &Connection,
    actor: &ActorContext,
    settings: &WorkflowSettings,
    req: &SaveDraft,
) -> WorkflowResult<SaveOutcome> {
    let ctx = &req.context;
    let kind = ctx.kind();
    actor.ensure_can_write(&ctx.class_id, &ctx.section_id)?;
    roster::ensure_context_exists(conn, ctx)?;

    let roster_ids: HashSet<String> = roster::get_roster(conn, &ctx.class_id, &ctx.section_id)?
        .into_iter()
        .map(|e| e.student_id)
        .collect();
    check_rows(req, &roster_ids, settings)?;
    if kind == SubmissionKind::Attendance && req.max_marks.is_some() {
        return Err(WorkflowError::BadParams(
            "maxMarks applies to marks only".to_string(),
        ));
    }

    let now = Utc::now().to_rfc3339();
    let tx = conn.unchecked_transaction()?;

    let (submission_id, version, max_marks, created) = match load_record(&tx, ctx)? {
        None => {
            check_version(req.expected_version, 0, false)?;
            let max_marks = match kind {
                SubmissionKind::Attendance => None,
                SubmissionKind::Marks => {
                    let max = req
                        .max_marks
                        .or(settings.marks.default_max_marks)
                        .ok_or_else(|| {
                            WorkflowError::BadParams(
                                "maxMarks is required for a new class test".to_string(),
                            )
                        })?;
                    Some(validate_max_marks(max)?)
                }
            };
            let id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO submissions(
                    id, kind, class_id, section_id, context_key, subject_id, context_date,
                    state, version, max_marks, created_by, created_at, updated_at
                 ) VALUES(?, ?, ?, ?, ?, ?, ?, 'draft', 1, ?, ?, ?, ?)",
                (
                    &id,
                    kind.as_str(),
                    &ctx.class_id,
                    &ctx.section_id,
                    ctx.key.storage_key(),
                    ctx.key.subject_id(),
                    format_date(ctx.key.date()),
                    max_marks,
                    &actor.user_id,
                    &now,
                    &now,
                ),
            )?;
            (id, 1, max_marks, true)
        }
        Some(rec) => {
            if rec.state == SubmissionState::Finalized {
                return Err(WorkflowError::AlreadyFinalized);
            }
            check_version(
                req.expected_version,
                rec.version,
                settings.require_version(kind),
            )?;
            if let (Some(asked), Some(stored)) = (req.max_marks, rec.max_marks) {
                if asked != stored {
                    return Err(WorkflowError::ContextMismatch(format!(
                        "class test is out of {}, not {}",
                        stored, asked
                    )));
                }
            }
            let version = rec.version + 1;
            tx.execute(
                "UPDATE submissions SET version = ?, updated_at = ? WHERE id = ?",
                (version, &now, &rec.id),
            )?;
            (rec.id, version, rec.max_marks, false)
        }
    };

    for row in &req.rows {
        match row {
            RecordRow::Attendance(r) => {
                tx.execute(
                    "INSERT INTO attendance_rows(submission_id, student_id, status, remark, updated_at)
                     VALUES(?, ?, ?, ?, ?)
                     ON CONFLICT(submission_id, student_id) DO UPDATE SET
                       status = excluded.status,
                       remark = excluded.remark,
                       updated_at = excluded.updated_at",
                    (&submission_id, &r.student_id, r.status.as_str(), &r.remark, &now),
                )?;
            }
            RecordRow::Marks(r) => {
                if let Some(v) = r.marks {
                    validate_marks(v, max_marks)?;
                }
                tx.execute(
                    "INSERT INTO mark_rows(submission_id, student_id, marks, remark, updated_at)
                     VALUES(?, ?, ?, ?, ?)
                     ON CONFLICT(submission_id, student_id) DO UPDATE SET
                       marks = excluded.marks,
                       remark = excluded.remark,
                       updated_at = excluded.updated_at",
                    (&submission_id, &r.student_id, r.marks, &r.remark, &now),
                )?;
            }
        }
    }

    tx.commit()?;
    tracing::info!(
        kind = kind.as_str(),
        context = %ctx.key.storage_key(),
        version,
        rows = req.rows.len(),
        actor = %actor.user_id,
        "draft saved"
    );

    Ok(SaveOutcome {
        state: SubmissionState::Draft,
        version,
        row_count: req.rows.len(),
        created,
    })
}
