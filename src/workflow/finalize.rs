use chrono::Utc;
use rusqlite::Connection;

use super::access::ActorContext;
use super::error::{WorkflowError, WorkflowResult};
use super::model::{RecordRow, StatusReport, SubmissionContext, SubmissionKind, SubmissionState, Tally};
use super::roster;
use super::status::{load_record, load_rows};
use super::tally;
use crate::settings::WorkflowSettings;

/// Freezes a draft. One-way: nothing in this crate moves a submission back
/// to `draft`.
pub fn finalize(
    conn: &Connection,
    actor: &ActorContext,
    settings: &WorkflowSettings,
    ctx: &SubmissionContext,
    expected_version: Option<i64>,
) -> WorkflowResult<StatusReport> {
    let kind = ctx.kind();
    actor.ensure_can_write(&ctx.class_id, &ctx.section_id)?;
    roster::ensure_context_exists(conn, ctx)?;

    let tx = conn.unchecked_transaction()?;
    let Some(rec) = load_record(&tx, ctx)? else {
        return Err(WorkflowError::NotStarted);
    };
    if rec.state == SubmissionState::Finalized {
        return Err(WorkflowError::AlreadyFinalized);
    }
    match expected_version {
        Some(v) if v != rec.version => {
            tracing::warn!(
                context = %ctx.key.storage_key(),
                expected = v,
                actual = rec.version,
                "finalize rejected: stale version"
            );
            return Err(WorkflowError::Conflict {
                expected: Some(v),
                actual: rec.version,
            });
        }
        None if settings.require_version(kind) => {
            return Err(WorkflowError::Conflict {
                expected: None,
                actual: rec.version,
            });
        }
        _ => {}
    }

    let roster = roster::get_roster(&tx, &ctx.class_id, &ctx.section_id)?;
    let rows = load_rows(&tx, &rec.id, kind)?;
    let counts = match kind {
        SubmissionKind::Attendance => Tally::Attendance(tally::attendance_tally(
            rows.iter().filter_map(|r| match r {
                RecordRow::Attendance(a) => Some(a),
                RecordRow::Marks(_) => None,
            }),
            &roster,
        )),
        SubmissionKind::Marks => {
            let max_marks = rec.max_marks.ok_or_else(|| {
                WorkflowError::ContextMismatch("class test has no maxMarks".to_string())
            })?;
            Tally::Marks(tally::marks_tally(
                rows.iter().filter_map(|r| match r {
                    RecordRow::Marks(m) => Some(m),
                    RecordRow::Attendance(_) => None,
                }),
                &roster,
                max_marks,
            ))
        }
    };

    let now = Utc::now().to_rfc3339();
    let changed = tx.execute(
        "UPDATE submissions
         SET state = 'finalized',
             version = version + 1,
             counts_json = ?,
             finalized_at = ?,
             finalized_by = ?,
             updated_at = ?
         WHERE id = ? AND state = 'draft'",
        (
            serde_json::to_string(&counts)?,
            &now,
            &actor.user_id,
            &now,
            &rec.id,
        ),
    )?;
    if changed != 1 {
        return Err(WorkflowError::AlreadyFinalized);
    }
    tx.commit()?;
    tracing::info!(
        kind = kind.as_str(),
        context = %ctx.key.storage_key(),
        actor = %actor.user_id,
        "submission finalized"
    );

    match load_record(conn, ctx)? {
        Some(rec) => rec.report(),
        None => Err(WorkflowError::NotFound("submission")),
    }
}
