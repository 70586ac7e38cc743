use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

use super::access::ActorContext;
use super::draft::{self, SaveDraft, SaveOutcome};
use super::error::{WorkflowError, WorkflowResult};
use super::finalize;
use super::model::{
    AttendanceRow, AttendanceStatus, MarksRow, RecordRow, RosterEntry, StatusReport,
    SubmissionContext, SubmissionKind, SubmissionState, Tally,
};
use super::roster;
use super::status;
use crate::settings::WorkflowSettings;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Status(AttendanceStatus),
    Marks(f64),
}

#[derive(Debug, Clone)]
struct EditorRow {
    entry: RosterEntry,
    value: Option<CellValue>,
    remark: Option<String>,
    /// A row for this student exists in the store.
    stored: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EditorOptions {
    pub read_only: bool,
    pub max_marks: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorRowView {
    pub student_id: String,
    pub name: String,
    pub roll_no: Option<i64>,
    pub value: Option<CellValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSnapshot {
    pub context: Value,
    pub state: SubmissionState,
    pub version: i64,
    pub read_only: bool,
    pub dirty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_marks: Option<f64>,
    pub rows: Vec<EditorRowView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<Tally>,
}

/// In-memory roster editor for one submission context.
///
/// Nothing reaches the store until [`Editor::save`]; a failed save or
/// finalize leaves the editor exactly as it was.
#[derive(Debug, Clone)]
pub struct Editor {
    actor: ActorContext,
    settings: WorkflowSettings,
    context: SubmissionContext,
    state: SubmissionState,
    version: i64,
    max_marks: Option<f64>,
    read_only: bool,
    dirty: bool,
    rows: Vec<EditorRow>,
    counts: Option<Tally>,
}

/// Reads a marks cell as typed by a user: a number, a numeric string, or
/// null / empty for blank.
pub fn parse_marks_input(raw: &Value) -> WorkflowResult<Option<f64>> {
    match raw {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| WorkflowError::InvalidValue("marks must be a number".to_string())),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return Ok(None);
            }
            t.parse::<f64>()
                .map(Some)
                .map_err(|_| WorkflowError::InvalidValue(format!("{:?} is not a number", t)))
        }
        _ => Err(WorkflowError::InvalidValue(
            "marks must be a number, a numeric string or null".to_string(),
        )),
    }
}

impl Editor {
    pub fn open(
        conn: &Connection,
        actor: ActorContext,
        settings: WorkflowSettings,
        context: SubmissionContext,
        options: EditorOptions,
    ) -> WorkflowResult<Self> {
        let kind = context.kind();
        actor.ensure_can_read(&context.class_id, &context.section_id)?;
        let read_only = options.read_only || !actor.can_write(&context.class_id, &context.section_id);

        let report = status::status(conn, &actor, &context)?;
        let roster = roster::get_roster(conn, &context.class_id, &context.section_id)?;

        let max_marks = match kind {
            SubmissionKind::Attendance => {
                if options.max_marks.is_some() {
                    return Err(WorkflowError::BadParams(
                        "maxMarks applies to marks only".to_string(),
                    ));
                }
                None
            }
            SubmissionKind::Marks => match (report.max_marks, options.max_marks) {
                (Some(stored), Some(asked)) if stored != asked => {
                    return Err(WorkflowError::ContextMismatch(format!(
                        "class test is out of {}, not {}",
                        stored, asked
                    )));
                }
                (Some(stored), _) => Some(stored),
                (None, Some(asked)) => Some(draft::validate_max_marks(asked)?),
                (None, None) => match settings.marks.default_max_marks {
                    Some(max) => Some(max),
                    None if read_only => None,
                    None => {
                        return Err(WorkflowError::BadParams(
                            "maxMarks is required to open a new class test".to_string(),
                        ));
                    }
                },
            },
        };

        let rows: Vec<EditorRow> = if report.state == SubmissionState::NotStarted {
            let default = match kind {
                SubmissionKind::Attendance => {
                    Some(CellValue::Status(settings.attendance.default_status))
                }
                SubmissionKind::Marks => None,
            };
            roster
                .into_iter()
                .map(|entry| EditorRow {
                    entry,
                    value: default,
                    remark: None,
                    stored: false,
                })
                .collect()
        } else {
            let mut stored: HashMap<String, RecordRow> = status::rows(conn, &actor, &context)?
                .into_iter()
                .map(|r| (r.student_id().to_string(), r))
                .collect();
            roster
                .into_iter()
                .map(|entry| {
                    // Roster members without a stored row stay blank.
                    let (value, remark, found) = match stored.remove(&entry.student_id) {
                        Some(RecordRow::Attendance(a)) => {
                            (Some(CellValue::Status(a.status)), a.remark, true)
                        }
                        Some(RecordRow::Marks(m)) => (m.marks.map(CellValue::Marks), m.remark, true),
                        None => (None, None, false),
                    };
                    EditorRow {
                        entry,
                        value,
                        remark,
                        stored: found,
                    }
                })
                .collect()
        };

        let dirty = !read_only
            && report.state == SubmissionState::NotStarted
            && rows.iter().any(|r| r.value.is_some());

        Ok(Self {
            actor,
            settings,
            context,
            state: report.state,
            version: report.version,
            max_marks,
            read_only,
            dirty,
            rows,
            counts: report.counts,
        })
    }

    pub fn context(&self) -> &SubmissionContext {
        &self.context
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.read_only || self.state == SubmissionState::Finalized
    }

    fn guard(&self) -> WorkflowResult<()> {
        if self.state == SubmissionState::Finalized {
            return Err(WorkflowError::AlreadyFinalized);
        }
        if self.read_only {
            return Err(WorkflowError::ReadOnly);
        }
        Ok(())
    }

    fn row_mut(&mut self, student_id: &str) -> WorkflowResult<&mut EditorRow> {
        self.rows
            .iter_mut()
            .find(|r| r.entry.student_id == student_id)
            .ok_or_else(|| WorkflowError::NotInRoster(student_id.to_string()))
    }

    fn expect_kind(&self, kind: SubmissionKind) -> WorkflowResult<()> {
        if self.context.kind() != kind {
            return Err(WorkflowError::ContextMismatch(format!(
                "this editor records {}",
                self.context.kind().as_str()
            )));
        }
        Ok(())
    }

    pub fn set_attendance(&mut self, student_id: &str, status: AttendanceStatus) -> WorkflowResult<()> {
        self.guard()?;
        self.expect_kind(SubmissionKind::Attendance)?;
        if !status.is_basic() && !self.settings.attendance.allow_extended_statuses {
            return Err(WorkflowError::InvalidValue(format!(
                "attendance must be present or absent, got {}",
                status.as_str()
            )));
        }
        let row = self.row_mut(student_id)?;
        let next = Some(CellValue::Status(status));
        if row.value != next {
            row.value = next;
            self.dirty = true;
        }
        Ok(())
    }

    /// Rejects values above the test's maximum before anything is sent.
    pub fn set_marks(&mut self, student_id: &str, marks: Option<f64>) -> WorkflowResult<()> {
        self.guard()?;
        self.expect_kind(SubmissionKind::Marks)?;
        if let Some(v) = marks {
            draft::validate_marks(v, self.max_marks)?;
        }
        let row = self.row_mut(student_id)?;
        let next = marks.map(CellValue::Marks);
        if row.value != next {
            row.value = next;
            self.dirty = true;
        }
        Ok(())
    }

    pub fn set_value(&mut self, student_id: &str, raw: &Value) -> WorkflowResult<()> {
        match self.context.kind() {
            SubmissionKind::Attendance => {
                let status = raw
                    .as_str()
                    .and_then(AttendanceStatus::parse)
                    .ok_or_else(|| {
                        WorkflowError::InvalidValue(
                            "status must be one of present, absent, late, excused".to_string(),
                        )
                    })?;
                self.set_attendance(student_id, status)
            }
            SubmissionKind::Marks => {
                let marks = parse_marks_input(raw)?;
                self.set_marks(student_id, marks)
            }
        }
    }

    pub fn set_remark(&mut self, student_id: &str, remark: Option<&str>) -> WorkflowResult<()> {
        self.guard()?;
        let next = remark
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let kind = self.context.kind();
        let row = self.row_mut(student_id)?;
        if next.is_some() && row.value.is_none() && kind == SubmissionKind::Attendance {
            return Err(WorkflowError::InvalidValue(format!(
                "mark attendance for {} before adding a remark",
                student_id
            )));
        }
        if row.remark != next {
            row.remark = next;
            self.dirty = true;
        }
        Ok(())
    }

    fn pending_row(&self, row: &EditorRow) -> Option<RecordRow> {
        let student_id = row.entry.student_id.clone();
        let remark = row.remark.clone();
        match row.value {
            Some(CellValue::Status(status)) => Some(RecordRow::Attendance(AttendanceRow {
                student_id,
                status,
                remark,
            })),
            Some(CellValue::Marks(m)) => Some(RecordRow::Marks(MarksRow {
                student_id,
                marks: Some(m),
                remark,
            })),
            // A blank mark is sent when it clears a stored one or carries a remark.
            None if self.context.kind() == SubmissionKind::Marks
                && (row.stored || remark.is_some()) =>
            {
                Some(RecordRow::Marks(MarksRow {
                    student_id,
                    marks: None,
                    remark,
                }))
            }
            None => None,
        }
    }

    /// Rows the next save will send. Rows left out match the store.
    pub fn pending_rows(&self) -> Vec<RecordRow> {
        self.rows
            .iter()
            .filter_map(|row| self.pending_row(row))
            .collect()
    }

    pub fn save(&mut self, conn: &Connection) -> WorkflowResult<SaveOutcome> {
        self.guard()?;
        let rows = self.pending_rows();
        let req = SaveDraft {
            context: self.context.clone(),
            rows,
            expected_version: Some(self.version),
            max_marks: self.max_marks,
        };
        let outcome = draft::save_draft(conn, &self.actor, &self.settings, &req)?;

        self.state = outcome.state;
        self.version = outcome.version;
        self.dirty = false;
        let sent: Vec<bool> = self
            .rows
            .iter()
            .map(|row| self.pending_row(row).is_some())
            .collect();
        for (row, sent) in self.rows.iter_mut().zip(sent) {
            row.stored |= sent;
        }
        Ok(outcome)
    }

    /// Finalizes the saved draft, then re-reads the status so counts and the
    /// lock reflect the store.
    pub fn finalize(&mut self, conn: &Connection) -> WorkflowResult<StatusReport> {
        self.guard()?;
        if self.dirty {
            return Err(WorkflowError::UnsavedChanges);
        }
        finalize::finalize(
            conn,
            &self.actor,
            &self.settings,
            &self.context,
            Some(self.version),
        )?;
        let report = status::status(conn, &self.actor, &self.context)?;
        self.state = report.state;
        self.version = report.version;
        self.counts = report.counts.clone();
        Ok(report)
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            context: self.context.to_json(),
            state: self.state,
            version: self.version,
            read_only: self.is_locked(),
            dirty: self.dirty,
            max_marks: self.max_marks,
            rows: self
                .rows
                .iter()
                .map(|r| EditorRowView {
                    student_id: r.entry.student_id.clone(),
                    name: r.entry.name.clone(),
                    roll_no: r.entry.roll_no,
                    value: r.value,
                    remark: r.remark.clone(),
                })
                .collect(),
            counts: self.counts.clone(),
        }
    }
}
