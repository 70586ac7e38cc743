use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Attendance,
    Marks,
}

impl SubmissionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attendance => "attendance",
            Self::Marks => "marks",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    NotStarted,
    Draft,
    Finalized,
}

impl SubmissionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Draft => "draft",
            Self::Finalized => "finalized",
        }
    }

    /// Parses a persisted state. `not_started` is never stored.
    pub fn from_stored(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "finalized" => Some(Self::Finalized),
            _ => None,
        }
    }
}

/// What a submission records: attendance for a day, or marks for one class test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextKey {
    Day { date: NaiveDate },
    ClassTest { subject_id: String, date: NaiveDate },
}

impl ContextKey {
    pub fn kind(&self) -> SubmissionKind {
        match self {
            Self::Day { .. } => SubmissionKind::Attendance,
            Self::ClassTest { .. } => SubmissionKind::Marks,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Day { date } | Self::ClassTest { date, .. } => *date,
        }
    }

    pub fn subject_id(&self) -> Option<&str> {
        match self {
            Self::Day { .. } => None,
            Self::ClassTest { subject_id, .. } => Some(subject_id.as_str()),
        }
    }

    /// Canonical key stored in `submissions.context_key`.
    pub fn storage_key(&self) -> String {
        match self {
            Self::Day { date } => format_date(*date),
            Self::ClassTest { subject_id, date } => {
                format!("{}@{}", subject_id, format_date(*date))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionContext {
    pub class_id: String,
    pub section_id: String,
    pub key: ContextKey,
}

impl SubmissionContext {
    pub fn attendance(class_id: &str, section_id: &str, date: NaiveDate) -> Self {
        Self {
            class_id: class_id.to_string(),
            section_id: section_id.to_string(),
            key: ContextKey::Day { date },
        }
    }

    pub fn class_test(class_id: &str, section_id: &str, subject_id: &str, date: NaiveDate) -> Self {
        Self {
            class_id: class_id.to_string(),
            section_id: section_id.to_string(),
            key: ContextKey::ClassTest {
                subject_id: subject_id.to_string(),
                date,
            },
        }
    }

    pub fn kind(&self) -> SubmissionKind {
        self.key.kind()
    }

    pub fn to_json(&self) -> Value {
        let mut v = json!({
            "kind": self.kind(),
            "classId": self.class_id,
            "sectionId": self.section_id,
            "date": format_date(self.key.date()),
        });
        if let Some(subject_id) = self.key.subject_id() {
            v["subjectId"] = json!(subject_id);
        }
        v
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, WorkflowError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| WorkflowError::BadParams("date must be YYYY-MM-DD".to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Late => "late",
            Self::Excused => "excused",
        }
    }

    /// Accepts full names or the single-letter register codes (P/A/L/E).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" | "p" => Some(Self::Present),
            "absent" | "a" => Some(Self::Absent),
            "late" | "l" => Some(Self::Late),
            "excused" | "e" => Some(Self::Excused),
            _ => None,
        }
    }

    /// Present/absent are the only values the marking flow itself produces.
    pub fn is_basic(self) -> bool {
        matches!(self, Self::Present | Self::Absent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    pub student_id: String,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksRow {
    pub student_id: String,
    /// `None` is an explicit blank.
    pub marks: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordRow {
    Attendance(AttendanceRow),
    Marks(MarksRow),
}

impl RecordRow {
    pub fn kind(&self) -> SubmissionKind {
        match self {
            Self::Attendance(_) => SubmissionKind::Attendance,
            Self::Marks(_) => SubmissionKind::Marks,
        }
    }

    pub fn student_id(&self) -> &str {
        match self {
            Self::Attendance(r) => &r.student_id,
            Self::Marks(r) => &r.student_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student_id: String,
    pub name: String,
    pub roll_no: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTally {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub excused: usize,
    pub unmarked: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksTally {
    pub graded: usize,
    pub blank: usize,
    pub total: usize,
    pub sum: f64,
    pub average: Option<f64>,
    pub highest: Option<f64>,
    pub lowest: Option<f64>,
    pub max_marks: f64,
    pub average_percent: Option<f64>,
}

/// Aggregate counts frozen at finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Tally {
    Attendance(AttendanceTally),
    Marks(MarksTally),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub state: SubmissionState,
    pub version: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_marks: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<Tally>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized_by: Option<String>,
}

impl StatusReport {
    pub fn not_started() -> Self {
        Self {
            state: SubmissionState::NotStarted,
            version: 0,
            max_marks: None,
            counts: None,
            updated_at: None,
            finalized_at: None,
            finalized_by: None,
        }
    }
}
