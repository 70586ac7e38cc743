use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db;
use crate::workflow::model::{AttendanceStatus, SubmissionKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct AttendanceSettings {
    /// Value every roster row starts with when a day is first opened.
    pub default_status: AttendanceStatus,
    /// Lets edits record late/excused, not only present/absent.
    pub allow_extended_statuses: bool,
    pub require_version: bool,
}

impl Default for AttendanceSettings {
    fn default() -> Self {
        Self {
            default_status: AttendanceStatus::Present,
            allow_extended_statuses: false,
            require_version: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct MarksSettings {
    pub default_max_marks: Option<f64>,
    pub require_version: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
    pub attendance: AttendanceSettings,
    pub marks: MarksSettings,
}

impl WorkflowSettings {
    pub fn require_version(&self, kind: SubmissionKind) -> bool {
        match kind {
            SubmissionKind::Attendance => self.attendance.require_version,
            SubmissionKind::Marks => self.marks.require_version,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupSection {
    Attendance,
    Marks,
}

impl SetupSection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "attendance" => Some(Self::Attendance),
            "marks" => Some(Self::Marks),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Attendance => "setup.attendance",
            Self::Marks => "setup.marks",
        }
    }
}

pub fn load(conn: &Connection) -> anyhow::Result<WorkflowSettings> {
    let mut out = WorkflowSettings::default();
    if let Some(saved) = db::settings_get_json(conn, SetupSection::Attendance.key())? {
        match serde_json::from_value(saved) {
            Ok(v) => out.attendance = v,
            Err(e) => tracing::warn!("ignoring malformed attendance settings: {}", e),
        }
    }
    if let Some(saved) = db::settings_get_json(conn, SetupSection::Marks.key())? {
        match serde_json::from_value(saved) {
            Ok(v) => out.marks = v,
            Err(e) => tracing::warn!("ignoring malformed marks settings: {}", e),
        }
    }
    Ok(out)
}

fn merge_object(current: Value, patch: &Map<String, Value>) -> Result<Value, String> {
    let mut current = current;
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        obj.insert(k.clone(), v.clone());
    }
    Ok(current)
}

/// Applies a partial update to one section and validates the result.
/// Errors are user-facing messages.
pub fn apply_patch(
    current: &WorkflowSettings,
    section: SetupSection,
    patch: &Map<String, Value>,
) -> Result<WorkflowSettings, String> {
    let mut next = current.clone();
    match section {
        SetupSection::Attendance => {
            let base = serde_json::to_value(&current.attendance).map_err(|e| e.to_string())?;
            let merged = merge_object(base, patch)?;
            let parsed: AttendanceSettings =
                serde_json::from_value(merged).map_err(|e| format!("attendance: {}", e))?;
            if !parsed.default_status.is_basic() {
                return Err("attendance.defaultStatus must be present or absent".to_string());
            }
            next.attendance = parsed;
        }
        SetupSection::Marks => {
            let base = serde_json::to_value(&current.marks).map_err(|e| e.to_string())?;
            let merged = merge_object(base, patch)?;
            let parsed: MarksSettings =
                serde_json::from_value(merged).map_err(|e| format!("marks: {}", e))?;
            if let Some(max) = parsed.default_max_marks {
                if !max.is_finite() || max <= 0.0 {
                    return Err("marks.defaultMaxMarks must be a positive number".to_string());
                }
            }
            next.marks = parsed;
        }
    }
    Ok(next)
}

pub fn save(conn: &Connection, settings: &WorkflowSettings, section: SetupSection) -> anyhow::Result<()> {
    let value = match section {
        SetupSection::Attendance => serde_json::to_value(&settings.attendance)?,
        SetupSection::Marks => serde_json::to_value(&settings.marks)?,
    };
    db::settings_set_json(conn, section.key(), &value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn defaults_mark_everyone_present() {
        let s = WorkflowSettings::default();
        assert_eq!(s.attendance.default_status, AttendanceStatus::Present);
        assert_eq!(s.marks.default_max_marks, None);
        assert!(!s.require_version(SubmissionKind::Marks));
    }

    #[test]
    fn patch_rejects_unknown_fields_and_bad_values() {
        let s = WorkflowSettings::default();
        assert!(apply_patch(&s, SetupSection::Marks, &patch(json!({ "bogus": 1 }))).is_err());
        assert!(apply_patch(
            &s,
            SetupSection::Marks,
            &patch(json!({ "defaultMaxMarks": 0 }))
        )
        .is_err());
        assert!(apply_patch(
            &s,
            SetupSection::Attendance,
            &patch(json!({ "defaultStatus": "late" }))
        )
        .is_err());
    }

    #[test]
    fn saved_sections_load_back() {
        let conn = db::open_in_memory().expect("db");
        let s = apply_patch(
            &WorkflowSettings::default(),
            SetupSection::Marks,
            &patch(json!({ "defaultMaxMarks": 25, "requireVersion": true })),
        )
        .expect("patch");
        save(&conn, &s, SetupSection::Marks).expect("save");

        let loaded = load(&conn).expect("load");
        assert_eq!(loaded.marks.default_max_marks, Some(25.0));
        assert!(loaded.require_version(SubmissionKind::Marks));
        assert!(!loaded.require_version(SubmissionKind::Attendance));
    }
}
