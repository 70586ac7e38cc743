use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    BadParams(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Forbidden(String),
    #[error("no draft exists for this context")]
    NotStarted,
    #[error("submission is finalized")]
    AlreadyFinalized,
    #[error("editor is read-only")]
    ReadOnly,
    #[error("{0}")]
    InvalidValue(String),
    #[error("marks {value} exceed the maximum of {max}")]
    OutOfRange { value: f64, max: f64 },
    #[error("student {0} is not on the roster")]
    NotInRoster(String),
    #[error("{0}")]
    ContextMismatch(String),
    #[error("submission changed since it was read (expected version {expected:?}, found {actual})")]
    Conflict { expected: Option<i64>, actual: i64 },
    #[error("save pending edits before finalizing")]
    UnsavedChanges,
    #[error("settings unavailable: {0}")]
    Settings(String),
    #[error("tally encoding failed: {0}")]
    TallyCodec(#[from] serde_json::Error),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl WorkflowError {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadParams(_) => "bad_params",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::NotStarted => "not_started",
            Self::AlreadyFinalized => "already_finalized",
            Self::ReadOnly => "read_only",
            Self::InvalidValue(_) => "invalid_value",
            Self::OutOfRange { .. } => "out_of_range",
            Self::NotInRoster(_) => "not_in_roster",
            Self::ContextMismatch(_) => "context_mismatch",
            Self::Conflict { .. } => "conflict",
            Self::UnsavedChanges => "unsaved_changes",
            Self::Settings(_) | Self::TallyCodec(_) | Self::Db(_) => "db_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::OutOfRange { value, max } => Some(json!({ "value": value, "maxMarks": max })),
            Self::NotInRoster(student_id) => Some(json!({ "studentId": student_id })),
            Self::Conflict { expected, actual } => Some(json!({
                "expectedVersion": expected,
                "actualVersion": actual
            })),
            _ => None,
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
