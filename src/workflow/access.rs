use serde::{Deserialize, Serialize};

use super::error::{WorkflowError, WorkflowResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRef {
    pub class_id: String,
    pub section_id: String,
}

/// Who is acting, passed explicitly with every workflow call.
///
/// For teachers `sections` is the set of class/sections they are the
/// homeroom (HR) teacher of; for students it is their own enrolment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorContext {
    pub user_id: String,
    pub role: Role,
    #[serde(default)]
    pub sections: Vec<SectionRef>,
}

impl ActorContext {
    pub fn covers(&self, class_id: &str, section_id: &str) -> bool {
        self.sections
            .iter()
            .any(|s| s.class_id == class_id && s.section_id == section_id)
    }

    pub fn can_read(&self, class_id: &str, section_id: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Teacher | Role::Student => self.covers(class_id, section_id),
        }
    }

    pub fn can_write(&self, class_id: &str, section_id: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Teacher => self.covers(class_id, section_id),
            Role::Student => false,
        }
    }

    pub fn ensure_can_read(&self, class_id: &str, section_id: &str) -> WorkflowResult<()> {
        if self.can_read(class_id, section_id) {
            return Ok(());
        }
        Err(WorkflowError::Forbidden(format!(
            "{} may not view records for this section",
            self.user_id
        )))
    }

    pub fn ensure_can_write(&self, class_id: &str, section_id: &str) -> WorkflowResult<()> {
        if self.can_write(class_id, section_id) {
            return Ok(());
        }
        Err(WorkflowError::Forbidden(format!(
            "{} may not record for this section",
            self.user_id
        )))
    }
}
