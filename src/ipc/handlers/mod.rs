pub mod core;
pub mod editor;
pub mod roster;
pub mod setup;
pub mod submissions;

use rusqlite::Connection;
use serde_json::Value;

use crate::ipc::error::{err, ok, workflow_err};
use crate::ipc::types::{AppState, Request};
use crate::settings::{self, WorkflowSettings};
use crate::workflow::error::{WorkflowError, WorkflowResult};

/// Runs `f` against the open workspace and wraps its result in a reply.
fn respond<F>(state: &AppState, req: &Request, f: F) -> Value
where
    F: FnOnce(&Connection, &Value) -> WorkflowResult<Value>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => workflow_err(&req.id, &e),
    }
}

fn load_settings(conn: &Connection) -> WorkflowResult<WorkflowSettings> {
    settings::load(conn).map_err(|e| WorkflowError::Settings(format!("{:#}", e)))
}
