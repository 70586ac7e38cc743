use serde_json::json;

use super::load_settings;
use crate::ipc::error::{err, ok, workflow_err};
use crate::ipc::params::parse_actor;
use crate::ipc::types::{AppState, Request};
use crate::settings::{self, SetupSection};
use crate::workflow::access::Role;

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match load_settings(conn) {
        Ok(current) => ok(
            &req.id,
            json!({
                "attendance": current.attendance,
                "marks": current.marks
            }),
        ),
        Err(e) => workflow_err(&req.id, &e),
    }
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let actor = match parse_actor(&req.params) {
        Ok(a) => a,
        Err(e) => return workflow_err(&req.id, &e),
    };
    if actor.role != Role::Admin {
        return err(
            &req.id,
            "forbidden",
            format!("{} may not change workspace setup", actor.user_id),
            None,
        );
    }
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let current = match load_settings(conn) {
        Ok(v) => v,
        Err(e) => return workflow_err(&req.id, &e),
    };
    let next = match settings::apply_patch(&current, section, patch_obj) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    if let Err(e) = settings::save(conn, &next, section) {
        return err(&req.id, "db_failed", format!("{:#}", e), None);
    }
    tracing::info!(section = section_raw, user = %actor.user_id, "setup updated");
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
