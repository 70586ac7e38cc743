mod common;

use common::{str_field, temp_dir, School, Sidecar};
use serde_json::json;

#[test]
fn requests_before_a_workspace_is_selected() {
    let mut sc = Sidecar::spawn();

    let health = sc.request_ok("health", json!({}));
    assert_eq!(health["workspacePath"], json!(null));
    assert_eq!(health["openEditors"], 0);

    let classes = sc.request_ok("classes.list", json!({}));
    assert_eq!(classes["classes"], json!([]));

    for method in [
        "classes.create",
        "students.list",
        "attendance.status",
        "marks.saveDraft",
        "editor.open",
        "setup.get",
    ] {
        sc.request_err(method, json!({}), "no_workspace");
    }
    sc.request_err("workspace.select", json!({}), "bad_params");
}

#[test]
fn unknown_methods_and_bad_lines_are_reported() {
    let mut sc = Sidecar::spawn();

    sc.request_err("grades.publish", json!({}), "not_implemented");
    sc.request_err("attendance.delete", json!({}), "not_implemented");

    let reply = sc.send_line("{not json");
    assert_eq!(reply["ok"], false);
    assert_eq!(reply["error"]["code"], "bad_json");

    // The daemon keeps serving after a bad line.
    sc.request_ok("health", json!({}));
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let mut sc = Sidecar::with_workspace("schoold-router-smoke");
    let school = School::seed(&mut sc);

    let classes = sc.request_ok("classes.list", json!({}));
    assert_eq!(classes["classes"][0]["name"], "Grade 7");
    assert_eq!(classes["classes"][0]["sectionCount"], 2);
    assert_eq!(classes["classes"][0]["studentCount"], 3);

    let sections = sc.request_ok("sections.list", json!({ "classId": school.class_id }));
    assert_eq!(sections["sections"].as_array().map(|s| s.len()), Some(2));
    let subjects = sc.request_ok("subjects.list", json!({ "classId": school.class_id }));
    assert_eq!(subjects["subjects"][0]["id"], school.subject_id);

    sc.request_err(
        "sections.create",
        json!({ "classId": "missing", "name": "C" }),
        "not_found",
    );
    sc.request_err(
        "students.create",
        json!({ "classId": school.class_id, "sectionId": "missing", "name": "Dev" }),
        "not_found",
    );

    let error = sc.request_err(
        "sections.create",
        json!({ "classId": school.class_id, "name": "A" }),
        "bad_params",
    );
    assert!(error["message"].as_str().is_some_and(|m| m.contains("\"A\"")));
    sc.request_err(
        "subjects.create",
        json!({ "classId": school.class_id, "name": "Science" }),
        "bad_params",
    );

    let ctx = school.day("2026-02-02", school.hr_teacher());
    sc.request_ok("attendance.status", ctx.clone());
    sc.request_ok("marks.status", school.test("2026-02-02", school.hr_teacher()));
    sc.request_ok("setup.get", json!({}));
    let opened = sc.request_ok(
        "editor.open",
        common::with(ctx, json!({ "kind": "attendance" })),
    );
    let editor_id = str_field(&opened, "editorId");
    sc.request_ok("editor.get", json!({ "editorId": editor_id }));

    // Switching workspaces drops open editors.
    let next = temp_dir("schoold-router-smoke-next");
    sc.request_ok("workspace.select", json!({ "path": next.to_string_lossy() }));
    sc.request_err("editor.get", json!({ "editorId": editor_id }), "not_found");
    let classes = sc.request_ok("classes.list", json!({}));
    assert_eq!(classes["classes"], json!([]));
}
